//! Semantic metrics over tidy ACS records. Consumers name a metric
//! ("owner-occupied units"); the definitions table owns the labels.

use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::{dictionary::VariableLabel, CATEGORY, GEOID, MEASURE, SUBCATEGORY, VALUE, VARIABLE};
use crate::{
    error::{Error, Result},
    table::{column, numeric_values, text_values},
};

/// A derivation over tidy records of one GEOID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricExpr {
    Variable(VariableLabel),
    Sum(Vec<MetricExpr>),
    Difference(Box<MetricExpr>, Box<MetricExpr>),
    Ratio(Box<MetricExpr>, Box<MetricExpr>),
}

impl MetricExpr {
    pub fn estimate(category: &str, subcategory: &str, variable: &str) -> Self {
        Self::Variable(VariableLabel::new("Estimate", category, subcategory, variable))
    }

    pub fn difference(a: MetricExpr, b: MetricExpr) -> Self { Self::Difference(Box::new(a), Box::new(b)) }

    pub fn ratio(a: MetricExpr, b: MetricExpr) -> Self { Self::Ratio(Box::new(a), Box::new(b)) }

    /// Every label the expression reads.
    pub fn labels(&self) -> Vec<&VariableLabel> {
        let mut out = Vec::new();
        self.collect_labels(&mut out);
        out
    }

    fn collect_labels<'a>(&'a self, out: &mut Vec<&'a VariableLabel>) {
        match self {
            Self::Variable(label) => out.push(label),
            Self::Sum(terms) => terms.iter().for_each(|t| t.collect_labels(out)),
            Self::Difference(a, b) | Self::Ratio(a, b) => {
                a.collect_labels(out);
                b.collect_labels(out);
            }
        }
    }

    fn eval(&self, lookup: &impl Fn(&VariableLabel) -> Option<f64>) -> Option<f64> {
        match self {
            Self::Variable(label) => lookup(label),
            Self::Sum(terms) => terms.iter().map(|t| t.eval(lookup)).sum(),
            Self::Difference(a, b) => Some(a.eval(lookup)? - b.eval(lookup)?),
            Self::Ratio(a, b) => {
                let denominator = b.eval(lookup)?;
                if denominator == 0.0 { return None }
                Some(a.eval(lookup)? / denominator)
            }
        }
    }
}

/// Values of one snapshot keyed by (GEOID, label), with GEOIDs in record order.
struct Snapshot<'a> {
    geoids: Vec<&'a str>,
    values: AHashMap<(&'a str, VariableLabel), Option<f64>>,
    labels: AHashSet<VariableLabel>,
}

impl<'a> Snapshot<'a> {
    fn index(geoids: &'a [Option<String>], tidy: &DataFrame) -> Result<Self> {
        let parts = [MEASURE, CATEGORY, SUBCATEGORY, VARIABLE].into_iter()
            .map(|name| text_values(column(tidy, name)?))
            .collect::<Result<Vec<_>>>()?;
        let values = numeric_values(column(tidy, VALUE)?)?;

        let mut snapshot = Snapshot { geoids: Vec::new(), values: AHashMap::new(), labels: AHashSet::new() };
        let mut seen = AHashSet::new();
        for (i, geoid) in geoids.iter().enumerate() {
            let Some(geoid) = geoid.as_deref() else { continue };
            if seen.insert(geoid) { snapshot.geoids.push(geoid) }
            let text = |p: usize| parts[p][i].clone().unwrap_or_default();
            let label = VariableLabel { measure: text(0), category: text(1), subcategory: text(2), variable: text(3) };
            snapshot.labels.insert(label.clone());
            snapshot.values.entry((geoid, label)).or_insert(values[i]);
        }
        Ok(snapshot)
    }

    fn evaluate(&self, expr: &MetricExpr) -> Result<Vec<Option<f64>>> {
        if let Some(missing) = expr.labels().into_iter().find(|l| !self.labels.contains(*l)) {
            return Err(Error::UnknownVariable(missing.to_string()));
        }
        Ok(self.geoids.iter()
            .map(|&geoid| expr.eval(&|label: &VariableLabel| {
                self.values.get(&(geoid, label.clone())).copied().flatten()
            }))
            .collect())
    }
}

/// Semantic name → expression.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinitions {
    metrics: BTreeMap<String, MetricExpr>,
}

impl MetricDefinitions {
    /// Housing and population metrics over the ACS data profiles.
    pub fn standard() -> Self {
        let occupancy = |variable: &str| MetricExpr::estimate("HOUSING OCCUPANCY", "Total housing units", variable);
        let tenure = |variable: &str| MetricExpr::estimate("HOUSING TENURE", "Occupied housing units", variable);

        let mut defs = Self::default();
        defs.insert("total housing units", occupancy("Total"));
        defs.insert("occupied housing units", occupancy("Occupied housing units"));
        defs.insert("vacant housing units", occupancy("Vacant housing units"));
        defs.insert("owner-occupied units", tenure("Owner-occupied"));
        defs.insert("renter-occupied units", tenure("Renter-occupied"));
        defs.insert("owner-occupancy rate", MetricExpr::ratio(tenure("Owner-occupied"), tenure("Total")));
        defs.insert("vacancy rate", MetricExpr::ratio(occupancy("Vacant housing units"), occupancy("Total")));
        defs.insert("total population", MetricExpr::estimate("SEX AND AGE", "Total population", "Total"));
        defs
    }

    pub fn insert(&mut self, name: &str, expr: MetricExpr) {
        self.metrics.insert(name.to_string(), expr);
    }

    #[inline] pub fn get(&self, name: &str) -> Option<&MetricExpr> { self.metrics.get(name) }

    pub fn names(&self) -> impl Iterator<Item = &str> { self.metrics.keys().map(String::as_str) }

    fn expr(&self, name: &str) -> Result<&MetricExpr> {
        self.get(name).ok_or_else(|| Error::Config(format!("no metric named {name:?}")))
    }

    /// One value per GEOID: a `GEOID` column and a column named after the metric.
    pub fn evaluate(&self, name: &str, tidy: &DataFrame) -> Result<DataFrame> {
        let expr = self.expr(name)?;
        let geoids = text_values(column(tidy, GEOID)?)?;
        let snapshot = Snapshot::index(&geoids, tidy)?;
        let values = snapshot.evaluate(expr)?;
        Ok(DataFrame::new(vec![
            Column::new(GEOID.into(), snapshot.geoids.clone()),
            Column::new(name.into(), values),
        ])?)
    }

    /// `later − earlier` for every GEOID present in both snapshots, in the
    /// later snapshot's order.
    pub fn delta(&self, name: &str, earlier: &DataFrame, later: &DataFrame) -> Result<DataFrame> {
        let expr = self.expr(name)?;
        let earlier_ids = text_values(column(earlier, GEOID)?)?;
        let later_ids = text_values(column(later, GEOID)?)?;
        let before = Snapshot::index(&earlier_ids, earlier)?;
        let after = Snapshot::index(&later_ids, later)?;

        let before_values: AHashMap<&str, Option<f64>> = before.geoids.iter().copied()
            .zip(before.evaluate(expr)?)
            .collect();
        let mut geoids = Vec::new();
        let mut deltas = Vec::new();
        for (geoid, value) in after.geoids.iter().zip(after.evaluate(expr)?) {
            let Some(previous) = before_values.get(geoid) else { continue };
            geoids.push(*geoid);
            deltas.push(value.zip(*previous).map(|(now, then)| now - then));
        }
        log::debug!("[census::metrics] {name} delta over {} shared GEOIDs", geoids.len());
        Ok(DataFrame::new(vec![
            Column::new(GEOID.into(), geoids),
            Column::new(name.into(), deltas),
        ])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::census::{tidy, VariableDictionary};

    fn dictionary() -> VariableDictionary {
        VariableDictionary::from_pairs([
            ("DP04_0045E", "Estimate!!HOUSING TENURE!!Occupied housing units"),
            ("DP04_0046E", "Estimate!!HOUSING TENURE!!Occupied housing units!!Owner-occupied"),
        ])
    }

    fn snapshot(geoids: &[&str], total: &[i64], owners: &[i64]) -> DataFrame {
        let wide = df!("GEOID" => geoids, "DP04_0045E" => total, "DP04_0046E" => owners).unwrap();
        tidy(&wide, &dictionary()).unwrap()
    }

    #[test]
    fn evaluates_one_value_per_geoid() {
        let defs = MetricDefinitions::standard();
        let tidy = snapshot(&["a", "b"], &[100, 50], &[60, 0]);
        let owners = defs.evaluate("owner-occupied units", &tidy).unwrap();
        assert_eq!(numeric_values(owners.column("owner-occupied units").unwrap()).unwrap(), vec![Some(60.0), Some(0.0)]);

        let rate = defs.evaluate("owner-occupancy rate", &tidy).unwrap();
        assert_eq!(numeric_values(rate.column("owner-occupancy rate").unwrap()).unwrap(), vec![Some(0.6), Some(0.0)]);
    }

    #[test]
    fn ratio_over_zero_is_missing() {
        let defs = MetricDefinitions::standard();
        let rate = defs.evaluate("owner-occupancy rate", &snapshot(&["a"], &[0], &[0])).unwrap();
        assert_eq!(rate.column("owner-occupancy rate").unwrap().null_count(), 1);
    }

    #[test]
    fn missing_variable_is_an_error() {
        let defs = MetricDefinitions::standard();
        let tidy = snapshot(&["a"], &[10], &[5]);
        assert!(matches!(defs.evaluate("vacant housing units", &tidy), Err(Error::UnknownVariable(_))));
        assert!(matches!(defs.evaluate("no such metric", &tidy), Err(Error::Config(_))));
    }

    #[test]
    fn delta_over_shared_geoids() {
        let defs = MetricDefinitions::standard();
        let earlier = snapshot(&["a", "b"], &[100, 50], &[60, 20]);
        let later = snapshot(&["c", "b", "a"], &[10, 55, 110], &[1, 25, 70]);
        let delta = defs.delta("owner-occupied units", &earlier, &later).unwrap();
        assert_eq!(text_values(delta.column(GEOID).unwrap()).unwrap(), vec![Some("b".into()), Some("a".into())]);
        assert_eq!(numeric_values(delta.column("owner-occupied units").unwrap()).unwrap(), vec![Some(5.0), Some(10.0)]);
    }

    #[test]
    fn delta_requires_the_variable_in_both_snapshots() {
        let defs = MetricDefinitions::standard();
        let later = snapshot(&["a"], &[10], &[5]);
        let earlier = tidy(
            &df!("GEOID" => ["a"], "DP04_0045E" => [9i64]).unwrap(),
            &dictionary(),
        ).unwrap();
        assert!(matches!(defs.delta("owner-occupied units", &earlier, &later), Err(Error::UnknownVariable(_))));
    }
}
