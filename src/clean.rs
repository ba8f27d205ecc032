//! Column-name driven type inference.
//!
//! Rules run per column, in order: dots in names become underscores,
//! blank text becomes missing, then the first matching name rule applies
//! (timestamp, year, month), else two-valued columns using a recognised
//! encoding become boolean. Geospatial tables finally render timestamps as
//! text. Already-typed columns are left alone, so cleaning is idempotent.

use std::collections::BTreeSet;

use ahash::AHashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    table::{text_values, Dataset, GeoTable},
};

/// Text layout for timestamps inside geospatial tables.
pub const TIMESTAMP_TEXT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%Y%m%d", "%d %B %Y", "%B %d, %Y", "%b %d, %Y"];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june",
    "july", "august", "september", "october", "november", "december",
];

/// A recognised two-valued encoding, matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BooleanPair {
    pub truthy: String,
    pub falsy: String,
}

impl BooleanPair {
    pub fn new(truthy: &str, falsy: &str) -> Self {
        Self { truthy: truthy.to_lowercase(), falsy: falsy.to_lowercase() }
    }
}

/// The cleaning ruleset. Name tokens are matched as lowercase substrings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanerConfig {
    pub empty_as_missing: bool,
    pub timestamp_tokens: Vec<String>,
    pub year_tokens: Vec<String>,
    pub month_tokens: Vec<String>,
    pub boolean_pairs: Vec<BooleanPair>,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            empty_as_missing: true,
            timestamp_tokens: vec!["datetime".into(), "date".into(), "time".into()],
            year_tokens: vec!["year".into()],
            month_tokens: vec!["month".into()],
            boolean_pairs: vec![
                BooleanPair::new("yes", "no"),
                BooleanPair::new("y", "n"),
                BooleanPair::new("1", "0"),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameRule {
    Timestamp,
    Year,
    Month,
    Plain,
}

/// Applies a [`CleanerConfig`] to tables.
#[derive(Debug, Clone, Default)]
pub struct Cleaner {
    config: CleanerConfig,
}

impl Cleaner {
    pub fn new(config: CleanerConfig) -> Self { Self { config } }

    #[inline] pub fn config(&self) -> &CleanerConfig { &self.config }

    /// Clean every column of a plain table.
    pub fn clean(&self, df: &DataFrame) -> Result<DataFrame> {
        let columns = df.get_columns().iter()
            .zip(clean_names(df))
            .map(|(col, name)| self.clean_column(col, name))
            .collect::<Result<Vec<_>>>()?;
        Ok(DataFrame::new(columns)?)
    }

    /// Clean the attribute columns, then render timestamps as text.
    pub fn clean_geo(&self, geo: GeoTable) -> Result<GeoTable> {
        let data = timestamps_to_text(&self.clean(geo.data())?)?;
        geo.with_data(data)
    }

    pub fn clean_dataset(&self, dataset: Dataset) -> Result<Dataset> {
        Ok(match dataset {
            Dataset::Table(df) => Dataset::Table(self.clean(&df)?),
            Dataset::Geo(geo) => Dataset::Geo(self.clean_geo(geo)?),
        })
    }

    fn rule_for(&self, lower_name: &str) -> NameRule {
        let hit = |tokens: &[String]| tokens.iter().any(|t| lower_name.contains(t.as_str()));
        if hit(&self.config.timestamp_tokens) {
            NameRule::Timestamp
        } else if hit(&self.config.year_tokens) {
            NameRule::Year
        } else if hit(&self.config.month_tokens) {
            NameRule::Month
        } else {
            NameRule::Plain
        }
    }

    fn clean_column(&self, col: &Column, name: String) -> Result<Column> {
        let mut col = col.clone().with_name(name.as_str().into());

        if self.config.empty_as_missing && col.dtype() == &DataType::String {
            col = blank_to_null(&col)?;
        }

        let rule = self.rule_for(&name.to_lowercase());
        if rule != NameRule::Plain && is_temporal(col.dtype()) { return Ok(col) }

        match rule {
            NameRule::Timestamp => timestamp_column(&name, &col, parse_timestamp),
            NameRule::Year => timestamp_column(&name, &col, |v| {
                parse_timestamp(v).or_else(|| year_of(v).and_then(|y| parse_timestamp(&format!("{y:04}-01-01"))))
            }),
            NameRule::Month => timestamp_column(&name, &col, |v| {
                parse_timestamp(v).or_else(|| month_of(v).and_then(|m| parse_timestamp(&format!("2000-{m:02}-01"))))
            }),
            NameRule::Plain => self.coerce_boolean(&name, col),
        }
    }

    fn coerce_boolean(&self, name: &str, col: Column) -> Result<Column> {
        if !(col.dtype() == &DataType::String || col.dtype().is_integer()) { return Ok(col) }

        let lowered: Vec<Option<String>> = text_values(&col)?.into_iter()
            .map(|v| v.map(|s| s.trim().to_lowercase()))
            .collect();
        let distinct: BTreeSet<&str> = lowered.iter().flatten().map(String::as_str).collect();
        if distinct.len() != 2 { return Ok(col) }

        let Some(pair) = self.config.boolean_pairs.iter()
            .find(|p| distinct.contains(p.truthy.as_str()) && distinct.contains(p.falsy.as_str()))
        else {
            return Ok(col);
        };

        log::debug!("[clean] {name}: boolean ({}/{})", pair.truthy, pair.falsy);
        let values: Vec<Option<bool>> = lowered.iter()
            .map(|v| v.as_deref().map(|s| s == pair.truthy))
            .collect();
        Ok(Column::new(name.into(), values))
    }
}

/// Clean with the default ruleset.
pub fn clean(df: &DataFrame) -> Result<DataFrame> {
    Cleaner::default().clean(df)
}

#[inline]
fn is_temporal(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Date | DataType::Datetime(_, _))
}

fn blank_to_null(col: &Column) -> Result<Column> {
    let values: Vec<Option<&str>> = col.str()?.into_iter()
        .map(|v| v.filter(|s| !s.trim().is_empty()))
        .collect();
    Ok(Column::new(col.name().clone(), values))
}

/// Values as text, with integral reals rendered without a fraction.
fn value_texts(col: &Column) -> Result<Vec<Option<String>>> {
    if col.dtype().is_float() {
        return Ok(col.cast(&DataType::Float64)?.f64()?.into_iter()
            .map(|v| v.filter(|x| x.is_finite()).map(|x| {
                if x.fract() == 0.0 { format!("{}", x as i64) } else { x.to_string() }
            }))
            .collect());
    }
    if col.dtype() == &DataType::Boolean {
        return Ok(vec![None; col.len()]);
    }
    text_values(col)
}

fn timestamp_column(name: &str, col: &Column, parse: impl Fn(&str) -> Option<NaiveDateTime>) -> Result<Column> {
    let texts = value_texts(col)?;
    let millis: Vec<Option<i64>> = texts.iter()
        .map(|v| v.as_deref().and_then(&parse).map(|dt| dt.and_utc().timestamp_millis()))
        .collect();

    let failed = texts.iter().zip(&millis).filter(|(t, m)| t.is_some() && m.is_none()).count();
    if failed > 0 {
        log::debug!("[clean] {name}: {failed} values did not parse as timestamps");
    }

    Ok(Column::new(name.into(), millis).cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?)
}

/// Parse the timestamp layouts commonly found in source files.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() { return None }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) { return Some(dt.naive_utc()) }
    if let Some(dt) = DATETIME_FORMATS.iter().find_map(|f| NaiveDateTime::parse_from_str(value, f).ok()) {
        return Some(dt);
    }
    if let Some(d) = DATE_FORMATS.iter().find_map(|f| NaiveDate::parse_from_str(value, f).ok()) {
        return d.and_hms_opt(0, 0, 0);
    }
    let t = TIME_FORMATS.iter().find_map(|f| NaiveTime::parse_from_str(value, f).ok())?;
    Some(NaiveDate::from_ymd_opt(1970, 1, 1)?.and_time(t))
}

fn year_of(value: &str) -> Option<i32> {
    let value = value.trim();
    let year = value.parse::<i32>().ok()
        .or_else(|| value.parse::<f64>().ok().filter(|f| f.fract() == 0.0).map(|f| f as i32))?;
    (1..=9999).contains(&year).then_some(year)
}

/// Month number from a full English name, a three-letter abbreviation or 1–12.
pub fn month_of(value: &str) -> Option<u32> {
    let value = value.trim().to_lowercase();
    if let Ok(n) = value.parse::<u32>() {
        return (1..=12).contains(&n).then_some(n);
    }
    if let Ok(f) = value.parse::<f64>() {
        return (f.fract() == 0.0 && (1.0..=12.0).contains(&f)).then_some(f as u32);
    }
    MONTHS.iter().position(|m| *m == value || (value.len() == 3 && m.starts_with(value.as_str())))
        .map(|i| i as u32 + 1)
}

/// Render every timestamp column as [`TIMESTAMP_TEXT_FORMAT`] text.
pub fn timestamps_to_text(df: &DataFrame) -> Result<DataFrame> {
    let columns = df.get_columns().iter()
        .map(|col| -> Result<Column> {
            if !is_temporal(col.dtype()) { return Ok(col.clone()) }
            let values: Vec<Option<String>> = naive_datetimes(col)?.into_iter()
                .map(|v| v.map(|dt| dt.format(TIMESTAMP_TEXT_FORMAT).to_string()))
                .collect();
            Ok(Column::new(col.name().clone(), values))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(DataFrame::new(columns)?)
}

/// Timestamp values of a Date or Datetime column.
pub(crate) fn naive_datetimes(col: &Column) -> Result<Vec<Option<NaiveDateTime>>> {
    Ok(match col.dtype() {
        DataType::Datetime(unit, _) => {
            let unit = *unit;
            col.cast(&DataType::Int64)?.i64()?.into_iter()
                .map(|v| v.and_then(|v| match unit {
                    TimeUnit::Milliseconds => DateTime::from_timestamp_millis(v),
                    TimeUnit::Microseconds => DateTime::from_timestamp_micros(v),
                    TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(v)),
                }).map(|dt| dt.naive_utc()))
                .collect()
        }
        DataType::Date => {
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1);
            col.cast(&DataType::Int32)?.i32()?.into_iter()
                .map(|days| {
                    let date = epoch?.checked_add_signed(chrono::TimeDelta::try_days(days? as i64)?)?;
                    date.and_hms_opt(0, 0, 0)
                })
                .collect()
        }
        _ => vec![None; col.len()],
    })
}

/// Column names with "." replaced by "_". A replaced name that collides with
/// another column gets the first free `_2`, `_3`, ... suffix; names without a
/// dot never change.
fn clean_names(df: &DataFrame) -> Vec<String> {
    let mut taken: AHashSet<String> = df.get_column_names().iter()
        .filter(|name| !name.contains('.'))
        .map(|name| name.to_string())
        .collect();
    df.get_column_names().iter()
        .map(|name| {
            if !name.contains('.') { return name.to_string() }
            let base = name.replace('.', "_");
            let mut candidate = base.clone();
            let mut n = 2;
            while taken.contains(&candidate) {
                candidate = format!("{base}_{n}");
                n += 1;
            }
            log::debug!("[clean] renamed {name} to {candidate}");
            taken.insert(candidate.clone());
            candidate
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(col: &Column) -> Vec<Option<String>> {
        col.str().unwrap().into_iter().map(|v| v.map(str::to_string)).collect()
    }

    #[test]
    fn dots_become_underscores() {
        let df = df!("pop.total" => [1i64, 2, 3]).unwrap();
        assert_eq!(clean(&df).unwrap().get_column_names(), ["pop_total"]);
    }

    #[test]
    fn renamed_columns_never_collide() {
        let df = df!("a.b" => [1i64, 2], "a_b" => [3i64, 4], "a.b_2" => [5i64, 6]).unwrap();
        let out = clean(&df).unwrap();
        assert_eq!(out.get_column_names(), ["a_b_2", "a_b", "a_b_2_2"]);
        assert_eq!(out.column("a_b").unwrap().i64().unwrap().get(0), Some(3));
        assert!(clean(&out).unwrap().equals_missing(&out));
    }

    #[test]
    fn blanks_become_missing() {
        let df = df!("town" => [Some("Barre"), Some("  "), Some(""), None]).unwrap();
        assert_eq!(clean(&df).unwrap().column("town").unwrap().null_count(), 3);
    }

    #[test]
    fn date_columns_parse_or_go_missing() {
        let df = df!("Survey Date" => [Some("2020-01-02"), Some("garbage"), Some("03/04/2021")]).unwrap();
        let out = clean(&df).unwrap();
        let col = out.column("Survey Date").unwrap();
        assert!(matches!(col.dtype(), DataType::Datetime(TimeUnit::Milliseconds, None)));
        assert_eq!(col.null_count(), 1);
        let parsed = naive_datetimes(col).unwrap();
        assert_eq!(parsed[2].map(|d| d.date()), NaiveDate::from_ymd_opt(2021, 3, 4));
    }

    #[test]
    fn year_and_month_compose_dates() {
        let df = df!(
            "year" => [Some(2019i64), Some(2023), None],
            "Month" => [Some("March"), Some("oct"), Some("13")],
        ).unwrap();
        let out = clean(&df).unwrap();

        let years = naive_datetimes(out.column("year").unwrap()).unwrap();
        assert_eq!(years[0].map(|d| d.date()), NaiveDate::from_ymd_opt(2019, 1, 1));
        assert!(years[2].is_none());

        let months = naive_datetimes(out.column("Month").unwrap()).unwrap();
        assert_eq!(months[0].map(|d| d.date()), NaiveDate::from_ymd_opt(2000, 3, 1));
        assert_eq!(months[1].map(|d| d.date()), NaiveDate::from_ymd_opt(2000, 10, 1));
        assert!(months[2].is_none());
    }

    #[test]
    fn month_names() {
        assert_eq!(month_of("February"), Some(2));
        assert_eq!(month_of("sep"), Some(9));
        assert_eq!(month_of("7"), Some(7));
        assert_eq!(month_of("0"), None);
        assert_eq!(month_of("ju"), None);
        assert_eq!(month_of("janvier"), None);
    }

    #[test]
    fn boolean_encodings() {
        let df = df!(
            "active" => [Some("Yes"), Some("no"), None, Some("YES")],
            "flag" => [1i64, 0, 0, 1],
            "tri" => [Some("y"), Some("n"), Some("maybe"), None],
        ).unwrap();
        let out = clean(&df).unwrap();

        let active: Vec<_> = out.column("active").unwrap().bool().unwrap().into_iter().collect();
        assert_eq!(active, [Some(true), Some(false), None, Some(true)]);
        assert_eq!(out.column("flag").unwrap().dtype(), &DataType::Boolean);
        assert_eq!(out.column("tri").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn geospatial_timestamps_become_text() {
        let df = df!("date" => ["2020-01-02"]).unwrap();
        let geo = GeoTable::new(df, vec![None], crate::table::WGS84).unwrap();
        let cleaned = Cleaner::default().clean_geo(geo).unwrap();
        assert_eq!(strings(cleaned.data().column("date").unwrap()), [Some("2020-01-02 00:00:00".into())]);

        let again = Cleaner::default().clean_geo(cleaned.clone()).unwrap();
        assert!(again.data().equals_missing(cleaned.data()));
    }

    #[test]
    fn cleaning_twice_changes_nothing() {
        let df = df!(
            "id" => [1i64, 2, 3],
            "date" => [Some("2020-01-02"), None, Some("2020-03-01")],
            "active" => ["yes", "no", "yes"],
            "year" => ["2001", "x", "2003"],
        ).unwrap();
        let once = clean(&df).unwrap();
        let twice = clean(&once).unwrap();
        assert!(once.equals_missing(&twice));
    }

    #[test]
    fn custom_ruleset() {
        let config = CleanerConfig {
            boolean_pairs: vec![BooleanPair::new("T", "F")],
            timestamp_tokens: vec!["when".into()],
            ..CleanerConfig::default()
        };
        let df = df!("ok" => ["t", "f"], "date" => ["a", "b"]).unwrap();
        let out = Cleaner::new(config).clean(&df).unwrap();
        assert_eq!(out.column("ok").unwrap().dtype(), &DataType::Boolean);
        assert_eq!(out.column("date").unwrap().dtype(), &DataType::String);
    }
}
