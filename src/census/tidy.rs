use ahash::{AHashMap, AHashSet};
use polars::prelude::*;

use super::{
    dictionary::{VariableDictionary, VariableLabel},
    CATEGORY, COUNTY, GEOID, JURISDICTION, MEASURE, NAME, SUBCATEGORY, VALUE, VARIABLE,
};
use crate::{
    error::Result,
    table::{column, numeric_values, text_values, Dataset, GeoTable},
};

/// Census annotation codes published in place of an estimate.
const ANNOTATIONS: [f64; 6] = [
    -999_999_999.0, -888_888_888.0, -666_666_666.0,
    -555_555_555.0, -333_333_333.0, -222_222_222.0,
];

/// Jurisdiction and county parsed from a Census `NAME`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CensusName {
    pub jurisdiction: String,
    pub county: Option<String>,
}

/// Parse "<Jurisdiction>, <County> County, <State>". A county-level name
/// ("<County> County, <State>") is its own jurisdiction.
pub fn split_census_name(name: &str) -> CensusName {
    let parts: Vec<&str> = name.split(',').map(str::trim).collect();
    let county_of = |part: &str| part.strip_suffix(" County").map(str::to_string);

    match parts.as_slice() {
        [jurisdiction, county, _, ..] => CensusName {
            jurisdiction: jurisdiction.to_string(),
            county: county_of(*county).or_else(|| Some(county.to_string())),
        },
        [only, _state] if county_of(*only).is_some() => CensusName {
            jurisdiction: only.to_string(),
            county: county_of(*only),
        },
        _ => CensusName { jurisdiction: parts.first().copied().unwrap_or_default().to_string(), county: None },
    }
}

/// Replace `NAME` with `Jurisdiction` and `County` columns in its position.
pub fn split_name(df: &DataFrame) -> Result<DataFrame> {
    let names = text_values(column(df, NAME)?)?;
    let parsed: Vec<Option<CensusName>> = names.iter()
        .map(|n| n.as_deref().map(split_census_name))
        .collect();
    let jurisdiction = Column::new(JURISDICTION.into(), parsed.iter()
        .map(|p| p.as_ref().map(|p| p.jurisdiction.clone()))
        .collect::<Vec<_>>());
    let county = Column::new(COUNTY.into(), parsed.iter()
        .map(|p| p.as_ref().and_then(|p| p.county.clone()))
        .collect::<Vec<_>>());

    let mut columns = Vec::with_capacity(df.width() + 1);
    let mut replacements = Some((jurisdiction, county));
    for col in df.get_columns() {
        match col.name().as_str() {
            NAME => if let Some((j, c)) = replacements.take() {
                columns.push(j);
                columns.push(c);
            },
            JURISDICTION | COUNTY => log::debug!("[census::tidy] replacing existing {} column", col.name()),
            _ => columns.push(col.clone()),
        }
    }
    Ok(DataFrame::new(columns)?)
}

/// Pivot a wide ACS table into tidy records.
pub fn tidy(df: &DataFrame, dict: &VariableDictionary) -> Result<DataFrame> {
    Ok(pivot_longer(df, dict)?.0)
}

/// Pivot a geospatial ACS table; each record keeps its feature's geometry.
pub fn tidy_geo(geo: &GeoTable, dict: &VariableDictionary) -> Result<GeoTable> {
    let (data, source) = pivot_longer(geo.data(), dict)?;
    let geometry = source.into_iter().map(|row| geo.geometry()[row].clone()).collect();
    GeoTable::new(data, geometry, geo.epsg())
}

pub fn tidy_dataset(dataset: &Dataset, dict: &VariableDictionary) -> Result<Dataset> {
    Ok(match dataset {
        Dataset::Table(df) => Dataset::Table(tidy(df, dict)?),
        Dataset::Geo(geo) => Dataset::Geo(tidy_geo(geo, dict)?),
    })
}

/// Returns the tidy frame and, per output record, the input row it came from.
fn pivot_longer(df: &DataFrame, dict: &VariableDictionary) -> Result<(DataFrame, Vec<usize>)> {
    let df = if df.column(NAME).is_ok() { split_name(df)? } else { df.clone() };
    let geoids = text_values(column(&df, GEOID)?)?;

    let identifiers: Vec<(&str, Vec<Option<String>>)> = [JURISDICTION, COUNTY].into_iter()
        .filter_map(|name| df.column(name).ok().map(|col| (name, col)))
        .map(|(name, col)| text_values(col).map(|values| (name, values)))
        .collect::<Result<_>>()?;

    let mut variables: Vec<(&VariableLabel, Vec<Option<f64>>)> = Vec::new();
    let mut unknown = 0;
    for col in df.get_columns() {
        let name = col.name().as_str();
        if [GEOID, JURISDICTION, COUNTY].contains(&name) { continue }
        match dict.get(name) {
            Some(label) => variables.push((label, numeric_values(col)?)),
            None => unknown += 1,
        }
    }
    if unknown > 0 {
        log::debug!("[census::tidy] {unknown} columns have no dictionary entry and were dropped");
    }

    let mut seen: AHashSet<(Option<&str>, &VariableLabel)> = AHashSet::new();
    let mut source = Vec::new();
    let mut labels = Vec::new();
    let mut values = Vec::new();
    let mut duplicates = 0;
    for (row, geoid) in geoids.iter().enumerate() {
        for (label, column_values) in &variables {
            if !seen.insert((geoid.as_deref(), *label)) {
                duplicates += 1;
                continue;
            }
            source.push(row);
            labels.push(*label);
            values.push(column_values[row].filter(|v| !ANNOTATIONS.contains(v)));
        }
    }
    if duplicates > 0 {
        log::warn!("[census::tidy] dropped {duplicates} records repeating a (GEOID, label) pair");
    }

    let pick = |values: &[Option<String>]| source.iter().map(|&row| values[row].clone()).collect::<Vec<_>>();
    let mut columns = vec![Column::new(GEOID.into(), pick(&geoids))];
    for (name, values) in &identifiers {
        columns.push(Column::new((*name).into(), pick(values)));
    }
    columns.push(Column::new(MEASURE.into(), labels.iter().map(|l| l.measure.as_str()).collect::<Vec<_>>()));
    columns.push(Column::new(CATEGORY.into(), labels.iter().map(|l| l.category.as_str()).collect::<Vec<_>>()));
    columns.push(Column::new(SUBCATEGORY.into(), labels.iter().map(|l| l.subcategory.as_str()).collect::<Vec<_>>()));
    columns.push(Column::new(VARIABLE.into(), labels.iter().map(|l| l.variable.as_str()).collect::<Vec<_>>()));
    columns.push(Column::new(VALUE.into(), values));

    log::debug!("[census::tidy] {} rows x {} variables -> {} records", df.height(), variables.len(), source.len());
    Ok((DataFrame::new(columns)?, source))
}

/// Re-pivot tidy records to one row per GEOID and one column per label,
/// named by its dictionary code (or the joined label when no code has it).
pub fn widen(tidy: &DataFrame, dict: &VariableDictionary) -> Result<DataFrame> {
    let geoids = text_values(column(tidy, GEOID)?)?;
    let identifiers: Vec<(&str, Vec<Option<String>>)> = [JURISDICTION, COUNTY].into_iter()
        .filter_map(|name| tidy.column(name).ok().map(|col| (name, col)))
        .map(|(name, col)| text_values(col).map(|values| (name, values)))
        .collect::<Result<_>>()?;
    let parts = [MEASURE, CATEGORY, SUBCATEGORY, VARIABLE].into_iter()
        .map(|name| text_values(column(tidy, name)?))
        .collect::<Result<Vec<_>>>()?;
    let values = numeric_values(column(tidy, VALUE)?)?;

    let mut rows: Vec<usize> = Vec::new();
    let mut row_of: AHashMap<Option<&str>, usize> = AHashMap::new();
    let mut names: Vec<String> = Vec::new();
    let mut column_of: AHashMap<VariableLabel, usize> = AHashMap::new();
    let mut cells: AHashMap<(usize, usize), f64> = AHashMap::new();

    for i in 0..tidy.height() {
        let row = *row_of.entry(geoids[i].as_deref()).or_insert_with(|| {
            rows.push(i);
            rows.len() - 1
        });
        let text = |p: usize| parts[p][i].clone().unwrap_or_default();
        let label = VariableLabel { measure: text(0), category: text(1), subcategory: text(2), variable: text(3) };
        let col = match column_of.get(&label) {
            Some(&col) => col,
            None => {
                names.push(dict.code_for(&label).map_or_else(|| label.to_string(), str::to_string));
                column_of.insert(label, names.len() - 1);
                names.len() - 1
            }
        };
        if let Some(v) = values[i] {
            cells.entry((row, col)).or_insert(v);
        }
    }

    let pick = |values: &[Option<String>]| rows.iter().map(|&i| values[i].clone()).collect::<Vec<_>>();
    let mut columns = vec![Column::new(GEOID.into(), pick(&geoids))];
    for (name, values) in &identifiers {
        columns.push(Column::new((*name).into(), pick(values)));
    }
    for (col, name) in names.iter().enumerate() {
        let data: Vec<Option<f64>> = (0..rows.len()).map(|row| cells.get(&(row, col)).copied()).collect();
        columns.push(Column::new(name.as_str().into(), data));
    }
    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use geo::{point, Geometry};

    fn dictionary() -> VariableDictionary {
        VariableDictionary::from_pairs([
            ("DP04_0045E", "Estimate!!HOUSING TENURE!!Occupied housing units"),
            ("DP04_0046E", "Estimate!!HOUSING TENURE!!Occupied housing units!!Owner-occupied"),
            ("DP04_0047E", "Estimate!!HOUSING TENURE!!Occupied housing units!!Renter-occupied"),
        ])
    }

    fn wide() -> DataFrame {
        df!(
            "GEOID" => ["5000710675", "5000785150"],
            "NAME" => ["Burlington city, Chittenden County, Vermont", "Winooski city, Chittenden County, Vermont"],
            "DP04_0045E" => [18_000i64, 3_300],
            "DP04_0046E" => [7_000i64, 1_200],
            "DP04_0047E" => [11_000i64, -666_666_666],
            "state" => ["50", "50"],
        ).unwrap()
    }

    #[test]
    fn splits_place_names() {
        assert_eq!(split_census_name("Burlington city, Chittenden County, Vermont"), CensusName {
            jurisdiction: "Burlington city".into(),
            county: Some("Chittenden".into()),
        });
        assert_eq!(split_census_name("Essex County, Vermont").county.as_deref(), Some("Essex"));
        assert_eq!(split_census_name("Vermont").county, None);
    }

    #[test]
    fn split_name_replaces_the_column_in_place() {
        let df = split_name(&wide()).unwrap();
        let names: Vec<_> = df.get_column_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(&names[..3], ["GEOID", "Jurisdiction", "County"]);
        assert!(df.column(NAME).is_err());
    }

    #[test]
    fn pivots_known_codes_only() {
        let long = tidy(&wide(), &dictionary()).unwrap();
        assert_eq!(long.height(), 6);
        assert_eq!(
            long.get_column_names().iter().map(|n| n.as_str()).collect::<Vec<_>>(),
            ["GEOID", "Jurisdiction", "County", "Measure", "Category", "Subcategory", "Variable", "Value"],
        );
        let variables = text_values(long.column(VARIABLE).unwrap()).unwrap();
        assert_eq!(variables[0].as_deref(), Some("Total"));
        assert_eq!(variables[1].as_deref(), Some("Owner-occupied"));
        let values = numeric_values(long.column(VALUE).unwrap()).unwrap();
        assert_eq!(values[1], Some(7_000.0));
        assert_eq!(values[5], None);
    }

    #[test]
    fn geoid_is_required() {
        let df = df!("DP04_0046E" => [1i64]).unwrap();
        assert!(matches!(tidy(&df, &dictionary()), Err(Error::MissingColumn(c)) if c == GEOID));
    }

    #[test]
    fn geometry_follows_its_records() {
        let geometry = vec![
            Some(Geometry::Point(point!(x: -73.21, y: 44.48))),
            Some(Geometry::Point(point!(x: -73.19, y: 44.49))),
        ];
        let geo = GeoTable::new(wide(), geometry, crate::table::WGS84).unwrap();
        let long = tidy_geo(&geo, &dictionary()).unwrap();
        assert_eq!(long.height(), 6);
        assert_eq!(long.geometry()[3], geo.geometry()[1]);
    }

    #[test]
    fn duplicate_labels_keep_the_first_code() {
        let dict = VariableDictionary::from_pairs([
            ("A", "Estimate!!X!!Y!!Z"),
            ("B", "Estimate!!X!!Y!!Z"),
        ]);
        let df = df!("GEOID" => ["1"], "A" => [1.0], "B" => [2.0]).unwrap();
        let long = tidy(&df, &dict).unwrap();
        assert_eq!(long.height(), 1);
        assert_eq!(numeric_values(long.column(VALUE).unwrap()).unwrap(), vec![Some(1.0)]);
    }

    #[test]
    fn widen_restores_code_columns() {
        let dict = dictionary();
        let wide = widen(&tidy(&wide(), &dict).unwrap(), &dict).unwrap();
        assert_eq!(wide.height(), 2);
        for code in ["DP04_0045E", "DP04_0046E", "DP04_0047E"] {
            assert!(wide.column(code).is_ok(), "{code}");
        }
        let owners = numeric_values(wide.column("DP04_0046E").unwrap()).unwrap();
        assert_eq!(owners, vec![Some(7_000.0), Some(1_200.0)]);
    }
}
