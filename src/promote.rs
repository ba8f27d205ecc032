//! Latitude/longitude detection and promotion to a point geometry column.

use geo::{Geometry, Point};
use polars::frame::DataFrame;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, Warning},
    table::{numeric_values, Dataset, GeoTable, WGS84},
};

/// Column-name candidates, compared case-insensitively against whole names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromoteConfig {
    pub latitude: Vec<String>,
    pub longitude: Vec<String>,
}

impl Default for PromoteConfig {
    fn default() -> Self {
        Self {
            latitude: vec!["latitude".into(), "lat".into()],
            longitude: vec!["longitude".into(), "lon".into(), "lng".into(), "long".into()],
        }
    }
}

/// Columns found for each axis, first match in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coordinates {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

/// A promotion result plus the warning raised when only one axis was found.
#[derive(Debug, Clone)]
pub struct Promotion {
    pub dataset: Dataset,
    pub warning: Option<Warning>,
}

impl PromoteConfig {
    pub fn detect(&self, df: &DataFrame) -> Coordinates {
        let find = |candidates: &[String]| df.get_column_names().into_iter()
            .find(|name| candidates.iter().any(|c| c.eq_ignore_ascii_case(name.as_str())))
            .map(|name| name.to_string());
        Coordinates { latitude: find(&self.latitude), longitude: find(&self.longitude) }
    }

    /// Promote a plain table carrying both coordinate columns into a point
    /// layer tagged WGS84. Rows with a missing or non-numeric coordinate get
    /// no geometry.
    pub fn promote(&self, df: DataFrame) -> Result<Promotion> {
        let (lat, lon) = match self.detect(&df) {
            Coordinates { latitude: Some(lat), longitude: Some(lon) } => (lat, lon),
            Coordinates { latitude: None, longitude: None } => {
                return Ok(Promotion { dataset: Dataset::Table(df), warning: None });
            }
            Coordinates { latitude, longitude } => {
                let (found, missing) = match latitude {
                    Some(lat) => (lat, "longitude"),
                    None => (longitude.unwrap_or_default(), "latitude"),
                };
                let warning = Warning::new("promote", format!(
                    "found coordinate column {found:?} but no {missing} column; leaving the table as is"
                ));
                return Ok(Promotion { dataset: Dataset::Table(df), warning: Some(warning) });
            }
        };

        let ys = numeric_values(crate::table::column(&df, &lat)?)?;
        let xs = numeric_values(crate::table::column(&df, &lon)?)?;
        let geometry = xs.into_iter().zip(ys)
            .map(|(x, y)| match (x, y) {
                (Some(x), Some(y)) => Some(Geometry::Point(Point::new(x, y))),
                _ => None,
            })
            .collect();

        log::debug!("[promote] promoted {lat:?}/{lon:?} to point geometry");
        Ok(Promotion { dataset: Dataset::Geo(GeoTable::new(df, geometry, WGS84)?), warning: None })
    }

    /// Promote a dataset; geospatial tables pass through unchanged.
    pub fn promote_dataset(&self, dataset: Dataset) -> Result<Promotion> {
        match dataset {
            Dataset::Table(df) => self.promote(df),
            geo @ Dataset::Geo(_) => Ok(Promotion { dataset: geo, warning: None }),
        }
    }
}

/// Promote with the default name candidates.
pub fn promote(df: DataFrame) -> Result<Promotion> {
    PromoteConfig::default().promote(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn both_columns_make_points() {
        let df = df!("Name" => ["A", "B"], "LAT" => [44.47, 44.26], "Lng" => [-73.21, -72.57]).unwrap();
        let promotion = promote(df).unwrap();
        assert!(promotion.warning.is_none());
        let geo = promotion.dataset.as_geo().cloned().unwrap();
        assert_eq!(geo.epsg(), WGS84);
        assert_eq!(geo.geometry()[0], Some(Geometry::Point(Point::new(-73.21, 44.47))));
    }

    #[test]
    fn one_column_warns_and_keeps_table() {
        let df = df!("lat" => [44.47]).unwrap();
        let promotion = promote(df).unwrap();
        assert!(promotion.dataset.as_geo().is_none());
        assert_eq!(promotion.warning.map(|w| w.component), Some("promote"));
    }

    #[test]
    fn no_columns_is_silent() {
        let promotion = promote(df!("town" => ["Barre"]).unwrap()).unwrap();
        assert!(promotion.warning.is_none());
        assert!(promotion.dataset.as_geo().is_none());
    }

    #[test]
    fn substrings_do_not_match() {
        let coords = PromoteConfig::default().detect(&df!("latency" => [1i64], "longer" => [2i64]).unwrap());
        assert_eq!(coords, Coordinates::default());
    }

    #[test]
    fn unparseable_coordinates_get_no_geometry() {
        let df = df!("latitude" => [Some("44.5"), Some("n/a")], "longitude" => [Some("-72.6"), Some("-72.7")]).unwrap();
        let geo = promote(df).unwrap().dataset.as_geo().cloned().unwrap();
        assert!(geo.geometry()[0].is_some());
        assert!(geo.geometry()[1].is_none());
    }
}
