//! In-memory tables: plain polars frames and geospatial tables with a
//! parallel geometry column.
mod cells;

pub(crate) use cells::{column_from_cells, Cell, ColumnsBuilder};

use geo::Geometry;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{crs, error::{Error, Result}};

/// EPSG code of WGS84 longitude/latitude.
pub const WGS84: u32 = 4326;

/// Abstract type attached to a column after cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Text,
    Integer,
    Real,
    Boolean,
    Timestamp,
    Geometry,
}

impl SemanticType {
    /// Semantic tag for a polars dtype.
    pub fn of(dtype: &DataType) -> Self {
        match dtype {
            DataType::Boolean => Self::Boolean,
            DataType::Date | DataType::Datetime(_, _) => Self::Timestamp,
            dt if dt.is_integer() => Self::Integer,
            dt if dt.is_float() => Self::Real,
            _ => Self::Text,
        }
    }

    /// Lowercase display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
            Self::Geometry => "geometry",
        }
    }
}

/// Column names with their semantic tags, in column order.
pub fn semantic_schema(df: &DataFrame) -> Vec<(String, SemanticType)> {
    df.get_columns().iter()
        .map(|col| (col.name().to_string(), SemanticType::of(col.dtype())))
        .collect()
}

/// A table with one designated geometry column and a CRS tag.
#[derive(Debug, Clone)]
pub struct GeoTable {
    data: DataFrame,
    geometry: Vec<Option<Geometry<f64>>>,
    epsg: u32,
}

impl GeoTable {
    /// Logical name of the geometry column.
    pub const GEOMETRY: &'static str = "geometry";

    /// Pair a frame with one geometry per row.
    pub fn new(data: DataFrame, geometry: Vec<Option<Geometry<f64>>>, epsg: u32) -> Result<Self> {
        if data.width() > 0 && data.height() != geometry.len() {
            return Err(PolarsError::ShapeMismatch(format!(
                "geometry column has {} rows, data has {}", geometry.len(), data.height()
            ).into()).into());
        }
        Ok(Self { data, geometry, epsg })
    }

    /// Attribute columns.
    #[inline] pub fn data(&self) -> &DataFrame { &self.data }

    /// Geometry column, aligned with `data()` rows.
    #[inline] pub fn geometry(&self) -> &[Option<Geometry<f64>>] { &self.geometry }

    /// EPSG code of the geometry coordinates.
    #[inline] pub fn epsg(&self) -> u32 { self.epsg }

    /// Number of rows.
    #[inline] pub fn height(&self) -> usize { self.geometry.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.geometry.is_empty() }

    pub fn into_parts(self) -> (DataFrame, Vec<Option<Geometry<f64>>>, u32) {
        (self.data, self.geometry, self.epsg)
    }

    /// Replace the attribute columns, keeping geometry and CRS.
    pub fn with_data(self, data: DataFrame) -> Result<Self> {
        Self::new(data, self.geometry, self.epsg)
    }

    /// Semantic schema including the geometry column.
    pub fn schema(&self) -> Vec<(String, SemanticType)> {
        let mut schema = semantic_schema(&self.data);
        schema.push((Self::GEOMETRY.to_string(), SemanticType::Geometry));
        schema
    }

    /// Keep rows where `mask` is true.
    pub fn filter(&self, mask: &[bool]) -> Result<Self> {
        let geometry = self.geometry.iter().zip(mask)
            .filter(|(_, keep)| **keep)
            .map(|(geom, _)| geom.clone())
            .collect();
        Self::new(mask_frame(&self.data, mask)?, geometry, self.epsg)
    }

    /// Reproject every geometry into `epsg`.
    pub fn to_epsg(&self, epsg: u32) -> Result<Self> {
        if epsg == self.epsg { return Ok(self.clone()) }
        let transform = crs::Reprojection::new(self.epsg, epsg)?;
        let geometry = self.geometry.iter()
            .map(|geom| geom.as_ref().map(|g| transform.apply(g)).transpose())
            .collect::<Result<Vec<_>>>()?;
        Self::new(self.data.clone(), geometry, epsg)
    }

    /// Append the rows of `other`; both tables must share schema and CRS.
    pub fn vstack(&self, other: &GeoTable) -> Result<Self> {
        let other = other.to_epsg(self.epsg)?;
        let data = if self.data.width() == 0 { other.data.clone() } else { self.data.vstack(&other.data)? };
        let mut geometry = self.geometry.clone();
        geometry.extend(other.geometry);
        Self::new(data, geometry, self.epsg)
    }
}

/// What the reader and the registry hand out.
#[derive(Debug, Clone)]
pub enum Dataset {
    Table(DataFrame),
    Geo(GeoTable),
}

impl Dataset {
    /// Attribute columns, regardless of variant.
    pub fn frame(&self) -> &DataFrame {
        match self {
            Dataset::Table(df) => df,
            Dataset::Geo(geo) => geo.data(),
        }
    }

    pub fn height(&self) -> usize {
        match self {
            Dataset::Table(df) => df.height(),
            Dataset::Geo(geo) => geo.height(),
        }
    }

    /// Semantic schema, including the geometry column for geospatial tables.
    pub fn schema(&self) -> Vec<(String, SemanticType)> {
        match self {
            Dataset::Table(df) => semantic_schema(df),
            Dataset::Geo(geo) => geo.schema(),
        }
    }

    pub fn as_geo(&self) -> Option<&GeoTable> {
        match self {
            Dataset::Geo(geo) => Some(geo),
            Dataset::Table(_) => None,
        }
    }
}

/// Row-filterable tables; lets the filter engine treat plain and
/// geospatial tables alike.
pub trait Tabular: Sized {
    fn frame(&self) -> &DataFrame;

    /// Keep rows where `mask` is true.
    fn filter_rows(&self, mask: &[bool]) -> Result<Self>;
}

impl Tabular for DataFrame {
    fn frame(&self) -> &DataFrame { self }

    fn filter_rows(&self, mask: &[bool]) -> Result<Self> { mask_frame(self, mask) }
}

impl Tabular for GeoTable {
    fn frame(&self) -> &DataFrame { self.data() }

    fn filter_rows(&self, mask: &[bool]) -> Result<Self> { self.filter(mask) }
}

impl Tabular for Dataset {
    fn frame(&self) -> &DataFrame { Dataset::frame(self) }

    fn filter_rows(&self, mask: &[bool]) -> Result<Self> {
        Ok(match self {
            Dataset::Table(df) => Dataset::Table(mask_frame(df, mask)?),
            Dataset::Geo(geo) => Dataset::Geo(geo.filter(mask)?),
        })
    }
}

/// Filter a frame by a plain boolean slice.
pub(crate) fn mask_frame(df: &DataFrame, mask: &[bool]) -> Result<DataFrame> {
    if df.width() == 0 { return Ok(df.clone()) }
    let mask = BooleanChunked::from_slice("mask".into(), mask);
    Ok(df.filter(&mask)?)
}

/// Look up a column, mapping absence to `MissingColumn`.
pub(crate) fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name).map_err(|_| Error::MissingColumn(name.to_string()))
}

/// Column values rendered as text; nulls stay `None`.
pub(crate) fn text_values(column: &Column) -> Result<Vec<Option<String>>> {
    let cast = column.cast(&DataType::String)?;
    Ok(cast.str()?.into_iter().map(|v| v.map(str::to_string)).collect())
}

/// Column values as reals; unparseable text and NaN become `None`.
pub(crate) fn numeric_values(column: &Column) -> Result<Vec<Option<f64>>> {
    let cast = match column.dtype() {
        DataType::String => {
            let parsed: Vec<Option<f64>> = column.str()?.into_iter()
                .map(|v| v.and_then(|s| s.trim().parse::<f64>().ok()))
                .collect();
            return Ok(parsed.into_iter().map(|v| v.filter(|x| !x.is_nan())).collect());
        }
        _ => column.cast(&DataType::Float64)?,
    };
    Ok(cast.f64()?.into_iter().map(|v| v.filter(|x| !x.is_nan())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::point;

    fn sample() -> GeoTable {
        let df = df!("name" => ["a", "b", "c"], "value" => [1i64, 2, 3]).unwrap();
        let geometry = vec![
            Some(Geometry::Point(point!(x: -73.2, y: 44.5))),
            None,
            Some(Geometry::Point(point!(x: -72.6, y: 44.3))),
        ];
        GeoTable::new(df, geometry, WGS84).unwrap()
    }

    #[test]
    fn rejects_misaligned_geometry() {
        let df = df!("name" => ["a", "b"]).unwrap();
        assert!(GeoTable::new(df, vec![None], WGS84).is_err());
    }

    #[test]
    fn filter_keeps_geometry_aligned() {
        let filtered = sample().filter(&[true, false, true]).unwrap();
        assert_eq!(filtered.height(), 2);
        assert_eq!(filtered.data().height(), 2);
        assert!(filtered.geometry().iter().all(Option::is_some));
    }

    #[test]
    fn schema_tags_columns() {
        let schema = sample().schema();
        assert_eq!(schema, vec![
            ("name".to_string(), SemanticType::Text),
            ("value".to_string(), SemanticType::Integer),
            ("geometry".to_string(), SemanticType::Geometry),
        ]);
    }

    #[test]
    fn numeric_values_parse_text() {
        let col = Column::new("v".into(), [Some("1.5"), Some("x"), None]);
        assert_eq!(numeric_values(&col).unwrap(), vec![Some(1.5), None, None]);
    }
}
