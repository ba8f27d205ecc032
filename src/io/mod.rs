//! Format-specific readers and the single entry point that dispatches on
//! file extension.
//!
//! # Format Modules
//!
//! - `csv` - comma-separated text
//! - `json` - record lists and column-oriented JSON
//! - `excel` - first worksheet of `.xls`/`.xlsx`
//! - `sav` - SPSS system files
//! - `geojson` - GeoJSON feature collections (read and write)
//! - `fgb` - FlatGeobuf
//! - `shp` - shapefiles, loose or zipped
//!
//! Geospatial readers return coordinates in whatever CRS the source declares;
//! [`read_bytes`] reprojects everything to WGS84 before handing it out.

mod csv;
mod excel;
mod fgb;
mod geojson;
mod json;
mod sav;
mod shp;

use std::{fs, io::Read, path::Path};

use geo::Geometry;
use polars::frame::DataFrame;

use crate::{
    error::{Error, Result},
    table::{Dataset, GeoTable, WGS84},
};

pub use sav::{read_sav, SavTable};
pub use shp::epsg_from_prj;

/// Geometry column plus the EPSG code it was declared in.
pub(crate) type GeoParts = (DataFrame, Vec<Option<Geometry<f64>>>, u32);

/// Input formats understood by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Json,
    Excel,
    Sav,
    GeoJson,
    FlatGeobuf,
    Shapefile,
    ZippedShapefile,
}

impl Format {
    /// Map a lowercase or mixed-case extension (without the dot) to a format.
    pub fn from_extension(ext: &str) -> Result<Self> {
        Ok(match ext.to_ascii_lowercase().as_str() {
            "csv" => Format::Csv,
            "json" => Format::Json,
            "xls" | "xlsx" | "xlsm" | "xlsb" | "ods" => Format::Excel,
            "sav" => Format::Sav,
            "geojson" => Format::GeoJson,
            "fgb" => Format::FlatGeobuf,
            "shp" => Format::Shapefile,
            "zip" => Format::ZippedShapefile,
            other => return Err(Error::UnsupportedFormat(format!(".{other}"))),
        })
    }

    /// Format of a file name, path or URL path, judged by its last extension.
    pub fn from_name(name: &str) -> Result<Self> {
        let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
        match base.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => Self::from_extension(ext),
            _ => Err(Error::UnsupportedFormat(format!("{name} has no extension"))),
        }
    }

    /// True for formats that carry a geometry column.
    #[inline]
    pub fn is_geospatial(&self) -> bool {
        matches!(self, Format::GeoJson | Format::FlatGeobuf | Format::Shapefile | Format::ZippedShapefile)
    }
}

/// Read a file from disk. Loose shapefiles pick up their `.dbf` and `.prj`
/// sidecars from the same directory.
pub fn read_path(path: &Path) -> Result<Dataset> {
    let name = path.display().to_string();
    let format = Format::from_name(&name)?;
    log::debug!("[io] reading {name} as {format:?}");

    if format == Format::Shapefile {
        let parts = shp::read_shapefile_path(path).map_err(|e| Error::read(&name, e))?;
        return finish_geo(parts, &name);
    }

    let bytes = fs::read(path).map_err(|e| Error::read(&name, e))?;
    read_bytes(&bytes, format, &name)
}

/// Read a whole stream, then parse it as the format implied by `name`.
pub fn read_from<R: Read>(mut reader: R, name: &str) -> Result<Dataset> {
    let format = Format::from_name(name)?;
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).map_err(|e| Error::read(name, e))?;
    read_bytes(&bytes, format, name)
}

/// Parse an in-memory payload. `name` is only used in diagnostics.
pub fn read_bytes(bytes: &[u8], format: Format, name: &str) -> Result<Dataset> {
    let wrap = |e: anyhow::Error| Error::read(name, e);
    match format {
        Format::Csv => finish_table(csv::read_csv_bytes(bytes).map_err(wrap)?, name),
        Format::Json => finish_table(json::read_json_bytes(bytes).map_err(wrap)?, name),
        Format::Excel => finish_table(excel::read_excel_bytes(bytes).map_err(wrap)?, name),
        Format::Sav => finish_table(sav::read_sav(bytes).map_err(wrap)?.into_data(), name),
        Format::GeoJson => finish_geo(geojson::read_geojson_bytes(bytes).map_err(wrap)?, name),
        Format::FlatGeobuf => finish_geo(fgb::read_fgb_bytes(bytes).map_err(wrap)?, name),
        Format::ZippedShapefile => finish_geo(shp::read_zipped_shapefile(bytes).map_err(wrap)?, name),
        Format::Shapefile => Err(Error::read(name, anyhow::anyhow!(
            "[io] a bare .shp payload has no attribute table; read it from a path or use read_shapefile_parts"
        ))),
    }
}

/// Assemble a shapefile from its component payloads, e.g. after fetching
/// each sidecar separately.
pub fn read_shapefile_parts(shp: &[u8], dbf: &[u8], prj: Option<&str>, name: &str) -> Result<Dataset> {
    let parts = shp::read_shapefile_bytes(shp, dbf, prj).map_err(|e| Error::read(name, e))?;
    finish_geo(parts, name)
}

fn finish_table(df: DataFrame, name: &str) -> Result<Dataset> {
    if df.height() == 0 { return Err(Error::EmptyPayload(name.to_string())) }
    log::debug!("[io] {name}: {} rows x {} columns", df.height(), df.width());
    Ok(Dataset::Table(df))
}

fn finish_geo((data, geometry, epsg): GeoParts, name: &str) -> Result<Dataset> {
    if geometry.is_empty() { return Err(Error::EmptyPayload(name.to_string())) }
    let geo = GeoTable::new(data, geometry, epsg)?;
    if epsg != WGS84 {
        log::debug!("[io] {name}: reprojecting from EPSG:{epsg} to EPSG:{WGS84}");
    }
    Ok(Dataset::Geo(geo.to_epsg(WGS84)?))
}
