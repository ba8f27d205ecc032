//! FlatGeobuf reading.

use std::io::Cursor;

use anyhow::{Context, Result};
use flatgeobuf::{FallibleStreamingIterator, FgbReader};
use geozero::{ColumnValue, FeatureProperties, PropertyProcessor, ToGeo};

use crate::{io::GeoParts, table::{Cell, ColumnsBuilder, WGS84}};

/// Collects one feature's properties with their declared types.
#[derive(Default)]
struct PropertyRow(Vec<(String, Cell)>);

impl PropertyProcessor for PropertyRow {
    fn property(&mut self, _idx: usize, name: &str, value: &ColumnValue) -> geozero::error::Result<bool> {
        let cell = match value {
            ColumnValue::Bool(b) => Cell::Bool(*b),
            ColumnValue::Byte(v) => Cell::Int(*v as i64),
            ColumnValue::UByte(v) => Cell::Int(*v as i64),
            ColumnValue::Short(v) => Cell::Int(*v as i64),
            ColumnValue::UShort(v) => Cell::Int(*v as i64),
            ColumnValue::Int(v) => Cell::Int(*v as i64),
            ColumnValue::UInt(v) => Cell::Int(*v as i64),
            ColumnValue::Long(v) => Cell::Int(*v),
            ColumnValue::ULong(v) => i64::try_from(*v).map_or(Cell::Float(*v as f64), Cell::Int),
            ColumnValue::Float(v) => Cell::Float(*v as f64),
            ColumnValue::Double(v) => Cell::Float(*v),
            ColumnValue::String(s) | ColumnValue::Json(s) | ColumnValue::DateTime(s) => Cell::Text(s.to_string()),
            ColumnValue::Binary(_) => Cell::Null,
        };
        self.0.push((name.to_string(), cell));
        Ok(false)
    }
}

pub(super) fn read_fgb_bytes(bytes: &[u8]) -> Result<GeoParts> {
    let reader = FgbReader::open(Cursor::new(bytes)).context("[io::fgb] not a FlatGeobuf file")?;

    let header = reader.header();
    let epsg = header.crs().map(|crs| crs.code()).filter(|code| *code > 0).map_or(WGS84, |code| code as u32);
    let names: Vec<String> = header.columns()
        .map(|cols| cols.iter().map(|col| col.name().to_string()).collect())
        .unwrap_or_default();

    let mut builder = ColumnsBuilder::with_columns(&names);
    let mut geometry = Vec::new();
    let mut features = reader.select_all().context("[io::fgb] failed to scan features")?;

    while let Some(feature) = features.next()? {
        let geom = match feature.geometry() {
            Some(_) => Some(feature.to_geo().context("[io::fgb] invalid feature geometry")?),
            None => None,
        };
        geometry.push(geom);

        let mut row = PropertyRow::default();
        feature.process_properties(&mut row).context("[io::fgb] failed to decode properties")?;
        builder.push_row(row.0);
    }

    Ok((builder.finish()?, geometry, epsg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flatgeobuf::{FgbCrs, FgbWriter, FgbWriterOptions, GeometryType};
    use geo::{polygon, Geometry, MultiPolygon};

    fn fixture(epsg: i32) -> Vec<u8> {
        let mut fgb = FgbWriter::create_with_options(
            "towns",
            GeometryType::MultiPolygon,
            FgbWriterOptions { crs: FgbCrs { code: epsg, ..Default::default() }, ..Default::default() },
        ).unwrap();
        let square = polygon![(x: -72.6, y: 44.2), (x: -72.5, y: 44.2), (x: -72.5, y: 44.3), (x: -72.6, y: 44.3)];
        for _ in 0..2 {
            fgb.add_feature_geom(Geometry::MultiPolygon(MultiPolygon(vec![square.clone()])), |_| {}).unwrap();
        }
        let mut out = Vec::new();
        fgb.write(&mut out).unwrap();
        out
    }

    #[test]
    fn reads_geometry_and_crs() {
        let (_, geometry, epsg) = read_fgb_bytes(&fixture(4269)).unwrap();
        assert_eq!(epsg, 4269);
        assert_eq!(geometry.len(), 2);
        assert!(geometry.iter().all(Option::is_some));
    }

    #[test]
    fn rejects_other_payloads() {
        assert!(read_fgb_bytes(b"{\"type\":\"FeatureCollection\"}").is_err());
    }
}
