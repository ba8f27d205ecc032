//! Largest-intersection attribute transfer between two geospatial tables.
mod bbox;

use geo::{Area, BooleanOps, Geometry, Intersects, MultiPolygon};
use polars::prelude::*;

use crate::{
    crs::CONUS_ALBERS,
    error::{Error, Result},
    table::GeoTable,
};

/// Copy `columns` from `donor` onto each `target` row, taking them from the
/// donor feature with the largest intersection area. Areas are measured in
/// an equal-area projection; ties go to the lowest donor row. Point and line
/// targets take the first donor they intersect. Rows with no intersecting
/// donor get missing values. Target geometry and CRS are returned unchanged.
pub fn largest_intersection(target: &GeoTable, donor: &GeoTable, columns: &[&str]) -> Result<GeoTable> {
    for &name in columns {
        if donor.data().column(name).is_err() {
            return Err(Error::MissingColumn(name.to_string()));
        }
    }

    let matches = match_rows(&target.to_epsg(CONUS_ALBERS)?, &donor.to_epsg(CONUS_ALBERS)?);
    let matched = matches.iter().flatten().count();
    log::debug!("[enrich] {matched} of {} target rows matched a donor", matches.len());

    let indices: Vec<Option<IdxSize>> = matches.into_iter().map(|m| m.map(|row| row as IdxSize)).collect();
    let indices = IdxCa::from_iter_options("donor".into(), indices.into_iter());
    let transferred = donor.data().select(columns.iter().copied())?.take(&indices)?;

    let mut data = target.data().clone();
    for col in transferred.get_columns() {
        if data.column(col.name().as_str()).is_ok() {
            log::debug!("[enrich] replacing target column {}", col.name());
        }
        data.with_column(col.clone())?;
    }
    target.clone().with_data(data)
}

/// Donor row chosen for each target row.
fn match_rows(target: &GeoTable, donor: &GeoTable) -> Vec<Option<usize>> {
    let tree = bbox::index(donor.geometry());
    let donor_areas: Vec<Option<MultiPolygon<f64>>> = donor.geometry().iter()
        .map(|g| g.as_ref().and_then(areal))
        .collect();

    target.geometry().iter()
        .map(|geom| {
            let geom = geom.as_ref()?;
            let rows = bbox::candidates(&tree, geom);
            match areal(geom) {
                Some(shape) => {
                    let mut best: Option<(usize, f64)> = None;
                    for row in rows {
                        let Some(other) = &donor_areas[row] else { continue };
                        let area = shape.intersection(other).unsigned_area();
                        if area > 0.0 && best.is_none_or(|(_, a)| area > a) {
                            best = Some((row, area));
                        }
                    }
                    best.map(|(row, _)| row)
                }
                None => rows.into_iter().find(|&row| {
                    donor.geometry()[row].as_ref().is_some_and(|d| geom.intersects(d))
                }),
            }
        })
        .collect()
}

/// Polygonal part of a geometry, if it has one.
fn areal(geom: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    let polygons = match geom {
        Geometry::Polygon(p) => vec![p.clone()],
        Geometry::MultiPolygon(mp) => mp.0.clone(),
        Geometry::Rect(r) => vec![r.to_polygon()],
        Geometry::Triangle(t) => vec![t.to_polygon()],
        Geometry::GeometryCollection(gc) => gc.iter().filter_map(areal).flat_map(|mp| mp.0).collect(),
        _ => Vec::new(),
    };
    (!polygons.is_empty()).then(|| MultiPolygon::new(polygons))
}
