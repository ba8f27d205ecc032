//! GeoJSON reading.

use std::sync::LazyLock;

use anyhow::{anyhow, bail, Context, Result};
use geo::{Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use regex::Regex;
use serde_json::Value;

use crate::{io::GeoParts, table::{Cell, ColumnsBuilder, WGS84}};

static EPSG_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)EPSG:{1,2}(?:[\d.]*:)?(\d+)$").expect("valid regex")
});

/// Read a FeatureCollection (or a single Feature). Properties become columns
/// in first-seen order; the legacy `crs` member sets the CRS, else WGS84.
pub(in crate::io) fn read_geojson_bytes(bytes: &[u8]) -> Result<GeoParts> {
    let value: Value = serde_json::from_slice(bytes).context("[io::geojson] invalid JSON")?;

    let features: Vec<&Value> = match value["type"].as_str() {
        Some("FeatureCollection") => value["features"].as_array()
            .ok_or_else(|| anyhow!("[io::geojson] FeatureCollection without a features array"))?
            .iter().collect(),
        Some("Feature") => vec![&value],
        other => bail!("[io::geojson] expected a FeatureCollection or Feature, found {other:?}"),
    };

    let epsg = declared_epsg(&value)?;
    let mut builder = ColumnsBuilder::default();
    let mut geometry = Vec::with_capacity(features.len());

    for (i, feature) in features.into_iter().enumerate() {
        let parsed = parse_geometry(&feature["geometry"])
            .with_context(|| format!("[io::geojson] feature {i} has an invalid geometry"))?;
        geometry.push(parsed);

        match &feature["properties"] {
            Value::Object(props) => builder.push_row(props.iter().map(|(k, v)| (k.as_str(), Cell::from_json(v)))),
            _ => builder.push_row(std::iter::empty::<(&str, Cell)>()),
        }
    }

    Ok((builder.finish()?, geometry, epsg))
}

/// CRS from the pre-RFC `crs.properties.name` member.
fn declared_epsg(value: &Value) -> Result<u32> {
    let Some(name) = value["crs"]["properties"]["name"].as_str() else { return Ok(WGS84) };
    if name.ends_with("CRS84") { return Ok(WGS84) }
    let caps = EPSG_NAME.captures(name)
        .ok_or_else(|| anyhow!("[io::geojson] unrecognised crs name {name:?}"))?;
    Ok(caps[1].parse()?)
}

fn parse_geometry(value: &Value) -> Result<Option<Geometry<f64>>> {
    if value.is_null() { return Ok(None) }
    let coords = &value["coordinates"];
    Ok(Some(match value["type"].as_str() {
        Some("Point") => Geometry::Point(Point(coord(coords)?)),
        Some("MultiPoint") => Geometry::MultiPoint(MultiPoint(
            array(coords)?.iter().map(|c| coord(c).map(Point)).collect::<Result<_>>()?,
        )),
        Some("LineString") => Geometry::LineString(line(coords)?),
        Some("MultiLineString") => Geometry::MultiLineString(MultiLineString(
            array(coords)?.iter().map(line).collect::<Result<_>>()?,
        )),
        Some("Polygon") => Geometry::Polygon(polygon(coords)?),
        Some("MultiPolygon") => Geometry::MultiPolygon(MultiPolygon(
            array(coords)?.iter().map(polygon).collect::<Result<_>>()?,
        )),
        Some("GeometryCollection") => Geometry::GeometryCollection(GeometryCollection(
            array(&value["geometries"])?.iter()
                .filter_map(|g| parse_geometry(g).transpose())
                .collect::<Result<_>>()?,
        )),
        other => bail!("unknown geometry type {other:?}"),
    }))
}

fn array(value: &Value) -> Result<&Vec<Value>> {
    value.as_array().ok_or_else(|| anyhow!("expected an array, found {value}"))
}

fn coord(value: &Value) -> Result<Coord<f64>> {
    let pair = array(value)?;
    let get = |i: usize| pair.get(i).and_then(Value::as_f64)
        .ok_or_else(|| anyhow!("invalid position {value}"));
    Ok(Coord { x: get(0)?, y: get(1)? })
}

fn line(value: &Value) -> Result<LineString<f64>> {
    Ok(LineString(array(value)?.iter().map(coord).collect::<Result<_>>()?))
}

/// First ring is the exterior; rings are closed if the source left them open.
fn polygon(value: &Value) -> Result<Polygon<f64>> {
    let mut rings = array(value)?.iter().map(line);
    let exterior = rings.next().transpose()?.unwrap_or_else(|| LineString(Vec::new()));
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}
