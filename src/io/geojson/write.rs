//! GeoJSON writing.

use geo::{Coord, Geometry, LineString, Polygon};
use polars::prelude::*;
use serde_json::{json, Map, Value};

use crate::{error::Result, table::{text_values, GeoTable}};

impl GeoTable {
    /// Export as a GeoJSON FeatureCollection in the table's own coordinates.
    /// Every attribute column becomes a property; missing values are `null`.
    pub fn to_geojson(&self) -> Result<Value> {
        write_feature_collection(self)
    }
}

fn write_feature_collection(table: &GeoTable) -> Result<Value> {
    let mut properties: Vec<Map<String, Value>> = vec![Map::new(); table.height()];

    for col in table.data().get_columns() {
        let values = column_to_json(col)?;
        for (props, value) in properties.iter_mut().zip(values) {
            props.insert(col.name().to_string(), value);
        }
    }

    let features: Vec<Value> = table.geometry().iter().zip(properties)
        .map(|(geom, props)| json!({
            "type": "Feature",
            "geometry": geom.as_ref().map_or(Value::Null, geometry_to_geojson),
            "properties": props,
        }))
        .collect();

    let mut collection = json!({
        "type": "FeatureCollection",
        "features": features,
    });
    if table.epsg() != crate::table::WGS84 {
        collection["crs"] = json!({
            "type": "name",
            "properties": { "name": format!("urn:ogc:def:crs:EPSG::{}", table.epsg()) },
        });
    }
    Ok(collection)
}

fn column_to_json(col: &Column) -> Result<Vec<Value>> {
    Ok(match col.dtype() {
        DataType::Boolean => col.bool()?.into_iter().map(|v| v.map_or(Value::Null, Value::from)).collect(),
        dt if dt.is_integer() => col.cast(&DataType::Int64)?.i64()?.into_iter()
            .map(|v| v.map_or(Value::Null, Value::from))
            .collect(),
        dt if dt.is_float() => col.cast(&DataType::Float64)?.f64()?.into_iter()
            .map(|v| v.filter(|x| x.is_finite()).map_or(Value::Null, Value::from))
            .collect(),
        _ => text_values(col)?.into_iter().map(|v| v.map_or(Value::Null, Value::from)).collect(),
    })
}

fn position(c: &Coord<f64>) -> Value { json!([c.x, c.y]) }

fn line(ls: &LineString<f64>) -> Value {
    Value::Array(ls.coords().map(position).collect())
}

fn rings(poly: &Polygon<f64>) -> Value {
    Value::Array(std::iter::once(poly.exterior()).chain(poly.interiors()).map(line).collect())
}

/// RFC 7946 geometry object.
fn geometry_to_geojson(geom: &Geometry<f64>) -> Value {
    match geom {
        Geometry::Point(p) => json!({ "type": "Point", "coordinates": position(&p.0) }),
        Geometry::MultiPoint(mp) => json!({
            "type": "MultiPoint",
            "coordinates": mp.0.iter().map(|p| position(&p.0)).collect::<Vec<_>>(),
        }),
        Geometry::Line(l) => json!({ "type": "LineString", "coordinates": [position(&l.start), position(&l.end)] }),
        Geometry::LineString(ls) => json!({ "type": "LineString", "coordinates": line(ls) }),
        Geometry::MultiLineString(mls) => json!({
            "type": "MultiLineString",
            "coordinates": mls.0.iter().map(line).collect::<Vec<_>>(),
        }),
        Geometry::Polygon(poly) => json!({ "type": "Polygon", "coordinates": rings(poly) }),
        Geometry::MultiPolygon(mp) => json!({
            "type": "MultiPolygon",
            "coordinates": mp.0.iter().map(rings).collect::<Vec<_>>(),
        }),
        Geometry::Rect(rect) => json!({ "type": "Polygon", "coordinates": rings(&rect.to_polygon()) }),
        Geometry::Triangle(tri) => json!({ "type": "Polygon", "coordinates": rings(&tri.to_polygon()) }),
        Geometry::GeometryCollection(gc) => json!({
            "type": "GeometryCollection",
            "geometries": gc.0.iter().map(geometry_to_geojson).collect::<Vec<_>>(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::geojson::read_geojson_bytes;
    use geo::{point, polygon};

    #[test]
    fn writes_properties_and_nulls() {
        let df = df!("town" => [Some("Barre"), None], "pop" => [Some(8_491i64), None]).unwrap();
        let geometry = vec![Some(Geometry::Point(point!(x: -72.5, y: 44.2))), None];
        let table = GeoTable::new(df, geometry, crate::table::WGS84).unwrap();

        let value = table.to_geojson().unwrap();
        assert_eq!(value["features"][0]["properties"]["pop"], json!(8491));
        assert!(value["features"][1]["properties"]["town"].is_null());
        assert!(value["features"][1]["geometry"].is_null());
        assert!(value.get("crs").is_none());
    }

    #[test]
    fn polygon_survives_a_write_and_read() {
        let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        let df = df!("id" => [1i64]).unwrap();
        let table = GeoTable::new(df, vec![Some(Geometry::Polygon(square.clone()))], crate::table::WGS84).unwrap();

        let bytes = serde_json::to_vec(&table.to_geojson().unwrap()).unwrap();
        let (_, geometry, _) = read_geojson_bytes(&bytes).unwrap();
        assert_eq!(geometry[0], Some(Geometry::Polygon(square)));
    }
}
