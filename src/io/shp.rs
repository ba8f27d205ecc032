//! Shapefile reading, from loose `.shp`/`.dbf`/`.prj` files or a zip archive.

use std::{
    fs,
    io::{Cursor, Read},
    path::Path,
    sync::LazyLock,
};

use anyhow::{anyhow, bail, ensure, Context, Result};
use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use regex::Regex;
use shapefile::{dbase::{self, FieldValue}, PolygonRing, Reader, Shape, ShapeReader};
use zip::ZipArchive;

use crate::{io::GeoParts, table::{Cell, ColumnsBuilder, WGS84}};

static AUTHORITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"AUTHORITY\s*\[\s*"EPSG"\s*,\s*"?(\d+)"?\s*\]"#).expect("valid regex")
});

/// ESRI-style `.prj` names without an AUTHORITY clause, most specific first.
const PRJ_NAMES: &[(&str, u32)] = &[
    ("StatePlane_Vermont", 32145),
    ("NAD83 / Vermont", 32145),
    ("Web_Mercator", 3857),
    ("Pseudo-Mercator", 3857),
    ("Conus Albers", 5070),
    ("Contiguous_Albers_Equal_Area", 5070),
    ("NAD_1983_UTM_Zone_18N", 26918),
    ("NAD83 / UTM zone 18N", 26918),
    ("WGS_1984_UTM_Zone_18N", 32618),
    ("WGS 84 / UTM zone 18N", 32618),
    ("GCS_North_American_1983", 4269),
    ("GCS_WGS_1984", 4326),
    ("WGS 84", 4326),
];

/// EPSG code declared by a `.prj` WKT string.
pub fn epsg_from_prj(wkt: &str) -> Option<u32> {
    // The outermost AUTHORITY clause closes the WKT.
    if let Some(caps) = AUTHORITY.captures_iter(wkt).last() {
        return caps[1].parse().ok();
    }
    PRJ_NAMES.iter().find(|(name, _)| wkt.contains(name)).map(|(_, code)| *code)
}

fn prj_epsg(prj: Option<&str>) -> Result<u32> {
    match prj {
        None => {
            log::debug!("[io::shp] no .prj sidecar; assuming EPSG:{WGS84}");
            Ok(WGS84)
        }
        Some(wkt) => epsg_from_prj(wkt)
            .ok_or_else(|| anyhow!("[io::shp] unrecognised projection in .prj: {}", wkt.trim())),
    }
}

/// Read `path` plus its `.dbf` and optional `.prj` siblings.
pub(super) fn read_shapefile_path(path: &Path) -> Result<GeoParts> {
    let shp = fs::read(path)
        .with_context(|| format!("[io::shp] failed to open {}", path.display()))?;
    let dbf_path = path.with_extension("dbf");
    let dbf = fs::read(&dbf_path)
        .with_context(|| format!("[io::shp] missing attribute table {}", dbf_path.display()))?;
    let prj = fs::read_to_string(path.with_extension("prj")).ok();
    read_shapefile_bytes(&shp, &dbf, prj.as_deref())
}

/// Read the first `.shp` in a zip archive, with its sidecars.
pub(super) fn read_zipped_shapefile(bytes: &[u8]) -> Result<GeoParts> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).context("[io::shp] not a zip archive")?;

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    let mut shp_names: Vec<&String> = names.iter()
        .filter(|n| n.to_ascii_lowercase().ends_with(".shp") && !n.starts_with("__MACOSX"))
        .collect();
    shp_names.sort();
    let shp_name = *shp_names.first().ok_or_else(|| anyhow!("[io::shp] archive contains no .shp file"))?;
    if shp_names.len() > 1 {
        log::warn!("[io::shp] archive holds {} shapefiles; reading {shp_name}", shp_names.len());
    }

    let stem = &shp_name[..shp_name.len() - 4];
    let sidecar = |ext: &str| names.iter().find(|n| {
        n.len() == stem.len() + 4 && n.starts_with(stem) && n[stem.len()..].eq_ignore_ascii_case(ext)
    });

    let mut entry = |name: &str| -> Result<Vec<u8>> {
        let mut file = archive.by_name(name).with_context(|| format!("[io::shp] failed to open {name} in archive"))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(buf)
    };

    let shp = entry(shp_name)?;
    let dbf_name = sidecar(".dbf").ok_or_else(|| anyhow!("[io::shp] {shp_name} has no .dbf in the archive"))?;
    let dbf = entry(dbf_name)?;
    let prj = match sidecar(".prj") {
        Some(name) => Some(String::from_utf8_lossy(&entry(name)?).into_owned()),
        None => None,
    };

    read_shapefile_bytes(&shp, &dbf, prj.as_deref())
}

/// Decode in-memory `.shp` and `.dbf` payloads.
pub(super) fn read_shapefile_bytes(shp: &[u8], dbf: &[u8], prj: Option<&str>) -> Result<GeoParts> {
    let epsg = prj_epsg(prj)?;
    let shape_reader = ShapeReader::new(Cursor::new(shp)).context("[io::shp] invalid .shp payload")?;
    let dbase_reader = dbase::Reader::new(Cursor::new(dbf)).context("[io::shp] invalid .dbf payload")?;
    let fields: Vec<String> = dbase_reader.fields().iter()
        .map(|field| field.name().to_string())
        .filter(|name| name != "DeletionFlag")
        .collect();

    let mut reader = Reader::new(shape_reader, dbase_reader);
    let mut builder = ColumnsBuilder::with_columns(&fields);
    let mut geometry = Vec::new();

    for (i, item) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = item.with_context(|| format!("[io::shp] failed to read record {i}"))?;
        geometry.push(shape_to_geometry(shape).with_context(|| format!("[io::shp] record {i}"))?);
        builder.push_row(fields.iter().map(|name| {
            (name.as_str(), record.get(name).map_or(Cell::Null, field_to_cell))
        }));
    }

    ensure!(builder.rows() == geometry.len(), "[io::shp] attribute and shape counts differ");
    Ok((builder.finish()?, geometry, epsg))
}

fn field_to_cell(value: &FieldValue) -> Cell {
    match value {
        FieldValue::Character(Some(s)) => match s.trim() {
            "" => Cell::Null,
            trimmed => Cell::Text(trimmed.to_string()),
        },
        FieldValue::Numeric(Some(n)) if n.fract() == 0.0 && n.abs() < 9.0e15 => Cell::Int(*n as i64),
        FieldValue::Numeric(Some(n)) => Cell::Float(*n),
        FieldValue::Float(Some(f)) => Cell::Float(*f as f64),
        FieldValue::Integer(i) => Cell::Int(*i as i64),
        FieldValue::Double(d) | FieldValue::Currency(d) => Cell::Float(*d),
        FieldValue::Logical(Some(b)) => Cell::Bool(*b),
        FieldValue::Date(Some(d)) => Cell::Text(format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day())),
        FieldValue::Memo(s) => Cell::Text(s.clone()),
        _ => Cell::Null,
    }
}

/// Rings come tagged outer/inner by the reader; each outer ring collects the
/// inner rings that follow it.
fn rings_to_multipolygon<P>(rings: &[PolygonRing<P>], xy: impl Fn(&P) -> Coord<f64>) -> MultiPolygon<f64> {
    let mut polys: Vec<Polygon<f64>> = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes: Vec<LineString<f64>> = Vec::new();

    for ring in rings {
        let ls = LineString(ring.points().iter().map(&xy).collect());
        match ring {
            PolygonRing::Outer(_) => {
                if let Some(ext) = exterior.replace(ls) {
                    polys.push(Polygon::new(ext, std::mem::take(&mut holes)));
                }
            }
            PolygonRing::Inner(_) => holes.push(ls),
        }
    }
    if let Some(ext) = exterior {
        polys.push(Polygon::new(ext, holes));
    }
    MultiPolygon(polys)
}

fn parts_to_lines<P>(parts: &[Vec<P>], xy: impl Fn(&P) -> Coord<f64>) -> MultiLineString<f64> {
    MultiLineString(parts.iter().map(|part| LineString(part.iter().map(&xy).collect())).collect())
}

fn shape_to_geometry(shape: Shape) -> Result<Option<Geometry<f64>>> {
    macro_rules! xy { () => { |p| Coord { x: p.x, y: p.y } } }

    Ok(Some(match shape {
        Shape::NullShape => return Ok(None),
        Shape::Point(p) => Geometry::Point(Point::new(p.x, p.y)),
        Shape::PointM(p) => Geometry::Point(Point::new(p.x, p.y)),
        Shape::PointZ(p) => Geometry::Point(Point::new(p.x, p.y)),
        Shape::Multipoint(mp) => Geometry::MultiPoint(MultiPoint(mp.points().iter().map(|p| Point::new(p.x, p.y)).collect())),
        Shape::MultipointM(mp) => Geometry::MultiPoint(MultiPoint(mp.points().iter().map(|p| Point::new(p.x, p.y)).collect())),
        Shape::MultipointZ(mp) => Geometry::MultiPoint(MultiPoint(mp.points().iter().map(|p| Point::new(p.x, p.y)).collect())),
        Shape::Polyline(l) => Geometry::MultiLineString(parts_to_lines(l.parts(), xy!())),
        Shape::PolylineM(l) => Geometry::MultiLineString(parts_to_lines(l.parts(), xy!())),
        Shape::PolylineZ(l) => Geometry::MultiLineString(parts_to_lines(l.parts(), xy!())),
        Shape::Polygon(p) => Geometry::MultiPolygon(rings_to_multipolygon(p.rings(), xy!())),
        Shape::PolygonM(p) => Geometry::MultiPolygon(rings_to_multipolygon(p.rings(), xy!())),
        Shape::PolygonZ(p) => Geometry::MultiPolygon(rings_to_multipolygon(p.rings(), xy!())),
        Shape::Multipatch(_) => bail!("multipatch shapes are not supported"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prj_authority_and_names() {
        let wkt = r#"PROJCS["NAD83 / Vermont",GEOGCS["NAD83",DATUM["North_American_Datum_1983",SPHEROID["GRS 1980",6378137,298.257222101,AUTHORITY["EPSG","7019"]],AUTHORITY["EPSG","6269"]],AUTHORITY["EPSG","4269"]],PROJECTION["Transverse_Mercator"],AUTHORITY["EPSG","32145"]]"#;
        assert_eq!(epsg_from_prj(wkt), Some(32145));

        let esri = r#"PROJCS["NAD_1983_StatePlane_Vermont_FIPS_4400",GEOGCS["GCS_North_American_1983"]]"#;
        assert_eq!(epsg_from_prj(esri), Some(32145));
        assert_eq!(epsg_from_prj(r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984"]]"#), Some(4326));
        assert_eq!(epsg_from_prj("LOCAL_CS[\"unknown\"]"), None);
    }

    #[test]
    fn missing_prj_defaults_to_wgs84() {
        assert_eq!(prj_epsg(None).unwrap(), WGS84);
        assert!(prj_epsg(Some("LOCAL_CS[\"engineering\"]")).is_err());
    }

    #[test]
    fn polygon_rings_group_holes() {
        let pt = |x: f64, y: f64| shapefile::Point { x, y };
        let polygon = shapefile::Polygon::with_rings(vec![
            PolygonRing::Outer(vec![pt(0.0, 0.0), pt(0.0, 4.0), pt(4.0, 4.0), pt(4.0, 0.0), pt(0.0, 0.0)]),
            PolygonRing::Inner(vec![pt(1.0, 1.0), pt(2.0, 1.0), pt(2.0, 2.0), pt(1.0, 1.0)]),
            PolygonRing::Outer(vec![pt(10.0, 10.0), pt(10.0, 11.0), pt(11.0, 11.0), pt(10.0, 10.0)]),
        ]);
        let Some(Geometry::MultiPolygon(mp)) = shape_to_geometry(Shape::Polygon(polygon)).unwrap() else {
            panic!("expected a multipolygon");
        };
        assert_eq!(mp.0.len(), 2);
        assert_eq!(mp.0[0].interiors().len(), 1);
        assert!(mp.0[1].interiors().is_empty());
    }

    #[test]
    fn null_shapes_have_no_geometry() {
        assert!(shape_to_geometry(Shape::NullShape).unwrap().is_none());
    }

    #[test]
    fn dbf_values() {
        assert_eq!(field_to_cell(&FieldValue::Character(Some("  Barre ".into()))), Cell::Text("Barre".into()));
        assert_eq!(field_to_cell(&FieldValue::Character(Some("   ".into()))), Cell::Null);
        assert_eq!(field_to_cell(&FieldValue::Numeric(Some(12.0))), Cell::Int(12));
        assert_eq!(field_to_cell(&FieldValue::Numeric(Some(1.5))), Cell::Float(1.5));
        assert_eq!(field_to_cell(&FieldValue::Numeric(None)), Cell::Null);
    }

    #[test]
    fn zip_without_shapefile_is_rejected() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            writer.start_file("readme.txt", zip::write::SimpleFileOptions::default()).unwrap();
            std::io::Write::write_all(&mut writer, b"hello").unwrap();
            writer.finish().unwrap();
        }
        let err = read_zipped_shapefile(buf.get_ref()).unwrap_err();
        assert!(err.to_string().contains("no .shp"));
    }
}
