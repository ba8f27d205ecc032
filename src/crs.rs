//! EPSG catalogue and coordinate reprojection.

use geo::{Coord, Geometry, MapCoords};
use proj4rs::{proj::Proj as Proj4, transform::transform};

use crate::error::{Error, Result};

/// NAD83 / Conus Albers; equal-area, used for intersection areas.
pub const CONUS_ALBERS: u32 = 5070;

/// PROJ.4 definition for a supported EPSG code.
pub fn proj4_definition(epsg: u32) -> Result<&'static str> {
    Ok(match epsg {
        4326 => "+proj=longlat +datum=WGS84 +no_defs +type=crs",
        4269 => "+proj=longlat +datum=NAD83 +no_defs +type=crs",
        3857 => "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs +type=crs",
        32145 => "+proj=tmerc +lat_0=42.5 +lon_0=-72.5 +k=0.999964286 +x_0=500000 +y_0=0 +datum=NAD83 +units=m +no_defs +type=crs",
        5070 => "+proj=aea +lat_0=23 +lon_0=-96 +lat_1=29.5 +lat_2=45.5 +x_0=0 +y_0=0 +datum=NAD83 +units=m +no_defs +type=crs",
        26918 => "+proj=utm +zone=18 +datum=NAD83 +units=m +no_defs +type=crs",
        32618 => "+proj=utm +zone=18 +datum=WGS84 +units=m +no_defs +type=crs",
        other => return Err(Error::Projection(format!("unsupported CRS EPSG:{other}"))),
    })
}

/// True for lon/lat (degree) coordinate systems.
#[inline]
pub fn is_geographic(epsg: u32) -> bool { matches!(epsg, 4326 | 4269) }

/// A prepared transform between two EPSG codes.
pub(crate) struct Reprojection {
    from: Proj4,
    to: Proj4,
    from_geographic: bool,
    to_geographic: bool,
    identity: bool,
}

impl Reprojection {
    pub(crate) fn new(from: u32, to: u32) -> Result<Self> {
        let build = |epsg: u32| -> Result<Proj4> {
            let definition = proj4_definition(epsg)?;
            Proj4::from_proj_string(definition)
                .map_err(|e| Error::Projection(format!("failed to build PROJ.4 for EPSG:{epsg}: {e}")))
        };

        Ok(Self {
            from: build(from)?,
            to: build(to)?,
            from_geographic: is_geographic(from),
            to_geographic: is_geographic(to),
            // NAD83 and WGS84 lon/lat agree to well under a metre here.
            identity: from == to || (is_geographic(from) && is_geographic(to)),
        })
    }

    /// Transform a single coordinate; degrees in and out for geographic systems.
    pub(crate) fn coord(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        if self.identity { return Ok(coord) }

        let mut point = if self.from_geographic {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };
        transform(&self.from, &self.to, &mut point)
            .map_err(|e| Error::Projection(format!("transform of ({}, {}) failed: {e}", coord.x, coord.y)))?;

        Ok(if self.to_geographic {
            Coord { x: point.0.to_degrees(), y: point.1.to_degrees() }
        } else {
            Coord { x: point.0, y: point.1 }
        })
    }

    /// Rects and triangles come back as polygons, since their edges do not
    /// stay axis-aligned under projection.
    pub(crate) fn apply(&self, geom: &Geometry<f64>) -> Result<Geometry<f64>> {
        if self.identity { return Ok(geom.clone()) }
        match geom {
            Geometry::Rect(rect) => Geometry::Polygon(rect.to_polygon()).try_map_coords(|coord| self.coord(coord)),
            Geometry::Triangle(tri) => Geometry::Polygon(tri.to_polygon()).try_map_coords(|coord| self.coord(coord)),
            _ => geom.try_map_coords(|coord| self.coord(coord)),
        }
    }
}
