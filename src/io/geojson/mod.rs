//! GeoJSON reading and writing.

mod read;
mod write;

pub(super) use read::read_geojson_bytes;
