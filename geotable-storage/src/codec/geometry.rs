//! Geometry encoding.
//!
//! Every geometry starts with its [`GeometryType`] tag. Bodies:
//!
//! ```text
//! Point               x f64, y f64
//! LineString          u32 n, n x (x, y)
//! MultiPoint          u32 n, n x (x, y)
//! Polygon             u32 parts, parts x u32 end, u32 n, n x (x, y)
//! MultiLineString     u32 parts, parts x u32 end, u32 n, n x (x, y)
//! MultiPolygon        u32 polygons, polygons x <Polygon body>
//! GeometryCollection  u32 members, members x <tagged geometry>
//! ```
//!
//! `end` values are cumulative coordinate indexes: part `i` spans
//! `ends[i-1]..ends[i]`. The first polygon part is the exterior ring.

use geo_types::{
    Coord, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point,
    Polygon,
};
use geotable_tabular::Geometry;

use crate::error::{Result, StoreError};
use crate::format::wire::{count_u32, ensure_len, read_f64, read_u32, read_u8};
use crate::format::GeometryType;

/// Bytes per stored coordinate.
const COORD_LEN: usize = 16;

/// Deepest collection nesting accepted when decoding.
const MAX_NESTING: usize = 32;

/// Append `geometry` to `buf` and return the offset it starts at.
///
/// When `declared` is not [`GeometryType::Unknown`] the geometry must be of
/// exactly that kind.
pub fn encode_geometry(
    buf: &mut Vec<u8>,
    declared: GeometryType,
    geometry: &Geometry,
) -> Result<usize> {
    let kind = GeometryType::of(geometry)?;
    if declared != GeometryType::Unknown && declared != kind {
        return Err(StoreError::UnsupportedGeometry(format!(
            "{kind} geometry in a {declared} table"
        )));
    }
    let offset = buf.len();
    write_tagged(buf, geometry)?;
    Ok(offset)
}

/// Decode one tagged geometry at `pos`, advancing.
pub fn decode_geometry(data: &[u8], pos: &mut usize, declared: GeometryType) -> Result<Geometry> {
    let kind = read_kind(data, pos)?;
    if declared != GeometryType::Unknown && declared != kind {
        return Err(StoreError::format(format!(
            "{kind} geometry stored in a {declared} table"
        )));
    }
    read_body(data, pos, kind, 0)
}

fn write_tagged(buf: &mut Vec<u8>, geometry: &Geometry) -> Result<()> {
    buf.push(GeometryType::of(geometry)?.as_u8());
    match geometry {
        Geometry::Point(p) => write_coord(buf, p.0),
        Geometry::LineString(ls) => write_coords(buf, &ls.0)?,
        Geometry::MultiPoint(mp) => {
            buf.extend_from_slice(&count_u32(mp.0.len(), "multipoint")?.to_le_bytes());
            for p in &mp.0 {
                write_coord(buf, p.0);
            }
        }
        Geometry::Polygon(polygon) => write_polygon(buf, polygon)?,
        Geometry::MultiLineString(mls) => write_parts(buf, mls.0.iter())?,
        Geometry::MultiPolygon(mp) => {
            buf.extend_from_slice(&count_u32(mp.0.len(), "multipolygon")?.to_le_bytes());
            for polygon in &mp.0 {
                write_polygon(buf, polygon)?;
            }
        }
        Geometry::GeometryCollection(gc) => {
            buf.extend_from_slice(&count_u32(gc.0.len(), "collection")?.to_le_bytes());
            for member in &gc.0 {
                write_tagged(buf, member)?;
            }
        }
        // Rejected by `GeometryType::of` above.
        Geometry::Line(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {}
    }
    Ok(())
}

#[inline]
fn write_coord(buf: &mut Vec<u8>, c: Coord<f64>) {
    buf.extend_from_slice(&c.x.to_le_bytes());
    buf.extend_from_slice(&c.y.to_le_bytes());
}

fn write_coords(buf: &mut Vec<u8>, coords: &[Coord<f64>]) -> Result<()> {
    buf.extend_from_slice(&count_u32(coords.len(), "coordinate")?.to_le_bytes());
    for c in coords {
        write_coord(buf, *c);
    }
    Ok(())
}

fn write_polygon(buf: &mut Vec<u8>, polygon: &Polygon<f64>) -> Result<()> {
    write_parts(
        buf,
        std::iter::once(polygon.exterior()).chain(polygon.interiors()),
    )
}

/// Ends array followed by the flattened coordinates of every part.
fn write_parts<'a>(
    buf: &mut Vec<u8>,
    parts: impl Iterator<Item = &'a LineString<f64>> + Clone,
) -> Result<()> {
    let count = parts.clone().count();
    buf.extend_from_slice(&count_u32(count, "part")?.to_le_bytes());
    let mut end = 0usize;
    for part in parts.clone() {
        end += part.0.len();
        buf.extend_from_slice(&count_u32(end, "coordinate")?.to_le_bytes());
    }
    buf.extend_from_slice(&count_u32(end, "coordinate")?.to_le_bytes());
    for part in parts {
        for c in &part.0 {
            write_coord(buf, *c);
        }
    }
    Ok(())
}

fn read_kind(data: &[u8], pos: &mut usize) -> Result<GeometryType> {
    match GeometryType::from_u8(read_u8(data, pos, "geometry type")?)? {
        GeometryType::Unknown => Err(StoreError::format("geometry tagged as Unknown")),
        kind => Ok(kind),
    }
}

fn read_body(data: &[u8], pos: &mut usize, kind: GeometryType, depth: usize) -> Result<Geometry> {
    Ok(match kind {
        GeometryType::Point => Geometry::Point(Point(read_coord(data, pos)?)),
        GeometryType::LineString => Geometry::LineString(LineString(read_coords(data, pos)?)),
        GeometryType::MultiPoint => Geometry::MultiPoint(MultiPoint(
            read_coords(data, pos)?.into_iter().map(Point).collect(),
        )),
        GeometryType::Polygon => Geometry::Polygon(read_polygon(data, pos)?),
        GeometryType::MultiLineString => {
            Geometry::MultiLineString(MultiLineString(read_parts(data, pos)?))
        }
        GeometryType::MultiPolygon => {
            let count = read_count(data, pos, 4, "multipolygon")?;
            let mut polygons = Vec::with_capacity(count);
            for _ in 0..count {
                polygons.push(read_polygon(data, pos)?);
            }
            Geometry::MultiPolygon(MultiPolygon(polygons))
        }
        GeometryType::GeometryCollection => {
            if depth >= MAX_NESTING {
                return Err(StoreError::format(format!(
                    "geometry collections nested deeper than {MAX_NESTING}"
                )));
            }
            let count = read_count(data, pos, 1, "collection")?;
            let mut members = Vec::with_capacity(count);
            for _ in 0..count {
                let member_kind = read_kind(data, pos)?;
                members.push(read_body(data, pos, member_kind, depth + 1)?);
            }
            Geometry::GeometryCollection(GeometryCollection(members))
        }
        GeometryType::Unknown => return Err(StoreError::format("geometry tagged as Unknown")),
    })
}

/// Read a u32 count and check that `count * min_item_len` bytes remain, so a
/// corrupt count cannot trigger a huge allocation.
fn read_count(data: &[u8], pos: &mut usize, min_item_len: usize, ctx: &str) -> Result<usize> {
    let count = read_u32(data, pos, ctx)? as usize;
    let need = count
        .checked_mul(min_item_len)
        .ok_or_else(|| StoreError::format(format!("{ctx} count {count} overflows")))?;
    ensure_len(data, *pos, need, ctx)?;
    Ok(count)
}

#[inline]
fn read_coord(data: &[u8], pos: &mut usize) -> Result<Coord<f64>> {
    let x = read_f64(data, pos, "x")?;
    let y = read_f64(data, pos, "y")?;
    Ok(Coord { x, y })
}

fn read_coords(data: &[u8], pos: &mut usize) -> Result<Vec<Coord<f64>>> {
    let n = read_count(data, pos, COORD_LEN, "coordinates")?;
    let mut coords = Vec::with_capacity(n);
    for _ in 0..n {
        coords.push(read_coord(data, pos)?);
    }
    Ok(coords)
}

fn read_parts(data: &[u8], pos: &mut usize) -> Result<Vec<LineString<f64>>> {
    let count = read_count(data, pos, 4, "parts")?;
    let mut ends = Vec::with_capacity(count);
    let mut prev = 0usize;
    for _ in 0..count {
        let end = read_u32(data, pos, "part end")? as usize;
        if end < prev {
            return Err(StoreError::format(format!(
                "part ends not monotonic ({end} after {prev})"
            )));
        }
        ends.push(end);
        prev = end;
    }
    let mut coords = read_coords(data, pos)?;
    if prev != coords.len() {
        return Err(StoreError::format(format!(
            "part ends cover {prev} coordinates but {} are stored",
            coords.len()
        )));
    }

    // Split from the back so each part takes ownership of its slice.
    let mut parts = Vec::with_capacity(count);
    for i in (0..count).rev() {
        let start = if i == 0 { 0 } else { ends[i - 1] };
        parts.push(LineString(coords.split_off(start)));
    }
    parts.reverse();
    Ok(parts)
}

fn read_polygon(data: &[u8], pos: &mut usize) -> Result<Polygon<f64>> {
    let mut rings = read_parts(data, pos)?.into_iter();
    let exterior = rings
        .next()
        .ok_or_else(|| StoreError::format("polygon without exterior ring"))?;
    Ok(Polygon::new(exterior, rings.collect()))
}
