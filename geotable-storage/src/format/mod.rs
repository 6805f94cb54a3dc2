//! On-disk layout of a geotable file.
//!
//! All fixed-width numeric fields are little-endian.
//!
//! ```text
//! [Magic 8B][Header len u32][Header block][Index region][Feature stream]
//! ```
//!
//! - The header block is described in [`header`].
//! - The index region is exactly
//!   [`PackedRTree::calc_size`](crate::index::PackedRTree::calc_size) bytes.
//! - The feature stream is `features_count` repetitions of
//!   `{ u32 record_len }{ record }`, see [`crate::codec::feature`].

use std::fmt;

use geotable_tabular::Geometry;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

pub mod header;
pub(crate) mod wire;

pub use header::{read_header, write_header, HeaderInfo, HeaderMeta};

/// Current format version.
pub const VERSION: u8 = 1;

/// Magic bytes identifying a geotable file, version byte included.
pub const MAGIC: [u8; 8] = [b'g', b't', b'b', VERSION, b'g', b't', b'b', 0];

/// Magic length in bytes.
pub const MAGIC_LEN: usize = MAGIC.len();

/// Size of every length prefix (header block and feature records).
pub const SIZE_PREFIX_LEN: usize = 4;

/// Header flag, bit 0: the index region holds a built R-tree rather than a
/// zero-filled placeholder.
pub const FLAG_INDEX_POPULATED: u8 = 0x01;

/// Check the magic/version marker at the start of a file.
pub fn check_magic(bytes: &[u8]) -> Result<()> {
    if bytes.len() < MAGIC_LEN {
        return Err(StoreError::format("not a recognized file: too short for magic"));
    }
    if bytes[0..3] != MAGIC[0..3] || bytes[4..8] != MAGIC[4..8] {
        return Err(StoreError::format("not a recognized file: bad magic bytes"));
    }
    if bytes[3] != VERSION {
        return Err(StoreError::format(format!(
            "unsupported version {} (expected {VERSION})",
            bytes[3]
        )));
    }
    Ok(())
}

/// Geometry kind declared in the header and tagged on every stored geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum GeometryType {
    /// Mixed: any supported geometry per feature.
    #[default]
    Unknown = 0,
    Point = 1,
    LineString = 2,
    Polygon = 3,
    MultiPoint = 4,
    MultiLineString = 5,
    MultiPolygon = 6,
    GeometryCollection = 7,
}

impl GeometryType {
    pub fn from_u8(b: u8) -> Result<Self> {
        match b {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Point),
            2 => Ok(Self::LineString),
            3 => Ok(Self::Polygon),
            4 => Ok(Self::MultiPoint),
            5 => Ok(Self::MultiLineString),
            6 => Ok(Self::MultiPolygon),
            7 => Ok(Self::GeometryCollection),
            _ => Err(StoreError::UnsupportedGeometry(format!(
                "unknown geometry type tag {b}"
            ))),
        }
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Classify a geometry.
    ///
    /// `Line`, `Rect` and `Triangle` have no stored representation and are
    /// rejected.
    pub fn of(geometry: &Geometry) -> Result<Self> {
        match geometry {
            Geometry::Point(_) => Ok(Self::Point),
            Geometry::LineString(_) => Ok(Self::LineString),
            Geometry::Polygon(_) => Ok(Self::Polygon),
            Geometry::MultiPoint(_) => Ok(Self::MultiPoint),
            Geometry::MultiLineString(_) => Ok(Self::MultiLineString),
            Geometry::MultiPolygon(_) => Ok(Self::MultiPolygon),
            Geometry::GeometryCollection(_) => Ok(Self::GeometryCollection),
            Geometry::Line(_) => Err(StoreError::UnsupportedGeometry("Line".into())),
            Geometry::Rect(_) => Err(StoreError::UnsupportedGeometry("Rect".into())),
            Geometry::Triangle(_) => Err(StoreError::UnsupportedGeometry("Triangle".into())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Point => "Point",
            Self::LineString => "LineString",
            Self::Polygon => "Polygon",
            Self::MultiPoint => "MultiPoint",
            Self::MultiLineString => "MultiLineString",
            Self::MultiPolygon => "MultiPolygon",
            Self::GeometryCollection => "GeometryCollection",
        }
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
