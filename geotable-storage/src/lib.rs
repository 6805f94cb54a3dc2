//! File-backed geospatial feature tables.
//!
//! A table file is written once and then read sequentially:
//!
//! ```text
//! magic (8) | header_len (u32) | header block | index region | feature records...
//! ```
//!
//! - [`format`]: magic marker and header codec
//! - [`index`]: packed R-tree stored in the index region
//! - [`codec`]: property, geometry and feature record encoding
//! - [`read`]: working buffer and streaming row decoder
//! - [`write`]: table writer
//! - [`table`]: [`GeoTable`], the file-bound facade
//!
//! All integers are little-endian. Reads use one fixed-capacity buffer per
//! decoder; records larger than it are rejected instead of reallocated.

pub mod codec;
pub mod config;
pub mod error;
pub mod format;
pub mod index;
pub mod read;
pub mod table;
pub mod write;

pub use config::TableConfig;
pub use error::{Result, StoreError};
pub use format::{GeometryType, HeaderInfo, HeaderMeta};
pub use index::{NodeItem, PackedRTree, SearchHit};
pub use read::{DecoderState, FeatureReader};
pub use table::{GeoTable, TableRows};
pub use write::{write_table, WriteStats};
