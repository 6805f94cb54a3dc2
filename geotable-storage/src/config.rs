//! Table configuration types.
//!
//! Write-time knobs end up in the file header; `buffer_capacity` only bounds
//! the working buffer of readers and writers and is never persisted.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::format::GeometryType;

/// Default working buffer size (1 MiB).
pub const DEFAULT_BUFFER_CAPACITY: usize = 1 << 20;

/// Smallest working buffer accepted by [`TableConfig::validate`].
pub const MIN_BUFFER_CAPACITY: usize = 64;

/// Default packed R-tree branching factor.
pub const DEFAULT_INDEX_NODE_SIZE: u16 = 16;

/// Default spatial reference id (Web Mercator).
pub const DEFAULT_SRID: i32 = 3857;

/// Configuration for writing and reading a feature table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Geometry kind declared in the header. `Unknown` accepts any
    /// supported geometry per feature.
    pub geometry_type: GeometryType,

    /// Spatial reference id stored in the header.
    pub srid: i32,

    /// Packed R-tree branching factor. `0` means no index region.
    pub index_node_size: u16,

    /// Populate the index region with a bounding-box tree.
    /// When false the region is reserved but left zero-filled.
    pub build_index: bool,

    /// Working buffer size in bytes. Header blocks and feature records
    /// larger than this are rejected.
    pub buffer_capacity: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            geometry_type: GeometryType::Unknown,
            srid: DEFAULT_SRID,
            index_node_size: DEFAULT_INDEX_NODE_SIZE,
            build_index: true,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl TableConfig {
    /// Set the declared geometry kind.
    pub fn with_geometry_type(mut self, geometry_type: GeometryType) -> Self {
        self.geometry_type = geometry_type;
        self
    }

    /// Set the spatial reference id.
    pub fn with_srid(mut self, srid: i32) -> Self {
        self.srid = srid;
        self
    }

    /// Set the index branching factor (`0` disables the index region).
    pub fn with_index_node_size(mut self, index_node_size: u16) -> Self {
        self.index_node_size = index_node_size;
        self
    }

    /// Enable or disable index construction.
    pub fn with_build_index(mut self, build_index: bool) -> Self {
        self.build_index = build_index;
        self
    }

    /// Set the working buffer size.
    pub fn with_buffer_capacity(mut self, buffer_capacity: usize) -> Self {
        self.buffer_capacity = buffer_capacity;
        self
    }

    /// Check the configuration before any byte is written.
    pub fn validate(&self) -> Result<()> {
        if self.index_node_size == 1 {
            return Err(StoreError::format(
                "index node size must be 0 (no index) or at least 2",
            ));
        }
        if self.buffer_capacity < MIN_BUFFER_CAPACITY {
            return Err(StoreError::format(format!(
                "buffer capacity {} is below the minimum of {MIN_BUFFER_CAPACITY} bytes",
                self.buffer_capacity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TableConfig::default();
        assert_eq!(config.geometry_type, GeometryType::Unknown);
        assert_eq!(config.srid, 3857);
        assert_eq!(config.index_node_size, 16);
        assert!(config.build_index);
        assert_eq!(config.buffer_capacity, 1 << 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = TableConfig::default()
            .with_geometry_type(GeometryType::Polygon)
            .with_srid(4326)
            .with_index_node_size(0)
            .with_build_index(false)
            .with_buffer_capacity(4096);
        assert_eq!(config.geometry_type, GeometryType::Polygon);
        assert_eq!(config.srid, 4326);
        assert_eq!(config.index_node_size, 0);
        assert!(!config.build_index);
        assert_eq!(config.buffer_capacity, 4096);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let err = TableConfig::default()
            .with_index_node_size(1)
            .validate()
            .unwrap_err();
        assert!(matches!(err, StoreError::Format(_)));

        let err = TableConfig::default()
            .with_buffer_capacity(8)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("below the minimum"));
    }

    #[test]
    fn test_serde_fills_missing_fields() {
        let config: TableConfig = serde_json::from_str(r#"{"srid": 4326}"#).unwrap();
        assert_eq!(config.srid, 4326);
        assert_eq!(config.index_node_size, DEFAULT_INDEX_NODE_SIZE);
    }
}
