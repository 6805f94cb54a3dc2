//! Error types for the geotable storage layer.

use std::io;

use geotable_tabular::{ColumnType, TabularError};
use thiserror::Error;

/// Storage errors.
///
/// Every failure that stops a read or write surfaces as one of these; the
/// layer never retries or swallows errors internally.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Not a geotable file, or a corrupt/truncated one.
    #[error("format error: {0}")]
    Format(String),

    /// Header declares a column type tag this build does not know.
    #[error("unsupported column type tag: {0}")]
    UnsupportedType(u8),

    /// Geometry kind that cannot be stored or decoded.
    #[error("unsupported geometry: {0}")]
    UnsupportedGeometry(String),

    /// Value does not match the declared type of its column.
    #[error("type conversion error on column '{column}': expected {expected}, found {found}")]
    TypeConversion {
        column: String,
        expected: ColumnType,
        found: &'static str,
    },

    /// Row does not carry exactly one value per schema column.
    #[error("row has {found} values but the schema has {expected} columns")]
    RowArity { expected: usize, found: usize },

    /// Operation the write-once format does not provide.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Schema construction error.
    #[error(transparent)]
    Tabular(#[from] TabularError),

    /// Underlying channel failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Shorthand for a [`StoreError::Format`].
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// True when the error means the bytes are not a valid table.
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            Self::Format(_) | Self::UnsupportedType(_) | Self::UnsupportedGeometry(_)
        )
    }

    /// Map an I/O error hit while reading a section of the file.
    ///
    /// Running out of bytes means the file is truncated, which is a format
    /// problem rather than a channel failure.
    pub(crate) fn from_read(err: io::Error, section: &str) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::Format(format!("truncated {section}"))
        } else {
            Self::Io(err)
        }
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eof_maps_to_format() {
        let err = StoreError::from_read(io::ErrorKind::UnexpectedEof.into(), "header");
        assert!(err.is_format());
        assert_eq!(err.to_string(), "format error: truncated header");

        let err = StoreError::from_read(io::ErrorKind::PermissionDenied.into(), "header");
        assert!(matches!(err, StoreError::Io(_)));
        assert!(!err.is_format());
    }

    #[test]
    fn test_type_conversion_message() {
        let err = StoreError::TypeConversion {
            column: "area_id".into(),
            expected: ColumnType::Long,
            found: "string",
        };
        assert_eq!(
            err.to_string(),
            "type conversion error on column 'area_id': expected long, found string"
        );
    }

    #[test]
    fn test_row_arity_is_not_format() {
        let err = StoreError::RowArity {
            expected: 2,
            found: 1,
        };
        assert!(!err.is_format());
        assert_eq!(
            err.to_string(),
            "row has 1 values but the schema has 2 columns"
        );
    }
}
