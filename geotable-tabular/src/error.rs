//! Error types for tabular operations.

use thiserror::Error;

/// Errors from schema and row construction.
#[derive(Debug, Error)]
pub enum TabularError {
    /// Schema or structural error (duplicate column, unknown column, etc.)
    #[error("Schema error: {0}")]
    Schema(String),
}

/// Result type for tabular operations.
pub type Result<T> = std::result::Result<T, TabularError>;
