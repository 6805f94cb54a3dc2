//! Row, schema and value types for geotable.
//!
//! This crate is the contract between storage backends and the code that
//! produces or consumes feature rows (ingestion, rendering, query layers).
//!
//! # Design
//!
//! - **Row oriented**: a [`Row`] holds one [`Value`] per schema column plus an
//!   optional geometry slot that is not part of the column list
//! - **Strongly typed**: every value is a variant of the closed [`Value`] enum,
//!   no `dyn Any`
//! - **Positional**: column order in the [`Schema`] defines value order in rows

pub mod error;
pub mod row;
pub mod schema;
pub mod table;

pub use error::{Result, TabularError};
pub use row::{Row, Value};
pub use schema::{ColumnDef, ColumnType, Schema};
pub use table::DataTable;

/// Geometry type carried in the geometry slot of a [`Row`].
pub type Geometry = geo_types::Geometry<f64>;
