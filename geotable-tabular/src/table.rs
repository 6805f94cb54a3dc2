//! The generic table contract implemented by storage backends.

use crate::row::Row;
use crate::schema::Schema;

/// A finite, ordered sequence of rows sharing one schema.
///
/// Every call to [`rows`](DataTable::rows) starts an independent pass over
/// the table. Errors during a pass are yielded as `Err` items; the iterator
/// ends after the first error.
pub trait DataTable {
    type Error: std::error::Error + Send + Sync + 'static;
    type Rows: Iterator<Item = Result<Row, Self::Error>>;

    /// Schema shared by every row.
    fn schema(&self) -> &Schema;

    /// Number of rows in the table.
    fn size(&self) -> Result<u64, Self::Error>;

    /// Start a new pass over the rows.
    fn rows(&self) -> Result<Self::Rows, Self::Error>;

    /// Remove all rows.
    fn clear(&mut self) -> Result<(), Self::Error>;
}
