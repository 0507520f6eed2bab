//! Bulk commits of normalized price records to a relational target.

mod sqlite;

pub use sqlite::{SqliteSink, DEFAULT_TABLE};

use crate::error::IngestError;
use crate::transform::PriceRecord;

/// A relational target for normalized price rows.
///
/// One `write_batch` call is one bulk operation: all rows in the call land
/// together under the sink's own transaction semantics, or the call fails.
/// The pipeline layers no additional atomicity or retry on top.
pub trait PriceSink {
    /// Target table name, for progress and error reporting.
    fn table(&self) -> &str;

    /// Write all records in one bulk operation.
    fn write_batch(&mut self, records: &[PriceRecord]) -> Result<(), IngestError>;
}
