//! Sink for staged batches.
//!
//! A sink receives one staged batch per partition and inserts it into the
//! batch's table as a single bulk operation.

pub mod postgres;

pub use postgres::PostgresSink;

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::SinkError;

/// A partition serialized to disk, ready for bulk insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedBatch {
    /// Destination table.
    pub table_name: String,
    /// Column names, in the order of the header row.
    pub columns: Vec<String>,
    /// Field separator used in the file.
    pub separator: char,
    /// Delimited file with a header row.
    pub path: PathBuf,
    /// Data rows in the file, header excluded.
    pub rows: usize,
    /// Size of the file in bytes.
    pub bytes: u64,
}

/// Trait for stores that can bulk-insert a staged batch.
///
/// Implementations must insert the whole batch or nothing.
#[async_trait]
pub trait BulkSink: Send + Sync {
    /// Insert every row of `batch` into `batch.table_name`.
    ///
    /// Returns the number of rows the store reports as inserted.
    async fn bulk_insert(&self, batch: &StagedBatch) -> Result<u64, SinkError>;
}
