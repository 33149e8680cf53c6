//! Internal events for metrics emission.
//!
//! Each event struct is one measurable occurrence in a run. Emitting it
//! records the matching counter, gauge or histogram and writes a trace line.

use metrics::{counter, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted for every chunk of rows read from the input.
pub struct RecordsExtracted {
    pub count: u64,
}

impl InternalEvent for RecordsExtracted {
    fn emit(self) {
        trace!(count = self.count, "Records extracted");
        counter!("sleet_records_extracted_total").increment(self.count);
    }
}

/// Event emitted when extraction of the input file finishes.
pub struct ExtractCompleted {
    pub duration: Duration,
}

impl InternalEvent for ExtractCompleted {
    fn emit(self) {
        trace!(duration_ms = self.duration.as_millis(), "Extract completed");
        histogram!("sleet_extract_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted after de-duplication.
pub struct DuplicatesDropped {
    pub count: u64,
}

impl InternalEvent for DuplicatesDropped {
    fn emit(self) {
        trace!(count = self.count, "Duplicates dropped");
        counter!("sleet_duplicates_dropped_total").increment(self.count);
    }
}

/// Event emitted when values of a field failed to parse and became null.
pub struct ValuesCoerced {
    pub field: String,
    pub count: u64,
}

impl InternalEvent for ValuesCoerced {
    fn emit(self) {
        trace!(field = %self.field, count = self.count, "Values coerced to null");
        counter!("sleet_values_coerced_total", "field" => self.field).increment(self.count);
    }
}

/// Validity of a record after the transform stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Valid,
    Invalid,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Valid => "valid",
            RecordStatus::Invalid => "invalid",
        }
    }
}

/// Event emitted once per status after validation.
pub struct RecordsTagged {
    pub status: RecordStatus,
    pub count: u64,
}

impl InternalEvent for RecordsTagged {
    fn emit(self) {
        trace!(status = self.status.as_str(), count = self.count, "Records tagged");
        counter!("sleet_records_tagged_total", "status" => self.status.as_str())
            .increment(self.count);
    }
}

/// Event emitted when a partition has been written to its staged batch.
pub struct RowsStaged {
    pub partition: &'static str,
    pub rows: u64,
    pub bytes: u64,
}

impl InternalEvent for RowsStaged {
    fn emit(self) {
        trace!(
            partition = self.partition,
            rows = self.rows,
            bytes = self.bytes,
            "Rows staged"
        );
        counter!("sleet_rows_staged_total", "partition" => self.partition).increment(self.rows);
        counter!("sleet_bytes_staged_total", "partition" => self.partition).increment(self.bytes);
    }
}

/// Outcome of loading one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Success,
    Failed,
}

impl LoadStatus {
    fn as_str(&self) -> &'static str {
        match self {
            LoadStatus::Success => "success",
            LoadStatus::Failed => "failed",
        }
    }
}

/// Event emitted when a partition load finishes, successfully or not.
pub struct PartitionLoaded {
    pub partition: &'static str,
    pub status: LoadStatus,
    pub rows: u64,
    pub duration: Duration,
}

impl InternalEvent for PartitionLoaded {
    fn emit(self) {
        trace!(
            partition = self.partition,
            status = self.status.as_str(),
            rows = self.rows,
            duration_ms = self.duration.as_millis(),
            "Partition loaded"
        );
        counter!(
            "sleet_partition_loads_total",
            "partition" => self.partition,
            "status" => self.status.as_str()
        )
        .increment(1);
        counter!("sleet_rows_loaded_total", "partition" => self.partition).increment(self.rows);
        histogram!("sleet_bulk_insert_duration_seconds", "partition" => self.partition)
            .record(self.duration.as_secs_f64());
    }
}
