//! Partitioner: routes tagged records to the valid or invalid set.

use tracing::info;

use crate::record::RecordSet;

/// Both halves of a partitioned record set.
#[derive(Debug, Clone, Default)]
pub struct Partitions {
    pub valid: RecordSet,
    pub invalid: RecordSet,
}

/// Split `records` by validity tag.
///
/// A pure filter: values are untouched and each half keeps the relative
/// order the records had in the input.
pub fn partition(records: RecordSet) -> Partitions {
    let total = records.len();
    let (valid, invalid) = records.split_by_validity();
    info!(
        "Partitioned {} records: {} valid, {} invalid",
        total,
        valid.len(),
        invalid.len()
    );
    Partitions { valid, invalid }
}
