//! Transform stage.
//!
//! Runs a fixed, ordered list of cleaners over the extracted record set:
//! de-duplication first, then field validation. Both mutate the set in
//! place; nothing else in a run touches record values.
//!
//! # Components
//!
//! - [`convert`] - datetime and date converters with coerce-to-null policy
//! - [`validate`] - the validation engine computing validity tags

pub mod convert;
pub mod validate;

pub use validate::{FieldReport, ValidationEngine, ValidationReport};

use tracing::info;

use crate::config::SchemaConfig;
use crate::emit;
use crate::error::TransformError;
use crate::metrics::events::DuplicatesDropped;
use crate::record::RecordSet;

/// A cleaning step of the transform stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cleaner {
    /// Collapse exact duplicate records to their first occurrence.
    Duplicates,
    /// Convert typed fields and tag records violating `not_null`.
    InvalidFields,
}

impl Cleaner {
    /// The cleaners of a run, in execution order.
    pub const ORDERED: [Cleaner; 2] = [Cleaner::Duplicates, Cleaner::InvalidFields];

    fn apply(
        self,
        records: &mut RecordSet,
        schema: &SchemaConfig,
        summary: &mut TransformSummary,
    ) -> Result<(), TransformError> {
        match self {
            Cleaner::Duplicates => {
                let dropped = records.drop_duplicates();
                emit!(DuplicatesDropped {
                    count: dropped as u64
                });
                summary.duplicates_dropped = dropped;
            }
            Cleaner::InvalidFields => {
                summary.validation = ValidationEngine::new(schema).apply(records)?;
            }
        }
        Ok(())
    }
}

/// What the transform stage did to a record set.
#[derive(Debug, Clone, Default)]
pub struct TransformSummary {
    pub duplicates_dropped: usize,
    pub validation: ValidationReport,
}

/// Runs the cleaners over a record set.
pub struct TransformJob<'a> {
    schema: &'a SchemaConfig,
    cleaners: Vec<Cleaner>,
}

impl<'a> TransformJob<'a> {
    pub fn new(schema: &'a SchemaConfig) -> Self {
        Self {
            schema,
            cleaners: Cleaner::ORDERED.to_vec(),
        }
    }

    /// Clean `records` in place.
    pub fn run(&self, records: &mut RecordSet) -> Result<TransformSummary, TransformError> {
        // Fail on a missing schema column before any cleaner touches the set.
        ValidationEngine::new(self.schema).check_columns(records)?;

        let mut summary = TransformSummary::default();
        for cleaner in &self.cleaners {
            cleaner.apply(records, self.schema, &mut summary)?;
        }

        info!(
            "Transform complete: {} duplicates dropped, {} valid, {} invalid, {} values coerced",
            summary.duplicates_dropped,
            summary.validation.valid,
            summary.validation.invalid,
            summary.validation.coerced()
        );
        Ok(summary)
    }
}
