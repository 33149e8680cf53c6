//! Staging of a partition to a delimited file.
//!
//! Writes the destination's field list as the header row, then one row per
//! record, flushing every `chunk_size` rows. Columns not in the field list
//! are dropped here; the validity tag is never written.

use snafu::prelude::*;
use std::path::Path;
use tracing::debug;

use crate::config::Destination;
use crate::error::{LoadError, StageSnafu};
use crate::record::RecordSet;
use crate::sink::StagedBatch;

/// Writes partitions to `{output_dir}/{table_name}.csv`.
#[derive(Debug, Clone)]
pub struct BatchStager<'a> {
    output_dir: &'a Path,
    chunk_size: usize,
}

impl<'a> BatchStager<'a> {
    pub fn new(output_dir: &'a Path, chunk_size: usize) -> Self {
        Self {
            output_dir,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Serialize `records` for `destination`.
    ///
    /// Fields of the destination that the record set lacks are written as
    /// empty values.
    pub fn stage(
        &self,
        partition: &'static str,
        records: &RecordSet,
        destination: &Destination,
    ) -> Result<StagedBatch, LoadError> {
        let path = self
            .output_dir
            .join(format!("{}.csv", destination.table_name));
        let shown = path.display().to_string();
        let context = || StageSnafu {
            partition,
            path: shown.clone(),
        };

        let mut writer = csv::WriterBuilder::new()
            .delimiter(destination.separator as u8)
            .from_path(&path)
            .with_context(|_| context())?;

        writer
            .write_record(&destination.field_list)
            .with_context(|_| context())?;

        let indices: Vec<Option<usize>> = records
            .column_indices(&destination.field_list)
            .into_iter()
            .map(|(_, index)| index)
            .collect();

        let mut row = csv::StringRecord::with_capacity(256, indices.len());
        let mut written = 0usize;
        for chunk in records.records().chunks(self.chunk_size) {
            for record in chunk {
                row.clear();
                for index in &indices {
                    match index {
                        Some(i) => row.push_field(&record.values()[*i].render()),
                        None => row.push_field(""),
                    }
                }
                writer.write_record(&row).with_context(|_| context())?;
            }
            writer
                .flush()
                .map_err(csv::Error::from)
                .with_context(|_| context())?;
            written += chunk.len();
            debug!("[{}] staged {} / {} rows", partition, written, records.len());
        }

        writer
            .flush()
            .map_err(csv::Error::from)
            .with_context(|_| context())?;
        drop(writer);

        let bytes = std::fs::metadata(&path)
            .map_err(csv::Error::from)
            .with_context(|_| context())?
            .len();

        Ok(StagedBatch {
            table_name: destination.table_name.clone(),
            columns: destination.field_list.clone(),
            separator: destination.separator,
            path,
            rows: written,
            bytes,
        })
    }
}
