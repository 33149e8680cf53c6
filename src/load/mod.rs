//! Load stage.
//!
//! Stages each partition as a delimited file and hands it to a
//! [`BulkSink`]. Loaders run in a fixed order and every loader runs even if
//! an earlier one failed; a partition that was committed stays committed.

pub mod stage;

pub use stage::BatchStager;

use snafu::prelude::*;
use std::time::Instant;
use tracing::{error, info};

use crate::config::{Config, Destination};
use crate::emit;
use crate::error::{BulkInsertSnafu, LoadError, OutputDirSnafu};
use crate::metrics::events::{LoadStatus, PartitionLoaded, RowsStaged};
use crate::partition::Partitions;
use crate::record::RecordSet;
use crate::sink::{BulkSink, StagedBatch};

/// A partition loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loader {
    /// Loads valid records into `load.destination_table`.
    Valid,
    /// Loads invalid records into `load.invalid_data_table`.
    Invalid,
}

impl Loader {
    /// The loaders of a run, in execution order.
    pub const ORDERED: [Loader; 2] = [Loader::Valid, Loader::Invalid];

    pub fn partition_name(self) -> &'static str {
        match self {
            Loader::Valid => "valid",
            Loader::Invalid => "invalid",
        }
    }

    pub fn destination(self, config: &Config) -> Destination {
        match self {
            Loader::Valid => config.valid_destination(),
            Loader::Invalid => config.invalid_destination(),
        }
    }

    fn take(self, partitions: &mut Partitions) -> RecordSet {
        match self {
            Loader::Valid => std::mem::take(&mut partitions.valid),
            Loader::Invalid => std::mem::take(&mut partitions.invalid),
        }
    }
}

/// Result of one successful partition load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionLoad {
    pub loader: Loader,
    pub table_name: String,
    /// Data rows written to the staged batch.
    pub rows_staged: usize,
    /// Rows the sink reported as inserted.
    pub rows_loaded: u64,
}

/// Per-partition results of a load stage where every loader succeeded.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub loads: Vec<PartitionLoad>,
}

impl LoadReport {
    /// Rows inserted by `loader`, zero if it did not run.
    pub fn rows_loaded(&self, loader: Loader) -> u64 {
        self.loads
            .iter()
            .find(|load| load.loader == loader)
            .map_or(0, |load| load.rows_loaded)
    }
}

/// Runs every loader against a sink.
pub struct LoadJob<'a> {
    config: &'a Config,
    sink: &'a dyn BulkSink,
    loaders: Vec<Loader>,
}

impl<'a> LoadJob<'a> {
    pub fn new(config: &'a Config, sink: &'a dyn BulkSink) -> Self {
        Self {
            config,
            sink,
            loaders: Loader::ORDERED.to_vec(),
        }
    }

    /// Stage and insert both partitions.
    ///
    /// Returns every failure when at least one loader failed.
    pub async fn run(&self, mut partitions: Partitions) -> Result<LoadReport, Vec<LoadError>> {
        let output_dir = &self.config.load.output_path;
        std::fs::create_dir_all(output_dir)
            .context(OutputDirSnafu {
                path: output_dir.display().to_string(),
            })
            .map_err(|e| vec![e])?;

        let stager = BatchStager::new(output_dir, self.config.load.chunk_size);
        let mut staged = Vec::with_capacity(self.loaders.len());
        for &loader in &self.loaders {
            let records = loader.take(&mut partitions);
            let destination = loader.destination(self.config);
            let result = stager.stage(loader.partition_name(), &records, &destination);
            if let Ok(batch) = &result {
                emit!(RowsStaged {
                    partition: loader.partition_name(),
                    rows: batch.rows as u64,
                    bytes: batch.bytes,
                });
                info!(
                    "[{}] staged {} rows ({} bytes) to {}",
                    loader.partition_name(),
                    batch.rows,
                    batch.bytes,
                    batch.path.display()
                );
            }
            staged.push((loader, result));
        }
        // Record values are no longer needed once both batches are on disk.
        drop(partitions);

        let mut report = LoadReport::default();
        let mut failures = Vec::new();
        for (loader, result) in staged {
            let outcome = match result {
                Ok(batch) => self.insert(loader, &batch).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(load) => report.loads.push(load),
                Err(e) => {
                    error!("[{}] load failed: {}", loader.partition_name(), e);
                    failures.push(e);
                }
            }
        }

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(failures)
        }
    }

    async fn insert(&self, loader: Loader, batch: &StagedBatch) -> Result<PartitionLoad, LoadError> {
        let partition = loader.partition_name();
        let start = Instant::now();
        let result = self.sink.bulk_insert(batch).await;
        let duration = start.elapsed();

        let status = if result.is_ok() {
            LoadStatus::Success
        } else {
            LoadStatus::Failed
        };
        emit!(PartitionLoaded {
            partition,
            status,
            rows: result.as_ref().map_or(0, |rows| *rows),
            duration,
        });

        let rows_loaded = result.context(BulkInsertSnafu {
            partition,
            table: &batch.table_name,
        })?;
        info!(
            "[{}] loaded {} rows into {} in {:?}",
            partition, rows_loaded, batch.table_name, duration
        );
        Ok(PartitionLoad {
            loader,
            table_name: batch.table_name.clone(),
            rows_staged: batch.rows,
            rows_loaded,
        })
    }
}
