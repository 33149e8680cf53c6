//! Main processing pipeline.
//!
//! Wires extraction, the transform stage, partitioning and the load stage
//! into a single pass over one input file:
//!
//! ```text
//! Extracted -> Validated -> Partitioned -> Loaded(valid), Loaded(invalid) -> Done
//! ```
//!
//! Any fatal error aborts the run where it happens. Nothing is retried and
//! nothing already loaded is rolled back.

use snafu::prelude::*;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::error::{
    ConfigSnafu, ExtractSnafu, LoadSnafu, PipelineError, SinkSnafu, TransformSnafu,
};
use crate::load::{LoadJob, Loader};
use crate::partition::partition;
use crate::sink::{BulkSink, PostgresSink};
use crate::source::{CsvExtractor, CsvExtractorConfig};
use crate::transform::TransformJob;

/// Statistics about the pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub records_extracted: usize,
    pub duplicates_dropped: usize,
    pub valid_records: usize,
    pub invalid_records: usize,
    pub values_coerced: usize,
    pub valid_loaded: u64,
    pub invalid_loaded: u64,
}

/// Stage a run has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Extracted,
    Validated,
    Partitioned,
    Loaded(Loader),
    Done,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStage::Extracted => f.write_str("extracted"),
            RunStage::Validated => f.write_str("validated"),
            RunStage::Partitioned => f.write_str("partitioned"),
            RunStage::Loaded(loader) => write!(f, "loaded({})", loader.partition_name()),
            RunStage::Done => f.write_str("done"),
        }
    }
}

/// A configured pipeline bound to a sink.
pub struct Pipeline {
    config: Config,
    sink: Arc<dyn BulkSink>,
}

impl Pipeline {
    pub fn new(config: Config, sink: Arc<dyn BulkSink>) -> Self {
        Self { config, sink }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the pipeline over `file_name` in the configured input directory.
    pub async fn run(&self, file_name: &str) -> Result<PipelineStats, PipelineError> {
        let extractor = CsvExtractor::new(CsvExtractorConfig::from(&self.config.source));
        info!("Starting run for {}", extractor.input_path(file_name).display());

        let mut stats = PipelineStats::default();

        let mut records = extractor.extract(file_name).context(ExtractSnafu)?;
        stats.records_extracted = records.len();
        transition(RunStage::Extracted);

        let summary = TransformJob::new(&self.config.schema)
            .run(&mut records)
            .context(TransformSnafu)?;
        stats.duplicates_dropped = summary.duplicates_dropped;
        stats.values_coerced = summary.validation.coerced();
        transition(RunStage::Validated);

        let partitions = partition(records);
        stats.valid_records = partitions.valid.len();
        stats.invalid_records = partitions.invalid.len();
        transition(RunStage::Partitioned);

        let report = match LoadJob::new(&self.config, self.sink.as_ref())
            .run(partitions)
            .await
        {
            Ok(report) => report,
            Err(failures) => return LoadSnafu { failures }.fail(),
        };
        for load in &report.loads {
            transition(RunStage::Loaded(load.loader));
        }
        stats.valid_loaded = report.rows_loaded(Loader::Valid);
        stats.invalid_loaded = report.rows_loaded(Loader::Invalid);
        transition(RunStage::Done);

        Ok(stats)
    }
}

fn transition(stage: RunStage) {
    info!("Run stage: {}", stage);
}

/// Connect to the configured sink and run the pipeline over `file_name`.
pub async fn run_pipeline(config: Config, file_name: &str) -> Result<PipelineStats, PipelineError> {
    let sink_config = config.sink().context(ConfigSnafu)?;
    let sink = PostgresSink::connect(sink_config)
        .await
        .context(SinkSnafu)?;

    Pipeline::new(config, Arc::new(sink)).run(file_name).await
}
