//! Error types for Sleet using snafu.
//!
//! Each stage of a run has its own error enum with context selectors;
//! [`PipelineError`] aggregates them at the top level.

use snafu::prelude::*;

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file"))]
    ReadFile { source: std::io::Error },

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML configuration"))]
    YamlParse { source: serde_yaml::Error },

    /// Schema has no fields.
    #[snafu(display("Schema must declare at least one field"))]
    EmptySchema,

    /// A schema field uses the synthetic validity field name.
    #[snafu(display("Field name '{name}' is reserved for internal use"))]
    ReservedFieldName { name: String },

    /// A schema field has an empty name.
    #[snafu(display("Schema field names cannot be empty"))]
    EmptyFieldName,

    /// A datetime or date field has no format.
    #[snafu(display("Field '{field}' of type {kind} requires a format"))]
    MissingFormat { field: String, kind: String },

    /// A plain field declares a format it would never use.
    #[snafu(display("Field '{field}' declares a format but has no datetime or date type"))]
    UnexpectedFormat { field: String },

    /// Destination table name is empty.
    #[snafu(display("{setting} cannot be empty"))]
    EmptyTableName { setting: &'static str },

    /// Table name cannot be used as a staged file name or a qualified identifier.
    #[snafu(display("{setting} '{name}' is not a valid table name"))]
    InvalidTableName { setting: &'static str, name: String },

    /// Both partitions target the same table.
    #[snafu(display(
        "load.destination_table and load.invalid_data_table must differ, both are '{table}'"
    ))]
    SameTable { table: String },

    /// Separator is not a single ASCII character.
    #[snafu(display("{setting} must be a single ASCII character, got {value:?}"))]
    InvalidSeparator { setting: &'static str, value: char },

    /// Chunk size is zero.
    #[snafu(display("{setting} must be greater than zero"))]
    ZeroChunkSize { setting: &'static str },

    /// No sink section in the configuration.
    #[snafu(display("Configuration has no sink section"))]
    MissingSink,

    /// A required sink credential is empty.
    #[snafu(display("Sink setting '{setting}' cannot be empty"))]
    MissingSinkSetting { setting: &'static str },
}

// ============ Extract Errors ============

/// Errors that can occur while reading the input file.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ExtractError {
    /// Failed to open the input file.
    #[snafu(display("Failed to open input file {path}"))]
    OpenInput {
        source: std::io::Error,
        path: String,
    },

    /// Failed to read or decode a CSV record.
    #[snafu(display("Failed to read CSV from {path}"))]
    ReadCsv { source: csv::Error, path: String },

    /// Input header contains the synthetic validity field.
    #[snafu(display("Input column '{column}' in {path} is reserved for internal use"))]
    ReservedColumn { column: String, path: String },
}

// ============ Transform Errors ============

/// Errors that can occur during the transform stage.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TransformError {
    /// A schema field does not exist in the input.
    #[snafu(display("Schema field '{field}' is missing from the input header"))]
    MissingField { field: String },
}

// ============ Sink Errors ============

/// Errors that can occur while bulk-inserting into the sink.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// Failed to connect to the database.
    #[snafu(display("Failed to connect to {host}:{port}/{dbname}"))]
    Connect {
        source: sqlx::Error,
        host: String,
        port: u16,
        dbname: String,
    },

    /// The database refused to start the COPY.
    #[snafu(display("Failed to start COPY into {table}"))]
    CopyStart { source: sqlx::Error, table: String },

    /// Streaming data into an open COPY failed.
    #[snafu(display("Failed to stream data into {table}"))]
    CopySend { source: sqlx::Error, table: String },

    /// The database rejected the COPY when it was finished.
    #[snafu(display("Failed to finish COPY into {table}"))]
    CopyFinish { source: sqlx::Error, table: String },

    /// Failed to read the staged batch file.
    #[snafu(display("Failed to read staged batch {path}"))]
    ReadStaged {
        source: std::io::Error,
        path: String,
    },

    /// The sink refused the batch before sending any data.
    #[snafu(display("Sink rejected batch for {table}: {message}"))]
    Rejected { table: String, message: String },
}

// ============ Load Errors ============

/// Errors that can occur while loading one partition.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LoadError {
    /// Failed to create the output directory.
    #[snafu(display("Failed to create output directory {path}"))]
    OutputDir {
        source: std::io::Error,
        path: String,
    },

    /// Failed to write the staged batch file.
    #[snafu(display("Failed to stage {partition} partition to {path}"))]
    Stage {
        source: csv::Error,
        partition: &'static str,
        path: String,
    },

    /// The sink failed to insert the batch.
    #[snafu(display("Bulk insert of {partition} partition into {table} failed: {source}"))]
    BulkInsert {
        source: SinkError,
        partition: &'static str,
        table: String,
    },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to bind the metrics endpoint.
    #[snafu(display("Failed to bind metrics endpoint to {addr}"))]
    Bind {
        source: std::io::Error,
        addr: std::net::SocketAddr,
    },

    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },
}

// ============ Pipeline Error (top-level) ============

/// Top-level pipeline errors that aggregate all error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Configuration error.
    #[snafu(display("Configuration error"))]
    Config { source: ConfigError },

    /// Extraction error.
    #[snafu(display("Extract error"))]
    Extract { source: ExtractError },

    /// Transform error.
    #[snafu(display("Transform error"))]
    Transform { source: TransformError },

    /// Sink error outside of a partition load (e.g. connecting).
    #[snafu(display("Sink error"))]
    Sink { source: SinkError },

    /// One or more partitions failed to load.
    #[snafu(display(
        "{} partition load(s) failed: {}",
        failures.len(),
        failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
    ))]
    Load { failures: Vec<LoadError> },

    /// Address parsing error.
    #[snafu(display("Failed to parse address"))]
    AddressParse { source: std::net::AddrParseError },

    /// Metrics error.
    #[snafu(display("Metrics error"))]
    Metrics { source: MetricsError },
}

impl PipelineError {
    /// Partitions whose load failed, if this is a load error.
    pub fn failed_partitions(&self) -> Vec<&'static str> {
        match self {
            PipelineError::Load { failures } => failures
                .iter()
                .filter_map(|failure| match failure {
                    LoadError::Stage { partition, .. } | LoadError::BulkInsert { partition, .. } => {
                        Some(*partition)
                    }
                    LoadError::OutputDir { .. } => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}
