//! Configuration parsing and the schema registry.
//!
//! Handles loading the pipeline configuration from YAML, validating it
//! before any data is read, and deriving the destination descriptors for
//! the valid and invalid partitions.

mod vars;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{
    ConfigError, EmptyFieldNameSnafu, EmptySchemaSnafu, EmptyTableNameSnafu,
    EnvInterpolationSnafu, InvalidSeparatorSnafu, InvalidTableNameSnafu, MissingFormatSnafu,
    MissingSinkSettingSnafu, MissingSinkSnafu, ReadFileSnafu, ReservedFieldNameSnafu,
    SameTableSnafu, UnexpectedFormatSnafu, YamlParseSnafu, ZeroChunkSizeSnafu,
};
use crate::record::VALIDITY_FIELD;

/// Rows per chunk for chunked reads and writes.
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

/// Main configuration structure for the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    pub schema: SchemaConfig,
    pub load: LoadConfig,
    /// PostgreSQL connection settings. Required, but checked in `validate`
    /// so a missing section is reported as such.
    #[serde(default)]
    pub sink: Option<SinkConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Source configuration for reading the input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Directory the positional file name is resolved against (default: "./data").
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Field delimiter of the input file (default: ',').
    #[serde(default = "default_separator")]
    pub delimiter: char,

    /// Rows read per chunk (default: 100000).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Cell contents that are read as null.
    #[serde(default = "default_null_values")]
    pub null_values: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            delimiter: default_separator(),
            chunk_size: default_chunk_size(),
            null_values: default_null_values(),
        }
    }
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_separator() -> char {
    ','
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

/// The usual spellings of a missing value in exported CSV files.
fn default_null_values() -> Vec<String> {
    [
        "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
        "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// The schema registry: field rules in declaration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub fields: IndexMap<String, FieldRule>,
}

/// Declarative type, format and nullability constraint for one field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    #[serde(rename = "type", default)]
    pub kind: FieldKind,
    /// strftime-style format, required for datetime and date fields.
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub not_null: bool,
}

impl FieldRule {
    /// A rule without conversion.
    pub fn plain(not_null: bool) -> Self {
        Self {
            kind: FieldKind::Plain,
            format: None,
            not_null,
        }
    }

    /// A rule converting values with `format`.
    pub fn typed(kind: FieldKind, format: impl Into<String>, not_null: bool) -> Self {
        Self {
            kind,
            format: Some(format.into()),
            not_null,
        }
    }
}

/// Supported field kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Datetime,
    Date,
    /// No conversion; the raw text is kept.
    #[default]
    Plain,
}

impl FieldKind {
    pub fn requires_format(self) -> bool {
        matches!(self, FieldKind::Datetime | FieldKind::Date)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Datetime => "datetime",
            FieldKind::Date => "date",
            FieldKind::Plain => "plain",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and how partitions are loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Directory staged batch files are written to (default: "./output").
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// Table receiving valid records.
    pub destination_table: String,

    /// Table receiving invalid records.
    pub invalid_data_table: String,

    /// Separator of the staged batches (default: ',').
    #[serde(default = "default_separator")]
    pub csv_separator: char,

    /// Rows written per chunk when staging (default: 100000).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_output_path() -> PathBuf {
    PathBuf::from("./output")
}

/// PostgreSQL connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub dbname: String,
    pub user: String,
    #[serde(default, alias = "pwd")]
    pub password: String,
}

fn default_port() -> u16 {
    5432
}

impl fmt::Debug for SinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Metrics configuration for the Prometheus endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether to serve metrics during the run (default: false).
    #[serde(default)]
    pub enabled: bool,
    /// Address to bind the metrics HTTP server (default: "0.0.0.0:9090").
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: default_metrics_address(),
        }
    }
}

fn default_metrics_address() -> String {
    "0.0.0.0:9090".to_string()
}

/// Target table, emitted columns and separator for one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub table_name: String,
    pub field_list: Vec<String>,
    pub separator: char,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_options(path, true)
    }

    /// Load configuration from a YAML file with optional environment variable interpolation.
    pub fn from_file_with_options(
        path: impl AsRef<Path>,
        interpolate_env: bool,
    ) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).context(ReadFileSnafu)?;

        let content = if interpolate_env {
            let interpolated = vars::interpolate(&content);
            if !interpolated.is_ok() {
                return EnvInterpolationSnafu {
                    message: interpolated.errors.join("\n"),
                }
                .fail();
            }
            interpolated.text
        } else {
            content
        };

        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml).context(YamlParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.schema.fields.is_empty(), EmptySchemaSnafu);

        for (name, rule) in &self.schema.fields {
            ensure!(!name.is_empty(), EmptyFieldNameSnafu);
            ensure!(name != VALIDITY_FIELD, ReservedFieldNameSnafu { name });
            match (rule.kind.requires_format(), rule.format.as_deref()) {
                (true, None | Some("")) => {
                    return MissingFormatSnafu {
                        field: name,
                        kind: rule.kind.to_string(),
                    }
                    .fail();
                }
                (false, Some(_)) => return UnexpectedFormatSnafu { field: name }.fail(),
                _ => {}
            }
        }

        ensure_table_name("load.destination_table", &self.load.destination_table)?;
        ensure_table_name("load.invalid_data_table", &self.load.invalid_data_table)?;
        // Each partition is staged to `{output_path}/{table}.csv`.
        ensure!(
            self.load.destination_table != self.load.invalid_data_table,
            SameTableSnafu {
                table: &self.load.destination_table
            }
        );

        ensure_separator("source.delimiter", self.source.delimiter)?;
        ensure_separator("load.csv_separator", self.load.csv_separator)?;
        ensure!(
            self.source.chunk_size > 0,
            ZeroChunkSizeSnafu {
                setting: "source.chunk_size"
            }
        );
        ensure!(
            self.load.chunk_size > 0,
            ZeroChunkSizeSnafu {
                setting: "load.chunk_size"
            }
        );

        let sink = self.sink.as_ref().context(MissingSinkSnafu)?;
        ensure!(!sink.host.is_empty(), MissingSinkSettingSnafu { setting: "host" });
        ensure!(
            !sink.dbname.is_empty(),
            MissingSinkSettingSnafu { setting: "dbname" }
        );
        ensure!(!sink.user.is_empty(), MissingSinkSettingSnafu { setting: "user" });

        Ok(())
    }

    /// Sink settings. Present on any validated config.
    pub fn sink(&self) -> Result<&SinkConfig, ConfigError> {
        self.sink.as_ref().context(MissingSinkSnafu)
    }

    /// Ordered names of the fields emitted to both destinations.
    pub fn field_list(&self) -> Vec<String> {
        self.schema.fields.keys().cloned().collect()
    }

    /// Descriptor for the valid partition.
    pub fn valid_destination(&self) -> Destination {
        Destination {
            table_name: self.load.destination_table.clone(),
            field_list: self.field_list(),
            separator: self.load.csv_separator,
        }
    }

    /// Descriptor for the invalid partition.
    pub fn invalid_destination(&self) -> Destination {
        Destination {
            table_name: self.load.invalid_data_table.clone(),
            field_list: self.field_list(),
            separator: self.load.csv_separator,
        }
    }
}

/// A possibly schema-qualified name that is also safe as a file name.
fn ensure_table_name(setting: &'static str, name: &str) -> Result<(), ConfigError> {
    ensure!(!name.is_empty(), EmptyTableNameSnafu { setting });
    ensure!(
        !name.contains(['/', '\\', '\0']) && !name.split('.').any(str::is_empty),
        InvalidTableNameSnafu { setting, name }
    );
    Ok(())
}

fn ensure_separator(setting: &'static str, value: char) -> Result<(), ConfigError> {
    ensure!(
        value.is_ascii() && !matches!(value, '\n' | '\r' | '"'),
        InvalidSeparatorSnafu { setting, value }
    );
    Ok(())
}
