//! sleet: a batch loader from delimited files into PostgreSQL.
//!
//! This library reads one delimited file, validates and normalizes every
//! record against a declarative schema, splits the records into valid and
//! invalid partitions, and bulk-loads each partition into its own table
//! with `COPY ... FROM STDIN`.
//!
//! # Example
//!
//! ```ignore
//! use sleet::{Config, run_pipeline};
//! use sleet::error::{ConfigSnafu, PipelineError};
//! use snafu::ResultExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), PipelineError> {
//!     let config = Config::from_file("etl_config.yaml").context(ConfigSnafu)?;
//!     let stats = run_pipeline(config, "users.csv").await?;
//!     println!("Loaded {} valid records", stats.valid_loaded);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod load;
pub mod metrics;
pub mod partition;
pub mod pipeline;
pub mod record;
pub mod sink;
pub mod source;
pub mod transform;

// Re-export main types
pub use config::Config;
pub use error::PipelineError;
pub use pipeline::{Pipeline, PipelineStats, run_pipeline};
pub use record::{Record, RecordSet, Value};
pub use sink::{BulkSink, StagedBatch};
