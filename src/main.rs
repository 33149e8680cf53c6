//! sleet: validate a delimited file against a schema and bulk-load it into
//! PostgreSQL.

use clap::Parser;
use snafu::prelude::*;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sleet::config::Config;
use sleet::error::{AddressParseSnafu, ConfigSnafu, MetricsSnafu, PipelineError};
use sleet::{metrics, run_pipeline};

/// Delimited file to PostgreSQL batch loader.
#[derive(Parser, Debug)]
#[command(name = "sleet")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input file name, resolved against `source.input_dir`.
    file: String,

    /// Path to the configuration file.
    #[arg(short, long, default_value = "etl_config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Dry run - validate configuration without processing.
    #[arg(long)]
    dry_run: bool,
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("sleet starting");

    let config = build_config(&args)?;
    let metrics_addr: Option<SocketAddr> = if config.metrics.enabled {
        Some(config.metrics.address.parse().context(AddressParseSnafu)?)
    } else {
        None
    };

    if args.dry_run {
        info!("Dry run mode - validating configuration");
        info!("Input: {}", config.source.input_dir.join(&args.file).display());
        info!(
            "Destinations: {} (valid), {} (invalid)",
            config.load.destination_table, config.load.invalid_data_table
        );
        info!("Staging directory: {}", config.load.output_path.display());
        info!("Schema fields: {}", config.schema.fields.len());
        for (name, rule) in &config.schema.fields {
            match &rule.format {
                Some(format) => info!(
                    "  - {}: {} ({}), not_null={}",
                    name, rule.kind, format, rule.not_null
                ),
                None => info!("  - {}: {}, not_null={}", name, rule.kind, rule.not_null),
            }
        }
        info!("Configuration is valid");
        return Ok(());
    }

    let endpoint = match metrics_addr {
        Some(addr) => Some(metrics::init(addr).await.context(MetricsSnafu)?),
        None => None,
    };

    let result = run_pipeline(config, &args.file).await;
    if let Some(endpoint) = endpoint {
        endpoint.shutdown().await;
    }
    let stats = result?;

    info!("Pipeline completed successfully");
    info!("  Records extracted: {}", stats.records_extracted);
    info!("  Duplicates dropped: {}", stats.duplicates_dropped);
    info!("  Values coerced to null: {}", stats.values_coerced);
    info!(
        "  Valid records: {} ({} loaded)",
        stats.valid_records, stats.valid_loaded
    );
    info!(
        "  Invalid records: {} ({} loaded)",
        stats.invalid_records, stats.invalid_loaded
    );

    Ok(())
}

/// Build configuration from arguments.
fn build_config(args: &Args) -> Result<Config, PipelineError> {
    Config::from_file(&args.config).context(ConfigSnafu)
}
