//! gharchive-parquet: turns GitHub Archive NDJSON dumps into one Parquet
//! partition per event schema.

use clap::Parser;
use snafu::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use gharchive_parquet::config::Config;
use gharchive_parquet::error::{
    AddressParseSnafu, ConfigSnafu, MetricsSnafu, PartitionCommitsSnafu, PipelineError,
};
use gharchive_parquet::extract::{PULL_REQUEST_STRUCTURAL_COLUMNS, SchemaName};
use gharchive_parquet::schema::declared;
use gharchive_parquet::{metrics, run_pipeline};

/// GitHub Archive to Parquet converter.
#[derive(Parser, Debug)]
#[command(name = "gharchive-parquet")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Dry run - validate configuration and print the output schemas.
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

    info!("gharchive-parquet starting");

    let config = Config::from_file(&args.config).context(ConfigSnafu)?;

    if args.dry_run {
        print_plan(&config);
        return Ok(());
    }

    if config.metrics.enabled {
        let addr = config.metrics.address.parse().context(AddressParseSnafu)?;
        metrics::init(addr).context(MetricsSnafu)?;
        debug!(
            "Metrics endpoint listening on http://{}/metrics",
            config.metrics.address
        );
    }

    let summary = run_pipeline(config).await?;
    summary.log();

    let failed = summary.failed_commits();
    ensure!(
        failed.is_empty(),
        PartitionCommitsSnafu {
            schemas: failed
                .iter()
                .map(|s| s.as_str().to_string())
                .collect::<Vec<_>>(),
        }
    );

    Ok(())
}

fn print_plan(config: &Config) {
    info!("Dry run mode - validating configuration");
    info!("Source: {} (*{})", config.source.path, config.source.suffix);
    info!("Sink: {}", config.sink.path);
    for schema in SchemaName::ALL {
        match declared(schema) {
            Some(table) => {
                info!("{}.parquet ({} columns)", schema, table.columns.len());
                for column in &table.columns {
                    info!(
                        "  - {}: {}{}",
                        column.name,
                        column.ty.as_str(),
                        if column.nullable { "" } else { " (required)" }
                    );
                }
            }
            None => {
                info!(
                    "{}.parquet (inferred from a {:.2}% sample, seed {})",
                    schema,
                    config.pull_requests.sample_ratio * 100.0,
                    config.pull_requests.seed
                );
                for column in PULL_REQUEST_STRUCTURAL_COLUMNS {
                    info!("  - {}", column);
                }
            }
        }
    }
    info!("Configuration is valid");
}
