//! Configuration parsing.
//!
//! The pipeline is driven by a YAML file with environment variable
//! interpolation (see [`vars`]). Every section except `source` and `sink`
//! is optional and falls back to defaults.

mod vars;

use chrono::NaiveDate;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{
    ConfigError, EmptySinkPathSnafu, EmptySourcePathSnafu, EnvInterpolationSnafu,
    InvalidSampleRatioSnafu, InvertedDateRangeSnafu, ReadFileSnafu, YamlParseSnafu,
    ZeroConcurrencySnafu,
};

/// Byte size constants (binary/IEC units).
pub const KB: usize = 1024;
pub const MB: usize = 1024 * KB;

/// Main configuration structure for the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    pub sink: SinkConfig,
    #[serde(default)]
    pub pull_requests: PullRequestsConfig,
    #[serde(default)]
    pub error_handling: ErrorHandlingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Where the raw GH Archive blobs live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Storage URL of the input root.
    /// Examples: "s3://gharchive/2018", "/data/gharchive"
    pub path: String,

    /// Only objects whose path ends with this suffix are read.
    #[serde(default = "default_suffix")]
    pub suffix: String,

    #[serde(default)]
    pub compression: CompressionFormat,

    /// Storage options (credentials, region, etc.)
    #[serde(default)]
    pub storage_options: HashMap<String, String>,

    /// Maximum number of files downloaded concurrently (default: 4)
    #[serde(default = "default_max_concurrent_files")]
    pub max_concurrent_files: usize,

    /// First day to include, matched against `YYYY-MM-DD-H` file names.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    /// Last day to include (inclusive).
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

fn default_suffix() -> String {
    ".json.gz".to_string()
}

fn default_max_concurrent_files() -> usize {
    4
}

/// Where the Parquet partitions are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Storage URL of the output root; each schema becomes
    /// `<path>/<Schema>.parquet/`.
    pub path: String,

    #[serde(default)]
    pub storage_options: HashMap<String, String>,

    #[serde(default)]
    pub compression: ParquetCompression,

    /// Target file size in MB before rolling to a new part (default: 128)
    #[serde(default = "default_file_size_mb")]
    pub file_size_mb: usize,

    /// Row groups are flushed when the in-progress size exceeds this (default: 128MB)
    #[serde(default = "default_row_group_size_bytes")]
    pub row_group_size_bytes: usize,
}

fn default_file_size_mb() -> usize {
    128
}

fn default_row_group_size_bytes() -> usize {
    128 * MB
}

/// Sampling parameters for the PullRequests schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestsConfig {
    /// Fraction of rows sampled to decide the column set (default: 0.01).
    #[serde(default = "default_sample_ratio")]
    pub sample_ratio: f64,

    /// Upper bound on sampled rows (default: 10000).
    #[serde(default = "default_max_sample_rows")]
    pub max_sample_rows: usize,

    /// RNG seed; a fixed seed keeps reruns byte-identical.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for PullRequestsConfig {
    fn default() -> Self {
        Self {
            sample_ratio: default_sample_ratio(),
            max_sample_rows: default_max_sample_rows(),
            seed: default_seed(),
        }
    }
}

fn default_sample_ratio() -> f64 {
    0.01
}

fn default_max_sample_rows() -> usize {
    10_000
}

fn default_seed() -> u64 {
    42
}

/// Error handling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorHandlingConfig {
    /// Failed input files before the run stops (0 = unlimited, default: 0).
    #[serde(default)]
    pub max_failures: usize,
    /// Error records kept in the run summary (default: 100).
    #[serde(default = "default_max_error_samples")]
    pub max_error_samples: usize,
    /// Storage URL for dead-letter NDJSON; disabled when unset.
    #[serde(default)]
    pub dlq_path: Option<String>,
    #[serde(default)]
    pub dlq_storage_options: HashMap<String, String>,
}

impl Default for ErrorHandlingConfig {
    fn default() -> Self {
        Self {
            max_failures: 0,
            max_error_samples: default_max_error_samples(),
            dlq_path: None,
            dlq_storage_options: HashMap::new(),
        }
    }
}

fn default_max_error_samples() -> usize {
    100
}

/// Metrics configuration for Prometheus endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics collection is enabled (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    /// Address to bind the metrics HTTP server (default: "0.0.0.0:9090").
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            address: default_metrics_address(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_address() -> String {
    "0.0.0.0:9090".to_string()
}

/// Compression format for source files.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompressionFormat {
    None,
    #[default]
    Gzip,
    Zstd,
}

/// Parquet compression codec.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParquetCompression {
    Uncompressed,
    #[default]
    Snappy,
    Gzip,
    Zstd,
    Lz4,
}

impl ParquetCompression {
    pub fn codec(self) -> Compression {
        match self {
            ParquetCompression::Uncompressed => Compression::UNCOMPRESSED,
            ParquetCompression::Snappy => Compression::SNAPPY,
            ParquetCompression::Gzip => Compression::GZIP(GzipLevel::default()),
            ParquetCompression::Zstd => Compression::ZSTD(ZstdLevel::default()),
            ParquetCompression::Lz4 => Compression::LZ4,
        }
    }
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
        Self::from_yaml(&content, interpolate_env)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(content: &str, interpolate_env: bool) -> Result<Self, ConfigError> {
        let content = if interpolate_env {
            let result = vars::interpolate(content);
            if !result.is_ok() {
                let message = result.errors.join("\n");
                return EnvInterpolationSnafu { message }.fail();
            }
            result.text
        } else {
            content.to_string()
        };

        let config: Config = serde_yaml::from_str(&content).context(YamlParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.source.path.is_empty(), EmptySourcePathSnafu);
        ensure!(!self.sink.path.is_empty(), EmptySinkPathSnafu);
        ensure!(self.source.max_concurrent_files > 0, ZeroConcurrencySnafu);

        let ratio = self.pull_requests.sample_ratio;
        ensure!(ratio > 0.0 && ratio <= 1.0, InvalidSampleRatioSnafu { ratio });

        if let (Some(start), Some(end)) = (self.source.start_date, self.source.end_date) {
            ensure!(
                start <= end,
                InvertedDateRangeSnafu {
                    start: start.to_string(),
                    end: end.to_string(),
                }
            );
        }
        Ok(())
    }
}
