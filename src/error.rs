//! Error types for gharchive-parquet using snafu.
//!
//! Run-level failures (storage, configuration, sink commits) are snafu enums
//! with context selectors. Record-level failures never surface here: they are
//! plain data carried by [`crate::event::DecodeError`] and
//! [`crate::extract::RowError`] and end up in the collector.

use snafu::prelude::*;

use crate::extract::SchemaName;
use crate::metrics::events::FailureStage;

// ============ Storage Errors ============

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// Invalid storage URL format.
    #[snafu(display("Invalid storage URL: {url}"))]
    InvalidUrl { url: String },

    /// Object store operation failed.
    #[snafu(display("Storage operation failed"))]
    ObjectStore { source: object_store::Error },

    /// IO error during storage operations.
    #[snafu(display("IO error"))]
    Io { source: std::io::Error },

    /// S3 configuration error.
    #[snafu(display("S3 configuration error"))]
    S3Config { source: object_store::Error },
}

impl StorageError {
    /// Check if this error represents a "not found" condition (404, NoSuchKey, etc.)
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::ObjectStore { source } => {
                matches!(source, object_store::Error::NotFound { .. })
            }
            _ => false,
        }
    }
}

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Source path is empty.
    #[snafu(display("Source path cannot be empty"))]
    EmptySourcePath,

    /// Sink path is empty.
    #[snafu(display("Sink path cannot be empty"))]
    EmptySinkPath,

    /// Pull request sample ratio outside (0, 1].
    #[snafu(display("pull_requests.sample_ratio must be in (0, 1], got {ratio}"))]
    InvalidSampleRatio { ratio: f64 },

    /// Date range is inverted.
    #[snafu(display("source.start_date {start} is after source.end_date {end}"))]
    InvertedDateRange { start: String, end: String },

    /// Concurrency must be at least one.
    #[snafu(display("source.max_concurrent_files must be at least 1"))]
    ZeroConcurrency,

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML configuration"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file"))]
    ReadFile { source: std::io::Error },
}

// ============ Reader Errors ============

/// Errors that make a whole input blob unreadable.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReaderError {
    /// Gzip decompression failed.
    #[snafu(display("Gzip decompression failed for {path}"))]
    GzipDecompression {
        source: std::io::Error,
        path: String,
    },

    /// Zstd decompression failed.
    #[snafu(display("Zstd decompression failed for {path}"))]
    ZstdDecompression {
        source: std::io::Error,
        path: String,
    },

    /// Extracted rows could not be laid out as a record batch.
    #[snafu(display("Failed to build {schema} batch from {path}"))]
    Project {
        schema: SchemaName,
        path: String,
        source: arrow::error::ArrowError,
    },
}

impl ReaderError {
    /// Pipeline stage this failure is reported under.
    pub fn stage(&self) -> FailureStage {
        match self {
            ReaderError::GzipDecompression { .. } | ReaderError::ZstdDecompression { .. } => {
                FailureStage::Decompress
            }
            ReaderError::Project { .. } => FailureStage::Extract,
        }
    }
}

// ============ Sink Errors ============

/// Errors that can occur while writing one schema partition.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// Parquet write error.
    #[snafu(display("Parquet write error"))]
    Write {
        source: parquet::errors::ParquetError,
    },

    /// Failed to create Parquet writer.
    #[snafu(display("Failed to create Parquet writer"))]
    WriterCreate {
        source: parquet::errors::ParquetError,
    },

    /// Writer is not available (internal state error).
    #[snafu(display("Parquet writer is not available"))]
    WriterUnavailable,

    /// Buffer lock error (mutex poisoned).
    #[snafu(display("Buffer lock failed: mutex poisoned"))]
    BufferLock,

    /// Buffer has outstanding references and cannot be consumed.
    #[snafu(display("Buffer has outstanding references"))]
    BufferInUse,

    /// Building the Arrow record batch failed.
    #[snafu(display("Failed to build record batch for {schema}"))]
    BatchBuild {
        schema: SchemaName,
        source: arrow::error::ArrowError,
    },

    /// The blocking encode task panicked or was cancelled.
    #[snafu(display("Parquet encode task for {schema} failed"))]
    EncodeTask {
        schema: SchemaName,
        source: tokio::task::JoinError,
    },

    /// Uploading or pruning partition files failed.
    #[snafu(display("Failed to write partition {schema}"))]
    PartitionStorage {
        schema: SchemaName,
        source: StorageError,
    },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },
}

// ============ DLQ Errors ============

/// Errors that can occur during Dead Letter Queue operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
// Prefix avoids selector clashes with SinkError (e.g. WriteSnafu)
#[allow(clippy::enum_variant_names)]
pub enum DlqError {
    /// Failed to write to DLQ.
    #[snafu(display("Failed to write to DLQ"))]
    DlqWrite { source: StorageError },

    /// Failed to serialize an error record.
    #[snafu(display("Failed to serialize DLQ record"))]
    DlqSerialize { source: serde_json::Error },

    /// Failed to create DLQ storage provider.
    #[snafu(display("Failed to create DLQ storage"))]
    DlqStorage { source: StorageError },
}

// ============ Pipeline Error (top-level) ============

/// Top-level pipeline errors that aggregate all error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Storage error.
    #[snafu(display("Storage error"))]
    PipelineStorage { source: StorageError },

    /// Configuration error.
    #[snafu(display("Configuration error"))]
    Config { source: ConfigError },

    /// Task join error.
    #[snafu(display("Task join error"))]
    TaskJoin { source: tokio::task::JoinError },

    /// Address parsing error.
    #[snafu(display("Failed to parse address"))]
    AddressParse { source: std::net::AddrParseError },

    /// Metrics error.
    #[snafu(display("Metrics error"))]
    Metrics { source: MetricsError },

    /// DLQ error.
    #[snafu(display("DLQ error"))]
    Dlq { source: DlqError },

    /// Max failures exceeded.
    #[snafu(display("Max failures exceeded: {count} failed input files"))]
    MaxFailuresExceeded { count: usize },

    /// One or more schema partitions could not be committed.
    #[snafu(display("Failed to commit partitions: {}", schemas.join(", ")))]
    PartitionCommits { schemas: Vec<String> },
}
