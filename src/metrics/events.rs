//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in the pipeline.
//! Events implement the `InternalEvent` trait which records the matching
//! Prometheus metric.

use metrics::{counter, gauge, histogram};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::trace;

use crate::extract::SchemaName;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

// ============================================================================
// Record-level events
// ============================================================================

/// Input lines read from decompressed files.
pub struct LinesRead {
    pub count: u64,
}

impl InternalEvent for LinesRead {
    fn emit(self) {
        trace!(count = self.count, "Lines read");
        counter!("gharchive_lines_read_total").increment(self.count);
    }
}

/// Lines that were not a well-formed JSON object.
pub struct ParseFailures {
    pub count: u64,
}

impl InternalEvent for ParseFailures {
    fn emit(self) {
        trace!(count = self.count, "Parse failures");
        counter!("gharchive_parse_failures_total").increment(self.count);
    }
}

/// Decoded events that were not extracted.
pub struct EventsDropped {
    pub reason: &'static str,
    pub count: u64,
}

impl InternalEvent for EventsDropped {
    fn emit(self) {
        trace!(reason = self.reason, count = self.count, "Events dropped");
        counter!("gharchive_events_dropped_total", "reason" => self.reason).increment(self.count);
    }
}

/// Rows produced for a schema.
pub struct RowsEmitted {
    pub schema: SchemaName,
    pub count: u64,
}

impl InternalEvent for RowsEmitted {
    fn emit(self) {
        trace!(schema = self.schema.as_str(), count = self.count, "Rows emitted");
        counter!("gharchive_rows_emitted_total", "schema" => self.schema.as_str())
            .increment(self.count);
    }
}

/// Events that failed a structurally required field.
pub struct RowFailures {
    pub schema: SchemaName,
    pub count: u64,
}

impl InternalEvent for RowFailures {
    fn emit(self) {
        trace!(schema = self.schema.as_str(), count = self.count, "Row failures");
        counter!("gharchive_row_failures_total", "schema" => self.schema.as_str())
            .increment(self.count);
    }
}

/// Optional fields that were present but did not coerce.
pub struct CoercionWarnings {
    pub schema: SchemaName,
    pub count: u64,
}

impl InternalEvent for CoercionWarnings {
    fn emit(self) {
        trace!(schema = self.schema.as_str(), count = self.count, "Coercion warnings");
        counter!("gharchive_coercion_warnings_total", "schema" => self.schema.as_str())
            .increment(self.count);
    }
}

/// PullRequests columns left out of the committed schema.
pub struct SchemaDriftColumns {
    pub count: usize,
}

impl InternalEvent for SchemaDriftColumns {
    fn emit(self) {
        trace!(count = self.count, "Schema drift columns");
        gauge!("gharchive_schema_drift_columns").set(self.count as f64);
    }
}

// ============================================================================
// File-level events
// ============================================================================

/// Event emitted when compressed bytes are read from source.
pub struct BytesRead {
    pub bytes: u64,
}

impl InternalEvent for BytesRead {
    fn emit(self) {
        trace!(bytes = self.bytes, "Bytes read");
        counter!("gharchive_bytes_read_total").increment(self.bytes);
    }
}

/// Event emitted when bytes are written to Parquet files.
pub struct BytesWritten {
    pub bytes: u64,
}

impl InternalEvent for BytesWritten {
    fn emit(self) {
        trace!(bytes = self.bytes, "Bytes written");
        counter!("gharchive_bytes_written_total").increment(self.bytes);
    }
}

/// Status of a processed file.
#[derive(Debug, Clone, Copy)]
pub enum FileStatus {
    Success,
    Failed,
}

impl FileStatus {
    fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Success => "success",
            FileStatus::Failed => "failed",
        }
    }
}

/// Stage at which a file failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Download,
    Decompress,
    Extract,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Download => "download",
            FailureStage::Decompress => "decompress",
            FailureStage::Extract => "extract",
        }
    }
}

/// Event emitted when a file fails processing.
pub struct FileFailed {
    pub stage: FailureStage,
}

impl InternalEvent for FileFailed {
    fn emit(self) {
        trace!(stage = self.stage.as_str(), "File failed");
        counter!("gharchive_files_failed_total", "stage" => self.stage.as_str()).increment(1);
    }
}

/// Event emitted when an input file is processed.
pub struct FileProcessed {
    pub status: FileStatus,
}

impl InternalEvent for FileProcessed {
    fn emit(self) {
        trace!(status = self.status.as_str(), "File processed");
        counter!("gharchive_files_processed_total", "status" => self.status.as_str()).increment(1);
    }
}

/// Event emitted when a file download completes.
pub struct FileDownloadCompleted {
    pub duration: Duration,
}

impl InternalEvent for FileDownloadCompleted {
    fn emit(self) {
        trace!(
            duration_ms = self.duration.as_millis(),
            "File download completed"
        );
        histogram!("gharchive_file_download_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted when decompression and extraction of one file completes.
pub struct FileExtractionCompleted {
    pub duration: Duration,
}

impl InternalEvent for FileExtractionCompleted {
    fn emit(self) {
        trace!(
            duration_ms = self.duration.as_millis(),
            "File extraction completed"
        );
        histogram!("gharchive_file_extraction_duration_seconds")
            .record(self.duration.as_secs_f64());
    }
}

/// Event emitted when the number of active downloads changes.
pub struct ActiveDownloads {
    pub count: usize,
}

impl InternalEvent for ActiveDownloads {
    fn emit(self) {
        trace!(count = self.count, "Active downloads");
        gauge!("gharchive_active_downloads").set(self.count as f64);
    }
}

// ============================================================================
// Partition commit events
// ============================================================================

/// Event emitted when a Parquet file write completes.
pub struct ParquetWriteCompleted {
    pub duration: Duration,
}

impl InternalEvent for ParquetWriteCompleted {
    fn emit(self) {
        trace!(
            duration_ms = self.duration.as_millis(),
            "Parquet write completed"
        );
        histogram!("gharchive_parquet_write_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted when a schema partition has been overwritten.
pub struct PartitionCommitted {
    pub schema: SchemaName,
    pub duration: Duration,
}

impl InternalEvent for PartitionCommitted {
    fn emit(self) {
        trace!(
            schema = self.schema.as_str(),
            duration_ms = self.duration.as_millis(),
            "Partition committed"
        );
        counter!("gharchive_partition_commits_total", "schema" => self.schema.as_str(), "status" => "success")
            .increment(1);
        histogram!("gharchive_partition_commit_duration_seconds", "schema" => self.schema.as_str())
            .record(self.duration.as_secs_f64());
    }
}

/// Event emitted when a schema partition could not be written.
pub struct PartitionCommitFailed {
    pub schema: SchemaName,
}

impl InternalEvent for PartitionCommitFailed {
    fn emit(self) {
        trace!(schema = self.schema.as_str(), "Partition commit failed");
        counter!("gharchive_partition_commits_total", "schema" => self.schema.as_str(), "status" => "error")
            .increment(1);
    }
}

// ============================================================================
// Storage operation events
// ============================================================================

/// Storage operation types.
#[derive(Debug, Clone, Copy)]
pub enum StorageOperation {
    Get,
    Put,
    List,
    Delete,
}

impl StorageOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageOperation::Get => "get",
            StorageOperation::Put => "put",
            StorageOperation::List => "list",
            StorageOperation::Delete => "delete",
        }
    }
}

/// Status of a storage request.
#[derive(Debug, Clone, Copy)]
pub enum RequestStatus {
    Success,
    Error,
}

impl RequestStatus {
    fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::Error => "error",
        }
    }

    pub fn of<T, E>(result: &Result<T, E>) -> Self {
        if result.is_ok() {
            RequestStatus::Success
        } else {
            RequestStatus::Error
        }
    }
}

/// Event emitted when a storage request completes.
pub struct StorageRequest {
    pub operation: StorageOperation,
    pub status: RequestStatus,
}

impl InternalEvent for StorageRequest {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            status = self.status.as_str(),
            "Storage request"
        );
        counter!(
            "gharchive_storage_requests_total",
            "operation" => self.operation.as_str(),
            "status" => self.status.as_str()
        )
        .increment(1);
    }
}

/// Event emitted when a storage request completes with duration.
pub struct StorageRequestDuration {
    pub operation: StorageOperation,
    pub duration: Duration,
}

impl InternalEvent for StorageRequestDuration {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            duration_ms = self.duration.as_millis(),
            "Storage request duration"
        );
        histogram!(
            "gharchive_storage_request_duration_seconds",
            "operation" => self.operation.as_str()
        )
        .record(self.duration.as_secs_f64());
    }
}
