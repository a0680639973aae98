//! Columnar sink: one overwritable partition per schema.

pub mod parquet;
pub mod partition;

use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use async_trait::async_trait;

use crate::error::SinkError;
use crate::extract::SchemaName;

pub use parquet::{FinishedFile, ParquetWriter, ParquetWriterConfig};
pub use partition::ParquetSink;

/// Outcome of a successful partition commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub schema: SchemaName,
    /// Files written, relative to the sink root.
    pub files: Vec<String>,
    pub rows: usize,
    pub bytes: usize,
    /// Stale files from an earlier run that were removed.
    pub pruned: usize,
}

/// A sink accepting typed batches keyed by schema.
///
/// `commit` replaces the whole partition for `schema`. Commits for
/// different schemas are independent and may run concurrently.
#[async_trait]
pub trait ColumnarSink: Send + Sync {
    async fn commit(
        &self,
        schema: SchemaName,
        arrow_schema: SchemaRef,
        batches: Vec<RecordBatch>,
    ) -> Result<CommitReceipt, SinkError>;
}
