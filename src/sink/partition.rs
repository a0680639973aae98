//! Parquet partitions on object storage.
//!
//! Schema `S` lives under `<sink root>/S.parquet/`. A commit encodes the
//! batches on the blocking pool, uploads every part (overwriting same-named
//! parts from an earlier run) and then deletes whatever else is left under
//! the partition prefix.

use std::collections::BTreeSet;

use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use async_trait::async_trait;
use futures::TryStreamExt;
use object_store::path::Path;
use snafu::prelude::*;
use tracing::{debug, info};

use super::{ColumnarSink, CommitReceipt, FinishedFile, ParquetWriter, ParquetWriterConfig};
use crate::emit;
use crate::error::{
    EncodeTaskSnafu, ObjectStoreSnafu, PartitionStorageSnafu, SinkError, StorageError,
};
use crate::extract::SchemaName;
use crate::metrics::events::BytesWritten;
use crate::storage::StorageProviderRef;

/// Writes each schema as a directory of Parquet parts.
#[derive(Debug, Clone)]
pub struct ParquetSink {
    storage: StorageProviderRef,
    config: ParquetWriterConfig,
}

impl ParquetSink {
    pub fn new(storage: StorageProviderRef, config: ParquetWriterConfig) -> Self {
        Self { storage, config }
    }

    /// Directory name of a schema's partition.
    pub fn partition_dir(schema: SchemaName) -> String {
        format!("{schema}.parquet")
    }

    async fn upload(&self, dir: &str, files: &[FinishedFile]) -> Result<usize, StorageError> {
        let mut bytes = 0;
        for file in files {
            let path = Path::from(format!("{dir}/{}", file.filename));
            self.storage.put(path, file.bytes.clone()).await?;
            bytes += file.bytes.len();
            emit!(BytesWritten {
                bytes: file.bytes.len() as u64
            });
        }
        Ok(bytes)
    }

    async fn prune(
        &self,
        dir: &str,
        keep: &BTreeSet<String>,
    ) -> Result<usize, StorageError> {
        let existing: Vec<Path> = self
            .storage
            .list_with_prefix(dir)
            .await?
            .try_collect()
            .await
            .context(ObjectStoreSnafu)?;

        let mut pruned = 0;
        for path in existing {
            if keep.contains(path.as_ref()) {
                continue;
            }
            debug!("Removing stale partition file {}", path);
            self.storage.delete(&path).await?;
            pruned += 1;
        }
        Ok(pruned)
    }
}

fn encode(
    arrow_schema: SchemaRef,
    config: ParquetWriterConfig,
    batches: Vec<RecordBatch>,
) -> Result<Vec<FinishedFile>, SinkError> {
    let mut writer = ParquetWriter::new(arrow_schema, config)?;
    for batch in &batches {
        writer.write_batch(batch)?;
    }
    writer.close()
}

#[async_trait]
impl ColumnarSink for ParquetSink {
    async fn commit(
        &self,
        schema: SchemaName,
        arrow_schema: SchemaRef,
        batches: Vec<RecordBatch>,
    ) -> Result<CommitReceipt, SinkError> {
        let config = self.config.clone();
        let files = tokio::task::spawn_blocking(move || encode(arrow_schema, config, batches))
            .await
            .context(EncodeTaskSnafu { schema })??;

        let dir = Self::partition_dir(schema);
        let bytes = self
            .upload(&dir, &files)
            .await
            .context(PartitionStorageSnafu { schema })?;

        let written: BTreeSet<String> = files
            .iter()
            .map(|f| format!("{dir}/{}", f.filename))
            .collect();
        let pruned = self
            .prune(&dir, &written)
            .await
            .context(PartitionStorageSnafu { schema })?;

        let rows = files.iter().map(|f| f.record_count).sum();
        info!(
            "Committed {}: {} rows in {} files ({} bytes, {} stale removed)",
            schema,
            rows,
            files.len(),
            bytes,
            pruned
        );

        Ok(CommitReceipt {
            schema,
            files: written.into_iter().collect(),
            rows,
            bytes,
            pruned,
        })
    }
}
