//! Dead Letter Queue implementation.
//!
//! Buffers error records and writes them as NDJSON. Every flush goes to a
//! new object (`errors-<run>-<n>.ndjson`), so nothing is ever overwritten.

use bytes::Bytes;
use object_store::path::Path;
use snafu::prelude::*;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::collector::ErrorRecord;
use crate::config::ErrorHandlingConfig;
use crate::error::{DlqError, DlqSerializeSnafu, DlqStorageSnafu, DlqWriteSnafu};
use crate::storage::StorageProvider;

const DEFAULT_BUFFER_SIZE: usize = 1000;

#[derive(Default)]
struct Pending {
    records: Vec<ErrorRecord>,
    flushes: usize,
    by_kind: BTreeMap<&'static str, usize>,
}

/// Dead Letter Queue for error records.
pub struct DeadLetterQueue {
    storage: StorageProvider,
    run_id: String,
    buffer_size: usize,
    pending: Mutex<Pending>,
}

impl DeadLetterQueue {
    /// Create a DLQ from configuration.
    ///
    /// Returns `None` if no DLQ path is configured.
    pub async fn from_config(config: &ErrorHandlingConfig) -> Result<Option<Self>, DlqError> {
        let Some(dlq_path) = &config.dlq_path else {
            return Ok(None);
        };

        let storage =
            StorageProvider::for_url_with_options(dlq_path, config.dlq_storage_options.clone())
                .await
                .context(DlqStorageSnafu)?;

        let run_id = Uuid::now_v7().to_string();
        info!("DLQ enabled: {} (run {})", storage.canonical_url(), run_id);

        Ok(Some(Self {
            storage,
            run_id,
            buffer_size: DEFAULT_BUFFER_SIZE,
            pending: Mutex::new(Pending::default()),
        }))
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    /// Queue records, flushing once the buffer is full.
    ///
    /// Flush failures are logged; the records are lost but the run goes on.
    pub async fn record(&self, records: impl IntoIterator<Item = ErrorRecord>) {
        let should_flush = {
            let mut pending = self.pending.lock().await;
            for record in records {
                *pending.by_kind.entry(record.error.as_str()).or_default() += 1;
                pending.records.push(record);
            }
            pending.records.len() >= self.buffer_size
        };

        if should_flush && let Err(e) = self.flush().await {
            error!("Failed to flush DLQ: {}", e);
        }
    }

    /// Write buffered records to a new object.
    pub async fn flush(&self) -> Result<(), DlqError> {
        let (records, flush_no) = {
            let mut pending = self.pending.lock().await;
            if pending.records.is_empty() {
                return Ok(());
            }
            let flush_no = pending.flushes;
            pending.flushes += 1;
            (std::mem::take(&mut pending.records), flush_no)
        };

        let mut ndjson = String::new();
        for record in &records {
            let line = serde_json::to_string(record).context(DlqSerializeSnafu)?;
            ndjson.push_str(&line);
            ndjson.push('\n');
        }

        let path = Path::from(format!("errors-{}-{:05}.ndjson", self.run_id, flush_no));
        debug!("Flushing {} DLQ records to {}", records.len(), path);
        self.storage
            .put(path, Bytes::from(ndjson))
            .await
            .context(DlqWriteSnafu)?;

        Ok(())
    }

    /// Flush remaining records and log what was written.
    pub async fn finalize(&self) -> Result<(), DlqError> {
        self.flush().await?;
        let pending = self.pending.lock().await;
        let total: usize = pending.by_kind.values().sum();
        info!(
            "DLQ finalized: {} records in {} files {:?}",
            total, pending.flushes, pending.by_kind
        );
        Ok(())
    }
}
