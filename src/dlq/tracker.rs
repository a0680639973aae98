//! Failed-file tracking with DLQ integration.

use std::sync::Arc;
use tracing::error;

use crate::collector::{ErrorKind, ErrorRecord};
use crate::emit;
use crate::error::{MaxFailuresExceededSnafu, PipelineError};
use crate::metrics::events::{FileFailed, FileProcessed, FileStatus};

use super::DeadLetterQueue;

/// Counts failed input files and enforces `max_failures`.
pub struct FailureTracker {
    count: usize,
    max_failures: usize,
    dlq: Option<Arc<DeadLetterQueue>>,
}

impl FailureTracker {
    /// `max_failures` of 0 means unlimited.
    pub fn new(max_failures: usize, dlq: Option<Arc<DeadLetterQueue>>) -> Self {
        Self {
            count: 0,
            max_failures,
            dlq,
        }
    }

    /// Record a failed file.
    ///
    /// Returns `Err` once the limit is reached, after finalizing the DLQ.
    pub async fn record_failure(&mut self, record: ErrorRecord) -> Result<(), PipelineError> {
        self.count += 1;
        emit!(FileProcessed {
            status: FileStatus::Failed,
        });
        if let ErrorKind::File { stage } = record.error {
            emit!(FileFailed { stage });
        }

        if let Some(dlq) = &self.dlq {
            dlq.record([record]).await;
        }

        if self.max_failures > 0 && self.count >= self.max_failures {
            error!("Max failures ({}) reached, stopping pipeline", self.count);
            self.finalize_dlq().await;
            return MaxFailuresExceededSnafu { count: self.count }.fail();
        }

        Ok(())
    }

    /// Finalize DLQ, logging any errors.
    pub async fn finalize_dlq(&self) {
        if let Some(dlq) = &self.dlq
            && let Err(e) = dlq.finalize().await
        {
            error!("Failed to finalize DLQ: {}", e);
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::Collector;
    use crate::metrics::events::FailureStage;

    fn failure(collector: &mut Collector, index: usize) -> ErrorRecord {
        collector.record_file_failure(index, "x.json.gz", FailureStage::Decompress, "bad gzip")
    }

    #[tokio::test]
    async fn test_unlimited_never_stops() {
        let mut collector = Collector::new(0);
        let mut tracker = FailureTracker::new(0, None);
        for i in 0..10 {
            tracker.record_failure(failure(&mut collector, i)).await.unwrap();
        }
        assert_eq!(tracker.count(), 10);
    }

    #[tokio::test]
    async fn test_stops_at_limit() {
        let mut collector = Collector::new(0);
        let mut tracker = FailureTracker::new(2, None);
        tracker.record_failure(failure(&mut collector, 0)).await.unwrap();
        let err = tracker
            .record_failure(failure(&mut collector, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MaxFailuresExceeded { count: 2 }));
    }
}
