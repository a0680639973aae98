//! End-of-run report.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{info, warn};

use crate::collector::Collector;
use crate::extract::SchemaName;
use crate::sink::CommitReceipt;

/// How a schema partition commit ended.
#[derive(Debug, Clone)]
pub enum CommitOutcome {
    Committed(CommitReceipt),
    Failed { error: String },
}

/// Everything a run did, for logging and tests.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub files_listed: usize,
    pub files_processed: usize,
    pub files_failed: usize,
    pub collector: Collector,
    /// Empty when the run was cancelled before committing.
    pub commits: BTreeMap<SchemaName, CommitOutcome>,
    /// Column count of the committed PullRequests schema.
    pub pull_request_columns: usize,
    pub cancelled: bool,
    pub duration: Duration,
}

impl RunSummary {
    pub fn failed_commits(&self) -> Vec<SchemaName> {
        self.commits
            .iter()
            .filter(|(_, outcome)| matches!(outcome, CommitOutcome::Failed { .. }))
            .map(|(schema, _)| *schema)
            .collect()
    }

    pub fn receipt(&self, schema: SchemaName) -> Option<&CommitReceipt> {
        match self.commits.get(&schema) {
            Some(CommitOutcome::Committed(receipt)) => Some(receipt),
            _ => None,
        }
    }

    /// Log a human-readable summary.
    pub fn log(&self) {
        let c = &self.collector;
        info!(
            "Run finished in {:.1}s: {} files listed, {} processed, {} failed{}",
            self.duration.as_secs_f64(),
            self.files_listed,
            self.files_processed,
            self.files_failed,
            if self.cancelled { " (cancelled, nothing committed)" } else { "" }
        );
        info!(
            "Lines: {} read, {} parsed, {} malformed; events dropped: {} {:?}",
            c.lines_read,
            c.lines_parsed,
            c.parse_failures,
            c.total_dropped(),
            c.dropped
        );
        if !c.unimplemented.is_empty() {
            info!("Recognized but not extracted: {:?}", c.unimplemented);
        }
        info!(
            "Rows: {} emitted, {} events failed a required field, {} coercion warnings",
            c.total_rows(),
            c.total_row_failures(),
            c.total_warnings()
        );
        if !c.schema_drift.is_empty() {
            warn!(
                "PullRequests committed with {} columns; {} observed columns omitted: {:?}",
                self.pull_request_columns,
                c.schema_drift.len(),
                c.schema_drift
            );
        }

        for (schema, outcome) in &self.commits {
            match outcome {
                CommitOutcome::Committed(receipt) => info!(
                    "  {:<13} {:>10} rows  {:>3} files",
                    schema.as_str(),
                    receipt.rows,
                    receipt.files.len()
                ),
                CommitOutcome::Failed { error } => warn!("  {:<13} FAILED: {}", schema.as_str(), error),
            }
        }

        for sample in &c.samples {
            info!(
                "  error sample {}:{} [{}] {}",
                sample.path,
                sample.line,
                sample.error.as_str(),
                sample.context
            );
        }
    }
}
