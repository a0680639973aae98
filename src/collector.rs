//! Record-level error and count accumulation.
//!
//! Every worker owns a private [`Collector`] and the pipeline merges them
//! once all files are processed. Merging is commutative and associative so
//! the final numbers do not depend on which file finished first.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::emit;
use crate::event::{DecodeError, DropReason, EventKind, line_context};
use crate::extract::{FieldWarning, RowError, SchemaName};
use crate::metrics::events::{
    CoercionWarnings, EventsDropped, FailureStage, LinesRead, ParseFailures, RowFailures,
    RowsEmitted,
};

/// Where a record came from: input file position and 1-based line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowOrigin {
    pub file_index: usize,
    pub line: usize,
}

/// What went wrong with a record or file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorKind {
    Parse,
    Dropped {
        drop: DropReason,
    },
    Row {
        schema: SchemaName,
        field: String,
        reason: String,
    },
    Coercion {
        schema: SchemaName,
        field: String,
    },
    File {
        stage: FailureStage,
    },
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Parse => "parse",
            ErrorKind::Dropped { .. } => "dropped",
            ErrorKind::Row { .. } => "row",
            ErrorKind::Coercion { .. } => "coercion",
            ErrorKind::File { .. } => "file",
        }
    }
}

/// A single diagnostic, never part of the row stream.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub file_index: usize,
    /// 0 for file-level failures.
    pub line: usize,
    /// Position among the records of the same file.
    pub seq: u64,
    pub error: ErrorKind,
    /// Source file path.
    pub path: String,
    /// Offending line prefix or a short message.
    pub context: String,
}

impl ErrorRecord {
    /// Whether this record belongs in the dead letter queue.
    ///
    /// Coercion warnings and drops of known but unextracted kinds are only
    /// counted.
    pub fn is_dead_letter(&self) -> bool {
        match &self.error {
            ErrorKind::Parse | ErrorKind::Row { .. } | ErrorKind::File { .. } => true,
            ErrorKind::Dropped { drop } => !matches!(drop, DropReason::Unimplemented { .. }),
            ErrorKind::Coercion { .. } => false,
        }
    }
}

/// Counters plus a bounded, ordered sample of error records.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Collector {
    pub lines_read: u64,
    pub lines_parsed: u64,
    pub parse_failures: u64,
    pub dropped: BTreeMap<&'static str, u64>,
    pub unimplemented: BTreeMap<EventKind, u64>,
    pub rows_emitted: BTreeMap<SchemaName, u64>,
    pub row_failures: BTreeMap<SchemaName, u64>,
    pub coercion_warnings: BTreeMap<SchemaName, u64>,
    pub schema_drift: BTreeSet<&'static str>,
    pub files_failed: u64,
    /// Total error records produced, sampled or not.
    pub error_records: u64,
    /// Smallest records by (file, line, seq), ascending.
    pub samples: Vec<ErrorRecord>,
    pub max_samples: usize,
}

impl Collector {
    pub fn new(max_samples: usize) -> Self {
        Self {
            max_samples,
            ..Default::default()
        }
    }

    pub fn record_line(&mut self) {
        self.lines_read += 1;
    }

    pub fn record_parsed(&mut self) {
        self.lines_parsed += 1;
    }

    pub fn record_rows(&mut self, schema: SchemaName, count: u64) {
        *self.rows_emitted.entry(schema).or_default() += count;
    }

    pub fn record_parse_failure(
        &mut self,
        origin: RowOrigin,
        path: &str,
        error: &DecodeError,
    ) -> ErrorRecord {
        self.parse_failures += 1;
        self.push(origin, path, ErrorKind::Parse, error.to_string())
    }

    /// Count a dropped record. Unimplemented kinds produce no record.
    pub fn record_drop(
        &mut self,
        origin: RowOrigin,
        path: &str,
        reason: DropReason,
        line: &[u8],
    ) -> Option<ErrorRecord> {
        *self.dropped.entry(reason.as_str()).or_default() += 1;
        if let DropReason::Unimplemented { kind } = reason {
            *self.unimplemented.entry(kind).or_default() += 1;
            return None;
        }
        Some(self.push(origin, path, ErrorKind::Dropped { drop: reason }, line_context(line)))
    }

    pub fn record_row_error(&mut self, origin: RowOrigin, path: &str, error: &RowError) -> ErrorRecord {
        *self.row_failures.entry(error.schema).or_default() += 1;
        let kind = ErrorKind::Row {
            schema: error.schema,
            field: error.path.clone(),
            reason: error.reason.to_string(),
        };
        self.push(origin, path, kind, error.to_string())
    }

    pub fn record_warning(
        &mut self,
        origin: RowOrigin,
        path: &str,
        warning: &FieldWarning,
    ) -> ErrorRecord {
        *self.coercion_warnings.entry(warning.schema).or_default() += 1;
        let kind = ErrorKind::Coercion {
            schema: warning.schema,
            field: warning.path.clone(),
        };
        self.push(origin, path, kind, warning.detail.clone())
    }

    pub fn record_file_failure(
        &mut self,
        file_index: usize,
        path: &str,
        stage: FailureStage,
        message: &str,
    ) -> ErrorRecord {
        self.files_failed += 1;
        let origin = RowOrigin { file_index, line: 0 };
        self.push(origin, path, ErrorKind::File { stage }, message.to_string())
    }

    pub fn record_schema_drift(&mut self, columns: impl IntoIterator<Item = &'static str>) {
        self.schema_drift.extend(columns);
    }

    fn push(&mut self, origin: RowOrigin, path: &str, error: ErrorKind, context: String) -> ErrorRecord {
        let record = ErrorRecord {
            file_index: origin.file_index,
            line: origin.line,
            seq: self.error_records,
            error,
            path: path.to_string(),
            context,
        };
        self.error_records += 1;
        self.sample(record.clone());
        record
    }

    fn sample(&mut self, record: ErrorRecord) {
        if self.max_samples == 0 {
            return;
        }
        if self.samples.len() == self.max_samples
            && self.samples.last().is_some_and(|last| &record >= last)
        {
            return;
        }
        let at = self.samples.partition_point(|r| r < &record);
        self.samples.insert(at, record);
        self.samples.truncate(self.max_samples);
    }

    /// Fold `other` into `self`.
    pub fn merge(&mut self, other: Collector) {
        self.lines_read += other.lines_read;
        self.lines_parsed += other.lines_parsed;
        self.parse_failures += other.parse_failures;
        self.files_failed += other.files_failed;
        self.error_records += other.error_records;
        merge_counts(&mut self.dropped, other.dropped);
        merge_counts(&mut self.unimplemented, other.unimplemented);
        merge_counts(&mut self.rows_emitted, other.rows_emitted);
        merge_counts(&mut self.row_failures, other.row_failures);
        merge_counts(&mut self.coercion_warnings, other.coercion_warnings);
        self.schema_drift.extend(other.schema_drift);

        self.max_samples = self.max_samples.max(other.max_samples);
        self.samples.extend(other.samples);
        self.samples.sort();
        self.samples.truncate(self.max_samples);
    }

    pub fn total_dropped(&self) -> u64 {
        self.dropped.values().sum()
    }

    pub fn total_rows(&self) -> u64 {
        self.rows_emitted.values().sum()
    }

    pub fn total_row_failures(&self) -> u64 {
        self.row_failures.values().sum()
    }

    pub fn total_warnings(&self) -> u64 {
        self.coercion_warnings.values().sum()
    }

    /// Mirror this collector's counts to the process-wide metrics recorder.
    pub fn emit_metrics(&self) {
        emit!(LinesRead {
            count: self.lines_read
        });
        if self.parse_failures > 0 {
            emit!(ParseFailures {
                count: self.parse_failures
            });
        }
        for (reason, count) in &self.dropped {
            emit!(EventsDropped {
                reason: *reason,
                count: *count
            });
        }
        for (schema, count) in &self.rows_emitted {
            emit!(RowsEmitted {
                schema: *schema,
                count: *count
            });
        }
        for (schema, count) in &self.row_failures {
            emit!(RowFailures {
                schema: *schema,
                count: *count
            });
        }
        for (schema, count) in &self.coercion_warnings {
            emit!(CoercionWarnings {
                schema: *schema,
                count: *count
            });
        }
    }
}

fn merge_counts<K: Ord>(into: &mut BTreeMap<K, u64>, from: BTreeMap<K, u64>) {
    for (key, count) in from {
        *into.entry(key).or_default() += count;
    }
}
