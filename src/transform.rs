//! Per-line and per-file transformation.
//!
//! `transform_line` is the pure record path: decode, classify, extract.
//! `process_file` runs it over a whole decompressed blob on the blocking
//! pool and returns everything the file contributed: record batches for
//! the fixed schemas, PullRequest candidate rows (their schema is only
//! known once every file is in), and a private [`Collector`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use arrow::array::RecordBatch;
use bytes::Bytes;
use snafu::prelude::*;
use tracing::debug;

use crate::collector::{Collector, ErrorRecord, RowOrigin};
use crate::emit;
use crate::error::{ProjectSnafu, ReaderError};
use crate::event::{Classified, DecodeError, DropReason, classify, decode};
use crate::extract::{Extracted, ExtractorRegistry, FieldWarning, FlatRow, RowError, SchemaName};
use crate::metrics::events::FileExtractionCompleted;
use crate::router::to_record_batch;
use crate::schema::declared;
use crate::source::{BlobReader, lines};

/// What one input line turned into.
#[derive(Debug)]
pub enum LineOutcome {
    Malformed(DecodeError),
    Dropped(DropReason),
    Failed(RowError),
    Extracted(Extracted),
}

/// Decode, classify and extract a single line.
pub fn transform_line(registry: &ExtractorRegistry, line: &[u8]) -> LineOutcome {
    let value = match decode(line) {
        Ok(value) => value,
        Err(err) => return LineOutcome::Malformed(err),
    };

    let (kind, event) = match classify(value) {
        Classified::Event(kind, event) => (kind, event),
        Classified::Dropped(reason) => return LineOutcome::Dropped(reason),
    };

    let Some(extractor) = registry.get(kind) else {
        return LineOutcome::Dropped(DropReason::Unimplemented { kind });
    };

    match extractor.extract(&event) {
        Ok(extracted) => LineOutcome::Extracted(extracted),
        Err(err) => LineOutcome::Failed(err),
    }
}

/// Shared, read-only state for file workers.
#[derive(Debug, Clone)]
pub struct TransformContext {
    pub registry: Arc<ExtractorRegistry>,
    pub reader: BlobReader,
    /// Error records kept per collector.
    pub max_samples: usize,
    /// Keep every dead-letter record, not only the sampled ones.
    pub keep_dead_letters: bool,
}

/// Everything one input file contributed to the run.
#[derive(Debug)]
pub struct FileOutput {
    pub index: usize,
    pub path: String,
    /// Record batches for the declared schemas, in line order.
    pub tables: BTreeMap<SchemaName, Vec<RecordBatch>>,
    pub pull_requests: Vec<(RowOrigin, FlatRow)>,
    pub collector: Collector,
    pub dead_letters: Vec<ErrorRecord>,
}

impl FileOutput {
    pub fn row_count(&self) -> usize {
        self.tables
            .values()
            .flatten()
            .map(|b| b.num_rows())
            .sum::<usize>()
            + self.pull_requests.len()
    }
}

/// Decompress and transform one blob.
pub fn process_file(
    ctx: &TransformContext,
    index: usize,
    path: &str,
    compressed: &Bytes,
) -> Result<FileOutput, ReaderError> {
    let start = Instant::now();
    let text = ctx.reader.decompress(compressed, path)?;
    let output = process_text(ctx, index, path, &text)?;

    emit!(FileExtractionCompleted {
        duration: start.elapsed()
    });
    debug!(
        "Extracted {} rows from {} lines of {}",
        output.row_count(),
        output.collector.lines_read,
        path
    );
    Ok(output)
}

/// Transform already-decompressed NDJSON text.
pub fn process_text(
    ctx: &TransformContext,
    index: usize,
    path: &str,
    text: &[u8],
) -> Result<FileOutput, ReaderError> {
    let mut acc = FileAccumulator::new(ctx, index, path);

    for (line_no, line) in lines(text) {
        let origin = RowOrigin {
            file_index: index,
            line: line_no as usize,
        };
        acc.collector.record_line();

        match transform_line(&ctx.registry, line) {
            LineOutcome::Malformed(err) => {
                let record = acc.collector.record_parse_failure(origin, path, &err);
                acc.keep(record);
            }
            LineOutcome::Dropped(reason) => {
                acc.collector.record_parsed();
                if let Some(record) = acc.collector.record_drop(origin, path, reason, line) {
                    acc.keep(record);
                }
            }
            LineOutcome::Failed(err) => {
                acc.collector.record_parsed();
                let record = acc.collector.record_row_error(origin, path, &err);
                acc.keep(record);
            }
            LineOutcome::Extracted(extracted) => {
                acc.collector.record_parsed();
                for warning in &extracted.warnings {
                    acc.collector.record_warning(origin, path, warning);
                }
                for row in extracted.rows {
                    acc.push_row(origin, row);
                }
            }
        }
    }

    acc.finish()
}

struct FileAccumulator<'a> {
    ctx: &'a TransformContext,
    index: usize,
    path: &'a str,
    collector: Collector,
    dead_letters: Vec<ErrorRecord>,
    fixed: BTreeMap<SchemaName, (Vec<RowOrigin>, Vec<FlatRow>)>,
    pull_requests: Vec<(RowOrigin, FlatRow)>,
}

impl<'a> FileAccumulator<'a> {
    fn new(ctx: &'a TransformContext, index: usize, path: &'a str) -> Self {
        Self {
            ctx,
            index,
            path,
            collector: Collector::new(ctx.max_samples),
            dead_letters: Vec::new(),
            fixed: BTreeMap::new(),
            pull_requests: Vec::new(),
        }
    }

    fn keep(&mut self, record: ErrorRecord) {
        if self.ctx.keep_dead_letters && record.is_dead_letter() {
            self.dead_letters.push(record);
        }
    }

    fn push_row(&mut self, origin: RowOrigin, row: FlatRow) {
        self.collector.record_rows(row.schema, 1);
        if row.schema == SchemaName::PullRequests {
            self.pull_requests.push((origin, row));
            return;
        }
        let (origins, rows) = self.fixed.entry(row.schema).or_default();
        origins.push(origin);
        rows.push(row);
    }

    fn finish(mut self) -> Result<FileOutput, ReaderError> {
        let mut tables = BTreeMap::new();

        for (schema, (origins, rows)) in std::mem::take(&mut self.fixed) {
            let Some(table) = declared(schema) else {
                continue;
            };
            let projected = to_record_batch(&table, &rows).context(ProjectSnafu {
                schema,
                path: self.path,
            })?;

            for (row_index, column) in projected.unfit {
                let warning = FieldWarning {
                    schema,
                    path: column.to_string(),
                    detail: format!("value does not fit {} column {}", schema, column),
                };
                self.collector
                    .record_warning(origins[row_index], self.path, &warning);
            }
            tables.insert(schema, vec![projected.batch]);
        }

        Ok(FileOutput {
            index: self.index,
            path: self.path.to_string(),
            tables,
            pull_requests: self.pull_requests,
            collector: self.collector,
            dead_letters: self.dead_letters,
        })
    }
}
