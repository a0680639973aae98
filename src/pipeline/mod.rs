//! Main processing pipeline.
//!
//! One run is: list → download → extract → merge → infer → commit.
//!
//! # Architecture
//!
//! - **Tokio tasks**: download compressed blobs concurrently (I/O bound)
//! - **Tokio's blocking thread pool**: decompress and extract each blob (CPU bound)
//! - **Merge**: file outputs are combined in listing order, so row order and
//!   every counter are independent of which file finished first
//! - **Commit**: every schema partition is overwritten concurrently; one
//!   failing schema does not affect the others
//!
//! A shutdown signal stops intake and skips the commit phase, leaving the
//! previous run's partitions untouched.

mod download;
mod signal;
mod summary;

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arrow::array::RecordBatch;
use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use snafu::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collector::{Collector, RowOrigin};
use crate::config::Config;
use crate::dlq::{DeadLetterQueue, FailureTracker};
use crate::emit;
use crate::error::{
    BatchBuildSnafu, DlqSnafu, PipelineError, PipelineStorageSnafu, ReaderError, SinkError,
    TaskJoinSnafu,
};
use crate::extract::{ExtractorRegistry, FieldWarning, FlatRow, SchemaName};
use crate::metrics::events::{
    FailureStage, FileProcessed, FileStatus, PartitionCommitFailed, PartitionCommitted,
    SchemaDriftColumns,
};
use crate::router::to_record_batch;
use crate::schema::{TableSchema, declared, infer_schema_from_sample};
use crate::sink::{ColumnarSink, CommitReceipt, ParquetSink, ParquetWriterConfig};
use crate::source::{BlobReader, list_input_files};
use crate::storage::{StorageProvider, StorageProviderRef};
use crate::transform::{FileOutput, TransformContext, process_file};

use download::{DownloadFailure, DownloadedFile, Downloader};

pub use signal::shutdown_signal;
pub use summary::{CommitOutcome, RunSummary};

/// A processed file, or the reason it could not be read.
struct Processed {
    index: usize,
    path: String,
    result: Result<FileOutput, ReaderError>,
}

type ProcessFuture = Pin<Box<dyn Future<Output = Result<Processed, PipelineError>> + Send>>;

fn spawn_process_task(downloaded: DownloadedFile, ctx: Arc<TransformContext>) -> ProcessFuture {
    let DownloadedFile {
        index,
        path,
        compressed,
    } = downloaded;
    Box::pin(async move {
        tokio::task::spawn_blocking(move || {
            let result = process_file(&ctx, index, &path, &compressed);
            Processed {
                index,
                path,
                result,
            }
        })
        .await
        .context(TaskJoinSnafu)
    })
}

/// Mutable state of the download/extract loop.
struct Intake {
    processing: FuturesUnordered<ProcessFuture>,
    channel_open: bool,
    outputs: BTreeMap<usize, FileOutput>,
    /// File-level failures.
    collector: Collector,
    failures: FailureTracker,
    dlq: Option<Arc<DeadLetterQueue>>,
}

impl Intake {
    fn should_continue(&self) -> bool {
        self.channel_open || !self.processing.is_empty()
    }

    fn has_capacity(&self, max_concurrent: usize) -> bool {
        self.channel_open && self.processing.len() < max_concurrent
    }

    async fn handle_download(
        &mut self,
        result: Option<Result<DownloadedFile, DownloadFailure>>,
        ctx: &Arc<TransformContext>,
    ) -> Result<(), PipelineError> {
        match result {
            Some(Ok(downloaded)) => {
                self.processing
                    .push(spawn_process_task(downloaded, ctx.clone()));
            }
            Some(Err(failure)) => {
                if failure.source.is_not_found() {
                    warn!("{} disappeared after listing", failure.path);
                }
                let message = snafu::Report::from_error(failure.source).to_string();
                self.fail_file(failure.index, &failure.path, FailureStage::Download, message)
                    .await?;
            }
            None => self.channel_open = false,
        }
        Ok(())
    }

    async fn handle_processed(&mut self, processed: Processed) -> Result<(), PipelineError> {
        match processed.result {
            Ok(mut output) => {
                emit!(FileProcessed {
                    status: FileStatus::Success
                });
                if let Some(dlq) = &self.dlq
                    && !output.dead_letters.is_empty()
                {
                    dlq.record(std::mem::take(&mut output.dead_letters)).await;
                }
                debug!("[-] Finished {} ({} rows)", output.path, output.row_count());
                self.outputs.insert(processed.index, output);
            }
            Err(error) => {
                let stage = error.stage();
                let message = snafu::Report::from_error(error).to_string();
                self.fail_file(processed.index, &processed.path, stage, message)
                    .await?;
            }
        }
        Ok(())
    }

    async fn fail_file(
        &mut self,
        index: usize,
        path: &str,
        stage: FailureStage,
        message: String,
    ) -> Result<(), PipelineError> {
        warn!("Skipping {} ({} failed): {}", path, stage.as_str(), message);
        let record = self
            .collector
            .record_file_failure(index, path, stage, &message);
        self.failures.record_failure(record).await
    }
}

/// Main processing pipeline.
pub struct Pipeline {
    config: Config,
    source_storage: StorageProviderRef,
    sink: Arc<dyn ColumnarSink>,
    registry: Arc<ExtractorRegistry>,
    shutdown: CancellationToken,
}

impl Pipeline {
    /// Create a pipeline writing Parquet partitions to `sink.path`.
    pub async fn new(config: Config, shutdown: CancellationToken) -> Result<Self, PipelineError> {
        let source_storage = Arc::new(
            StorageProvider::for_url_with_options(
                &config.source.path,
                config.source.storage_options.clone(),
            )
            .await
            .context(PipelineStorageSnafu)?,
        );

        let sink_storage = Arc::new(
            StorageProvider::for_url_with_options(
                &config.sink.path,
                config.sink.storage_options.clone(),
            )
            .await
            .context(PipelineStorageSnafu)?,
        );
        let sink = Arc::new(ParquetSink::new(
            sink_storage,
            ParquetWriterConfig::from_sink(&config.sink),
        ));

        Ok(Self {
            config,
            source_storage,
            sink,
            registry: Arc::new(ExtractorRegistry::default()),
            shutdown,
        })
    }

    /// Replace the columnar sink.
    pub fn with_sink(mut self, sink: Arc<dyn ColumnarSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Run the pipeline once over every listed input file.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let start = Instant::now();
        info!("Starting pipeline");

        let files = list_input_files(&self.source_storage, &self.config.source)
            .await
            .context(PipelineStorageSnafu)?;
        let files_listed = files.len();

        let dlq = DeadLetterQueue::from_config(&self.config.error_handling)
            .await
            .context(DlqSnafu)?
            .map(Arc::new);

        let ctx = Arc::new(TransformContext {
            registry: self.registry.clone(),
            reader: BlobReader::new(self.config.source.compression),
            max_samples: self.config.error_handling.max_error_samples,
            keep_dead_letters: dlq.is_some(),
        });

        let mut intake = Intake {
            processing: FuturesUnordered::new(),
            channel_open: true,
            outputs: BTreeMap::new(),
            collector: Collector::new(self.config.error_handling.max_error_samples),
            failures: FailureTracker::new(self.config.error_handling.max_failures, dlq.clone()),
            dlq,
        };

        let paths = files.clone();
        let max_concurrent = self.config.source.max_concurrent_files;
        let mut downloader = Downloader::spawn(
            files.into_iter().enumerate().collect(),
            self.source_storage.clone(),
            self.shutdown.clone(),
            max_concurrent,
        );

        let mut cancelled = false;
        while intake.should_continue() {
            if self.shutdown.is_cancelled() {
                info!("Shutdown requested, stopping intake");
                cancelled = true;
                break;
            }

            let has_capacity = intake.has_capacity(max_concurrent);
            tokio::select! {
                _ = self.shutdown.cancelled() => {}

                result = downloader.rx.recv(), if has_capacity => {
                    intake.handle_download(result, &ctx).await?;
                }

                Some(result) = intake.processing.next(), if !intake.processing.is_empty() => {
                    intake.handle_processed(result?).await?;
                }
            }
        }
        downloader.abort();

        let files_processed = intake.outputs.len();
        let files_failed = intake.failures.count();
        let mut summary = RunSummary {
            files_listed,
            files_processed,
            files_failed,
            cancelled,
            ..Default::default()
        };

        if cancelled {
            intake.failures.finalize_dlq().await;
            summary.collector = intake.collector;
            for output in intake.outputs.into_values() {
                summary.collector.merge(output.collector);
            }
            summary.duration = start.elapsed();
            return Ok(summary);
        }

        let merged = merge_outputs(intake.collector, intake.outputs);
        let Merged {
            mut collector,
            tables,
            pull_requests,
        } = merged;

        let pull_requests = self.project_pull_requests(pull_requests, &paths, &mut collector);
        summary.pull_request_columns = pull_requests
            .as_ref()
            .map(|(table, _)| table.columns.len())
            .unwrap_or_default();

        collector.emit_metrics();
        summary.commits = self.commit_all(tables, pull_requests).await;

        intake.failures.finalize_dlq().await;
        summary.collector = collector;
        summary.duration = start.elapsed();
        Ok(summary)
    }

    /// Infer the PullRequests schema and lay the rows out against it.
    ///
    /// Values that do not fit their inferred column are nulled and counted
    /// as coercion warnings.
    fn project_pull_requests(
        &self,
        rows: Vec<(RowOrigin, FlatRow)>,
        paths: &[String],
        collector: &mut Collector,
    ) -> Result<(TableSchema, RecordBatch), SinkError> {
        let (origins, rows): (Vec<RowOrigin>, Vec<FlatRow>) = rows.into_iter().unzip();

        let settings = &self.config.pull_requests;
        let inferred = infer_schema_from_sample(
            &rows,
            settings.sample_ratio,
            settings.max_sample_rows,
            settings.seed,
        );
        info!(
            "PullRequests schema: {} columns from {} sampled of {} rows",
            inferred.table.columns.len(),
            inferred.sampled,
            rows.len()
        );
        collector.record_schema_drift(inferred.omitted.iter().copied());
        emit!(SchemaDriftColumns {
            count: inferred.omitted.len()
        });

        let table = inferred.table;
        let projected = to_record_batch(&table, &rows).context(BatchBuildSnafu {
            schema: SchemaName::PullRequests,
        })?;

        for (row_index, column) in projected.unfit {
            let origin = origins[row_index];
            let path = paths.get(origin.file_index).map_or("", String::as_str);
            let warning = FieldWarning {
                schema: SchemaName::PullRequests,
                path: column.to_string(),
                detail: format!("value does not fit inferred PullRequests column {column}"),
            };
            collector.record_warning(origin, path, &warning);
        }

        Ok((table, projected.batch))
    }

    async fn commit_all(
        &self,
        mut tables: BTreeMap<SchemaName, Vec<RecordBatch>>,
        pull_requests: Result<(TableSchema, RecordBatch), SinkError>,
    ) -> BTreeMap<SchemaName, CommitOutcome> {
        let mut outcomes = BTreeMap::new();
        let mut pull_requests = Some(pull_requests);
        let mut jobs = Vec::new();

        for schema in SchemaName::ALL {
            let (table, batches) = match declared(schema) {
                Some(table) => (table, tables.remove(&schema).unwrap_or_default()),
                None => match pull_requests.take() {
                    Some(Ok((table, batch))) => (table, vec![batch]),
                    Some(Err(error)) => {
                        let outcome = commit_outcome(schema, Err(error), Duration::ZERO);
                        outcomes.insert(schema, outcome);
                        continue;
                    }
                    None => continue,
                },
            };

            let sink = self.sink.clone();
            jobs.push(async move {
                let started = Instant::now();
                let result = sink.commit(schema, table.to_arrow(), batches).await;
                (schema, result, started.elapsed())
            });
        }

        for (schema, result, duration) in join_all(jobs).await {
            let outcome = commit_outcome(schema, result, duration);
            outcomes.insert(schema, outcome);
        }
        outcomes
    }
}

fn commit_outcome(
    schema: SchemaName,
    result: Result<CommitReceipt, SinkError>,
    duration: Duration,
) -> CommitOutcome {
    match result {
        Ok(receipt) => {
            emit!(PartitionCommitted { schema, duration });
            CommitOutcome::Committed(receipt)
        }
        Err(error) => {
            emit!(PartitionCommitFailed { schema });
            let error = snafu::Report::from_error(error).to_string();
            warn!("Failed to commit {}: {}", schema, error);
            CommitOutcome::Failed { error }
        }
    }
}

struct Merged {
    collector: Collector,
    tables: BTreeMap<SchemaName, Vec<RecordBatch>>,
    pull_requests: Vec<(RowOrigin, FlatRow)>,
}

/// Combine file outputs in listing order.
fn merge_outputs(collector: Collector, outputs: BTreeMap<usize, FileOutput>) -> Merged {
    let mut merged = Merged {
        collector,
        tables: BTreeMap::new(),
        pull_requests: Vec::new(),
    };

    for output in outputs.into_values() {
        merged.collector.merge(output.collector);
        for (schema, batches) in output.tables {
            merged.tables.entry(schema).or_default().extend(batches);
        }
        merged.pull_requests.extend(output.pull_requests);
    }
    merged
}

/// Run the pipeline with the given configuration, stopping intake on
/// SIGINT/SIGTERM/SIGQUIT.
pub async fn run_pipeline(config: Config) -> Result<RunSummary, PipelineError> {
    let shutdown = CancellationToken::new();

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let pipeline = Pipeline::new(config, shutdown).await?;
    pipeline.run().await
}
