//! Parquet file writer.
//!
//! Encodes Arrow record batches into in-memory Parquet files, rolling to a
//! new part once the current one reaches the target size. Part names are
//! sequential (`part-00000.parquet`, ...) so the same input always yields
//! the same file set.

use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use bytes::{BufMut, Bytes, BytesMut};
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use snafu::prelude::*;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::debug;

use crate::config::{MB, ParquetCompression, SinkConfig};
use crate::emit;
use crate::error::{
    BufferInUseSnafu, BufferLockSnafu, SinkError, WriteSnafu, WriterCreateSnafu,
    WriterUnavailableSnafu,
};
use crate::metrics::events::ParquetWriteCompleted;

const INITIAL_BUFFER_CAPACITY: usize = 8 * MB;

/// A finished, not yet uploaded Parquet file.
#[derive(Debug, Clone)]
pub struct FinishedFile {
    /// File name relative to the partition directory.
    pub filename: String,
    pub record_count: usize,
    pub bytes: Bytes,
}

/// A buffer with interior mutability for the ArrowWriter.
#[derive(Clone)]
struct SharedBuffer {
    buffer: Arc<Mutex<bytes::buf::Writer<BytesMut>>>,
}

impl SharedBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(BytesMut::with_capacity(capacity).writer())),
        }
    }

    fn into_inner(self) -> Result<BytesMut, SinkError> {
        let mutex = Arc::into_inner(self.buffer).context(BufferInUseSnafu)?;
        let writer = mutex.into_inner().map_err(|_| BufferLockSnafu.build())?;
        Ok(writer.into_inner())
    }

    fn len(&self) -> Result<usize, SinkError> {
        let guard = self.buffer.lock().map_err(|_| BufferLockSnafu.build())?;
        Ok(guard.get_ref().len())
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut buffer = self.buffer.try_lock().map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::WouldBlock, "buffer lock contention")
        })?;
        Write::write(&mut *buffer, buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Configuration for the Parquet writer.
#[derive(Debug, Clone)]
pub struct ParquetWriterConfig {
    /// Roll to a new part once the current one reaches this many bytes.
    pub target_file_size: usize,
    /// Row groups are flushed when in_progress_size exceeds this threshold.
    pub row_group_size_bytes: usize,
    pub compression: ParquetCompression,
}

impl Default for ParquetWriterConfig {
    fn default() -> Self {
        Self {
            target_file_size: 128 * MB,
            row_group_size_bytes: 128 * MB,
            compression: ParquetCompression::Snappy,
        }
    }
}

impl ParquetWriterConfig {
    pub fn from_sink(config: &SinkConfig) -> Self {
        Self {
            target_file_size: config.file_size_mb.max(1) * MB,
            row_group_size_bytes: config.row_group_size_bytes,
            compression: config.compression,
        }
    }

    pub fn with_target_file_size(mut self, bytes: usize) -> Self {
        self.target_file_size = bytes;
        self
    }

    pub fn with_compression(mut self, compression: ParquetCompression) -> Self {
        self.compression = compression;
        self
    }
}

/// Writes one schema's batches into a sequence of Parquet parts.
pub struct ParquetWriter {
    schema: SchemaRef,
    config: ParquetWriterConfig,
    writer: Option<ArrowWriter<SharedBuffer>>,
    buffer: SharedBuffer,
    part: usize,
    records_in_part: usize,
    finished_files: Vec<FinishedFile>,
}

impl ParquetWriter {
    pub fn new(schema: SchemaRef, config: ParquetWriterConfig) -> Result<Self, SinkError> {
        let buffer = SharedBuffer::new(INITIAL_BUFFER_CAPACITY);
        let writer = Self::create_writer(&schema, &config, buffer.clone())?;

        Ok(Self {
            schema,
            config,
            writer: Some(writer),
            buffer,
            part: 0,
            records_in_part: 0,
            finished_files: Vec::new(),
        })
    }

    fn create_writer(
        schema: &SchemaRef,
        config: &ParquetWriterConfig,
        buffer: SharedBuffer,
    ) -> Result<ArrowWriter<SharedBuffer>, SinkError> {
        let properties = WriterProperties::builder()
            .set_compression(config.compression.codec())
            .build();

        ArrowWriter::try_new(buffer, schema.clone(), Some(properties)).context(WriterCreateSnafu)
    }

    fn part_name(part: usize) -> String {
        format!("part-{part:05}.parquet")
    }

    /// Write a batch to the current part.
    pub fn write_batch(&mut self, batch: &RecordBatch) -> Result<(), SinkError> {
        if batch.num_rows() == 0 {
            return Ok(());
        }

        let writer = self.writer.as_mut().context(WriterUnavailableSnafu)?;
        writer.write(batch).context(WriteSnafu)?;
        self.records_in_part += batch.num_rows();

        if writer.in_progress_size() > self.config.row_group_size_bytes {
            debug!(
                "Flushing row group: in_progress_size={} bytes, threshold={} bytes",
                writer.in_progress_size(),
                self.config.row_group_size_bytes
            );
            writer.flush().context(WriteSnafu)?;
        }

        let current_size = self.current_file_size();
        if current_size >= self.config.target_file_size {
            debug!(
                "Rolling {} at {} bytes ({} records)",
                Self::part_name(self.part),
                current_size,
                self.records_in_part
            );
            self.finish_part()?;
            self.writer = Some(Self::create_writer(
                &self.schema,
                &self.config,
                self.buffer.clone(),
            )?);
        }

        Ok(())
    }

    /// Close the current part and hand its bytes over.
    fn finish_part(&mut self) -> Result<(), SinkError> {
        let start = Instant::now();
        let writer = self.writer.take().context(WriterUnavailableSnafu)?;
        writer.close().context(WriteSnafu)?;

        let bytes = std::mem::replace(
            &mut self.buffer,
            SharedBuffer::new(INITIAL_BUFFER_CAPACITY),
        )
        .into_inner()?
        .freeze();

        emit!(ParquetWriteCompleted {
            duration: start.elapsed()
        });

        self.finished_files.push(FinishedFile {
            filename: Self::part_name(self.part),
            record_count: self.records_in_part,
            bytes,
        });
        self.part += 1;
        self.records_in_part = 0;
        Ok(())
    }

    /// Close the writer and return every part.
    ///
    /// A writer that never saw a row still yields one empty part, so the
    /// partition keeps its schema.
    pub fn close(mut self) -> Result<Vec<FinishedFile>, SinkError> {
        if self.records_in_part > 0 || self.finished_files.is_empty() {
            self.finish_part()?;
        }
        Ok(self.finished_files)
    }

    /// Current part size in bytes, including data not yet flushed.
    pub fn current_file_size(&self) -> usize {
        let buffer_size = self.buffer.len().unwrap_or(0);
        let in_progress_size = self
            .writer
            .as_ref()
            .map(|w| w.in_progress_size())
            .unwrap_or(0);
        buffer_size + in_progress_size
    }
}
