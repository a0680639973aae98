//! Background download task.
//!
//! Keeps up to `max_concurrent` object reads in flight and hands finished
//! blobs to the processing loop over a bounded channel, which provides
//! backpressure when extraction falls behind.

use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::emit;
use crate::error::StorageError;
use crate::metrics::events::{ActiveDownloads, FileDownloadCompleted};
use crate::storage::StorageProviderRef;

/// Downloaded file ready for processing.
pub(super) struct DownloadedFile {
    pub index: usize,
    pub path: String,
    pub compressed: Bytes,
}

/// A file whose download failed.
pub(super) struct DownloadFailure {
    pub index: usize,
    pub path: String,
    pub source: StorageError,
}

type DownloadResult = Result<DownloadedFile, DownloadFailure>;
type DownloadFuture = Pin<Box<dyn Future<Output = DownloadResult> + Send>>;

/// Handle to the background downloader task.
pub(super) struct Downloader {
    pub rx: mpsc::Receiver<DownloadResult>,
    handle: JoinHandle<()>,
}

impl Downloader {
    /// Spawn the downloader over `(index, path)` pairs.
    pub fn spawn(
        files: Vec<(usize, String)>,
        storage: StorageProviderRef,
        shutdown: CancellationToken,
        max_concurrent: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(max_concurrent);
        let handle = tokio::spawn(Self::run(files, storage, tx, shutdown, max_concurrent));
        Self { rx, handle }
    }

    /// Abort the downloader task.
    pub fn abort(self) {
        drop(self.rx);
        self.handle.abort();
    }

    async fn run(
        files: Vec<(usize, String)>,
        storage: StorageProviderRef,
        tx: mpsc::Sender<DownloadResult>,
        shutdown: CancellationToken,
        max_concurrent: usize,
    ) {
        let mut downloads: FuturesUnordered<DownloadFuture> = FuturesUnordered::new();
        let mut pending = files.into_iter();

        for (index, path) in pending.by_ref().take(max_concurrent) {
            downloads.push(Box::pin(download_file(storage.clone(), index, path)));
        }
        emit!(ActiveDownloads {
            count: downloads.len()
        });

        while let Some(result) = downloads.next().await {
            if shutdown.is_cancelled() {
                debug!("[download] Shutdown requested, stopping downloads");
                break;
            }

            if let Ok(downloaded) = &result {
                debug!(
                    "[download] Completed {} ({} bytes)",
                    downloaded.path,
                    downloaded.compressed.len()
                );
            }

            if tx.send(result).await.is_err() {
                debug!("[download] Consumer closed, stopping downloads");
                break;
            }

            if let Some((index, path)) = pending.next() {
                debug!("[download] Starting {}", path);
                downloads.push(Box::pin(download_file(storage.clone(), index, path)));
            }
            emit!(ActiveDownloads {
                count: downloads.len()
            });
        }

        emit!(ActiveDownloads { count: 0 });
        debug!("[download] All downloads complete");
    }
}

async fn download_file(storage: StorageProviderRef, index: usize, path: String) -> DownloadResult {
    let start = Instant::now();
    match storage.get(path.as_str()).await {
        Ok(compressed) => {
            emit!(FileDownloadCompleted {
                duration: start.elapsed()
            });
            Ok(DownloadedFile {
                index,
                path,
                compressed,
            })
        }
        Err(source) => Err(DownloadFailure {
            index,
            path,
            source,
        }),
    }
}
