//! Download progress reporting.
//!
//! [`ProgressStream`] sits between the HTTP body and the decompressor and
//! reports every raw chunk it forwards. Events are never throttled; callers
//! that redraw a UI decide how often to do so.

use crate::Result;
use bytes::Bytes;
use futures::Stream;
use serde::Serialize;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::sync::mpsc;
use tracing::debug;

/// Progress information for a download.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    /// Completed share in `[0, 1]`.
    pub fraction: f64,
    /// Raw (compressed) bytes received so far.
    pub bytes_downloaded: u64,
    /// Advertised artifact size, 0 when unknown.
    pub bytes_total: u64,
}

impl DownloadProgress {
    /// Progress after `bytes_downloaded` of `bytes_total` bytes. An unknown
    /// total reports 0.
    pub fn new(bytes_downloaded: u64, bytes_total: u64) -> Self {
        let fraction = if bytes_total > 0 {
            (bytes_downloaded as f64 / bytes_total as f64).min(1.0)
        } else {
            0.0
        };

        Self {
            fraction,
            bytes_downloaded,
            bytes_total,
        }
    }

    fn completed(bytes_downloaded: u64, bytes_total: u64) -> Self {
        Self {
            fraction: 1.0,
            bytes_downloaded,
            bytes_total,
        }
    }

    /// Percentage complete (0-100).
    pub fn percent(&self) -> f64 {
        self.fraction * 100.0
    }
}

/// Counts received bytes and sends a [`DownloadProgress`] per chunk.
#[derive(Debug)]
pub struct ProgressEmitter {
    downloaded: u64,
    total: u64,
    tx: Option<mpsc::UnboundedSender<DownloadProgress>>,
}

impl ProgressEmitter {
    pub fn new(total: u64, tx: Option<mpsc::UnboundedSender<DownloadProgress>>) -> Self {
        Self {
            downloaded: 0,
            total,
            tx,
        }
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded
    }

    /// Account for a received chunk of `len` bytes.
    pub fn record(&mut self, len: usize) -> DownloadProgress {
        self.downloaded += len as u64;
        let progress = DownloadProgress::new(self.downloaded, self.total);
        self.emit(progress);
        progress
    }

    /// Signal the end of the body. Only emits when the total was unknown,
    /// since per-chunk events could not reach 1.0 in that case.
    pub fn finish(&mut self) -> Option<DownloadProgress> {
        if self.total > 0 {
            return None;
        }
        let progress = DownloadProgress::completed(self.downloaded, self.total);
        self.emit(progress);
        Some(progress)
    }

    fn emit(&mut self, progress: DownloadProgress) {
        if let Some(tx) = &self.tx {
            if tx.send(progress).is_err() {
                debug!("Progress receiver dropped, continuing download without updates");
                self.tx = None;
            }
        }
    }
}

/// Byte stream adapter that reports progress without altering the data.
pub struct ProgressStream<S> {
    inner: S,
    emitter: ProgressEmitter,
    finished: bool,
}

impl<S> ProgressStream<S> {
    pub fn new(inner: S, emitter: ProgressEmitter) -> Self {
        Self {
            inner,
            emitter,
            finished: false,
        }
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.finished {
            return Poll::Ready(None);
        }

        match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
            Some(Ok(chunk)) => {
                this.emitter.record(chunk.len());
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(e)) => {
                this.finished = true;
                Poll::Ready(Some(Err(e)))
            }
            None => {
                this.finished = true;
                this.emitter.finish();
                Poll::Ready(None)
            }
        }
    }
}
