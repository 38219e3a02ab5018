//! Serializes chunks from every process onto one terminal sink.
//!
//! Each stream class (stdout, stderr) gets exactly one dispatcher task. It is
//! the only writer of its sink, which is what keeps chunks from different
//! processes from tearing into each other.

use super::types::{OutputChunk, StreamSource};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

/// Live counters of one dispatcher.
#[derive(Debug, Default)]
pub struct DispatchStats {
    chunks: AtomicU64,
    bytes: AtomicU64,
    write_failures: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSnapshot {
    pub chunks: u64,
    pub bytes: u64,
    pub write_failures: u64,
}

impl DispatchStats {
    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            chunks: self.chunks.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

pub struct OutputDispatcher<W> {
    source: StreamSource,
    sink: W,
    last_prefix: Option<(String, String)>,
    last_ended_in_newline: bool,
    stats: Arc<DispatchStats>,
}

impl<W> OutputDispatcher<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(source: StreamSource, sink: W) -> Self {
        Self {
            source,
            sink,
            last_prefix: None,
            last_ended_in_newline: false,
            stats: Arc::new(DispatchStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<DispatchStats> {
        Arc::clone(&self.stats)
    }

    /// Bytes to write for `chunk`, given what was written before it.
    ///
    /// Every physical line starts with the label, including each redraw
    /// introduced by a carriage return inside the payload.
    pub fn render(&self, chunk: &OutputChunk) -> Vec<u8> {
        let prefix_len = chunk.label.len() + chunk.delimiter.len() + 1;
        let mut frame = Vec::with_capacity(chunk.payload.len() + prefix_len * 2 + 1);

        if let Some((label, delimiter)) = &self.last_prefix {
            if !self.last_ended_in_newline && !chunk.same_prefix(label, delimiter) {
                frame.push(b'\n');
            }
        }

        for segment in chunk.payload.split(|&b| b == b'\r') {
            frame.push(b'\r');
            frame.extend_from_slice(chunk.label.as_bytes());
            frame.extend_from_slice(chunk.delimiter.as_bytes());
            frame.extend_from_slice(segment);
        }
        frame
    }

    /// Write one chunk. Sink failures are counted, never returned.
    pub async fn dispatch(&mut self, chunk: OutputChunk) {
        let frame = self.render(&chunk);

        let written = match self.sink.write_all(&frame).await {
            Ok(()) => self.sink.flush().await,
            Err(e) => Err(e),
        };
        match written {
            Ok(()) => {
                self.stats.chunks.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .bytes
                    .fetch_add(frame.len() as u64, Ordering::Relaxed);
            }
            Err(e) => {
                let failures = self.stats.write_failures.fetch_add(1, Ordering::Relaxed) + 1;
                if failures == 1 {
                    tracing::warn!("Writing to {} failed, output is being dropped: {}", self.source, e);
                } else {
                    tracing::debug!("Write to {} failed ({} failures): {}", self.source, failures, e);
                }
            }
        }

        self.last_ended_in_newline = chunk.ends_with_newline();
        self.last_prefix = Some((chunk.label, chunk.delimiter));
    }

    /// Dispatch until every sender is dropped, then flush and report.
    pub async fn run(mut self, mut inbound: UnboundedReceiver<OutputChunk>) -> DispatchSnapshot {
        tracing::trace!("{} dispatcher started", self.source);
        while let Some(chunk) = inbound.recv().await {
            self.dispatch(chunk).await;
        }
        if let Err(e) = self.sink.flush().await {
            tracing::debug!("Final flush of {} failed: {}", self.source, e);
        }
        let snapshot = self.stats.snapshot();
        tracing::debug!("{} dispatcher stopped: {:?}", self.source, snapshot);
        snapshot
    }
}

impl<W> OutputDispatcher<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn spawn(self, inbound: UnboundedReceiver<OutputChunk>) -> JoinHandle<DispatchSnapshot> {
        tokio::spawn(self.run(inbound))
    }
}
