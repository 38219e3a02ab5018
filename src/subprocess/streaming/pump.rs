//! Drives one child output stream into a dispatcher channel.

use super::accumulator::LineAccumulator;
use super::types::{OutputChunk, StreamSource};
use crate::subprocess::registry::LabelRegistry;
use crate::subprocess::style::visible_width;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;

const READ_BUFFER_SIZE: usize = 8192;

/// Why a stream stopped being read
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("malformed UTF-8 at byte {offset} of {source_stream}")]
    Malformed {
        source_stream: StreamSource,
        offset: usize,
    },

    #[error("{source_stream} ended inside a multi-byte character ({len} bytes pending)")]
    Truncated {
        source_stream: StreamSource,
        len: usize,
    },

    #[error("failed to read {source_stream}: {source}")]
    Read {
        source_stream: StreamSource,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// Stream closed and the remainder was flushed
    EndOfStream,
    /// Read or decode failure; the partial buffer was dropped
    Aborted,
    /// Nobody is listening for chunks anymore
    ReceiverClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpSummary {
    pub outcome: PumpOutcome,
    pub chunks: usize,
    pub bytes: usize,
}

/// Incremental UTF-8 decoding that tolerates characters split across reads.
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
    consumed: usize,
}

/// Text decoded from one read, plus the error that stopped decoding, if any.
struct Decoded {
    text: String,
    error: Option<usize>,
}

impl Utf8Decoder {
    fn decode(&mut self, bytes: &[u8]) -> Decoded {
        self.pending.extend_from_slice(bytes);
        let (valid, error) = match std::str::from_utf8(&self.pending) {
            Ok(_) => (self.pending.len(), None),
            Err(e) => match e.error_len() {
                // Incomplete trailing character; wait for the next read.
                None => (e.valid_up_to(), None),
                Some(_) => (e.valid_up_to(), Some(self.consumed + e.valid_up_to())),
            },
        };
        let text = String::from_utf8_lossy(&self.pending[..valid]).into_owned();
        self.pending.drain(..valid);
        self.consumed += valid;
        Decoded { text, error }
    }

    fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Reads one stream of one process and forwards labelled chunks.
pub struct StreamPump<R> {
    reader: R,
    source: StreamSource,
    label: String,
    label_width: usize,
    delimiter: String,
    registry: Arc<LabelRegistry>,
    sender: UnboundedSender<OutputChunk>,
    flush_timeout: Duration,
}

impl<R> StreamPump<R>
where
    R: AsyncRead + Unpin,
{
    /// `label` may carry color sequences; alignment uses its visible width.
    pub fn new(
        reader: R,
        source: StreamSource,
        label: impl Into<String>,
        registry: Arc<LabelRegistry>,
        sender: UnboundedSender<OutputChunk>,
        flush_timeout: Duration,
    ) -> Self {
        let label = label.into();
        let label_width = visible_width(&label);
        registry.widths().observe(label_width);
        Self {
            reader,
            source,
            label,
            label_width,
            delimiter: source.delimiter(),
            registry,
            sender,
            flush_timeout,
        }
    }

    pub async fn run(mut self) -> PumpSummary {
        let mut accumulator = LineAccumulator::new();
        let mut decoder = Utf8Decoder::default();
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let mut summary = PumpSummary {
            outcome: PumpOutcome::EndOfStream,
            chunks: 0,
            bytes: 0,
        };

        let idle = tokio::time::sleep(self.flush_timeout);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                biased;
                read = self.reader.read(&mut buf) => {
                    let n = match read {
                        Ok(n) => n,
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            let source_stream = self.source;
                            self.abort(StreamError::Read { source_stream, source: e }).await;
                            summary.outcome = PumpOutcome::Aborted;
                            return summary;
                        }
                    };

                    if n == 0 {
                        if decoder.pending_len() > 0 {
                            let source_stream = self.source;
                            self.abort(StreamError::Truncated {
                                source_stream,
                                len: decoder.pending_len(),
                            })
                            .await;
                            summary.outcome = PumpOutcome::Aborted;
                            return summary;
                        }
                        if let Some(payload) = accumulator.flush() {
                            if !self.emit(payload, &mut summary) {
                                summary.outcome = PumpOutcome::ReceiverClosed;
                            }
                        }
                        return summary;
                    }

                    let decoded = decoder.decode(&buf[..n]);
                    for payload in accumulator.push_str(&decoded.text) {
                        if !self.emit(payload, &mut summary) {
                            self.discard_rest().await;
                            summary.outcome = PumpOutcome::ReceiverClosed;
                            return summary;
                        }
                    }
                    if let Some(offset) = decoded.error {
                        let source_stream = self.source;
                        self.abort(StreamError::Malformed { source_stream, offset }).await;
                        summary.outcome = PumpOutcome::Aborted;
                        return summary;
                    }
                    idle.as_mut().reset(Instant::now() + self.flush_timeout);
                }
                () = &mut idle, if !accumulator.is_empty() => {
                    if let Some(payload) = accumulator.flush() {
                        tracing::trace!("{} of {} idle, flushing partial line", self.source, self.label);
                        if !self.emit(payload, &mut summary) {
                            self.discard_rest().await;
                            summary.outcome = PumpOutcome::ReceiverClosed;
                            return summary;
                        }
                    }
                }
            }
        }
    }

    /// Returns false once the receiving dispatcher is gone.
    fn emit(&self, payload: Vec<u8>, summary: &mut PumpSummary) -> bool {
        let len = payload.len();
        let Some(chunk) = OutputChunk::new(
            self.registry.widths().pad(&self.label, self.label_width),
            self.delimiter.clone(),
            payload,
        )
        else {
            return true;
        };
        if self.sender.send(chunk).is_err() {
            tracing::debug!("Dispatcher for {} closed, stopping pump", self.source);
            return false;
        }
        summary.chunks += 1;
        summary.bytes += len;
        true
    }

    async fn abort(&mut self, error: StreamError) {
        tracing::debug!("Stopped reading {}: {}", self.label, error);
        self.discard_rest().await;
    }

    /// Read the stream to its end without forwarding anything.
    ///
    /// The child keeps a writable pipe until it exits, so it is never killed
    /// by SIGPIPE because this side stopped listening.
    async fn discard_rest(&mut self) {
        match tokio::io::copy(&mut self.reader, &mut tokio::io::sink()).await {
            Ok(0) => {}
            Ok(n) => tracing::trace!("Discarded {} bytes of {} from {}", n, self.source, self.label),
            Err(e) => tracing::debug!("Discarding {} of {} failed: {}", self.source, self.label, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn drain(rx: &mut mpsc::UnboundedReceiver<OutputChunk>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(chunk) = rx.try_recv() {
            out.push(String::from_utf8(chunk.payload).unwrap());
        }
        out
    }

    fn pump<R: AsyncRead + Unpin>(
        reader: R,
        source: StreamSource,
    ) -> (StreamPump<R>, mpsc::UnboundedReceiver<OutputChunk>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = Arc::new(LabelRegistry::default());
        let pump = StreamPump::new(
            reader,
            source,
            "job:1",
            registry,
            tx,
            Duration::from_millis(4150),
        );
        (pump, rx)
    }

    #[tokio::test]
    async fn test_end_of_stream_flushes_remainder() {
        let reader = tokio_test::io::Builder::new().read(b"tail").build();
        let (pump, mut rx) = pump(reader, StreamSource::Stdout);

        let summary = pump.run().await;

        assert_eq!(summary.outcome, PumpOutcome::EndOfStream);
        assert_eq!(summary.chunks, 1);
        assert_eq!(drain(&mut rx), vec!["tail"]);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_line_split_across_reads() {
        let reader = tokio_test::io::Builder::new()
            .read(b"ab")
            .read(b"c\n")
            .build();
        let (pump, mut rx) = pump(reader, StreamSource::Stdout);

        pump.run().await;

        assert_eq!(drain(&mut rx), vec!["abc\n"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_partial_line_is_flushed_once() {
        let reader = tokio_test::io::Builder::new()
            .read(b"partial")
            .wait(Duration::from_secs(5))
            .read(b" more\n")
            .build();
        let (pump, mut rx) = pump(reader, StreamSource::Stdout);

        let summary = pump.run().await;

        assert_eq!(summary.chunks, 2);
        assert_eq!(drain(&mut rx), vec!["partial", " more\n"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_postpones_idle_flush() {
        let reader = tokio_test::io::Builder::new()
            .read(b"a")
            .wait(Duration::from_secs(3))
            .read(b"b")
            .wait(Duration::from_secs(3))
            .read(b"c\n")
            .build();
        let (pump, mut rx) = pump(reader, StreamSource::Stdout);

        pump.run().await;

        assert_eq!(drain(&mut rx), vec!["abc\n"]);
    }

    #[tokio::test]
    async fn test_malformed_input_drops_partial_buffer() {
        let reader = tokio_test::io::Builder::new()
            .read(b"ok\nbroken")
            .read(&[0xff, b'\n'])
            .build();
        let (pump, mut rx) = pump(reader, StreamSource::Stderr);

        let summary = pump.run().await;

        assert_eq!(summary.outcome, PumpOutcome::Aborted);
        assert_eq!(drain(&mut rx), vec!["ok\n"]);
    }

    #[tokio::test]
    async fn test_malformed_input_consumes_rest_of_stream() {
        // The mock reader panics on drop if any scripted read is left over
        let reader = tokio_test::io::Builder::new()
            .read(b"ok\n\xff\n")
            .read(b"still writing\n")
            .read(&b"more output\n".repeat(500))
            .build();
        let (pump, mut rx) = pump(reader, StreamSource::Stdout);

        let summary = pump.run().await;

        assert_eq!(summary.outcome, PumpOutcome::Aborted);
        assert_eq!(summary.chunks, 1);
        assert_eq!(drain(&mut rx), vec!["ok\n"]);
    }

    #[tokio::test]
    async fn test_closed_receiver_consumes_rest_of_stream() {
        let reader = tokio_test::io::Builder::new()
            .read(b"line\n")
            .read(b"ignored\n")
            .build();
        let (pump, rx) = pump(reader, StreamSource::Stderr);
        drop(rx);

        let summary = pump.run().await;

        assert_eq!(summary.outcome, PumpOutcome::ReceiverClosed);
    }

    #[tokio::test]
    async fn test_character_split_between_reads() {
        let check = "✓".as_bytes();
        let reader = tokio_test::io::Builder::new()
            .read(&check[..1])
            .read(&check[1..])
            .read(b"\n")
            .build();
        let (pump, mut rx) = pump(reader, StreamSource::Stdout);

        let summary = pump.run().await;

        assert_eq!(summary.outcome, PumpOutcome::EndOfStream);
        assert_eq!(drain(&mut rx), vec!["✓\n"]);
    }

    #[tokio::test]
    async fn test_truncated_character_at_end_is_dropped() {
        let check = "✓".as_bytes();
        let reader = tokio_test::io::Builder::new()
            .read(b"text")
            .read(&check[..2])
            .build();
        let (pump, mut rx) = pump(reader, StreamSource::Stdout);

        let summary = pump.run().await;

        assert_eq!(summary.outcome, PumpOutcome::Aborted);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_closed_receiver_stops_pump() {
        let reader = tokio_test::io::Builder::new().read(b"line\n").build();
        let (pump, rx) = pump(reader, StreamSource::Stdout);
        drop(rx);

        let summary = pump.run().await;

        assert_eq!(summary.outcome, PumpOutcome::ReceiverClosed);
        assert_eq!(summary.chunks, 0);
    }

    #[tokio::test]
    async fn test_labels_padded_to_widest() {
        let registry = Arc::new(LabelRegistry::default());
        registry.widths().observe(12);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reader = tokio_test::io::Builder::new().read(b"x\n").build();
        let pump = StreamPump::new(
            reader,
            StreamSource::Stdout,
            "\x1b[38;2;1;2;3mab:9\x1b[0m",
            registry,
            tx,
            Duration::from_secs(1),
        );

        pump.run().await;

        let chunk = rx.try_recv().unwrap();
        assert_eq!(chunk.label, "\x1b[38;2;1;2;3mab:9\x1b[0m        ");
        assert_eq!(chunk.delimiter, " | ");
    }

    #[test]
    fn test_decoder_reports_offset() {
        let mut decoder = Utf8Decoder::default();
        let first = decoder.decode(b"abc");
        assert_eq!(first.text, "abc");
        assert!(first.error.is_none());
        let second = decoder.decode(&[b'd', 0xc0, b'e']);
        assert_eq!(second.text, "d");
        assert_eq!(second.error, Some(4));
    }
}
