//! Line assembly for a single output stream.
//!
//! [`LineAccumulator`] is a pure state machine: it is fed characters and
//! answers with payloads that are ready to be shown. Timing (the inactivity
//! flush) is driven by the owning pump, which calls [`LineAccumulator::flush`].

use std::time::Duration;

/// How long a partial line may sit in the buffer without new characters.
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_millis(4150);

#[derive(Debug, Default)]
pub struct LineAccumulator {
    buffer: Vec<u8>,
}

impl LineAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one character, returning a payload when it completes one.
    ///
    /// A newline completes the buffered line. A carriage return completes
    /// whatever text precedes it and stays buffered on its own, so the next
    /// payload starts with `\r` and overwrites the current terminal line.
    pub fn push(&mut self, ch: char) -> Option<Vec<u8>> {
        match ch {
            '\n' => {
                self.buffer.push(b'\n');
                Some(std::mem::take(&mut self.buffer))
            }
            '\r' => {
                if self.holds_text() {
                    Some(std::mem::replace(&mut self.buffer, vec![b'\r']))
                } else {
                    self.buffer.clear();
                    self.buffer.push(b'\r');
                    None
                }
            }
            other => {
                let mut encoded = [0u8; 4];
                self.buffer
                    .extend_from_slice(other.encode_utf8(&mut encoded).as_bytes());
                None
            }
        }
    }

    /// Feed a run of characters, collecting every completed payload.
    pub fn push_str(&mut self, text: &str) -> Vec<Vec<u8>> {
        text.chars().filter_map(|ch| self.push(ch)).collect()
    }

    /// Take everything buffered, used on inactivity and end of stream.
    pub fn flush(&mut self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// True when the buffer holds more than a retained carriage return.
    fn holds_text(&self) -> bool {
        !matches!(self.buffer.as_slice(), [] | [b'\r'])
    }
}
