//! Core types for streaming infrastructure

use crate::subprocess::style::{FG_RED, RESET};
use std::fmt;

/// Stream source identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamSource {
    Stdout,
    Stderr,
}

impl StreamSource {
    /// Separator printed between a label and the payload of this stream.
    pub fn delimiter(&self) -> String {
        match self {
            StreamSource::Stdout => " | ".to_string(),
            StreamSource::Stderr => format!("{FG_RED} | {RESET}"),
        }
    }
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamSource::Stdout => f.write_str("stdout"),
            StreamSource::Stderr => f.write_str("stderr"),
        }
    }
}

/// One unit of terminal output. A dispatcher writes it whole or not at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    /// Colored process label, already padded to the shared column width
    pub label: String,
    pub delimiter: String,
    /// Never empty
    pub payload: Vec<u8>,
}

impl OutputChunk {
    /// Build a chunk, or `None` for an empty payload.
    pub fn new(label: impl Into<String>, delimiter: impl Into<String>, payload: Vec<u8>) -> Option<Self> {
        if payload.is_empty() {
            return None;
        }
        Some(Self {
            label: label.into(),
            delimiter: delimiter.into(),
            payload,
        })
    }

    pub fn ends_with_newline(&self) -> bool {
        self.payload.last() == Some(&b'\n')
    }

    pub fn same_prefix(&self, label: &str, delimiter: &str) -> bool {
        self.label == label && self.delimiter == delimiter
    }
}
