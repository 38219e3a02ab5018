//! Real-time streaming of subprocess output
//!
//! Bytes read from a child's stdout/stderr are assembled into display-ready
//! chunks by a [`LineAccumulator`], forwarded by a [`StreamPump`], and written
//! by the single [`OutputDispatcher`] of the matching stream class.

pub mod accumulator;
pub mod dispatcher;
pub mod pump;
pub mod sink;
pub mod types;

pub use accumulator::{LineAccumulator, DEFAULT_FLUSH_TIMEOUT};
pub use dispatcher::{DispatchSnapshot, DispatchStats, OutputDispatcher};
pub use pump::{PumpOutcome, PumpSummary, StreamError, StreamPump};
pub use sink::MemorySink;
pub use types::{OutputChunk, StreamSource};
