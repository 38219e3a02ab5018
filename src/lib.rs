//! # procmux
//!
//! Run several commands at once and interleave their output on one terminal.
//! Every line is prefixed with a colored, column-aligned label naming the
//! process it came from, and stderr lines get a red delimiter.
//!
//! ## Usage
//!
//! ```bash
//! procmux -n api -n web "cargo run" "npm run dev"
//! ```
//!
//! ## Modules
//!
//! - `app` - Logging setup, CLI-level settings and fatal error handling
//! - `config` - Multiplexer configuration (TOML file, environment, flags)
//! - `error` - Crate-level error type
//! - `subprocess` - Process supervision, line assembly and output dispatch
pub mod app;
pub mod config;
pub mod error;
pub mod subprocess;

pub use config::MuxConfig;
pub use error::{Error, Result};
pub use subprocess::{Multiplexer, ProcessCommandBuilder, ProcessError, ShutdownReport};
