//! Application module
//!
//! This module contains application-level functionality including:
//! - Command-line settings
//! - Logging setup
//! - Fatal error reporting
//! - Multiplexer configuration assembly

pub mod config;
pub mod error_handling;
pub mod logging;
pub mod runtime;

// Re-export main application functions
pub use config::AppConfig;
pub use error_handling::handle_fatal_error;
pub use logging::init_logging;
pub use runtime::{initialize_app, resolve_mux_config};
