//! Application configuration
//!
//! Settings that only exist at the command line, as opposed to the
//! multiplexer's own [`MuxConfig`](crate::config::MuxConfig).

use std::path::PathBuf;
use std::time::Duration;

/// Application configuration structure
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Verbosity level for logging
    pub verbose: u8,
    /// TOML file with multiplexer settings
    pub config_path: Option<PathBuf>,
    /// Overrides the configured flush timeout
    pub flush_timeout: Option<Duration>,
}

impl AppConfig {
    pub fn new(verbose: u8) -> Self {
        Self {
            verbose,
            ..Self::default()
        }
    }

    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn with_flush_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.flush_timeout = timeout;
        self
    }

    /// Get the log level string based on verbosity
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_by_verbosity() {
        assert_eq!(AppConfig::new(0).log_level(), "warn");
        assert_eq!(AppConfig::new(1).log_level(), "debug");
        assert_eq!(AppConfig::new(2).log_level(), "trace");
        assert_eq!(AppConfig::new(5).log_level(), "trace");
    }

    #[test]
    fn test_builder_methods() {
        let config = AppConfig::new(1)
            .with_config_path(Some(PathBuf::from("procmux.toml")))
            .with_flush_timeout(Some(Duration::from_millis(250)));
        assert_eq!(config.config_path, Some(PathBuf::from("procmux.toml")));
        assert_eq!(config.flush_timeout, Some(Duration::from_millis(250)));
    }
}
