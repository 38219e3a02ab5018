//! Multiplexer configuration.
//!
//! Values come from, in increasing priority: built-in defaults, a TOML file,
//! `PROCMUX_*` environment variables, and finally command-line flags.

use crate::error::{Error, Result};
use crate::subprocess::registry::DEFAULT_COLOR_SEED;
use crate::subprocess::streaming::DEFAULT_FLUSH_TIMEOUT;
use humantime_serde::re::humantime;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable every child receives so it keeps emitting colors into a pipe.
pub const DEFAULT_FORCE_SEQUENCES_VAR: &str = "FORCE_TERMINAL_SEQUENCES";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MuxConfig {
    /// Partial lines are shown after this long without new output
    #[serde(with = "humantime_serde")]
    pub flush_timeout: Duration,
    /// Seed of the label color generator
    pub color_seed: u64,
    /// Name of the variable set to `1` in every child environment
    pub force_sequences_var: String,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
            color_seed: DEFAULT_COLOR_SEED,
            force_sequences_var: DEFAULT_FORCE_SEQUENCES_VAR.to_string(),
        }
    }
}

impl MuxConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: MuxConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `PROCMUX_FLUSH_TIMEOUT` and `PROCMUX_COLOR_SEED` from the process environment.
    pub fn merge_env_vars(self) -> Result<Self> {
        self.merge_env_with(|key| std::env::var(key).ok())
    }

    pub fn merge_env_with<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(timeout) = lookup("PROCMUX_FLUSH_TIMEOUT") {
            self.flush_timeout = humantime::parse_duration(&timeout).map_err(|e| {
                Error::Config(format!("Invalid PROCMUX_FLUSH_TIMEOUT '{timeout}': {e}"))
            })?;
        }
        if let Some(seed) = lookup("PROCMUX_COLOR_SEED") {
            self.color_seed = seed.parse().map_err(|e| {
                Error::Config(format!("Invalid PROCMUX_COLOR_SEED '{seed}': {e}"))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }

    pub fn with_color_seed(mut self, seed: u64) -> Self {
        self.color_seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.flush_timeout.is_zero() {
            return Err(Error::Config("flush_timeout must be greater than zero".to_string()));
        }
        if self.force_sequences_var.is_empty() || self.force_sequences_var.contains('=') {
            return Err(Error::Config(format!(
                "Invalid force_sequences_var '{}'",
                self.force_sequences_var
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
