//! Runtime initialization and setup

use crate::app::{config::AppConfig, logging::init_logging};
use crate::config::MuxConfig;
use anyhow::{Context, Result};
use tracing::debug;

/// Initialize logging and assemble the multiplexer configuration
pub fn initialize_app(config: &AppConfig) -> Result<MuxConfig> {
    // Initialize logging first
    init_logging(config);
    resolve_mux_config(config)
}

/// Defaults, then the config file, then `PROCMUX_*` variables, then flags.
pub fn resolve_mux_config(config: &AppConfig) -> Result<MuxConfig> {
    let mux = match &config.config_path {
        Some(path) => MuxConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => MuxConfig::default(),
    };

    let mut mux = mux
        .merge_env_vars()
        .context("Invalid PROCMUX_* environment variable")?;

    if let Some(timeout) = config.flush_timeout {
        mux = mux.with_flush_timeout(timeout);
        mux.validate()?;
    }

    debug!("Effective configuration: {:?}", mux);
    Ok(mux)
}
