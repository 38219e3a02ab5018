use thiserror::Error;

use crate::subprocess::ProcessError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("Invalid arguments: {0}")]
    Arguments(String),
}

pub type Result<T> = std::result::Result<T, Error>;
