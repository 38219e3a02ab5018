use super::streaming::StreamSource;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Empty command line")]
    EmptyCommand,

    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Failed to spawn {command}: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Can't capture {stream} of {command}")]
    PipeUnavailable { command: String, stream: StreamSource },

    #[error("Failed to wait for {command}: {source}")]
    WaitFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} terminated by signal {signal}")]
    Signal { command: String, signal: i32 },

    #[error("{command} was cancelled")]
    Cancelled { command: String },

    #[error("{command} exited with code {code}")]
    NonZeroExit { command: String, code: i32 },
}

impl ProcessError {
    /// The process could not be started, so it produced no output.
    pub fn is_setup_failure(&self) -> bool {
        matches!(
            self,
            ProcessError::EmptyCommand
                | ProcessError::CommandNotFound(_)
                | ProcessError::SpawnFailed { .. }
                | ProcessError::PipeUnavailable { .. }
        )
    }

    /// The process ran but its completion could not be observed normally.
    pub fn is_wait_failure(&self) -> bool {
        matches!(
            self,
            ProcessError::WaitFailed { .. }
                | ProcessError::Signal { .. }
                | ProcessError::Cancelled { .. }
        )
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessError::NonZeroExit { code, .. } => Some(*code),
            _ => None,
        }
    }
}
