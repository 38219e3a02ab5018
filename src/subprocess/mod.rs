pub mod builder;
pub mod error;
pub mod identity;
pub mod registry;
pub mod runner;
pub mod streaming;
pub mod style;


pub use builder::ProcessCommandBuilder;
pub use error::ProcessError;
pub use identity::ProcessIdentity;
pub use registry::{ColorAllocator, LabelRegistry, LabelWidthTracker, Rgb};
pub use runner::{ExitStatus, ProcessCommand, ProcessSupervisor};
pub use streaming::{DispatchSnapshot, MemorySink, OutputChunk, OutputDispatcher, StreamSource};

use std::sync::Arc;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::MuxConfig;

/// What the two dispatchers wrote before shutting down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub stdout: DispatchSnapshot,
    pub stderr: DispatchSnapshot,
}

impl ShutdownReport {
    pub fn write_failures(&self) -> u64 {
        self.stdout.write_failures + self.stderr.write_failures
    }
}

/// Runs any number of processes concurrently with labelled, aligned output.
///
/// Owns one dispatcher per stream class. Every process started through the
/// multiplexer (or a [`ProcessSupervisor`] obtained from it) writes through
/// those dispatchers.
pub struct Multiplexer {
    supervisor: ProcessSupervisor,
    stdout_task: JoinHandle<DispatchSnapshot>,
    stderr_task: JoinHandle<DispatchSnapshot>,
}

impl Multiplexer {
    /// Multiplex onto the process's own stdout and stderr.
    pub fn start(config: MuxConfig) -> Self {
        Self::with_sinks(config, tokio::io::stdout(), tokio::io::stderr())
    }

    pub fn with_sinks<O, E>(config: MuxConfig, stdout: O, stderr: E) -> Self
    where
        O: AsyncWrite + Send + Unpin + 'static,
        E: AsyncWrite + Send + Unpin + 'static,
    {
        let (stdout_tx, stdout_rx) = mpsc::unbounded_channel();
        let (stderr_tx, stderr_rx) = mpsc::unbounded_channel();

        let stdout_task = OutputDispatcher::new(StreamSource::Stdout, stdout).spawn(stdout_rx);
        let stderr_task = OutputDispatcher::new(StreamSource::Stderr, stderr).spawn(stderr_rx);

        let registry = Arc::new(LabelRegistry::new(config.color_seed));
        tracing::debug!(
            "Multiplexer started (flush timeout {:?}, color seed {})",
            config.flush_timeout,
            config.color_seed
        );

        Self {
            supervisor: ProcessSupervisor::new(registry, stdout_tx, stderr_tx, Arc::new(config)),
            stdout_task,
            stderr_task,
        }
    }

    /// Handle for running processes from other tasks.
    ///
    /// Dispatchers stay alive while any clone is held, so drop clones before
    /// calling [`Multiplexer::shutdown`].
    pub fn supervisor(&self) -> ProcessSupervisor {
        self.supervisor.clone()
    }

    /// Run a whitespace-separated command line.
    pub async fn run_command_line(
        &self,
        cancel: &CancellationToken,
        alias: &str,
        line: &str,
    ) -> Result<(), ProcessError> {
        let builder =
            ProcessCommandBuilder::from_command_line(line).ok_or(ProcessError::EmptyCommand)?;
        self.run(alias, builder.cancel_on(cancel.clone()).build())
            .await
    }

    pub async fn run_command<I, S>(
        &self,
        cancel: &CancellationToken,
        alias: &str,
        program: &str,
        args: I,
    ) -> Result<(), ProcessError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if program.trim().is_empty() {
            return Err(ProcessError::EmptyCommand);
        }
        let command = ProcessCommandBuilder::new(program)
            .args(args)
            .cancel_on(cancel.clone())
            .build();
        self.run(alias, command).await
    }

    pub async fn run(&self, alias: &str, command: ProcessCommand) -> Result<(), ProcessError> {
        self.supervisor.run(alias, command).await
    }

    /// Close the dispatcher channels and wait for everything queued to be
    /// written.
    pub async fn shutdown(self) -> ShutdownReport {
        let Self {
            supervisor,
            stdout_task,
            stderr_task,
        } = self;
        drop(supervisor);

        let (stdout, stderr) = tokio::join!(stdout_task, stderr_task);
        let report = ShutdownReport {
            stdout: Self::joined_snapshot(StreamSource::Stdout, stdout),
            stderr: Self::joined_snapshot(StreamSource::Stderr, stderr),
        };
        tracing::debug!("Multiplexer shut down: {:?}", report);
        report
    }

    fn joined_snapshot(
        source: StreamSource,
        joined: Result<DispatchSnapshot, tokio::task::JoinError>,
    ) -> DispatchSnapshot {
        joined.unwrap_or_else(|e| {
            tracing::warn!("{} dispatcher did not finish: {}", source, e);
            DispatchSnapshot::default()
        })
    }
}
