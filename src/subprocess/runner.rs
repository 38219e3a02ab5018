use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use super::error::ProcessError;
use super::identity::ProcessIdentity;
use super::registry::LabelRegistry;
use super::streaming::{OutputChunk, PumpSummary, StreamPump, StreamSource};
use super::style::{visible_width, RESET};
use crate::config::MuxConfig;

/// Time a cancelled process group gets between SIGTERM and SIGKILL.
const KILL_GRACE_PERIOD: Duration = Duration::from_millis(100);

/// A fully described, not yet started process.
#[derive(Debug, Clone)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Set on top of the inherited environment
    pub env: HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
    pub cancel: Option<CancellationToken>,
}

impl ProcessCommand {
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Error(i32),
    Signal(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Success => Some(0),
            ExitStatus::Error(code) => Some(*code),
            ExitStatus::Signal(_) => None,
        }
    }
}

/// Why waiting for a child did not yield an exit status
enum WaitInterruption {
    Io(std::io::Error),
    Cancelled,
}

/// Starts processes and routes their output into the dispatcher channels.
///
/// Cloning is cheap; every clone feeds the same dispatchers and shares the
/// same label registry.
#[derive(Clone)]
pub struct ProcessSupervisor {
    registry: Arc<LabelRegistry>,
    stdout: UnboundedSender<OutputChunk>,
    stderr: UnboundedSender<OutputChunk>,
    config: Arc<MuxConfig>,
}

impl ProcessSupervisor {
    pub fn new(
        registry: Arc<LabelRegistry>,
        stdout: UnboundedSender<OutputChunk>,
        stderr: UnboundedSender<OutputChunk>,
        config: Arc<MuxConfig>,
    ) -> Self {
        Self {
            registry,
            stdout,
            stderr,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<LabelRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &MuxConfig {
        &self.config
    }

    /// Variables applied over the inherited environment, one entry per key.
    ///
    /// The command's own entries override inherited ones, and the forced
    /// escape-sequence flag is always present.
    pub fn environment_overrides(&self, command: &ProcessCommand) -> Vec<(String, String)> {
        let mut merged: BTreeMap<String, String> = command
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        merged.insert(self.config.force_sequences_var.clone(), "1".to_string());
        merged.into_iter().collect()
    }

    /// Run `command` to completion, streaming its output labelled with `alias`
    /// (or the executable name when `alias` is empty).
    ///
    /// Returns only after every chunk the process produced has been handed to
    /// the dispatchers.
    pub async fn run(&self, alias: &str, command: ProcessCommand) -> Result<(), ProcessError> {
        let command_line = command.command_line();
        if command.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(ProcessError::Cancelled {
                command: command_line,
            });
        }

        Self::log_command_start(&command);
        let start = Instant::now();

        let mut child = self
            .configure_command(&command)
            .spawn()
            .map_err(|e| Self::map_spawn_error(e, &command))?;

        let (stdout, stderr) = match Self::take_pipes(&mut child, &command_line) {
            Ok(pipes) => pipes,
            Err(e) => {
                if let Err(kill_err) = child.start_kill() {
                    tracing::debug!("Failed to kill {}: {}", command_line, kill_err);
                }
                return Err(e);
            }
        };

        let pid = child.id().unwrap_or_default();
        let identity = ProcessIdentity::new(alias, &command.program, pid);
        let color = self.registry.colors().allocate(pid);
        let label = format!("{}{}{}", color.fg(), identity.display_label, RESET);
        tracing::debug!("Started '{}' as {}", command_line, identity.display_label);

        let stdout_pump = tokio::spawn(
            StreamPump::new(
                stdout,
                StreamSource::Stdout,
                label.clone(),
                Arc::clone(&self.registry),
                self.stdout.clone(),
                self.config.flush_timeout,
            )
            .run(),
        );
        let stderr_pump = tokio::spawn(
            StreamPump::new(
                stderr,
                StreamSource::Stderr,
                label.clone(),
                Arc::clone(&self.registry),
                self.stderr.clone(),
                self.config.flush_timeout,
            )
            .run(),
        );

        let waited = Self::wait_for_exit(&mut child, command.cancel.as_ref()).await;
        let result = Self::interpret_exit(waited, &command_line);

        if let Err(error) = &result {
            if error.is_wait_failure() {
                self.report_wait_failure(&label, &command_line, error);
            }
        }

        let (stdout_summary, stderr_summary) = tokio::join!(stdout_pump, stderr_pump);
        Self::log_drain(&identity, StreamSource::Stdout, stdout_summary);
        Self::log_drain(&identity, StreamSource::Stderr, stderr_summary);
        Self::log_result(&identity, &result, start.elapsed());

        result
    }

    /// Build the tokio command with environment, directory and pipes.
    fn configure_command(&self, command: &ProcessCommand) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&command.program);

        // Own process group so cancellation can take down grandchildren too
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        cmd.args(&command.args);
        cmd.envs(self.environment_overrides(command));

        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }

    fn log_command_start(command: &ProcessCommand) {
        tracing::debug!("Executing subprocess: {}", command.command_line());

        if !command.env.is_empty() {
            tracing::trace!("Environment overrides: {:?}", command.env);
        }

        if let Some(ref dir) = command.working_dir {
            tracing::trace!("Working directory: {:?}", dir);
        }
    }

    fn map_spawn_error(error: std::io::Error, command: &ProcessCommand) -> ProcessError {
        if error.kind() == std::io::ErrorKind::NotFound {
            tracing::debug!("Command '{}' not found", command.program);
            ProcessError::CommandNotFound(command.program.clone())
        } else {
            tracing::error!(
                "Failed to spawn '{}': {:?} (kind: {:?})",
                command.program,
                error,
                error.kind()
            );
            ProcessError::SpawnFailed {
                command: command.command_line(),
                source: error,
            }
        }
    }

    /// Extract a stream from a child process, converting None to error
    fn extract_stream<T>(
        stream: Option<T>,
        command_line: &str,
        source: StreamSource,
    ) -> Result<T, ProcessError> {
        stream.ok_or_else(|| ProcessError::PipeUnavailable {
            command: command_line.to_string(),
            stream: source,
        })
    }

    fn take_pipes(
        child: &mut Child,
        command_line: &str,
    ) -> Result<(ChildStdout, ChildStderr), ProcessError> {
        let stdout = Self::extract_stream(child.stdout.take(), command_line, StreamSource::Stdout)?;
        let stderr = Self::extract_stream(child.stderr.take(), command_line, StreamSource::Stderr)?;
        Ok((stdout, stderr))
    }

    async fn wait_for_exit(
        child: &mut Child,
        cancel: Option<&CancellationToken>,
    ) -> Result<std::process::ExitStatus, WaitInterruption> {
        let Some(token) = cancel else {
            return child.wait().await.map_err(WaitInterruption::Io);
        };

        tokio::select! {
            status = child.wait() => status.map_err(WaitInterruption::Io),
            () = token.cancelled() => {
                Self::terminate(child).await;
                Err(WaitInterruption::Cancelled)
            }
        }
    }

    /// Stop the child and everything it started.
    async fn terminate(child: &mut Child) {
        #[cfg(unix)]
        {
            if let Some(pid) = child.id() {
                use nix::sys::signal::{self, Signal};
                use nix::unistd::Pid;

                // Negative pid addresses the whole process group
                let group = Pid::from_raw(-(pid as i32));
                if let Err(e) = signal::kill(group, Signal::SIGTERM) {
                    tracing::debug!("SIGTERM to process group {} failed: {}", pid, e);
                }

                tokio::time::sleep(KILL_GRACE_PERIOD).await;

                // Members that ignored SIGTERM may outlive the leader and hold the pipes
                match signal::kill(group, Signal::SIGKILL) {
                    Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
                    Err(e) => tracing::debug!("SIGKILL to process group {} failed: {}", pid, e),
                }
            }
        }

        if let Err(e) = child.kill().await {
            tracing::debug!("Kill after cancellation failed: {}", e);
        }
    }

    fn interpret_exit(
        waited: Result<std::process::ExitStatus, WaitInterruption>,
        command_line: &str,
    ) -> Result<(), ProcessError> {
        let command = command_line.to_string();
        match waited {
            Ok(status) => match Self::parse_exit_status(status) {
                ExitStatus::Success => Ok(()),
                ExitStatus::Error(code) => Err(ProcessError::NonZeroExit { command, code }),
                ExitStatus::Signal(signal) => Err(ProcessError::Signal { command, signal }),
            },
            Err(WaitInterruption::Io(source)) => Err(ProcessError::WaitFailed { command, source }),
            Err(WaitInterruption::Cancelled) => Err(ProcessError::Cancelled { command }),
        }
    }

    /// Convert process exit status to our ExitStatus enum
    fn parse_exit_status(status: std::process::ExitStatus) -> ExitStatus {
        if status.success() {
            ExitStatus::Success
        } else if let Some(code) = status.code() {
            ExitStatus::Error(code)
        } else {
            Self::parse_signal_status(status)
        }
    }

    /// Parse signal status on Unix systems
    #[cfg(unix)]
    fn parse_signal_status(status: std::process::ExitStatus) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            ExitStatus::Signal(signal)
        } else {
            ExitStatus::Error(1)
        }
    }

    #[cfg(not(unix))]
    fn parse_signal_status(_status: std::process::ExitStatus) -> ExitStatus {
        ExitStatus::Error(1)
    }

    /// Put a diagnostic line into the stderr stream on behalf of the process.
    fn report_wait_failure(&self, label: &str, command_line: &str, error: &ProcessError) {
        let detail = match error {
            ProcessError::WaitFailed { source, .. } => format!("wait failed: {source}"),
            ProcessError::Signal { signal, .. } => format!("terminated by signal {signal}"),
            ProcessError::Cancelled { .. } => "cancelled".to_string(),
            other => other.to_string(),
        };
        let padded = self.registry.widths().pad(label, visible_width(label));
        let payload = format!("{command_line}: {detail}\n").into_bytes();
        if let Some(chunk) = OutputChunk::new(padded, StreamSource::Stderr.delimiter(), payload) {
            if self.stderr.send(chunk).is_err() {
                tracing::debug!("Stderr dispatcher closed, dropping diagnostic for '{}'", command_line);
            }
        }
    }

    fn log_drain(
        identity: &ProcessIdentity,
        source: StreamSource,
        joined: Result<PumpSummary, JoinError>,
    ) {
        match joined {
            Ok(summary) => tracing::trace!(
                "{} {} drained: {:?}, {} chunks, {} bytes",
                identity.display_label,
                source,
                summary.outcome,
                summary.chunks,
                summary.bytes
            ),
            Err(e) => tracing::warn!(
                "{} pump of {} did not finish: {}",
                source,
                identity.display_label,
                e
            ),
        }
    }

    fn log_result(
        identity: &ProcessIdentity,
        result: &Result<(), ProcessError>,
        duration: Duration,
    ) {
        match result {
            Ok(()) => tracing::debug!(
                "{} completed successfully in {:?}",
                identity.display_label,
                duration
            ),
            Err(e) if e.is_wait_failure() => {
                tracing::warn!("{} ended abnormally after {:?}: {}", identity.display_label, duration, e)
            }
            Err(e) => tracing::debug!("{} failed in {:?}: {}", identity.display_label, duration, e),
        }
    }
}
