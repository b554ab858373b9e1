//! Subprocess execution.
//!
//! The runner spawns argument vectors (never shell strings), enforces a
//! timeout by killing the children, and captures stderr for diagnostics. It
//! never retries; that is the job of the retry controller.

use super::invocation::{CommandInvocation, ProcessSpec};
use crate::errors::ReconError;
use async_trait::async_trait;
use std::fs::File;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Default number of stderr bytes kept for diagnostics.
pub const DEFAULT_STDERR_LIMIT: usize = 2048;

/// Why a single command execution failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunFailure {
    /// The timeout elapsed and the children were killed.
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// A process exited unsuccessfully.
    #[error("{program} exited with {}: {stderr}", .code.map_or_else(|| "signal".to_string(), |c| format!("status {c}")))]
    NonZeroExit {
        /// The failing program.
        program: String,
        /// Exit code, `None` when killed by a signal.
        code: Option<i32>,
        /// Tail of the captured stderr.
        stderr: String,
    },

    /// A process could not be started.
    #[error("failed to spawn {program}: {reason}")]
    Spawn {
        /// The program that could not be started.
        program: String,
        /// The OS error.
        reason: String,
    },
}

impl RunFailure {
    fn spawn(program: &str, err: impl std::fmt::Display) -> Self {
        Self::Spawn {
            program: program.to_string(),
            reason: err.to_string(),
        }
    }

    /// Returns true if throttling and retrying could help.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::NonZeroExit { .. })
    }

    /// Converts into the library error for `stage`.
    #[must_use]
    pub fn into_error(self, stage: &str) -> ReconError {
        match self {
            Self::Timeout(timeout) => ReconError::StageTimeout {
                stage: stage.to_string(),
                timeout_secs: timeout.as_secs(),
            },
            Self::NonZeroExit { code, stderr, .. } => ReconError::StageNonZeroExit {
                stage: stage.to_string(),
                code,
                stderr,
            },
            Self::Spawn { program, reason } => ReconError::StageSpawn {
                stage: stage.to_string(),
                reason: format!("{program}: {reason}"),
            },
        }
    }
}

/// Executes command invocations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `invocation` to completion or until `timeout` elapses.
    async fn run(&self, invocation: &CommandInvocation, timeout: Duration) -> Result<(), RunFailure>;
}

/// Runs invocations as real OS processes through `tokio::process`.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    stderr_limit: usize,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            stderr_limit: DEFAULT_STDERR_LIMIT,
        }
    }
}

impl ProcessRunner {
    /// Creates a runner with the default stderr limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many trailing stderr bytes are kept.
    #[must_use]
    pub fn with_stderr_limit(mut self, limit: usize) -> Self {
        self.stderr_limit = limit;
        self
    }

    fn command(spec: &ProcessSpec, invocation: &CommandInvocation) -> Command {
        let mut command = Command::new(&spec.program);
        command.args(spec.argv());
        if let Some(ref dir) = invocation.current_dir {
            command.current_dir(dir);
        }
        command.stderr(Stdio::piped()).kill_on_drop(true);
        command
    }

    fn stdin(invocation: &CommandInvocation) -> Result<Stdio, RunFailure> {
        match invocation.stdin_from {
            Some(ref path) => File::open(path)
                .map(Stdio::from)
                .map_err(|e| RunFailure::spawn(&invocation.head.program, format!("{}: {e}", path.display()))),
            None => Ok(Stdio::null()),
        }
    }

    fn stdout(invocation: &CommandInvocation, program: &str) -> Result<Stdio, RunFailure> {
        match invocation.stdout_to {
            Some(ref path) => File::create(path)
                .map(Stdio::from)
                .map_err(|e| RunFailure::spawn(program, format!("{}: {e}", path.display()))),
            None => Ok(Stdio::null()),
        }
    }

    fn spawn(mut command: Command, program: &str) -> Result<Child, RunFailure> {
        command.spawn().map_err(|e| RunFailure::spawn(program, e))
    }

    fn check(&self, program: &str, status: ExitStatus, stderr: &[u8]) -> Result<(), RunFailure> {
        if status.success() {
            return Ok(());
        }
        Err(RunFailure::NonZeroExit {
            program: program.to_string(),
            code: status.code(),
            stderr: tail_text(stderr, self.stderr_limit),
        })
    }

    async fn run_single(&self, invocation: &CommandInvocation) -> Result<(), RunFailure> {
        let program = invocation.head.program.as_str();
        let mut command = Self::command(&invocation.head, invocation);
        command
            .stdin(Self::stdin(invocation)?)
            .stdout(Self::stdout(invocation, program)?);

        let child = Self::spawn(command, program)?;
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| RunFailure::spawn(program, e))?;
        self.check(program, output.status, &output.stderr)
    }

    async fn run_piped(
        &self,
        invocation: &CommandInvocation,
        tail: &ProcessSpec,
    ) -> Result<(), RunFailure> {
        let head_program = invocation.head.program.as_str();
        let mut head_command = Self::command(&invocation.head, invocation);
        head_command
            .stdin(Self::stdin(invocation)?)
            .stdout(Stdio::piped());
        let mut head = Self::spawn(head_command, head_program)?;

        let head_stdout = head
            .stdout
            .take()
            .ok_or_else(|| RunFailure::spawn(head_program, "stdout was not captured"))?;
        let tail_stdin: Stdio = head_stdout
            .try_into()
            .map_err(|e| RunFailure::spawn(&tail.program, e))?;

        let mut tail_command = Self::command(tail, invocation);
        tail_command
            .stdin(tail_stdin)
            .stdout(Self::stdout(invocation, &tail.program)?);
        // On error `head` is dropped here and killed.
        let tail_child = Self::spawn(tail_command, &tail.program)?;

        let (head_output, tail_output) =
            tokio::join!(head.wait_with_output(), tail_child.wait_with_output());
        let head_output = head_output.map_err(|e| RunFailure::spawn(head_program, e))?;
        let tail_output = tail_output.map_err(|e| RunFailure::spawn(&tail.program, e))?;

        self.check(head_program, head_output.status, &head_output.stderr)?;
        self.check(&tail.program, tail_output.status, &tail_output.stderr)
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &CommandInvocation, timeout: Duration) -> Result<(), RunFailure> {
        debug!(
            step = %invocation.step,
            command = %invocation,
            timeout_secs = timeout.as_secs(),
            "Spawning command"
        );

        let execution = async {
            match invocation.pipe_to {
                Some(ref tail) => self.run_piped(invocation, tail).await,
                None => self.run_single(invocation).await,
            }
        };

        // Dropping the execution future drops the children, which kills them.
        let result = match tokio::time::timeout(timeout, execution).await {
            Ok(result) => result,
            Err(_) => Err(RunFailure::Timeout(timeout)),
        };

        if let Err(ref failure) = result {
            warn!(step = %invocation.step, error = %failure, "Command failed");
        }
        result
    }
}

/// Returns at most the last `limit` bytes of `bytes` as trimmed text.
fn tail_text(bytes: &[u8], limit: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    if text.len() <= limit {
        return text.to_string();
    }
    let mut start = text.len() - limit;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}
