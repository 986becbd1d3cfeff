//! Error types for the command runner.

use std::time::Duration;

use thiserror::Error;

/// Why a command did not complete successfully.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The child process could not be started.
    #[error("Failed to spawn process: {0}")]
    Spawn(#[source] std::io::Error),

    /// Waiting on or reading from the child failed.
    #[error("I/O error while running process: {0}")]
    Io(#[from] std::io::Error),

    /// The process exited with a non-zero status.
    #[error("Process exited with code {0}")]
    Exit(i32),

    /// The process was terminated by a signal.
    #[error("Process terminated by signal {0}")]
    Signal(i32),

    /// The process ran longer than the configured timeout and was killed.
    #[error("Process timed out after {0:?}")]
    Timeout(Duration),

    /// An output stream grew past the configured limit and the process was killed.
    #[error("{stream} exceeded the maximum buffer size of {limit} bytes")]
    MaxBuffer { stream: &'static str, limit: usize },
}

/// A failed command, with everything it wrote before it stopped.
#[derive(Debug, Error)]
#[error("Command `{command}` failed: {error}")]
pub struct ExecFailure {
    /// The command as it was requested.
    pub command: String,

    /// The underlying failure.
    #[source]
    pub error: ExecError,

    /// Captured standard output.
    pub stdout: String,

    /// Captured standard error.
    pub stderr: String,
}

impl ExecFailure {
    pub(crate) fn new(
        command: impl Into<String>,
        error: ExecError,
        stdout: &[u8],
        stderr: &[u8],
    ) -> Self {
        Self {
            command: command.into(),
            error,
            stdout: String::from_utf8_lossy(stdout).into_owned(),
            stderr: String::from_utf8_lossy(stderr).into_owned(),
        }
    }

    /// Exit code, if the process got far enough to exit with one.
    pub fn exit_code(&self) -> Option<i32> {
        match self.error {
            ExecError::Exit(code) => Some(code),
            _ => None,
        }
    }
}
