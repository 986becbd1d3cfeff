//! Options for running a command.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

/// Default limit for each captured output stream (1 MiB).
pub const DEFAULT_MAX_BUFFER: usize = 1024 * 1024;

/// How to run a command.
///
/// Every field maps onto the child-process primitive; nothing here changes
/// what the runner does beyond configuring the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecOptions {
    /// Working directory for the child. Inherited when unset.
    pub cwd: Option<PathBuf>,

    /// Extra environment variables.
    pub env: BTreeMap<String, String>,

    /// Start from an empty environment instead of inheriting ours.
    pub clear_env: bool,

    /// Kill the child after this many milliseconds. Zero or unset disables it.
    pub timeout_ms: Option<u64>,

    /// Shell used by `exec`. Defaults to `/bin/sh` (`cmd.exe` on Windows).
    pub shell: Option<String>,

    /// Largest number of bytes captured per output stream.
    pub max_buffer: usize,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            cwd: None,
            env: BTreeMap::new(),
            clear_env: false,
            timeout_ms: None,
            shell: None,
            max_buffer: DEFAULT_MAX_BUFFER,
        }
    }
}

impl ExecOptions {
    /// Options that inherit everything from the current process.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the working directory.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Do not inherit the parent environment.
    pub fn with_clear_env(mut self, clear: bool) -> Self {
        self.clear_env = clear;
        self
    }

    /// Set a timeout, rounded up to whole milliseconds. A zero duration
    /// disables it.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let ms = timeout.as_nanos().div_ceil(1_000_000);
        self.timeout_ms = Some(u64::try_from(ms).unwrap_or(u64::MAX));
        self
    }

    /// Set the shell used by `exec`.
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = Some(shell.into());
        self
    }

    /// Set the per-stream capture limit.
    pub fn with_max_buffer(mut self, bytes: usize) -> Self {
        self.max_buffer = bytes;
        self
    }

    /// Effective timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Shell program and the flag that makes it run a command string.
    pub(crate) fn shell_invocation(&self) -> (&str, &'static str) {
        let flag = if cfg!(windows) { "/C" } else { "-c" };
        match &self.shell {
            Some(shell) => (shell.as_str(), flag),
            None if cfg!(windows) => ("cmd.exe", flag),
            None => ("/bin/sh", flag),
        }
    }

    /// Apply the process-level settings to `cmd`.
    pub(crate) fn apply(&self, cmd: &mut Command) {
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        if self.clear_env {
            cmd.env_clear();
        }
        cmd.envs(&self.env);
    }
}
