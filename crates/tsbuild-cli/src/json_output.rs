//! JSON report for `tsbuild exec --json`.

use std::io::{self, Write};

use serde::Serialize;
use tsbuild_exec::ExecFailure;

/// Outcome of one command, as printed to stdout.
#[derive(Debug, Clone, Serialize)]
pub struct ExecReport {
    pub command: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed_ms: u64,
    pub finished_at: String,
}

impl ExecReport {
    pub fn new(command: &str, result: &Result<String, ExecFailure>, elapsed_ms: u64) -> Self {
        let finished_at = chrono::Utc::now().to_rfc3339();
        match result {
            Ok(stdout) => Self {
                command: command.to_string(),
                success: true,
                exit_code: Some(0),
                error: None,
                stdout: stdout.clone(),
                stderr: String::new(),
                elapsed_ms,
                finished_at,
            },
            Err(failure) => Self {
                command: command.to_string(),
                success: false,
                exit_code: failure.exit_code(),
                error: Some(failure.error.to_string()),
                stdout: failure.stdout.clone(),
                stderr: failure.stderr.clone(),
                elapsed_ms,
                finished_at,
            },
        }
    }

    /// Write this report as one JSON line to stdout.
    pub fn emit(&self) -> io::Result<()> {
        let json = serde_json::to_string(self)?;
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", json)?;
        stdout.flush()
    }
}
