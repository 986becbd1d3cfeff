//! Child process execution.
//!
//! Both entry points spawn the process with piped output, read stdout and
//! stderr concurrently into bounded buffers, and wait for the exit status,
//! a timeout, or a buffer overflow, whichever comes first.

use std::ffi::{OsStr, OsString};
use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{ExecError, ExecFailure};
use crate::options::ExecOptions;

/// Run `command` through the shell.
///
/// Resolves with the captured stdout when the process exits with status 0.
/// Any other outcome is an `ExecFailure` carrying the cause and whatever was
/// captured on both streams.
pub async fn exec(command: &str, options: &ExecOptions) -> Result<String, ExecFailure> {
    let (shell, flag) = options.shell_invocation();

    let mut cmd = Command::new(shell);
    cmd.arg(flag).arg(command);

    run(cmd, command.to_string(), options).await
}

/// Run `program` directly with `args`, without a shell.
///
/// Same contract as [`exec`]; arguments are passed through untouched, so no
/// quoting is needed.
pub async fn exec_program<I, S>(
    program: &str,
    args: I,
    options: &ExecOptions,
) -> Result<String, ExecFailure>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();

    let mut command_line = program.to_string();
    for arg in &args {
        command_line.push(' ');
        command_line.push_str(&arg.to_string_lossy());
    }

    let mut cmd = Command::new(program);
    cmd.args(&args);

    run(cmd, command_line, options).await
}

/// What stopped the wait.
enum Halt {
    Exited(io::Result<ExitStatus>),
    Overflow,
    TimedOut,
}

/// Bytes read from one output stream.
struct Capture {
    bytes: Vec<u8>,
    overflowed: bool,
}

async fn run(mut cmd: Command, command_line: String, options: &ExecOptions) -> Result<String, ExecFailure> {
    options.apply(&mut cmd);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(command = %command_line, cwd = ?options.cwd, "Spawning process");
    let started = Instant::now();

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(command = %command_line, error = %e, "Failed to spawn process");
            return Err(ExecFailure::new(command_line, ExecError::Spawn(e), &[], &[]));
        }
    };

    let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
        (Some(stdout), Some(stderr)) => (stdout, stderr),
        _ => {
            let e = io::Error::other("child output was not captured");
            return Err(ExecFailure::new(command_line, ExecError::Io(e), &[], &[]));
        }
    };

    let overflow = Arc::new(Notify::new());
    let stdout_task = tokio::spawn(read_capped(stdout, options.max_buffer, overflow.clone()));
    let stderr_task = tokio::spawn(read_capped(stderr, options.max_buffer, overflow.clone()));

    let timeout = options.timeout();
    let halt = tokio::select! {
        status = child.wait() => Halt::Exited(status),
        _ = overflow.notified() => Halt::Overflow,
        _ = deadline(timeout) => Halt::TimedOut,
    };

    let mut error = match halt {
        Halt::Exited(Ok(status)) if status.success() => None,
        Halt::Exited(Ok(status)) => Some(status_error(status)),
        Halt::Exited(Err(e)) => Some(ExecError::Io(e)),
        Halt::Overflow => {
            child.kill().await.ok();
            None
        }
        Halt::TimedOut => {
            child.kill().await.ok();
            Some(ExecError::Timeout(timeout.unwrap_or_default()))
        }
    };

    let (stdout, stderr) = match (collect(stdout_task).await, collect(stderr_task).await) {
        (Ok(stdout), Ok(stderr)) => (stdout, stderr),
        (Err(e), _) | (_, Err(e)) => return Err(ExecFailure::new(command_line, e, &[], &[])),
    };

    // A stream can overflow just as the process exits; the overflow still wins.
    if !matches!(error, Some(ExecError::Timeout(_))) {
        let overflowed = if stdout.overflowed {
            Some("stdout")
        } else if stderr.overflowed {
            Some("stderr")
        } else {
            None
        };
        if let Some(stream) = overflowed {
            error = Some(ExecError::MaxBuffer {
                stream,
                limit: options.max_buffer,
            });
        }
    }

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match error {
        None => {
            info!(command = %command_line, elapsed_ms = elapsed_ms, "Process completed");
            Ok(String::from_utf8_lossy(&stdout.bytes).into_owned())
        }
        Some(error) => {
            info!(command = %command_line, elapsed_ms = elapsed_ms, error = %error, "Process failed");
            Err(ExecFailure::new(command_line, error, &stdout.bytes, &stderr.bytes))
        }
    }
}

/// Read `reader` to EOF, keeping at most `limit` bytes.
///
/// Stops reading and signals `overflow` as soon as the limit is crossed.
async fn read_capped<R>(mut reader: R, limit: usize, overflow: Arc<Notify>) -> io::Result<Capture>
where
    R: AsyncRead + Unpin,
{
    let mut bytes = Vec::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(Capture {
                bytes,
                overflowed: false,
            });
        }

        if bytes.len() + n > limit {
            let room = limit - bytes.len();
            bytes.extend_from_slice(&buf[..room]);
            overflow.notify_one();
            return Ok(Capture {
                bytes,
                overflowed: true,
            });
        }

        bytes.extend_from_slice(&buf[..n]);
    }
}

async fn collect(task: JoinHandle<io::Result<Capture>>) -> Result<Capture, ExecError> {
    match task.await {
        Ok(Ok(capture)) => Ok(capture),
        Ok(Err(e)) => Err(ExecError::Io(e)),
        Err(e) => Err(ExecError::Io(io::Error::other(e))),
    }
}

async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

fn status_error(status: ExitStatus) -> ExecError {
    if let Some(code) = status.code() {
        return ExecError::Exit(code);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ExecError::Signal(signal);
        }
    }

    ExecError::Exit(-1)
}
