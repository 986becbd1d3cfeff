//! Task source errors.

use std::path::PathBuf;

use thiserror::Error;

/// Failure signal emitted by a task source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Reading or writing a file failed.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The compiler reported errors, so nothing was emitted.
    #[error("Compilation failed with {errors} error(s): {summary}")]
    Compile { errors: usize, summary: String },

    /// The task driving the sources went away before reporting a result.
    #[error("Task sources were abandoned before completing")]
    Aborted,

    /// Any other producer failure.
    #[error("{0}")]
    Other(String),
}

impl SourceError {
    /// Build an `Io` error for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build an `Other` error from any message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}
