//! Compiler errors.

use std::path::PathBuf;

use thiserror::Error;
use tsbuild_core::SourceError;
use tsbuild_exec::ExecFailure;

/// Failure to run the compiler at all. Diagnostics are not errors here; they
/// come back inside the compile output.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The compiler process could not be run to completion.
    #[error("Failed to run compiler: {0}")]
    Exec(#[from] ExecFailure),

    /// Temporary output directory could not be created.
    #[error("Failed to create staging directory: {0}")]
    Staging(#[source] std::io::Error),

    /// An emitted file could not be read back.
    #[error("Failed to read emitted file '{}': {source}", path.display())]
    ReadOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<CompileError> for SourceError {
    fn from(e: CompileError) -> Self {
        match e {
            CompileError::ReadOutput { path, source } => SourceError::Io { path, source },
            other => SourceError::Other(other.to_string()),
        }
    }
}
