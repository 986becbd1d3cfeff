//! Command runner for tsbuild
//!
//! Runs an external command in a child process and resolves once it has
//! exited and both output streams are fully captured.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tsbuild_exec::{exec, ExecOptions};
//!
//! async fn version() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = ExecOptions::new()
//!         .with_cwd(".")
//!         .with_timeout(Duration::from_secs(10));
//!
//!     match exec("git describe --tags", &options).await {
//!         Ok(stdout) => println!("version: {}", stdout.trim()),
//!         Err(failure) => eprintln!("{}\n{}", failure, failure.stderr),
//!     }
//!     Ok(())
//! }
//! ```

mod error;
mod options;
mod runner;

pub use error::{ExecError, ExecFailure};
pub use options::{ExecOptions, DEFAULT_MAX_BUFFER};
pub use runner::{exec, exec_program};
