//! tsbuild core types
//!
//! This crate contains the pieces shared by every build step:
//! - `TaskSource`: a push-based sequence of chunks that ends or fails
//! - `complete_all`: the fan-in that turns many sources into one `Completion`
//! - `SourceError`: the failure signal a source can emit
//!
//! It has no knowledge of compilers or child processes.

pub mod aggregate;
pub mod error;
pub mod source;

// Re-export commonly used types
pub use aggregate::{complete_all, Completion};
pub use error::SourceError;
pub use source::{SourceSender, TaskSource};
