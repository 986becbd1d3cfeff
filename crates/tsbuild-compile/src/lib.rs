//! TypeScript compilation step for tsbuild
//!
//! Compiles a set of TypeScript sources to CommonJS/ES5 JavaScript with
//! source maps and, when asked, writes type declarations alongside. The
//! file system, the output destination and the compiler itself are passed in
//! explicitly, so builds can run against the local disk or against fakes.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use tsbuild_compile::{DefaultReporter, Tsc, TypeScriptBuild};
//!
//! async fn build() -> Result<(), Box<dyn std::error::Error>> {
//!     let build = TypeScriptBuild::local(Tsc::new("node_modules/.bin/tsc"), ".")
//!         .with_reporter(Arc::new(DefaultReporter));
//!
//!     build
//!         .build(&["src/**/*.ts".to_string()], Path::new("dist"), None)
//!         .await?;
//!     Ok(())
//! }
//! ```

mod build;
mod compiler;
mod diagnostic;
mod error;
mod fs;
mod options;
mod reporter;

pub use build::{TypeScriptBuild, WrittenFile};
pub use compiler::{CompileOutput, CompileRequest, Compiler, EmittedFile, Tsc};
pub use diagnostic::{parse_tsc_output, Category, Diagnostic, Location};
pub use error::CompileError;
pub use fs::{common_ancestor, expand_braces, glob_base, Destination, LocalDestination, LocalFs, SourceFs};
pub use options::{CompilerOptions, ModuleKind, ScriptTarget, SourceMapMode};
pub use reporter::{DefaultReporter, LongReporter, NullReporter, Reporter};
