//! The TypeScript build step.
//!
//! A build compiles the matched sources once and then writes the result as
//! two independent branches, compiled code and type declarations, each a
//! [`TaskSource`] of written files. Both branches feed [`complete_all`], and
//! the build resolves when the aggregate does.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};
use tsbuild_core::{complete_all, SourceError, SourceSender, TaskSource};

use crate::compiler::{CompileOutput, CompileRequest, Compiler, EmittedFile, Tsc};
use crate::fs::{Destination, LocalDestination, LocalFs, SourceFs};
use crate::options::CompilerOptions;
use crate::reporter::{LongReporter, Reporter};

const BRANCH_CAPACITY: usize = 16;

/// One file written by a build branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub bytes: usize,
}

/// Compiles TypeScript sources with explicitly supplied capabilities.
///
/// # Example
///
/// ```rust,no_run
/// use std::path::Path;
/// use tsbuild_compile::{Tsc, TypeScriptBuild};
///
/// async fn build() -> Result<(), tsbuild_core::SourceError> {
///     TypeScriptBuild::local(Tsc::default(), ".")
///         .build(&["src/**/*.ts".to_string()], Path::new("dist"), Some(Path::new("typings")))
///         .await
/// }
/// ```
#[derive(Clone)]
pub struct TypeScriptBuild {
    compiler: Arc<dyn Compiler>,
    sources: Arc<dyn SourceFs>,
    destination: Arc<dyn Destination>,
    reporter: Arc<dyn Reporter>,
    options: CompilerOptions,
}

impl TypeScriptBuild {
    /// Create a build from its capabilities, with the long reporter and the
    /// default compiler options.
    pub fn new(
        compiler: Arc<dyn Compiler>,
        sources: Arc<dyn SourceFs>,
        destination: Arc<dyn Destination>,
    ) -> Self {
        Self {
            compiler,
            sources,
            destination,
            reporter: Arc::new(LongReporter),
            options: CompilerOptions::default(),
        }
    }

    /// A build reading sources below `root` and writing to the local disk.
    pub fn local(tsc: Tsc, root: impl Into<PathBuf>) -> Self {
        Self::new(
            Arc::new(tsc),
            Arc::new(LocalFs::new(root)),
            Arc::new(LocalDestination),
        )
    }

    /// Set the diagnostic reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Set the compiler options.
    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    /// Compile the sources matched by `patterns`.
    ///
    /// Code goes to `code_dir`. Declarations are emitted and written to
    /// `declaration_dir` only when it is given; otherwise that branch does
    /// not exist. Resolves once every branch has finished, or with the first
    /// branch error. Compiler errors fail the code branch without writing it.
    pub async fn build(
        &self,
        patterns: &[String],
        code_dir: &Path,
        declaration_dir: Option<&Path>,
    ) -> Result<(), SourceError> {
        let (code_tx, code_source) = TaskSource::channel("code", BRANCH_CAPACITY);
        let mut branches = vec![code_source];

        let declaration_branch = declaration_dir.map(|dir| {
            let (tx, source) = TaskSource::channel("declarations", BRANCH_CAPACITY);
            branches.push(source);
            (tx, dir.to_path_buf())
        });

        let completion = complete_all(branches);

        let job = BuildJob {
            build: self.clone(),
            patterns: patterns.to_vec(),
            code_dir: code_dir.to_path_buf(),
        };
        tokio::spawn(job.run(code_tx, declaration_branch));

        completion.await
    }
}

struct BuildJob {
    build: TypeScriptBuild,
    patterns: Vec<String>,
    code_dir: PathBuf,
}

impl BuildJob {
    async fn run(
        self,
        code_tx: SourceSender<WrittenFile>,
        declarations: Option<(SourceSender<WrittenFile>, PathBuf)>,
    ) {
        let output = match self.compile(declarations.is_some()).await {
            Ok(Some(output)) => output,
            // Nothing matched; dropping the senders ends both branches.
            Ok(None) => return,
            Err(e) => {
                code_tx.fail(e).await;
                return;
            }
        };

        let errors = output.error_count();
        if errors > 0 {
            let summary = output
                .diagnostics
                .iter()
                .find(|d| d.is_error())
                .map(|d| d.to_string())
                .unwrap_or_default();

            if !self.build.options.no_emit_on_error {
                self.write_branch(code_tx.clone(), &self.code_dir, output.code).await;
            }
            code_tx.fail(SourceError::Compile { errors, summary }).await;
            return;
        }

        let code = self.write_branch(code_tx, &self.code_dir, output.code);
        match declarations {
            Some((tx, dir)) => {
                tokio::join!(code, self.write_branch(tx, &dir, output.declarations));
            }
            None => code.await,
        }
    }

    /// Resolve sources and run the compiler. `None` when no file matched.
    async fn compile(&self, declarations: bool) -> Result<Option<CompileOutput>, SourceError> {
        let files = self.build.sources.resolve(&self.patterns).await?;
        if files.is_empty() {
            warn!(patterns = ?self.patterns, "No source files matched");
            return Ok(None);
        }

        let request = CompileRequest {
            files,
            root_dir: self.build.sources.base_dir(&self.patterns),
            options: self.build.options.clone(),
            declarations,
        };

        let mut output = self.build.compiler.compile(&request).await?;
        self.report(&mut output).await;

        info!(
            files = request.files.len(),
            errors = output.error_count(),
            code = output.code.len(),
            declarations = output.declarations.len(),
            "Compilation finished"
        );

        Ok(Some(output))
    }

    async fn report(&self, output: &mut CompileOutput) {
        let reporter = &self.build.reporter;

        if reporter.wants_excerpts() {
            let mut cache: HashMap<PathBuf, Option<String>> = HashMap::new();
            for diagnostic in &mut output.diagnostics {
                let Some(location) = &diagnostic.location else {
                    continue;
                };
                if !cache.contains_key(&location.file) {
                    let text = self.build.sources.read_to_string(&location.file).await.ok();
                    cache.insert(location.file.clone(), text);
                }
                let line = location.line as usize;
                diagnostic.excerpt = cache
                    .get(&location.file)
                    .and_then(|text| text.as_deref())
                    .and_then(|text| text.lines().nth(line.saturating_sub(1)))
                    .map(str::to_string);
            }
        }

        for diagnostic in &output.diagnostics {
            reporter.report(diagnostic);
        }
    }

    async fn write_branch(&self, tx: SourceSender<WrittenFile>, dir: &Path, files: Vec<EmittedFile>) {
        for file in files {
            let written = self
                .build
                .destination
                .write(dir, &file.relative_path, &file.contents)
                .await;

            match written {
                Ok(path) => {
                    let chunk = WrittenFile {
                        path,
                        bytes: file.contents.len(),
                    };
                    if tx.send(chunk).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    tx.fail(e).await;
                    return;
                }
            }
        }
    }
}
