//! Compiler abstraction and the `tsc` driver.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};
use tsbuild_exec::{exec_program, ExecError, ExecOptions};

use crate::diagnostic::{parse_tsc_output, Category, Diagnostic};
use crate::error::CompileError;
use crate::options::{CompilerOptions, SourceMapMode};

/// What to compile.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    /// Source files, already resolved from patterns.
    pub files: Vec<PathBuf>,

    /// Output paths mirror the layout of `files` below this directory.
    pub root_dir: PathBuf,

    pub options: CompilerOptions,

    /// Whether type-declaration files should be emitted.
    pub declarations: bool,
}

/// A file produced by the compiler, not yet written anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedFile {
    pub relative_path: PathBuf,
    pub contents: Vec<u8>,
}

/// Everything a compilation produced.
#[derive(Debug, Clone, Default)]
pub struct CompileOutput {
    /// JavaScript files, plus `.js.map` files in external source-map mode.
    pub code: Vec<EmittedFile>,

    /// `.d.ts` files. Empty unless declarations were requested.
    pub declarations: Vec<EmittedFile>,

    pub diagnostics: Vec<Diagnostic>,
}

impl CompileOutput {
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }
}

/// Turns source files into emitted files and diagnostics.
#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(&self, request: &CompileRequest) -> Result<CompileOutput, CompileError>;
}

/// Runs the TypeScript compiler as a child process.
///
/// Output goes to a temporary staging directory and is read back into
/// memory, so nothing reaches the real output directories until the build
/// decides to write it.
#[derive(Debug, Clone)]
pub struct Tsc {
    program: String,
    leading_args: Vec<String>,
    exec_options: ExecOptions,
}

impl Tsc {
    /// Use `program` as the compiler executable, e.g. `tsc` or a full path.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            exec_options: ExecOptions::default(),
        }
    }

    /// Run the compiler as a script of another program, e.g.
    /// `Tsc::via("node", "node_modules/typescript/bin/tsc")`.
    pub fn via(program: impl Into<String>, script: impl Into<String>) -> Self {
        let mut tsc = Self::new(program);
        tsc.leading_args.push(script.into());
        tsc
    }

    /// Set the process options used for each compiler run.
    pub fn with_exec_options(mut self, options: ExecOptions) -> Self {
        self.exec_options = options;
        self
    }

    fn arguments(
        &self,
        request: &CompileRequest,
        code_dir: &Path,
        declaration_dir: &Path,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.leading_args.iter().map(OsString::from).collect();
        args.extend(request.options.to_tsc_args().into_iter().map(OsString::from));

        args.push("--outDir".into());
        args.push(code_dir.as_os_str().to_owned());
        args.push("--rootDir".into());
        args.push(request.root_dir.as_os_str().to_owned());

        if request.declarations {
            args.push("--declaration".into());
            args.push("--declarationDir".into());
            args.push(declaration_dir.as_os_str().to_owned());
        }

        // Maps are moved out of the staging directory, so relative source
        // paths would point nowhere.
        if request.options.source_maps == SourceMapMode::External {
            args.push("--sourceRoot".into());
            args.push(absolute(&request.root_dir).into_os_string());
        }

        args.extend(request.files.iter().map(|f| f.as_os_str().to_owned()));
        args
    }
}

impl Default for Tsc {
    fn default() -> Self {
        Self::new("tsc")
    }
}

#[async_trait]
impl Compiler for Tsc {
    async fn compile(&self, request: &CompileRequest) -> Result<CompileOutput, CompileError> {
        let staging = tempfile::Builder::new()
            .prefix("tsbuild-")
            .tempdir()
            .map_err(CompileError::Staging)?;
        let code_dir = staging.path().join("code");
        let declaration_dir = staging.path().join("declarations");

        let args = self.arguments(request, &code_dir, &declaration_dir);

        info!(
            compiler = %self.program,
            files = request.files.len(),
            root_dir = %request.root_dir.display(),
            declarations = request.declarations,
            "Running TypeScript compiler"
        );

        let diagnostics = match exec_program(&self.program, &args, &self.exec_options).await {
            Ok(stdout) => parse_tsc_output(&stdout),
            Err(failure) => match failure.error {
                ExecError::Exit(code) => {
                    let mut diagnostics = parse_tsc_output(&failure.stdout);
                    if !diagnostics.iter().any(Diagnostic::is_error) {
                        let text: Vec<&str> = [failure.stdout.trim(), failure.stderr.trim()]
                            .into_iter()
                            .filter(|s| !s.is_empty())
                            .collect();
                        let message = if text.is_empty() {
                            format!("{} exited with code {}", self.program, code)
                        } else {
                            text.join("\n")
                        };
                        diagnostics.push(Diagnostic::global(Category::Error, 0, message));
                    }
                    diagnostics
                }
                _ => return Err(failure.into()),
            },
        };

        let code = read_tree(&code_dir).await?;
        let declarations = if request.declarations {
            read_tree(&declaration_dir).await?
        } else {
            Vec::new()
        };

        debug!(
            code = code.len(),
            declarations = declarations.len(),
            diagnostics = diagnostics.len(),
            "Compiler finished"
        );

        Ok(CompileOutput {
            code,
            declarations,
            diagnostics,
        })
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Read every file below `root`. A missing `root` means nothing was emitted.
async fn read_tree(root: &Path) -> Result<Vec<EmittedFile>, CompileError> {
    let read_error = |path: &Path, source: io::Error| CompileError::ReadOutput {
        path: path.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(read_error(&dir, e)),
        };

        while let Some(entry) = entries.next_entry().await.map_err(|e| read_error(&dir, e))? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(|e| read_error(&path, e))?;
            if file_type.is_dir() {
                pending.push(path);
                continue;
            }

            let contents = tokio::fs::read(&path).await.map_err(|e| read_error(&path, e))?;
            let relative_path = path.strip_prefix(root).unwrap_or(path.as_path()).to_path_buf();
            files.push(EmittedFile {
                relative_path,
                contents,
            });
        }
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(declarations: bool) -> CompileRequest {
        CompileRequest {
            files: vec![PathBuf::from("src/a.ts"), PathBuf::from("src/lib/b.ts")],
            root_dir: PathBuf::from("src"),
            options: CompilerOptions::default(),
            declarations,
        }
    }

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_arguments_without_declarations() {
        let tsc = Tsc::default();
        let args = strings(&tsc.arguments(&request(false), Path::new("/stage/code"), Path::new("/stage/decl")));

        let out = args.iter().position(|a| a == "--outDir").unwrap();
        assert_eq!(args[out + 1], "/stage/code");
        let root = args.iter().position(|a| a == "--rootDir").unwrap();
        assert_eq!(args[root + 1], "src");
        assert!(!args.contains(&"--declaration".to_string()));
        assert!(!args.contains(&"--declarationDir".to_string()));
        assert_eq!(&args[args.len() - 2..], ["src/a.ts", "src/lib/b.ts"]);
    }

    #[test]
    fn test_arguments_with_declarations() {
        let tsc = Tsc::default();
        let args = strings(&tsc.arguments(&request(true), Path::new("/stage/code"), Path::new("/stage/decl")));

        assert!(args.contains(&"--declaration".to_string()));
        let decl = args.iter().position(|a| a == "--declarationDir").unwrap();
        assert_eq!(args[decl + 1], "/stage/decl");
    }

    #[test]
    fn test_via_puts_script_first() {
        let tsc = Tsc::via("node", "node_modules/typescript/bin/tsc");
        let args = strings(&tsc.arguments(&request(false), Path::new("/c"), Path::new("/d")));
        assert_eq!(args[0], "node_modules/typescript/bin/tsc");
        assert_eq!(args[1], "--target");
    }

    #[test]
    fn test_external_maps_get_absolute_source_root() {
        let mut req = request(false);
        req.options = req.options.with_source_maps(SourceMapMode::External);

        let args = strings(&Tsc::default().arguments(&req, Path::new("/c"), Path::new("/d")));
        let idx = args.iter().position(|a| a == "--sourceRoot").unwrap();
        assert!(Path::new(&args[idx + 1]).is_absolute());
        assert!(args[idx + 1].ends_with("src"));
    }

    #[test]
    fn test_error_count() {
        let output = CompileOutput {
            diagnostics: vec![
                Diagnostic::global(Category::Error, 1, "a"),
                Diagnostic::global(Category::Warning, 2, "b"),
                Diagnostic::global(Category::Error, 3, "c"),
            ],
            ..Default::default()
        };
        assert_eq!(output.error_count(), 2);
    }

    #[cfg(unix)]
    mod fake_tsc {
        use super::*;

        /// Emits one code file (and a declaration when asked) into the
        /// directories named on the command line.
        const EMITTING: &str = r#"
while [ $# -gt 0 ]; do
  case "$1" in
    --outDir) out="$2"; shift ;;
    --declarationDir) decl="$2"; shift ;;
  esac
  shift
done
mkdir -p "$out/lib" && printf 'var b = 1;\n' > "$out/lib/b.js"
printf 'var a = 1;\n' > "$out/a.js"
if [ -n "$decl" ]; then mkdir -p "$decl" && printf 'export {};\n' > "$decl/a.d.ts"; fi
"#;

        const FAILING: &str = r#"
echo "src/a.ts(1,5): error TS2322: Type 'string' is not assignable to type 'number'."
exit 1
"#;

        const CRASHING: &str = r#"
echo "internal compiler crash" >&2
exit 3
"#;

        fn script(dir: &Path, body: &str) -> Tsc {
            let path = dir.join("tsc.sh");
            std::fs::write(&path, body).unwrap();
            Tsc::via("/bin/sh", path.to_string_lossy())
        }

        #[tokio::test]
        async fn test_reads_back_emitted_files() {
            let dir = tempfile::tempdir().unwrap();
            let tsc = script(dir.path(), EMITTING);

            let output = tsc.compile(&request(true)).await.unwrap();

            let code: Vec<&Path> = output.code.iter().map(|f| f.relative_path.as_path()).collect();
            assert_eq!(code, vec![Path::new("a.js"), Path::new("lib/b.js")]);
            assert_eq!(output.code[0].contents, b"var a = 1;\n");
            assert_eq!(output.declarations.len(), 1);
            assert_eq!(output.declarations[0].relative_path, PathBuf::from("a.d.ts"));
            assert!(output.diagnostics.is_empty());
        }

        #[tokio::test]
        async fn test_declarations_ignored_when_not_requested() {
            let dir = tempfile::tempdir().unwrap();
            let tsc = script(dir.path(), EMITTING);

            let output = tsc.compile(&request(false)).await.unwrap();
            assert_eq!(output.code.len(), 2);
            assert!(output.declarations.is_empty());
        }

        #[tokio::test]
        async fn test_exit_with_diagnostics() {
            let dir = tempfile::tempdir().unwrap();
            let tsc = script(dir.path(), FAILING);

            let output = tsc.compile(&request(false)).await.unwrap();
            assert!(output.code.is_empty());
            assert_eq!(output.error_count(), 1);
            assert_eq!(output.diagnostics[0].code, 2322);
        }

        #[tokio::test]
        async fn test_exit_without_diagnostics_is_synthesized() {
            let dir = tempfile::tempdir().unwrap();
            let tsc = script(dir.path(), CRASHING);

            let output = tsc.compile(&request(false)).await.unwrap();
            assert_eq!(output.error_count(), 1);
            assert_eq!(output.diagnostics[0].message, "internal compiler crash");
        }

        #[tokio::test]
        async fn test_missing_compiler_is_exec_error() {
            let tsc = Tsc::new("/nonexistent/tsbuild/tsc");
            let result = tsc.compile(&request(false)).await;
            assert!(matches!(result, Err(CompileError::Exec(_))));
        }
    }
}
