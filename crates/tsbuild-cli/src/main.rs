//! tsbuild CLI - Compile TypeScript and run build commands.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tsbuild_compile::{
    CompilerOptions, DefaultReporter, LongReporter, NullReporter, Reporter, SourceMapMode, Tsc,
    TypeScriptBuild,
};
use tsbuild_exec::{exec, ExecOptions};

mod config;
mod json_output;

use config::Config;
use json_output::ExecReport;

/// tsbuild - TypeScript build helpers
#[derive(Parser)]
#[command(name = "tsbuild")]
#[command(about = "Compile TypeScript and run build commands", long_about = None)]
struct Cli {
    /// Log filter, e.g. "debug" or "tsbuild=trace" (overrides RUST_LOG)
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile TypeScript sources to JavaScript and declarations
    Compile(CompileArgs),

    /// Run a shell command and print its output
    Exec(ExecArgs),
}

#[derive(Args)]
struct CompileArgs {
    /// Source glob; repeat for more, prefix with '!' to exclude
    #[arg(short, long = "src", required = true)]
    src: Vec<String>,

    /// Directory for compiled JavaScript
    #[arg(short, long)]
    out_dir: PathBuf,

    /// Directory for .d.ts files; declarations are skipped without it
    #[arg(short, long)]
    declaration_dir: Option<PathBuf>,

    /// Directory source globs are resolved against
    #[arg(long)]
    root: Option<PathBuf>,

    /// TypeScript compiler executable
    #[arg(long)]
    tsc: Option<String>,

    /// How diagnostics are printed
    #[arg(long, value_enum, default_value_t = ReporterKind::Long)]
    reporter: ReporterKind,

    /// Write .js.map files next to the output instead of inlining them
    #[arg(long)]
    external_source_maps: bool,
}

#[derive(Args)]
struct ExecArgs {
    /// Command line, run through the shell
    command: String,

    /// Working directory
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Extra environment variable as KEY=VALUE; may be repeated
    #[arg(short, long = "env", value_parser = parse_env)]
    env: Vec<(String, String)>,

    /// Kill the command after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Shell used to interpret the command
    #[arg(long)]
    shell: Option<String>,

    /// Maximum bytes captured per output stream
    #[arg(long)]
    max_buffer: Option<usize>,

    /// Print a JSON report instead of the raw output
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ReporterKind {
    Long,
    Default,
    Null,
}

impl ReporterKind {
    fn reporter(self) -> Arc<dyn Reporter> {
        match self {
            ReporterKind::Long => Arc::new(LongReporter),
            ReporterKind::Default => Arc::new(DefaultReporter),
            ReporterKind::Null => Arc::new(NullReporter),
        }
    }
}

fn parse_env(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{}`", raw)),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::default();

    // Logs go to stderr so command output on stdout stays clean
    let filter = match cli.log.as_deref() {
        Some(directives) => EnvFilter::try_new(directives)?,
        None => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.log_filter))?,
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let succeeded = match cli.command {
        Commands::Compile(args) => compile(&config, args).await,
        Commands::Exec(args) => run_exec(args).await?,
    };

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn compile(config: &Config, args: CompileArgs) -> bool {
    let tsc = Tsc::new(args.tsc.unwrap_or_else(|| config.tsc_path.clone()));
    let root = args.root.unwrap_or_else(|| config.project_root.clone());

    let mut options = CompilerOptions::default();
    if args.external_source_maps {
        options = options.with_source_maps(SourceMapMode::External);
    }

    let build = TypeScriptBuild::local(tsc, root)
        .with_reporter(args.reporter.reporter())
        .with_options(options);

    let started = Instant::now();
    match build
        .build(&args.src, &args.out_dir, args.declaration_dir.as_deref())
        .await
    {
        Ok(()) => {
            info!(
                out_dir = %args.out_dir.display(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Build finished"
            );
            true
        }
        Err(e) => {
            error!(error = %e, "Build failed");
            false
        }
    }
}

fn exec_options(args: &ExecArgs) -> ExecOptions {
    let mut options = ExecOptions::new();
    if let Some(cwd) = &args.cwd {
        options = options.with_cwd(cwd);
    }
    for (key, value) in &args.env {
        options = options.with_env(key, value);
    }
    if let Some(ms) = args.timeout_ms {
        options = options.with_timeout(Duration::from_millis(ms));
    }
    if let Some(shell) = &args.shell {
        options = options.with_shell(shell);
    }
    if let Some(bytes) = args.max_buffer {
        options = options.with_max_buffer(bytes);
    }
    options
}

async fn run_exec(args: ExecArgs) -> std::io::Result<bool> {
    let options = exec_options(&args);
    let started = Instant::now();
    let result = exec(&args.command, &options).await;
    let succeeded = result.is_ok();

    if args.json {
        ExecReport::new(&args.command, &result, started.elapsed().as_millis() as u64).emit()?;
        return Ok(succeeded);
    }

    match result {
        Ok(stdout) => print!("{}", stdout),
        Err(failure) => {
            print!("{}", failure.stdout);
            eprint!("{}", failure.stderr);
            error!(command = %failure.command, error = %failure.error, "Command failed");
        }
    }
    Ok(succeeded)
}
