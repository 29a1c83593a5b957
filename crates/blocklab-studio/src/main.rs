//! blocklab command line.
//!
//! Provides the `blocklab` binary: `languages` lists the output languages,
//! `render` prints a block program's source text, and `run` executes a
//! program (or a plain source file) through the same [`Studio`] facade an
//! interactive shell would use.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use blocklab_codegen::EmitterRegistry;
use blocklab_core::{LanguageKey, Program};
use blocklab_exec::ExecutionReport;
use blocklab_studio::{Studio, StudioConfig, StudioError};

/// Render and run block programs.
#[derive(Parser)]
#[command(name = "blocklab", about = "Render and run block programs")]
struct Cli {
    /// JSON configuration file. BLOCKLAB_* variables and flags override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// List the output languages.
    Languages,

    /// Print a program's source text.
    Render {
        /// Program file (JSON).
        #[arg(short, long)]
        program: PathBuf,

        /// Output language (default: from configuration).
        #[arg(short, long)]
        language: Option<LanguageKey>,
    },

    /// Execute a program, or a source file, and print the report.
    Run {
        /// Program file (JSON), rendered in the selected language first.
        #[arg(short, long, required_unless_present = "source", conflicts_with = "source")]
        program: Option<PathBuf>,

        /// Source file to run as-is.
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Language the source is declared as.
        #[arg(short, long)]
        language: Option<LanguageKey>,

        /// Print the report as JSON instead of rendered text.
        #[arg(long)]
        json: bool,

        /// Statement budget.
        #[arg(long)]
        step_limit: Option<u64>,

        /// Wall-clock budget in milliseconds.
        #[arg(long)]
        time_limit_ms: Option<u64>,

        /// Value `prompt()` answers with.
        #[arg(long)]
        prompt_default: Option<String>,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    };

    let exit_code = match cli.command {
        Commands::Languages => run_languages(),
        Commands::Render { program, language } => {
            if let Some(language) = language {
                config.language = language;
            }
            run_render(&program, config)
        }
        Commands::Run {
            program,
            source,
            language,
            json,
            step_limit,
            time_limit_ms,
            prompt_default,
        } => {
            if let Some(language) = language {
                config.language = language;
            }
            if step_limit.is_some() {
                config.harness.step_limit = step_limit;
            }
            if time_limit_ms.is_some() {
                config.harness.time_limit_ms = time_limit_ms;
            }
            if let Some(prompt_default) = prompt_default {
                config.harness.prompt_default = prompt_default;
            }
            let input = match (program, source) {
                (Some(program), _) => Input::Program(program),
                (None, Some(source)) => Input::Source(source),
                (None, None) => {
                    eprintln!("Error: one of --program or --source is required");
                    process::exit(1);
                }
            };
            run_run(input, json, config)
        }
    };
    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<StudioConfig, StudioError> {
    match path {
        Some(path) => StudioConfig::from_file(path)?.with_env(|key| std::env::var(key).ok()),
        None => StudioConfig::from_env(),
    }
}

fn read_program(path: &Path) -> Result<Program, StudioError> {
    let text = std::fs::read_to_string(path).map_err(|source| StudioError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| StudioError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Execute the languages subcommand.
fn run_languages() -> i32 {
    let registry = EmitterRegistry::with_builtin();
    for language in registry.languages() {
        let marker = if language.is_host() { "  (runnable)" } else { "" };
        println!(
            "{:<12}{:<12}.{}{}",
            language.as_str(),
            language.display_name(),
            language.file_extension(),
            marker
        );
    }
    0
}

/// Execute the render subcommand.
///
/// Returns exit code: 0 = success, 1 = invalid program or configuration,
/// 3 = I/O error.
fn run_render(path: &Path, config: StudioConfig) -> i32 {
    let studio = match read_program(path).and_then(|program| Studio::with_program(program, config)) {
        Ok(studio) => studio,
        Err(e) => {
            eprintln!("Error: {}", e);
            return e.exit_code();
        }
    };
    print!("{}", studio.current_source_text());
    0
}

enum Input {
    Program(PathBuf),
    Source(PathBuf),
}

/// Execute the run subcommand.
///
/// Returns exit code: 0 = completed, 1 = invalid program or configuration,
/// 2 = the code did not complete (or the harness refused it), 3 = I/O error.
fn run_run(input: Input, json: bool, config: StudioConfig) -> i32 {
    let report = match execute(input, config) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            return e.exit_code();
        }
    };

    if json {
        let json = serde_json::to_string_pretty(&report).unwrap_or_else(|e| {
            format!("{{\"error\": \"failed to serialize report: {}\"}}", e)
        });
        println!("{}", json);
    } else {
        println!("{}", report.render());
    }

    if report.is_success() {
        0
    } else {
        2
    }
}

fn execute(input: Input, config: StudioConfig) -> Result<ExecutionReport, StudioError> {
    match input {
        Input::Program(path) => {
            let mut studio = Studio::with_program(read_program(&path)?, config)?;
            studio.execute()
        }
        Input::Source(path) => {
            let source = std::fs::read_to_string(&path).map_err(|source| StudioError::Io {
                path: path.clone(),
                source,
            })?;
            let mut studio = Studio::new(config)?;
            studio.execute_source(&source)
        }
    }
}
