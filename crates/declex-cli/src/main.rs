//! declex CLI
//!
//! Extracts declarations from C and C++ headers into a line-oriented log.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use declex_core::{Invocation, Language};
use declex_parser::{run_invocation, ParseOutcome};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "declex")]
#[command(author, version, about = "Declaration extractor for C/C++ headers", long_about = None)]
struct Cli {
    /// Define a macro, NAME or NAME=VALUE
    #[arg(short = 'D', value_name = "NAME[=VALUE]")]
    defines: Vec<String>,

    /// Add a directory to the include search path
    #[arg(short = 'I', value_name = "DIR")]
    include_paths: Vec<PathBuf>,

    /// Pass-through attribute, echoed to the output only
    #[arg(short = 'A', value_name = "NAME[=VALUE]")]
    attributes: Vec<String>,

    /// Include FILE before any input
    #[arg(long = "include", value_name = "FILE")]
    force_includes: Vec<String>,

    /// Treat FILE as empty wherever it is included
    #[arg(long = "exclude", value_name = "FILE")]
    exclude_files: Vec<PathBuf>,

    /// Skip included files whose name matches PATTERN (`*` and `?` wildcards)
    #[arg(long = "exclude-pattern", value_name = "PATTERN")]
    exclude_patterns: Vec<String>,

    /// Compiler resource directory; DIR/include is searched last
    #[arg(long, value_name = "DIR")]
    resource_dir: Option<PathBuf>,

    /// Output log file
    #[arg(short, long, value_name = "FILE", required_unless_present = "config")]
    output: Option<PathBuf>,

    /// Source language (c or c++)
    #[arg(short = 'x', value_name = "LANG")]
    language: Option<Language>,

    /// JSON file with default options; command-line lists are appended
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Input headers, included in order
    #[arg(value_name = "FILE")]
    inputs: Vec<String>,
}

fn main() -> ExitCode {
    // Usage errors share exit status 1 with failed parses; --help and
    // --version still exit 0
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(e.exit_code().min(1) as u8);
        }
    };
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            eprintln!("declex: error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<ParseOutcome> {
    let invocation = build_invocation(cli)?;
    debug!("Invocation: {:?}", invocation);

    let output = invocation.output_path()?.to_path_buf();
    run_invocation(&invocation)
        .with_context(|| format!("failed to produce {}", output.display()))
}

fn build_invocation(cli: Cli) -> Result<Invocation> {
    let base = match &cli.config {
        Some(path) => Invocation::from_json_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => Invocation::default(),
    };

    // merge() always takes the language of its argument
    let language = cli.language.unwrap_or(base.language);

    Ok(base.merge(Invocation {
        defines: cli.defines,
        include_paths: cli.include_paths,
        attributes: cli.attributes,
        force_includes: cli.force_includes,
        exclude_files: cli.exclude_files,
        exclude_patterns: cli.exclude_patterns,
        inputs: cli.inputs,
        resource_dir: cli.resource_dir,
        language,
        output: cli.output,
    }))
}
