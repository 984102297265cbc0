#![warn(rust_2018_idioms)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # edi
//!
//! Command-line front end of the translator: parse an interchange to XML or
//! back to its wire format, validate it against schema files, or identify
//! its format.
//!
//! Exit codes: 0 success, 1 errors were found in the document, 2 usage
//! errors (from clap), 3 the document or the configuration could not be
//! processed at all.

mod commands;
mod detect;

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit code when the document was read but errors were recorded
const EXIT_DOCUMENT_ERRORS: u8 = 1;
/// Exit code when nothing useful could be done
const EXIT_FATAL: u8 = 3;

#[derive(Parser)]
#[command(name = "edi")]
#[command(about = "Parse, validate and re-serialize EDIFACT, TRADACOMS and ACH documents")]
#[command(version)]
struct Cli {
    /// Parser configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a document and print it as XML or in its wire format
    Parse {
        #[command(flatten)]
        source: SourceArgs,

        /// What to print on stdout
        #[arg(short, long, value_enum, default_value_t = OutputKind::Xml)]
        output: OutputKind,

        /// Print recorded errors as JSON on stderr
        #[arg(long)]
        errors_json: bool,
    },

    /// Validate a document; exits with 1 when any error is recorded
    Validate {
        #[command(flatten)]
        source: SourceArgs,

        /// Print recorded errors as JSON
        #[arg(long)]
        errors_json: bool,
    },

    /// Print the wire format of a file
    Detect {
        /// Input file path
        input: PathBuf,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Input file path
    input: PathBuf,

    /// Wire format of the input
    #[arg(short, long, value_enum, default_value_t = FormatArg::Auto)]
    format: FormatArg,

    /// Schema file (YAML or JSON); may be repeated
    #[arg(short, long)]
    schema: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Auto,
    Edifact,
    Tradacoms,
    Ach,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputKind {
    Xml,
    Edi,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match commands::execute(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("ERROR: {e:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}
