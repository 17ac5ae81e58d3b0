//! Stabil CLI: change-impact test selection from the command line.
//!
//! Provides `stabil status` to report changed files and stability,
//! `stabil select` to filter a collected node list down to what must run,
//! `stabil record` to store fingerprints from an execution trace, and
//! `stabil files` to show which nodes depend on which files.

#![warn(missing_docs)]

mod files;
mod logging;
mod project;
mod record;
mod select;
mod status;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// Stabil: skip tests whose dependencies did not change.
#[derive(Parser, Debug)]
#[command(name = "stabil", version, about = "Stabil change-impact test selection")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a custom `stabil.toml`, or to the project directory.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Report changed files and stable/unstable nodes.
    Status(StatusArgs),
    /// Print the collected nodes that must run.
    Select(SelectArgs),
    /// Record node fingerprints from a JSON trace file.
    Record(RecordArgs),
    /// Show which nodes depend on each file.
    Files(FilesArgs),
}

/// Arguments for the `stabil status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the `stabil select` subcommand.
#[derive(Parser, Debug)]
pub struct SelectArgs {
    /// Collected node ids.
    #[arg(required = true, num_args = 1..)]
    pub ids: Vec<String>,

    /// Forget stored nodes that are not in the collected list.
    #[arg(long)]
    pub prune: bool,
}

/// Arguments for the `stabil record` subcommand.
#[derive(Parser, Debug)]
pub struct RecordArgs {
    /// JSON file mapping node ids to executed lines per file.
    pub trace: PathBuf,
}

/// Arguments for the `stabil files` subcommand.
#[derive(Parser, Debug)]
pub struct FilesArgs {
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Report output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom config file or project directory.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);
    tracing::debug!(command = ?cli.command, "starting");

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Status(ref args) => status::run(args, &global),
        Command::Select(ref args) => select::run(args, &global),
        Command::Record(ref args) => record::run(args, &global),
        Command::Files(ref args) => files::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
