//! rdiag CLI - resilient `PlantUML` processing.
//!
//! Converts a standalone `.puml` file, or every diagram in a markdown
//! document, into images and writes a copy of the document that links them.
//! `--validate-only` checks syntax without converting; `--check-setup`
//! reports the local toolchain.

mod commands;
mod error;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use output::Output;

/// rdiag - resilient `PlantUML` diagram processor.
#[derive(Parser, Debug)]
#[command(name = "rdiag", version, about)]
pub(crate) struct Cli {
    /// Input file (.md, .markdown, .puml or .plantuml).
    #[arg(required_unless_present = "check_setup")]
    pub input: Option<PathBuf>,

    /// Output image format (overrides config).
    #[arg(long, value_parser = ["png", "svg"])]
    pub format: Option<String>,

    /// Directory that receives the diagrams directory (default: the input's directory).
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Maximum conversion attempts per diagram (overrides config).
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Renderer timeout in seconds (overrides config).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Stop starting new diagrams after this many seconds.
    #[arg(long, value_name = "SECONDS")]
    pub time_limit: Option<u64>,

    /// Only classify diagrams and check their syntax.
    #[arg(long)]
    pub validate_only: bool,

    /// Report the local PlantUML, Java and Graphviz installation.
    #[arg(long)]
    pub check_setup: bool,

    /// Path to configuration file (default: auto-discover rdiag.toml).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose output (log each workflow stage).
    #[arg(short, long)]
    pub verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match commands::execute(cli, &output) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            output.error(&format!("Error: {err}"));
            ExitCode::FAILURE
        }
    }
}
