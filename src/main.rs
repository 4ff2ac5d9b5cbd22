//! e2e-runner - Browser-driven acceptance test runner
//!
//! Runs YAML test scenarios against Chrome through WebDriver and exits
//! non-zero when any scenario fails.

use std::path::PathBuf;

use clap::Parser;
use commands::Commands;
use e2e::{cli, commands, common::logging};

#[derive(Parser)]
#[command(name = "e2e-runner", about = "Browser-driven acceptance test runner")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Held until exit so buffered file logs are flushed
    let log_guard = logging::init(cli.command.is_verbose());

    let result = cli::dispatch(cli.command, cli.config.as_deref()).await;

    if let Err(e) = result {
        drop(log_guard);
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
