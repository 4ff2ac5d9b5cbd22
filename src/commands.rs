//! CLI command definitions
//!
//! Defines the clap commands for the scenario runner CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run test scenarios (files or directories of YAML files)
    Run {
        /// Scenario files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Base URL for relative step URLs (overrides config)
        #[arg(long)]
        base_url: Option<String>,

        /// Use an already running WebDriver endpoint instead of spawning one
        #[arg(long)]
        driver_url: Option<String>,

        /// Show the browser window
        #[arg(long)]
        headed: bool,

        /// Print one JSON summary per scenario instead of progress output
        #[arg(long)]
        json: bool,

        /// Verbose output
        #[arg(long, short)]
        verbose: bool,
    },

    /// List scenarios without running them
    List {
        /// Scenario files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Verify that the WebDriver executable starts and reports ready
    Check,

    /// View the run log
    Logs {
        /// Number of lines to show (default: 50)
        #[arg(long, short = 'n', default_value = "50")]
        lines: usize,

        /// Clear the log file
        #[arg(long)]
        clear: bool,
    },
}

impl Commands {
    /// Whether debug-level logging was requested
    pub fn is_verbose(&self) -> bool {
        matches!(self, Commands::Run { verbose: true, .. })
    }
}
