//! Scenario runner
//!
//! Reads YAML test scenarios and executes them against a browser session,
//! reporting one pass/fail verdict per scenario.

mod config;
mod runner;

pub use config::*;
pub use runner::{execute, resolve_url, run_scenario, RunOptions, RunSettings, TestResult};
