//! CLI command handling
//!
//! Dispatches CLI commands to the scenario runner and formats output.

use std::path::{Path, PathBuf};
use std::time::Duration;

use colored::Colorize;
use serde_json::json;

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{logging, Error, Result};
use crate::testing::{self, RunOptions, TestResult};
use crate::webdriver::{self, DriverProcess};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config_path: Option<&Path>) -> Result<()> {
    match command {
        Commands::Run {
            paths,
            base_url,
            driver_url,
            headed,
            json,
            verbose,
        } => {
            let mut config = load_config(config_path)?;
            if driver_url.is_some() {
                config.driver.url = driver_url;
            }
            if headed {
                config.browser.headless = false;
            }

            let options = RunOptions {
                base_url,
                verbose,
                quiet: json,
            };
            run(&paths, &options, &config, json).await
        }

        Commands::List { paths } => {
            let files = expand_paths(&paths)?;
            for file in &files {
                let scenario = testing::load_scenario(file)?;
                println!(
                    "{} {} ({} steps)",
                    "•".cyan(),
                    scenario.name.bold(),
                    scenario.steps.len()
                );
                println!("    {}", file.display().to_string().dimmed());
                println!("    expects: {}", scenario.assertion.text);
            }
            println!("\n{} scenario(s)", files.len());
            Ok(())
        }

        Commands::Check => {
            let config = load_config(config_path)?;
            check(&config).await
        }

        Commands::Logs { lines, clear } => {
            let Some(path) = logging::log_path() else {
                return Err(Error::Config(
                    "No log directory available on this platform".to_string(),
                ));
            };

            if clear {
                logging::truncate_log()?;
                println!("Cleared {}", path.display());
                return Ok(());
            }

            if !path.exists() {
                println!("No run log yet at {}", path.display());
                return Ok(());
            }

            let content = std::fs::read_to_string(&path).map_err(|e| Error::FileRead {
                path: path.display().to_string(),
                error: e.to_string(),
            })?;
            for line in tail(&content, lines) {
                println!("{}", line);
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

/// Run every scenario in turn, each on its own session
async fn run(paths: &[PathBuf], options: &RunOptions, config: &Config, json: bool) -> Result<()> {
    let files = expand_paths(paths)?;
    let total = files.len();
    let mut failed = 0;

    for file in &files {
        let result = match testing::run_scenario(file, options, config).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(path = %file.display(), error = %e, "Scenario could not start");
                failed += 1;
                if json {
                    println!("{}", startup_failure_json(file, &e));
                } else {
                    println!(
                        "\n{} {}: {}",
                        "✗".red().bold(),
                        file.display(),
                        e.to_string().red()
                    );
                }
                continue;
            }
        };

        if !result.passed {
            failed += 1;
        }
        if json {
            println!("{}", summary_json(&result));
        }
    }

    if !json && total > 1 {
        let passed = total - failed;
        println!(
            "{} passed, {} failed, {} total",
            passed.to_string().green(),
            failed.to_string().red(),
            total
        );
    }

    if failed > 0 {
        return Err(Error::ScenariosFailed { failed, total });
    }
    Ok(())
}

/// Start the driver, confirm it is ready, and stop it again
async fn check(config: &Config) -> Result<()> {
    if let Some(url) = &config.driver.url {
        let status = webdriver::status(url).await?;
        report_status(url, status.ready, &status.message);
        return if status.ready {
            Ok(())
        } else {
            Err(Error::DriverCommunication(format!(
                "WebDriver at {} is not ready: {}",
                url, status.message
            )))
        };
    }

    let path = config.resolve_driver()?;
    println!("Driver: {}", path.display());

    let process = DriverProcess::spawn(
        &path,
        config.driver.port,
        &config.driver.args,
        Duration::from_secs(config.driver.startup_timeout_secs),
    )
    .await?;

    let url = process.url();
    let status = webdriver::status(&url).await;
    process.stop().await?;

    let status = status?;
    report_status(&url, status.ready, &status.message);
    Ok(())
}

fn report_status(url: &str, ready: bool, message: &str) {
    if ready {
        println!("  {} {} ready: {}", "✓".green(), url, message.dimmed());
    } else {
        println!("  {} {} not ready: {}", "✗".red(), url, message.dimmed());
    }
}

/// Expand directories to the scenario files they contain
///
/// Directory entries are `*.yaml` / `*.yml` files in sorted order; file
/// arguments are kept as given.
pub fn expand_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if !path.is_dir() {
            if !path.exists() {
                return Err(Error::FileRead {
                    path: path.display().to_string(),
                    error: "No such file or directory".to_string(),
                });
            }
            files.push(path.clone());
            continue;
        }

        let mut found: Vec<PathBuf> = std::fs::read_dir(path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_scenario_file(p))
            .collect();
        found.sort();

        if found.is_empty() {
            tracing::warn!(dir = %path.display(), "No scenario files in directory");
        }
        files.extend(found);
    }

    Ok(files)
}

fn is_scenario_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Machine-readable summary of one scenario run
pub fn summary_json(result: &TestResult) -> serde_json::Value {
    let teardown: Vec<serde_json::Value> = result
        .teardown
        .stages
        .iter()
        .map(|(stage, error)| {
            json!({
                "stage": stage.to_string(),
                "ok": error.is_none(),
                "error": error,
            })
        })
        .collect();

    json!({
        "name": result.name,
        "passed": result.passed,
        "steps_run": result.steps_run,
        "steps_total": result.steps_total,
        "duration_ms": result.duration.as_millis() as u64,
        "error": result.error.as_ref().map(|e| json!({
            "code": e.code(),
            "message": e.to_string(),
        })),
        "teardown": teardown,
    })
}

fn startup_failure_json(path: &Path, error: &Error) -> serde_json::Value {
    json!({
        "name": path.display().to_string(),
        "passed": false,
        "steps_run": 0,
        "steps_total": 0,
        "duration_ms": 0,
        "error": {
            "code": error.code(),
            "message": error.to_string(),
        },
        "teardown": [],
    })
}

/// Last `n` lines of `content`
fn tail(content: &str, n: usize) -> Vec<&str> {
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].to_vec()
}
