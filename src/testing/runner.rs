//! Scenario runner implementation
//!
//! Interprets a scenario's steps against a [`BrowserDriver`], performs the
//! terminal visibility check, and always tears the session down afterwards.

use std::path::Path;
use std::time::Duration;

use colored::Colorize;
use reqwest::Url;
use tokio::time::{sleep, Instant};

use crate::browser::{BrowserDriver, ChromeBrowser, LoadState, Session, TeardownReport};
use crate::common::config::{Config, Timeouts};
use crate::common::{Error, Result};

use super::config::{load_scenario, Scenario, Step};

/// Result of a scenario run
#[derive(Debug)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    /// Steps attempted, including the one that failed
    pub steps_run: usize,
    pub steps_total: usize,
    /// Why the scenario failed
    pub error: Option<Error>,
    pub teardown: TeardownReport,
    pub duration: Duration,
}

impl TestResult {
    /// Turn the verdict into a `Result`, yielding the failure reason
    pub fn into_result(self) -> Result<()> {
        match (self.passed, self.error) {
            (true, _) => Ok(()),
            (false, Some(e)) => Err(e),
            (false, None) => Err(Error::Internal(format!(
                "Scenario '{}' failed without a reason",
                self.name
            ))),
        }
    }
}

/// Overrides supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Base URL used when the scenario does not name one
    pub base_url: Option<String>,
    /// Print each step's details
    pub verbose: bool,
    /// Suppress progress output (machine-readable output is printed instead)
    pub quiet: bool,
}

/// Everything the interpreter needs besides the scenario and the browser
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Base URL relative step URLs are joined onto
    pub base_url: String,
    pub timeouts: Timeouts,
    pub verbose: bool,
    pub quiet: bool,
}

impl RunSettings {
    /// Resolve settings for one scenario
    ///
    /// Base URL precedence: scenario, then command line, then config.
    pub fn resolve(scenario: &Scenario, options: &RunOptions, config: &Config) -> Self {
        let base_url = scenario
            .base_url
            .clone()
            .or_else(|| options.base_url.clone())
            .unwrap_or_else(|| config.defaults.base_url.clone());

        Self {
            base_url,
            timeouts: config.timeouts.clone(),
            verbose: options.verbose,
            quiet: options.quiet,
        }
    }

    /// Settings straight from config, used when no scenario-level overrides apply
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.defaults.base_url.clone(),
            timeouts: config.timeouts.clone(),
            verbose: false,
            quiet: false,
        }
    }
}

/// Run a test scenario from a YAML file
///
/// Failing to load the scenario or acquire a browser is an `Err`; anything
/// that goes wrong once the session exists is reported in the result.
pub async fn run_scenario(path: &Path, options: &RunOptions, config: &Config) -> Result<TestResult> {
    let scenario = load_scenario(path)?;
    let settings = RunSettings::resolve(&scenario, options, config);

    let browser = ChromeBrowser::launch(config).await?;
    let session = Session::new(Box::new(browser));

    Ok(execute(&scenario, session, &settings).await)
}

/// Execute a scenario on an acquired session
///
/// The session is closed on every path before this returns.
pub async fn execute(scenario: &Scenario, mut session: Session, settings: &RunSettings) -> TestResult {
    let started = Instant::now();
    let steps_total = scenario.steps.len();
    let progress = Progress::new(settings);

    tracing::info!(scenario = %scenario.name, steps = steps_total, "Scenario started");
    progress.header(scenario);

    let (steps_run, outcome) = run_steps(scenario, session.driver(), settings, &progress).await;

    let teardown = session.close().await;
    progress.teardown(&teardown);

    let passed = outcome.is_ok();
    let duration = started.elapsed();
    match &outcome {
        Ok(()) => {
            tracing::info!(scenario = %scenario.name, ?duration, "Scenario passed");
            progress.passed();
        }
        Err(e) => {
            tracing::info!(scenario = %scenario.name, ?duration, error = %e, "Scenario failed");
            progress.failed(e);
        }
    }

    TestResult {
        name: scenario.name.clone(),
        passed,
        steps_run,
        steps_total,
        error: outcome.err(),
        teardown,
        duration,
    }
}

/// Run every step, then the terminal assertion
///
/// Returns how many steps were attempted alongside the verdict.
async fn run_steps(
    scenario: &Scenario,
    driver: &mut dyn BrowserDriver,
    settings: &RunSettings,
    progress: &Progress,
) -> (usize, Result<()>) {
    if !scenario.steps.is_empty() {
        progress.section("Steps:");
    }

    for (i, step) in scenario.steps.iter().enumerate() {
        let step_num = i + 1;

        match execute_step(driver, step, settings).await {
            Ok(StepOutcome::Done) => progress.step_ok(step_num, step),
            Ok(StepOutcome::Tolerated(reason)) => progress.step_tolerated(step_num, step, &reason),
            Err(e) if step.is_tolerant() => {
                tracing::debug!(step = step_num, error = %e, "Ignoring failure of tolerant step");
                progress.step_tolerated(step_num, step, &e.to_string());
            }
            Err(e) => {
                progress.step_failed(step_num, step, &e);
                return (step_num, Err(e));
            }
        }
    }

    let steps_run = scenario.steps.len();
    if let Err(e) = check_assertion(scenario, driver, settings, progress).await {
        return (steps_run, Err(e));
    }

    let settle = scenario
        .settle_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| settings.timeouts.settle());
    if !settle.is_zero() {
        tracing::debug!(?settle, "Settling before teardown");
        sleep(settle).await;
    }

    (steps_run, Ok(()))
}

/// How a step finished when it did not fail outright
#[derive(Debug)]
enum StepOutcome {
    Done,
    /// Some part of the step failed but was ignored
    Tolerated(String),
}

/// Execute a single step
async fn execute_step(
    driver: &mut dyn BrowserDriver,
    step: &Step,
    settings: &RunSettings,
) -> Result<StepOutcome> {
    let timeouts = &settings.timeouts;

    match step {
        Step::Navigate {
            url,
            wait_until,
            timeout_ms,
            ..
        } => {
            let target = resolve_url(&settings.base_url, url)?;
            let timeout = timeout_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| timeouts.navigation());
            tracing::debug!(url = %target, %wait_until, "Navigating");
            driver.navigate(&target, *wait_until, timeout).await?;
            Ok(StepOutcome::Done)
        }
        Step::WaitForLoadState {
            state,
            timeout_ms,
            frames,
            tolerant,
        } => {
            let timeout = timeout_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| timeouts.load_state());
            wait_for_load_state(driver, *state, timeout, *frames, *tolerant).await
        }
        Step::Fill { .. } | Step::Click { .. } => {
            let Some(interaction) = step.interaction()? else {
                return Err(Error::Internal(format!(
                    "'{}' is not an element interaction",
                    step.describe()
                )));
            };

            let delay = interaction
                .delay_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| timeouts.pre_action_delay());
            if !delay.is_zero() {
                sleep(delay).await;
            }

            let timeout = interaction
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| timeouts.action());
            tracing::debug!(locator = %interaction.locator, action = interaction.action.name(), "Acting on element");
            driver
                .perform(&interaction.locator, &interaction.action, timeout)
                .await?;
            Ok(StepOutcome::Done)
        }
        Step::Sleep { ms } => {
            sleep(Duration::from_millis(*ms)).await;
            Ok(StepOutcome::Done)
        }
        Step::Scroll { delta_y, .. } => {
            driver.scroll_by(*delta_y).await?;
            Ok(StepOutcome::Done)
        }
    }
}

/// Wait on the page, then optionally on each child frame
///
/// When tolerant, every individual wait is soft: a frame that never loads
/// does not stop the remaining frames from being waited on.
async fn wait_for_load_state(
    driver: &mut dyn BrowserDriver,
    state: LoadState,
    timeout: Duration,
    frames: bool,
    tolerant: bool,
) -> Result<StepOutcome> {
    let mut ignored: Vec<String> = Vec::new();

    let result = driver.wait_for_load_state(state, timeout).await;
    absorb(result, tolerant, "page", &mut ignored)?;

    if frames {
        let count = match driver.frame_count().await {
            Ok(count) => count,
            Err(e) => {
                absorb(Err(e), tolerant, "frame count", &mut ignored)?;
                0
            }
        };

        for frame in 0..count {
            let result = driver.wait_for_frame_load_state(frame, state, timeout).await;
            absorb(result, tolerant, &format!("frame {}", frame), &mut ignored)?;
        }
    }

    if ignored.is_empty() {
        Ok(StepOutcome::Done)
    } else {
        Ok(StepOutcome::Tolerated(ignored.join("; ")))
    }
}

fn absorb(result: Result<()>, tolerant: bool, what: &str, ignored: &mut Vec<String>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if tolerant => {
            tracing::debug!(scope = what, error = %e, "Ignoring load state failure");
            ignored.push(format!("{}: {}", what, e));
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// The single pass/fail check of a scenario
async fn check_assertion(
    scenario: &Scenario,
    driver: &mut dyn BrowserDriver,
    settings: &RunSettings,
    progress: &Progress,
) -> Result<()> {
    let assertion = &scenario.assertion;
    let timeout = assertion
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| settings.timeouts.assertion());

    progress.section("Assertion:");

    let visible = match driver.is_text_visible(&assertion.text, timeout).await {
        Ok(visible) => visible,
        Err(e) => {
            tracing::debug!(text = %assertion.text, error = %e, "Visibility check failed");
            false
        }
    };

    if visible {
        progress.assertion(&assertion.text, true);
        Ok(())
    } else {
        progress.assertion(&assertion.text, false);
        Err(Error::AssertionFailed(assertion.message.clone()))
    }
}

/// Resolve a step URL against the base URL
///
/// Absolute URLs are used as given.
pub fn resolve_url(base: &str, url: &str) -> Result<String> {
    if let Ok(absolute) = Url::parse(url) {
        if absolute.has_host() {
            return Ok(absolute.to_string());
        }
    }

    let base_url = Url::parse(base).map_err(|e| Error::InvalidUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })?;
    let joined = base_url.join(url).map_err(|e| Error::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    Ok(joined.to_string())
}

/// Human-facing progress output
struct Progress {
    enabled: bool,
    verbose: bool,
}

impl Progress {
    fn new(settings: &RunSettings) -> Self {
        Self {
            enabled: !settings.quiet,
            verbose: settings.verbose,
        }
    }

    fn header(&self, scenario: &Scenario) {
        if !self.enabled {
            return;
        }
        println!(
            "\n{} {}",
            "Running Test:".blue().bold(),
            scenario.name.white().bold()
        );
        if let Some(desc) = &scenario.description {
            println!("  {}", desc.dimmed());
        }
    }

    fn section(&self, title: &str) {
        if self.enabled {
            println!("\n{}", title.cyan());
        }
    }

    fn step_ok(&self, step_num: usize, step: &Step) {
        if self.enabled {
            println!(
                "  {} Step {}: {}",
                "✓".green(),
                step_num,
                step.describe().dimmed()
            );
        }
    }

    fn step_tolerated(&self, step_num: usize, step: &Step, reason: &str) {
        if !self.enabled {
            return;
        }
        println!(
            "  {} Step {}: {} (ignored failure)",
            "~".yellow(),
            step_num,
            step.describe().dimmed()
        );
        if self.verbose {
            println!("      {}", reason.dimmed());
        }
    }

    fn step_failed(&self, step_num: usize, step: &Step, error: &Error) {
        if self.enabled {
            println!(
                "  {} Step {}: {}: {}",
                "✗".red(),
                step_num,
                step.describe(),
                error
            );
        }
    }

    fn assertion(&self, text: &str, visible: bool) {
        if !self.enabled {
            return;
        }
        if visible {
            println!("  {} '{}' is visible", "✓".green(), text);
        } else {
            println!("  {} '{}' is not visible", "✗".red(), text);
        }
    }

    fn teardown(&self, report: &TeardownReport) {
        if !self.enabled {
            return;
        }
        for (stage, error) in report.failures() {
            println!("  {} Teardown {}: {}", "!".yellow(), stage, error.dimmed());
        }
    }

    fn passed(&self) {
        if self.enabled {
            println!("\n{} {}\n", "✓".green().bold(), "Test Passed".green().bold());
        }
    }

    fn failed(&self, error: &Error) {
        if self.enabled {
            println!("\n{} {}\n", "✗".red().bold(), error.to_string().red().bold());
        }
    }
}
