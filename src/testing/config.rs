//! Test scenario configuration types
//!
//! Defines the data structures for deserializing YAML test scenarios.

use serde::Deserialize;
use std::path::Path;

use crate::browser::{ElementAction, LoadState, Locator};
use crate::common::{Error, Result};

/// A complete test scenario loaded from a YAML file
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Name of the test scenario
    pub name: String,
    /// Optional description of what the test verifies
    pub description: Option<String>,
    /// Base URL for relative step URLs
    pub base_url: Option<String>,
    /// The sequence of steps to execute
    pub steps: Vec<Step>,
    /// The single pass/fail check run after all steps
    #[serde(rename = "assert")]
    pub assertion: TerminalAssertion,
    /// Delay after a passing assertion, before teardown
    pub settle_ms: Option<u64>,
}

/// A single step in the execution flow
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Load a URL
    Navigate {
        /// Absolute URL or path relative to the base URL
        url: String,
        /// How far the page must get before the step completes
        #[serde(default)]
        wait_until: LoadState,
        timeout_ms: Option<u64>,
        #[serde(default)]
        tolerant: bool,
    },
    /// Wait for the page (and optionally each frame) to reach a load state
    WaitForLoadState {
        #[serde(default = "default_wait_state")]
        state: LoadState,
        timeout_ms: Option<u64>,
        /// Also wait on every child frame
        #[serde(default)]
        frames: bool,
        #[serde(default = "default_true")]
        tolerant: bool,
    },
    /// Replace the value of an input
    Fill {
        selector: String,
        value: String,
        #[serde(default)]
        nth: usize,
        /// Settle delay before acting
        delay_ms: Option<u64>,
        timeout_ms: Option<u64>,
        #[serde(default)]
        tolerant: bool,
    },
    /// Click an element
    Click {
        selector: String,
        #[serde(default)]
        nth: usize,
        /// Settle delay before acting
        delay_ms: Option<u64>,
        timeout_ms: Option<u64>,
        #[serde(default)]
        tolerant: bool,
    },
    /// Unconditional delay
    Sleep { ms: u64 },
    /// Scroll the page; one viewport when `delta_y` is omitted
    Scroll {
        delta_y: Option<i64>,
        #[serde(default)]
        tolerant: bool,
    },
}

fn default_wait_state() -> LoadState {
    LoadState::DomContentLoaded
}

fn default_true() -> bool {
    true
}

/// The terminal pass/fail check of a scenario
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct TerminalAssertion {
    /// Text that must become visible
    pub text: String,
    /// How long to wait for it
    pub timeout_ms: Option<u64>,
    /// Business-level description reported when the text never appears
    pub message: String,
}

/// A locate-and-act step resolved to its parts
#[derive(Debug, Clone)]
pub struct Interaction {
    pub locator: Locator,
    pub action: ElementAction,
    pub delay_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
}

impl Step {
    /// Whether errors from this step are ignored
    pub fn is_tolerant(&self) -> bool {
        match self {
            Step::Navigate { tolerant, .. }
            | Step::WaitForLoadState { tolerant, .. }
            | Step::Fill { tolerant, .. }
            | Step::Click { tolerant, .. }
            | Step::Scroll { tolerant, .. } => *tolerant,
            Step::Sleep { .. } => false,
        }
    }

    /// Resolve fill/click steps into an element interaction
    pub fn interaction(&self) -> Result<Option<Interaction>> {
        let interaction = match self {
            Step::Fill {
                selector,
                value,
                nth,
                delay_ms,
                timeout_ms,
                ..
            } => Interaction {
                locator: Locator::parse(selector, *nth)?,
                action: ElementAction::Fill(value.clone()),
                delay_ms: *delay_ms,
                timeout_ms: *timeout_ms,
            },
            Step::Click {
                selector,
                nth,
                delay_ms,
                timeout_ms,
                ..
            } => Interaction {
                locator: Locator::parse(selector, *nth)?,
                action: ElementAction::Click,
                delay_ms: *delay_ms,
                timeout_ms: *timeout_ms,
            },
            _ => return Ok(None),
        };
        Ok(Some(interaction))
    }

    /// Short human-readable description for progress output
    pub fn describe(&self) -> String {
        match self {
            Step::Navigate { url, wait_until, .. } => format!("navigate {} ({})", url, wait_until),
            Step::WaitForLoadState { state, frames, .. } => {
                if *frames {
                    format!("wait for {} (page and frames)", state)
                } else {
                    format!("wait for {}", state)
                }
            }
            Step::Fill { selector, value, .. } => format!("fill {} = {:?}", selector, value),
            Step::Click { selector, .. } => format!("click {}", selector),
            Step::Sleep { ms } => format!("sleep {}ms", ms),
            Step::Scroll { delta_y: Some(dy), .. } => format!("scroll {}px", dy),
            Step::Scroll { delta_y: None, .. } => "scroll one viewport".to_string(),
        }
    }
}

impl Scenario {
    /// Parse a scenario from YAML text and validate it
    pub fn from_yaml(content: &str) -> Result<Self> {
        let scenario: Scenario = serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse test scenario: {}", e)))?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Check the invariants serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidScenario("Scenario name is empty".to_string()));
        }
        if self.assertion.text.trim().is_empty() {
            return Err(Error::InvalidScenario(format!(
                "'{}': assertion text is empty",
                self.name
            )));
        }
        if self.assertion.message.trim().is_empty() {
            return Err(Error::InvalidScenario(format!(
                "'{}': assertion message is empty",
                self.name
            )));
        }

        for (i, step) in self.steps.iter().enumerate() {
            let step_num = i + 1;
            match step {
                Step::Sleep { ms: 0 } => {
                    return Err(Error::InvalidScenario(format!(
                        "'{}' step {}: sleep of 0ms",
                        self.name, step_num
                    )));
                }
                Step::Navigate { url, .. } if url.trim().is_empty() => {
                    return Err(Error::InvalidScenario(format!(
                        "'{}' step {}: navigate without a URL",
                        self.name, step_num
                    )));
                }
                _ => {}
            }

            step.interaction().map_err(|e| match e {
                Error::InvalidScenario(msg) => Error::InvalidScenario(format!(
                    "'{}' step {}: {}",
                    self.name, step_num, msg
                )),
                other => other,
            })?;
        }

        Ok(())
    }
}

/// Load and validate a scenario file
pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read test scenario '{}': {}",
            path.display(),
            e
        ))
    })?;
    Scenario::from_yaml(&content)
}
