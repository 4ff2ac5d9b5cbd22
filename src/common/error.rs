//! Error types for the scenario runner
//!
//! Messages are meant to be read in a CI log: they say what was being
//! attempted and, where it helps, how to fix the environment.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the runner
#[derive(Error, Debug)]
pub enum Error {
    // === Driver Errors ===
    #[error("WebDriver executable '{name}' not found. Searched: {searched}")]
    DriverNotFound { name: String, searched: String },

    #[error("WebDriver failed to start: {0}")]
    DriverStartFailed(String),

    #[error("WebDriver did not become ready within {0} seconds")]
    DriverStartTimeout(u64),

    #[error("WebDriver communication error: {0}")]
    DriverCommunication(String),

    // === Protocol Errors ===
    #[error("WebDriver protocol error: {0}")]
    Protocol(String),

    #[error("WebDriver command '{command}' failed ({error}): {message}")]
    CommandFailed {
        command: String,
        error: String,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // === Session Errors ===
    #[error("Browser session could not be created: {0}")]
    SessionCreateFailed(String),

    #[error("Browser session is closed")]
    SessionClosed,

    // === Navigation / Element Errors ===
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Navigation to '{url}' failed: {reason}")]
    NavigationFailed { url: String, reason: String },

    #[error("No element matches {locator} within {timeout_ms}ms")]
    ElementNotFound { locator: String, timeout_ms: u64 },

    #[error("Cannot {action} {locator}: {reason}")]
    ActionFailed {
        action: String,
        locator: String,
        reason: String,
    },

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    // === Scenario Errors ===
    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),

    #[error("Test case failed: {0}")]
    AssertionFailed(String),

    #[error("{failed} of {total} scenarios failed")]
    ScenariosFailed { failed: usize, total: usize },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a driver not found error with search locations
    pub fn driver_not_found<S: AsRef<str>>(name: &str, searched: &[S]) -> Self {
        Self::DriverNotFound {
            name: name.to_string(),
            searched: searched
                .iter()
                .map(|s| s.as_ref())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Create a WebDriver command failed error
    pub fn command_failed(command: &str, error: &str, message: &str) -> Self {
        Self::CommandFailed {
            command: command.to_string(),
            error: error.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a timeout error for a named operation
    pub fn timeout(operation: impl Into<String>, timeout: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Create an action failed error
    pub fn action_failed(action: &str, locator: &str, reason: &str) -> Self {
        Self::ActionFailed {
            action: action.to_string(),
            locator: locator.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error represents an elapsed deadline
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Timeout { .. } | Error::DriverStartTimeout(_) => true,
            Error::CommandFailed { error, .. } => error == "timeout" || error == "script timeout",
            Error::Http(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// The W3C error string when this is a failed WebDriver command
    pub fn webdriver_code(&self) -> Option<&str> {
        match self {
            Error::CommandFailed { error, .. } => Some(error.as_str()),
            _ => None,
        }
    }

    /// Stable machine-readable code for JSON reports
    pub fn code(&self) -> &'static str {
        match self {
            Error::DriverNotFound { .. } => "DRIVER_NOT_FOUND",
            Error::DriverStartFailed(_) | Error::DriverStartTimeout(_) => "DRIVER_START_FAILED",
            Error::DriverCommunication(_) | Error::Http(_) => "DRIVER_COMMUNICATION",
            Error::Protocol(_) => "PROTOCOL_ERROR",
            Error::CommandFailed { .. } => "COMMAND_FAILED",
            Error::SessionCreateFailed(_) => "SESSION_CREATE_FAILED",
            Error::SessionClosed => "SESSION_CLOSED",
            Error::InvalidUrl { .. } => "INVALID_URL",
            Error::NavigationFailed { .. } => "NAVIGATION_FAILED",
            Error::ElementNotFound { .. } => "ELEMENT_NOT_FOUND",
            Error::ActionFailed { .. } => "ACTION_FAILED",
            Error::Timeout { .. } => "TIMEOUT",
            Error::InvalidScenario(_) => "INVALID_SCENARIO",
            Error::AssertionFailed(_) => "ASSERTION_FAILED",
            Error::ScenariosFailed { .. } => "SCENARIOS_FAILED",
            Error::Config(_) | Error::ConfigParse(_) => "CONFIG_ERROR",
            Error::Io(_) | Error::FileRead { .. } => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
