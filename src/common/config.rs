//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::config_path;
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Browser launch settings
    #[serde(default)]
    pub browser: BrowserConfig,

    /// WebDriver executable or endpoint
    #[serde(default)]
    pub driver: DriverConfig,

    /// Timeout and delay settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Default settings
    #[serde(default)]
    pub defaults: Defaults,
}

/// Browser launch settings
#[derive(Debug, Deserialize, Clone)]
pub struct BrowserConfig {
    /// Run without a visible window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Extra command line switches for the browser
    #[serde(default = "default_browser_args")]
    pub args: Vec<String>,

    /// Browser binary, when not the driver's default
    #[serde(default)]
    pub binary: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            args: default_browser_args(),
            binary: None,
        }
    }
}

fn default_headless() -> bool {
    true
}

fn default_browser_args() -> Vec<String> {
    vec![
        "--window-size=1280,720".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--ipc=host".to_string(),
        "--single-process".to_string(),
    ]
}

/// WebDriver configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DriverConfig {
    /// Executable name searched in PATH
    #[serde(default = "default_driver_name")]
    pub name: String,

    /// Explicit path to the driver executable
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Remote WebDriver endpoint; when set no local driver is spawned
    #[serde(default)]
    pub url: Option<String>,

    /// Port for a spawned driver (0 = any free port)
    #[serde(default)]
    pub port: u16,

    /// Additional arguments for the driver executable
    #[serde(default)]
    pub args: Vec<String>,

    /// How long to wait for a spawned driver to report ready
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            name: default_driver_name(),
            path: None,
            url: None,
            port: 0,
            args: Vec::new(),
            startup_timeout_secs: default_startup_timeout(),
        }
    }
}

fn default_driver_name() -> String {
    "chromedriver".to_string()
}

fn default_startup_timeout() -> u64 {
    10
}

/// Timeout settings in milliseconds
#[derive(Debug, Deserialize, Clone)]
pub struct Timeouts {
    /// Default timeout for element actions
    #[serde(default = "default_action")]
    pub action_ms: u64,

    /// Default timeout for navigation
    #[serde(default = "default_navigation")]
    pub navigation_ms: u64,

    /// Default timeout for load state waits
    #[serde(default = "default_load_state")]
    pub load_state_ms: u64,

    /// Default timeout for the terminal assertion
    #[serde(default = "default_assertion")]
    pub assertion_ms: u64,

    /// Delay before each element action
    #[serde(default = "default_pre_action_delay")]
    pub pre_action_delay_ms: u64,

    /// Delay after a passing assertion, before teardown
    #[serde(default = "default_settle")]
    pub settle_ms: u64,

    /// Interval between polls while waiting on the page
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            action_ms: default_action(),
            navigation_ms: default_navigation(),
            load_state_ms: default_load_state(),
            assertion_ms: default_assertion(),
            pre_action_delay_ms: default_pre_action_delay(),
            settle_ms: default_settle(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

fn default_action() -> u64 {
    5000
}
fn default_navigation() -> u64 {
    10_000
}
fn default_load_state() -> u64 {
    3000
}
fn default_assertion() -> u64 {
    5000
}
fn default_pre_action_delay() -> u64 {
    3000
}
fn default_settle() -> u64 {
    5000
}
fn default_poll_interval() -> u64 {
    100
}

impl Timeouts {
    pub fn action(&self) -> Duration {
        Duration::from_millis(self.action_ms)
    }

    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn load_state(&self) -> Duration {
        Duration::from_millis(self.load_state_ms)
    }

    pub fn assertion(&self) -> Duration {
        Duration::from_millis(self.assertion_ms)
    }

    pub fn pre_action_delay(&self) -> Duration {
        Duration::from_millis(self.pre_action_delay_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Default settings
#[derive(Debug, Deserialize)]
pub struct Defaults {
    /// Base URL that relative scenario URLs resolve against
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Locate the driver executable
    ///
    /// Prefers an explicit `driver.path`, then searches PATH for `driver.name`
    pub fn resolve_driver(&self) -> Result<PathBuf> {
        if let Some(path) = &self.driver.path {
            if path.exists() {
                return Ok(path.clone());
            }
            return Err(Error::driver_not_found(
                &self.driver.name,
                &[path.display().to_string()],
            ));
        }

        which::which(&self.driver.name).map_err(|_| {
            Error::driver_not_found(&self.driver.name, &["config driver.path", "PATH"])
        })
    }
}
