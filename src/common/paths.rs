//! Configuration and log paths
//!
//! Uses the directories crate for platform-appropriate locations.

use std::path::PathBuf;

/// Name used for the config and data directories
const APP_NAME: &str = "e2e-runner";

/// Get the configuration directory path
///
/// - Linux: `~/.config/e2e-runner/`
/// - macOS: `~/Library/Application Support/e2e-runner/`
/// - Windows: `%APPDATA%\e2e-runner\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the path to the log directory
pub fn log_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.data_dir().join("logs"))
}
