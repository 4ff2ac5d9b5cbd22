//! e2e-runner - Browser-driven acceptance test runner
//!
//! Scenarios are YAML files of navigation, wait, interaction and sleep
//! steps followed by a single text-visibility assertion. They are run
//! against Chrome through the W3C WebDriver protocol.

pub mod browser;
pub mod cli;
pub mod commands;
pub mod common;
pub mod testing;
pub mod webdriver;

// Re-export commonly used types for tests
pub use common::{Error, Result};
