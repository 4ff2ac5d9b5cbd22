//! Session capabilities for Chrome

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::common::config::BrowserConfig;

/// When a navigation command returns
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PageLoadStrategy {
    /// Wait for the load event
    Normal,
    /// Wait for DOMContentLoaded
    Eager,
    /// Return as soon as the navigation is committed
    None,
}

/// Capabilities requesting a Chrome session
///
/// `--headless=new` is appended for headless runs unless the configured
/// arguments already pick a headless mode.
pub fn chrome_capabilities(browser: &BrowserConfig, strategy: PageLoadStrategy) -> Map<String, Value> {
    let mut args = browser.args.clone();
    if browser.headless && !args.iter().any(|a| a.starts_with("--headless")) {
        args.push("--headless=new".to_string());
    }

    let mut chrome_options = json!({ "args": args });
    if let Some(binary) = &browser.binary {
        chrome_options["binary"] = json!(binary.display().to_string());
    }

    let mut caps = Map::new();
    caps.insert("browserName".to_string(), json!("chrome"));
    caps.insert("pageLoadStrategy".to_string(), json!(strategy));
    caps.insert("goog:chromeOptions".to_string(), chrome_options);
    caps
}
