//! Browser automation surface
//!
//! The runner only ever talks to a [`BrowserDriver`]. The production
//! implementation is [`chrome::ChromeBrowser`]; tests substitute their own.

pub mod chrome;
pub mod locator;
pub mod session;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::common::Result;

pub use chrome::ChromeBrowser;
pub use locator::{Locator, LocatorStrategy};
pub use session::{Session, TeardownReport, TeardownStage};

/// Page readiness milestones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub enum LoadState {
    /// Navigation request committed; nothing about the document is known
    #[default]
    #[serde(rename = "commit")]
    Commit,
    /// `document.readyState` is at least `interactive`
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    /// `document.readyState` is `complete`
    #[serde(rename = "load")]
    Load,
}

impl LoadState {
    /// Whether a `document.readyState` value satisfies this state
    pub fn is_reached_by(&self, ready_state: &str) -> bool {
        match self {
            LoadState::Commit => true,
            LoadState::DomContentLoaded => {
                matches!(ready_state, "interactive" | "complete")
            }
            LoadState::Load => ready_state == "complete",
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Commit => write!(f, "commit"),
            Self::DomContentLoaded => write!(f, "domcontentloaded"),
            Self::Load => write!(f, "load"),
        }
    }
}

/// Interaction performed on a located element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementAction {
    Click,
    /// Replace the element's value; an empty string just clears it
    Fill(String),
}

impl ElementAction {
    pub fn name(&self) -> &'static str {
        match self {
            ElementAction::Click => "click",
            ElementAction::Fill(_) => "fill",
        }
    }
}

/// Capability surface consumed by the scenario runner
///
/// Page operations always target the topmost (most recently opened)
/// page. Teardown operations are called once each, in the order
/// context, browser, driver.
#[async_trait]
pub trait BrowserDriver: Send {
    /// Load a URL, returning once `wait_until` is reached
    async fn navigate(&mut self, url: &str, wait_until: LoadState, timeout: Duration)
        -> Result<()>;

    /// Wait for the topmost page to reach a load state
    async fn wait_for_load_state(&mut self, state: LoadState, timeout: Duration) -> Result<()>;

    /// Number of child frames in the topmost page
    async fn frame_count(&mut self) -> Result<usize>;

    /// Wait for one child frame to reach a load state
    async fn wait_for_frame_load_state(
        &mut self,
        frame: usize,
        state: LoadState,
        timeout: Duration,
    ) -> Result<()>;

    /// Locate an element and act on it within `timeout`
    async fn perform(
        &mut self,
        locator: &Locator,
        action: &ElementAction,
        timeout: Duration,
    ) -> Result<()>;

    /// Scroll the topmost page vertically; `None` scrolls one viewport
    async fn scroll_by(&mut self, delta_y: Option<i64>) -> Result<()>;

    /// Whether an element showing `text` becomes visible within `timeout`
    async fn is_text_visible(&mut self, text: &str, timeout: Duration) -> Result<bool>;

    /// Discard the isolated cookie and storage jar
    async fn close_context(&mut self) -> Result<()>;

    /// End the browser session
    async fn close_browser(&mut self) -> Result<()>;

    /// Stop the driver process
    async fn stop_driver(&mut self) -> Result<()>;
}
