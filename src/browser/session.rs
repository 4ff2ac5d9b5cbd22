//! Scenario-scoped browser session
//!
//! A [`Session`] owns the driver for exactly one scenario. Closing it
//! consumes it, so teardown can run at most once; each teardown stage is
//! attempted regardless of how the earlier ones went.

use std::fmt;

use super::BrowserDriver;

/// Teardown stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStage {
    CloseContext,
    CloseBrowser,
    StopDriver,
}

impl fmt::Display for TeardownStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CloseContext => write!(f, "close context"),
            Self::CloseBrowser => write!(f, "close browser"),
            Self::StopDriver => write!(f, "stop driver"),
        }
    }
}

/// Outcome of each teardown stage
#[derive(Debug, Clone, Default)]
pub struct TeardownReport {
    /// Stages in the order they ran, with the error message on failure
    pub stages: Vec<(TeardownStage, Option<String>)>,
}

impl TeardownReport {
    /// Whether every stage completed without error
    pub fn is_clean(&self) -> bool {
        self.stages.iter().all(|(_, err)| err.is_none())
    }

    /// Stages that failed, with their messages
    pub fn failures(&self) -> impl Iterator<Item = (TeardownStage, &str)> {
        self.stages
            .iter()
            .filter_map(|(stage, err)| err.as_deref().map(|e| (*stage, e)))
    }

    fn record(&mut self, stage: TeardownStage, result: crate::common::Result<()>) {
        let error = match result {
            Ok(()) => {
                tracing::debug!(%stage, "Teardown stage complete");
                None
            }
            Err(e) => {
                tracing::warn!(%stage, error = %e, "Teardown stage failed");
                Some(e.to_string())
            }
        };
        self.stages.push((stage, error));
    }
}

/// Browser, context and pages for a single scenario
pub struct Session {
    driver: Box<dyn BrowserDriver>,
    closed: bool,
}

impl Session {
    /// Take ownership of an acquired driver
    pub fn new(driver: Box<dyn BrowserDriver>) -> Self {
        Self {
            driver,
            closed: false,
        }
    }

    /// Driver for executing steps
    pub fn driver(&mut self) -> &mut dyn BrowserDriver {
        self.driver.as_mut()
    }

    /// Tear the session down: context, then browser, then driver
    pub async fn close(mut self) -> TeardownReport {
        let mut report = TeardownReport::default();

        let result = self.driver.close_context().await;
        report.record(TeardownStage::CloseContext, result);

        let result = self.driver.close_browser().await;
        report.record(TeardownStage::CloseBrowser, result);

        let result = self.driver.stop_driver().await;
        report.record(TeardownStage::StopDriver, result);

        self.closed = true;
        report
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!("Browser session dropped without teardown");
        }
    }
}
