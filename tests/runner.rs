//! Scenario runner integration tests
//!
//! These tests drive `testing::execute` with a recording browser driver
//! instead of a real browser, verifying:
//! 1. Step ordering and the single terminal assertion
//! 2. Soft and fatal failure handling
//! 3. Teardown on every exit path
//! 4. Timeout and delay defaults

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use e2e::browser::{
    BrowserDriver, ElementAction, LoadState, Locator, Session, TeardownStage,
};
use e2e::common::config::Config;
use e2e::testing::{execute, RunSettings, Scenario, TestResult};
use e2e::{Error, Result};

/// A driver call as seen by the recording driver
#[derive(Debug, Clone, PartialEq)]
enum Call {
    Navigate {
        url: String,
        wait_until: LoadState,
        timeout: Duration,
    },
    WaitForLoadState(LoadState),
    FrameCount,
    WaitForFrame(usize),
    Perform {
        locator: String,
        action: ElementAction,
        timeout: Duration,
    },
    Scroll(Option<i64>),
    TextVisible {
        text: String,
        timeout: Duration,
    },
    CloseContext,
    CloseBrowser,
    StopDriver,
}

#[derive(Debug, Clone)]
struct Entry {
    /// Time since the driver was created
    at: Duration,
    call: Call,
}

type CallLog = Arc<Mutex<Vec<Entry>>>;

/// Browser driver that records every call and fails on request
#[derive(Default)]
struct RecordingDriver {
    log: CallLog,
    started: Option<Instant>,
    frames: usize,
    fail_page_wait: bool,
    fail_frames: HashSet<usize>,
    fail_navigate: bool,
    /// Selector fragment whose interactions fail
    fail_locator: Option<String>,
    visible_texts: Vec<String>,
    visibility_error: bool,
    fail_teardown: Vec<TeardownStage>,
}

impl RecordingDriver {
    fn new() -> Self {
        Self {
            started: Some(Instant::now()),
            ..Default::default()
        }
    }

    fn showing(mut self, text: &str) -> Self {
        self.visible_texts.push(text.to_string());
        self
    }

    fn log(&self) -> CallLog {
        self.log.clone()
    }

    fn record(&self, call: Call) {
        let at = self.started.map(|s| s.elapsed()).unwrap_or_default();
        self.log.lock().unwrap().push(Entry { at, call });
    }

    fn teardown(&self, stage: TeardownStage, call: Call) -> Result<()> {
        self.record(call);
        if self.fail_teardown.contains(&stage) {
            return Err(Error::DriverCommunication(format!("{} exploded", stage)));
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserDriver for RecordingDriver {
    async fn navigate(&mut self, url: &str, wait_until: LoadState, timeout: Duration) -> Result<()> {
        self.record(Call::Navigate {
            url: url.to_string(),
            wait_until,
            timeout,
        });
        if self.fail_navigate {
            return Err(Error::NavigationFailed {
                url: url.to_string(),
                reason: "net::ERR_CONNECTION_REFUSED".to_string(),
            });
        }
        Ok(())
    }

    async fn wait_for_load_state(&mut self, state: LoadState, timeout: Duration) -> Result<()> {
        self.record(Call::WaitForLoadState(state));
        if self.fail_page_wait {
            return Err(Error::timeout(format!("Waiting for {}", state), timeout));
        }
        Ok(())
    }

    async fn frame_count(&mut self) -> Result<usize> {
        self.record(Call::FrameCount);
        Ok(self.frames)
    }

    async fn wait_for_frame_load_state(
        &mut self,
        frame: usize,
        state: LoadState,
        timeout: Duration,
    ) -> Result<()> {
        self.record(Call::WaitForFrame(frame));
        if self.fail_frames.contains(&frame) {
            return Err(Error::timeout(
                format!("Waiting for {} in frame {}", state, frame),
                timeout,
            ));
        }
        Ok(())
    }

    async fn perform(
        &mut self,
        locator: &Locator,
        action: &ElementAction,
        timeout: Duration,
    ) -> Result<()> {
        self.record(Call::Perform {
            locator: locator.selector.clone(),
            action: action.clone(),
            timeout,
        });
        if let Some(fragment) = &self.fail_locator {
            if locator.selector.contains(fragment.as_str()) {
                return Err(Error::ElementNotFound {
                    locator: locator.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
        }
        Ok(())
    }

    async fn scroll_by(&mut self, delta_y: Option<i64>) -> Result<()> {
        self.record(Call::Scroll(delta_y));
        Ok(())
    }

    async fn is_text_visible(&mut self, text: &str, timeout: Duration) -> Result<bool> {
        self.record(Call::TextVisible {
            text: text.to_string(),
            timeout,
        });
        if self.visibility_error {
            return Err(Error::SessionClosed);
        }
        Ok(self.visible_texts.iter().any(|t| t == text))
    }

    async fn close_context(&mut self) -> Result<()> {
        self.teardown(TeardownStage::CloseContext, Call::CloseContext)
    }

    async fn close_browser(&mut self) -> Result<()> {
        self.teardown(TeardownStage::CloseBrowser, Call::CloseBrowser)
    }

    async fn stop_driver(&mut self) -> Result<()> {
        self.teardown(TeardownStage::StopDriver, Call::StopDriver)
    }
}

const LOGIN_SCENARIO: &str = r#"
name: Host creates a draft listing
steps:
  - action: navigate
    url: /login
  - action: fill
    selector: xpath=html/body/div/form/div/div/input
    value: host@example.com
  - action: fill
    selector: xpath=html/body/div/form/div[2]/div/input
    value: "12345abc"
  - action: click
    selector: xpath=html/body/div/form/button
assert:
  text: Listing Published Successfully
  timeout_ms: 1000
  message: >-
    The listing creation test did not pass as expected. The listing was not
    saved as a draft and images were not confirmed uploaded.
"#;

fn settings() -> RunSettings {
    let mut settings = RunSettings::from_config(&Config::default());
    settings.quiet = true;
    settings
}

async fn run(yaml: &str, driver: RecordingDriver) -> (TestResult, Vec<Entry>) {
    let log = driver.log();
    let scenario = Scenario::from_yaml(yaml).unwrap();
    let session = Session::new(Box::new(driver));
    let result = execute(&scenario, session, &settings()).await;
    let entries = log.lock().unwrap().clone();
    (result, entries)
}

fn calls(entries: &[Entry]) -> Vec<Call> {
    entries.iter().map(|e| e.call.clone()).collect()
}

fn teardown_calls(entries: &[Entry]) -> Vec<Call> {
    calls(entries)
        .into_iter()
        .filter(|c| matches!(c, Call::CloseContext | Call::CloseBrowser | Call::StopDriver))
        .collect()
}

fn count(entries: &[Entry], pred: impl Fn(&Call) -> bool) -> usize {
    entries.iter().filter(|e| pred(&e.call)).count()
}

// ============== Terminal assertion ==============

#[tokio::test(start_paused = true)]
async fn test_missing_text_fails_with_authored_message() {
    let (result, entries) = run(LOGIN_SCENARIO, RecordingDriver::new()).await;

    assert!(!result.passed);
    assert_eq!(result.steps_run, 4);
    assert_eq!(result.steps_total, 4);

    let message = result.error.as_ref().unwrap().to_string();
    assert!(message.starts_with("Test case failed: "));
    assert!(message.contains("saved as a draft"));
    assert!(message.contains("images were not confirmed uploaded"));

    assert_eq!(
        count(&entries, |c| matches!(c, Call::TextVisible { .. })),
        1
    );
    assert!(entries.iter().any(|e| e.call
        == Call::TextVisible {
            text: "Listing Published Successfully".to_string(),
            timeout: Duration::from_millis(1000),
        }));

    assert_eq!(
        teardown_calls(&entries),
        vec![Call::CloseContext, Call::CloseBrowser, Call::StopDriver]
    );
    assert!(result.teardown.is_clean());
    assert!(matches!(result.into_result(), Err(Error::AssertionFailed(_))));
}

#[tokio::test(start_paused = true)]
async fn test_visible_text_passes_after_settle_delay() {
    let driver = RecordingDriver::new().showing("Listing Published Successfully");
    let (result, entries) = run(LOGIN_SCENARIO, driver).await;

    assert!(result.passed, "unexpected failure: {:?}", result.error);
    assert!(result.error.is_none());

    let assert_at = entries
        .iter()
        .find(|e| matches!(e.call, Call::TextVisible { .. }))
        .map(|e| e.at)
        .unwrap();
    let teardown_at = entries
        .iter()
        .find(|e| e.call == Call::CloseContext)
        .map(|e| e.at)
        .unwrap();
    assert!(teardown_at - assert_at >= Duration::from_millis(5000));

    assert_eq!(
        teardown_calls(&entries),
        vec![Call::CloseContext, Call::CloseBrowser, Call::StopDriver]
    );
    assert!(result.into_result().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_assertion_runs_once_after_all_steps() {
    let driver = RecordingDriver::new().showing("Listing Published Successfully");
    let (_, entries) = run(LOGIN_SCENARIO, driver).await;

    let all = calls(&entries);
    let assert_idx = all
        .iter()
        .position(|c| matches!(c, Call::TextVisible { .. }))
        .unwrap();
    let last_step_idx = all
        .iter()
        .rposition(|c| matches!(c, Call::Perform { .. }))
        .unwrap();
    let teardown_idx = all.iter().position(|c| *c == Call::CloseContext).unwrap();

    assert!(last_step_idx < assert_idx);
    assert!(assert_idx < teardown_idx);
    assert_eq!(count(&entries, |c| matches!(c, Call::TextVisible { .. })), 1);
}

#[tokio::test(start_paused = true)]
async fn test_visibility_error_counts_as_not_visible() {
    let mut driver = RecordingDriver::new().showing("Listing Published Successfully");
    driver.visibility_error = true;
    let (result, entries) = run(LOGIN_SCENARIO, driver).await;

    assert!(!result.passed);
    assert!(matches!(result.error, Some(Error::AssertionFailed(_))));
    assert_eq!(teardown_calls(&entries).len(), 3);
}

// ============== Soft waits ==============

const WAIT_SCENARIO: &str = r#"
name: Waits are best effort
steps:
  - action: navigate
    url: /
  - action: wait_for_load_state
    state: domcontentloaded
    frames: true
  - action: click
    selector: xpath=html/body/div/a
  - action: scroll
assert:
  text: Welcome
  message: Home page did not load
"#;

#[tokio::test(start_paused = true)]
async fn test_soft_wait_failures_do_not_abort() {
    let mut driver = RecordingDriver::new().showing("Welcome");
    driver.frames = 3;
    driver.fail_page_wait = true;
    driver.fail_frames = [1].into_iter().collect();

    let (result, entries) = run(WAIT_SCENARIO, driver).await;

    assert!(result.passed, "unexpected failure: {:?}", result.error);
    assert_eq!(result.steps_run, 4);

    // Every frame is waited on even though frame 1 failed
    let frame_waits: Vec<Call> = calls(&entries)
        .into_iter()
        .filter(|c| matches!(c, Call::WaitForFrame(_)))
        .collect();
    assert_eq!(
        frame_waits,
        vec![Call::WaitForFrame(0), Call::WaitForFrame(1), Call::WaitForFrame(2)]
    );

    assert_eq!(count(&entries, |c| matches!(c, Call::Perform { .. })), 1);
    assert_eq!(count(&entries, |c| *c == Call::Scroll(None)), 1);
}

#[tokio::test(start_paused = true)]
async fn test_strict_wait_failure_is_fatal() {
    let yaml = r#"
name: Strict wait
steps:
  - action: navigate
    url: /
  - action: wait_for_load_state
    state: load
    tolerant: false
  - action: click
    selector: xpath=html/body/div/a
assert:
  text: Welcome
  message: Home page did not load
"#;
    let mut driver = RecordingDriver::new().showing("Welcome");
    driver.fail_page_wait = true;

    let (result, entries) = run(yaml, driver).await;

    assert!(!result.passed);
    assert_eq!(result.steps_run, 2);
    assert!(result.error.as_ref().unwrap().is_timeout());
    assert_eq!(count(&entries, |c| matches!(c, Call::Perform { .. })), 0);
    assert_eq!(count(&entries, |c| matches!(c, Call::TextVisible { .. })), 0);
    assert_eq!(teardown_calls(&entries).len(), 3);
}

// ============== Fatal steps ==============

#[tokio::test(start_paused = true)]
async fn test_fatal_interaction_stops_later_steps_and_tears_down() {
    let mut driver = RecordingDriver::new().showing("Listing Published Successfully");
    driver.fail_locator = Some("div[2]/div/input".to_string());

    let (result, entries) = run(LOGIN_SCENARIO, driver).await;

    assert!(!result.passed);
    assert_eq!(result.steps_run, 3);
    assert!(matches!(result.error, Some(Error::ElementNotFound { .. })));

    // The sign-in click and the assertion never happen
    assert!(!calls(&entries).iter().any(|c| matches!(
        c,
        Call::Perform { action: ElementAction::Click, .. }
    )));
    assert_eq!(count(&entries, |c| matches!(c, Call::TextVisible { .. })), 0);

    assert_eq!(
        teardown_calls(&entries),
        vec![Call::CloseContext, Call::CloseBrowser, Call::StopDriver]
    );
}

#[tokio::test(start_paused = true)]
async fn test_fatal_navigation_stops_later_steps() {
    let mut driver = RecordingDriver::new();
    driver.fail_navigate = true;

    let (result, entries) = run(LOGIN_SCENARIO, driver).await;

    assert!(!result.passed);
    assert_eq!(result.steps_run, 1);
    assert!(matches!(result.error, Some(Error::NavigationFailed { .. })));
    assert_eq!(count(&entries, |c| matches!(c, Call::Perform { .. })), 0);
    assert_eq!(teardown_calls(&entries).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_tolerant_interaction_failure_is_ignored() {
    let yaml = r#"
name: Optional banner
steps:
  - action: click
    selector: xpath=html/body/div[@id='cookie-banner']/button
    tolerant: true
  - action: click
    selector: xpath=html/body/main/a
assert:
  text: Welcome
  message: Home page did not load
"#;
    let mut driver = RecordingDriver::new().showing("Welcome");
    driver.fail_locator = Some("cookie-banner".to_string());

    let (result, entries) = run(yaml, driver).await;

    assert!(result.passed, "unexpected failure: {:?}", result.error);
    assert_eq!(count(&entries, |c| matches!(c, Call::Perform { .. })), 2);
}

// ============== Teardown ==============

#[tokio::test(start_paused = true)]
async fn test_teardown_failure_does_not_skip_later_stages() {
    let mut driver = RecordingDriver::new().showing("Listing Published Successfully");
    driver.fail_teardown = vec![TeardownStage::CloseContext, TeardownStage::CloseBrowser];

    let (result, entries) = run(LOGIN_SCENARIO, driver).await;

    // Teardown problems do not change the verdict
    assert!(result.passed);
    assert_eq!(
        teardown_calls(&entries),
        vec![Call::CloseContext, Call::CloseBrowser, Call::StopDriver]
    );
    assert!(!result.teardown.is_clean());

    let failed: Vec<TeardownStage> = result.teardown.failures().map(|(s, _)| s).collect();
    assert_eq!(
        failed,
        vec![TeardownStage::CloseContext, TeardownStage::CloseBrowser]
    );
}

// ============== Defaults ==============

#[tokio::test(start_paused = true)]
async fn test_timeouts_fall_back_to_config() {
    let yaml = r#"
name: Defaults
steps:
  - action: navigate
    url: /login
  - action: click
    selector: xpath=html/body/a
  - action: click
    selector: xpath=html/body/b
    timeout_ms: 750
    delay_ms: 0
assert:
  text: Welcome
  message: Home page did not load
"#;
    let driver = RecordingDriver::new().showing("Welcome");
    let (result, entries) = run(yaml, driver).await;
    assert!(result.passed);

    assert_eq!(
        entries[0].call,
        Call::Navigate {
            url: "http://localhost:8080/login".to_string(),
            wait_until: LoadState::Commit,
            timeout: Duration::from_millis(10_000),
        }
    );

    // Default pre-action delay, then the default action timeout
    assert!(entries[1].at - entries[0].at >= Duration::from_millis(3000));
    assert_eq!(
        entries[1].call,
        Call::Perform {
            locator: "/html/body/a".to_string(),
            action: ElementAction::Click,
            timeout: Duration::from_millis(5000),
        }
    );

    // Step-level overrides
    assert!(entries[2].at - entries[1].at < Duration::from_millis(3000));
    assert_eq!(
        entries[2].call,
        Call::Perform {
            locator: "/html/body/b".to_string(),
            action: ElementAction::Click,
            timeout: Duration::from_millis(750),
        }
    );

    assert_eq!(
        entries[3].call,
        Call::TextVisible {
            text: "Welcome".to_string(),
            timeout: Duration::from_millis(5000),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_sleep_step_waits() {
    let yaml = r#"
name: Sleep
settle_ms: 0
steps:
  - action: navigate
    url: https://example.com/
  - action: sleep
    ms: 3000
  - action: navigate
    url: /next
assert:
  text: Welcome
  message: Nothing
"#;
    let driver = RecordingDriver::new().showing("Welcome");
    let (result, entries) = run(yaml, driver).await;
    assert!(result.passed);

    match (&entries[0].call, &entries[1].call) {
        (Call::Navigate { url: first, .. }, Call::Navigate { url: second, .. }) => {
            assert_eq!(first, "https://example.com/");
            assert_eq!(second, "http://localhost:8080/next");
        }
        other => panic!("Expected two navigations, got {:?}", other),
    }
    assert!(entries[1].at - entries[0].at >= Duration::from_millis(3000));
}
