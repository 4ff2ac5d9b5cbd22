//! Chrome over WebDriver
//!
//! Implements [`BrowserDriver`] on top of a `fantoccini` client. The
//! session is created with the `none` page load strategy, so navigation
//! returns at commit and every further readiness check is an explicit poll.
//! Every driver round trip is bounded by the caller's deadline.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder};
use serde_json::{json, Value};
use tokio::time::{sleep, timeout_at, Instant};

use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::webdriver::{
    chrome_capabilities, is_transient, CommandExt, DriverProcess, PageLoadStrategy,
};

use super::{BrowserDriver, ElementAction, LoadState, Locator};

const READY_STATE_SCRIPT: &str = "return document.readyState;";
const FRAME_COUNT_SCRIPT: &str = "return window.frames.length;";
// Cross-origin frames throw on document access and count as loaded
const FRAME_READY_STATE_SCRIPT: &str = "try { return window.frames[arguments[0]].document.readyState; } catch (e) { return 'complete'; }";
const SCROLL_SCRIPT: &str =
    "window.scrollBy(0, arguments[0] === null ? window.innerHeight : arguments[0]);";
const CLEAR_STORAGE_SCRIPT: &str =
    "try { window.localStorage.clear(); window.sessionStorage.clear(); } catch (e) {}";

/// Chrome browser driven through a WebDriver endpoint
pub struct ChromeBrowser {
    /// WebDriver session, `None` once the browser is closed
    client: Option<Client>,
    /// Locally spawned driver, absent for remote endpoints
    driver: Option<DriverProcess>,
    /// Interval between page polls
    poll_interval: Duration,
    /// Whether the isolated context is still open
    context_open: bool,
}

impl ChromeBrowser {
    /// Start (or connect to) a driver and open a browser session
    ///
    /// Anything acquired before a failure is released before returning.
    #[tracing::instrument(skip(config), fields(remote = config.driver.url.is_some()))]
    pub async fn launch(config: &Config) -> Result<Self> {
        let (driver, endpoint) = match &config.driver.url {
            Some(url) => {
                tracing::info!(endpoint = %url, "Using remote WebDriver");
                (None, url.clone())
            }
            None => {
                let path = config.resolve_driver()?;
                tracing::info!(driver = %path.display(), "Starting WebDriver");
                let process = DriverProcess::spawn(
                    &path,
                    config.driver.port,
                    &config.driver.args,
                    Duration::from_secs(config.driver.startup_timeout_secs),
                )
                .await?;
                let url = process.url();
                (Some(process), url)
            }
        };

        let mut browser = Self {
            client: None,
            driver,
            poll_interval: config.timeouts.poll_interval(),
            context_open: false,
        };

        if let Err(e) = browser.open_session(&endpoint, config).await {
            let _ = browser.close_browser().await;
            let _ = browser.stop_driver().await;
            return Err(e);
        }

        Ok(browser)
    }

    async fn open_session(&mut self, endpoint: &str, config: &Config) -> Result<()> {
        let mut builder = ClientBuilder::native();
        builder.capabilities(chrome_capabilities(&config.browser, PageLoadStrategy::None));
        let client = builder.connect(endpoint).await.during("new session")?;
        let client = self.client.insert(client);

        client
            .update_timeouts(TimeoutConfiguration::new(
                Some(config.timeouts.action()),
                Some(config.timeouts.navigation()),
                Some(Duration::ZERO),
            ))
            .await
            .during("set timeouts")?;

        self.context_open = true;
        tracing::info!(endpoint, "Browser session opened");
        Ok(())
    }

    fn client(&self) -> Result<&Client> {
        self.client.as_ref().ok_or(Error::SessionClosed)
    }

    /// Make the most recently opened window the current browsing context
    async fn focus_topmost_page(&self) -> Result<()> {
        let client = self.client()?;
        let mut handles = client.windows().await.during("get window handles")?;
        match handles.pop() {
            Some(handle) => client
                .switch_to_window(handle)
                .await
                .during("switch to window"),
            None => Err(Error::SessionClosed),
        }
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.client()?
            .execute(script, args)
            .await
            .during("execute script")
    }

    async fn ready_state(&self) -> Result<String> {
        let value = self.execute(READY_STATE_SCRIPT, Vec::new()).await?;
        Ok(value.as_str().unwrap_or("loading").to_string())
    }

    async fn frame_ready_state(&self, frame: usize) -> Result<String> {
        let value = self
            .execute(FRAME_READY_STATE_SCRIPT, vec![json!(frame)])
            .await?;
        Ok(value.as_str().unwrap_or("loading").to_string())
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<Element>> {
        self.client()?
            .find_all(locator.as_webdriver())
            .await
            .during("find elements")
    }

    /// Run one attempt of an element action against the topmost page
    async fn try_perform(&self, locator: &Locator, action: &ElementAction) -> Result<bool> {
        self.focus_topmost_page().await?;

        let elements = self.find_all(locator).await?;
        let Some(element) = elements.get(locator.nth) else {
            return Ok(false);
        };

        apply_action(element, action).await?;
        Ok(true)
    }

    /// One visibility check: any displayed element showing the text
    async fn find_visible_text(&self, locator: &Locator) -> Result<bool> {
        self.focus_topmost_page().await?;
        for element in &self.find_all(locator).await? {
            match element.is_displayed().await.during("is element displayed") {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) if is_transient(&e) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(false)
    }

    /// Poll `read` until it reports `state` or the deadline passes
    async fn poll_ready_state<F, Fut>(
        &self,
        state: LoadState,
        operation: String,
        timeout: Duration,
        read: F,
    ) -> Result<()>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let deadline = Instant::now() + timeout;
        let timed_out = || Error::timeout(operation.as_str(), timeout);

        timeout_at(deadline, self.focus_topmost_page())
            .await
            .map_err(|_| timed_out())??;

        loop {
            let ready_state = timeout_at(deadline, read())
                .await
                .map_err(|_| timed_out())??;
            if state.is_reached_by(&ready_state) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(timed_out());
            }
            sleep(self.poll_interval).await;
        }
    }
}

async fn apply_action(element: &Element, action: &ElementAction) -> Result<()> {
    match action {
        ElementAction::Click => element.click().await.during("element click"),
        ElementAction::Fill(value) => {
            element.clear().await.during("element clear")?;
            if !value.is_empty() {
                element.send_keys(value).await.during("element send keys")?;
            }
            Ok(())
        }
    }
}

#[async_trait]
impl BrowserDriver for ChromeBrowser {
    async fn navigate(
        &mut self,
        url: &str,
        wait_until: LoadState,
        timeout: Duration,
    ) -> Result<()> {
        let started = Instant::now();
        let client = self.client()?;

        match tokio::time::timeout(timeout, client.goto(url)).await {
            Ok(result) => result
                .during("navigate to")
                .map_err(|e| Error::NavigationFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?,
            Err(_) => {
                return Err(Error::NavigationFailed {
                    url: url.to_string(),
                    reason: format!("not committed within {}ms", timeout.as_millis()),
                })
            }
        }

        if wait_until != LoadState::Commit {
            let remaining = timeout.saturating_sub(started.elapsed());
            self.wait_for_load_state(wait_until, remaining)
                .await
                .map_err(|e| Error::NavigationFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
        }

        Ok(())
    }

    async fn wait_for_load_state(&mut self, state: LoadState, timeout: Duration) -> Result<()> {
        self.poll_ready_state(state, format!("Waiting for {}", state), timeout, || {
            self.ready_state()
        })
        .await
    }

    async fn frame_count(&mut self) -> Result<usize> {
        self.focus_topmost_page().await?;
        let value = self.execute(FRAME_COUNT_SCRIPT, Vec::new()).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn wait_for_frame_load_state(
        &mut self,
        frame: usize,
        state: LoadState,
        timeout: Duration,
    ) -> Result<()> {
        self.poll_ready_state(
            state,
            format!("Waiting for {} in frame {}", state, frame),
            timeout,
            || self.frame_ready_state(frame),
        )
        .await
    }

    async fn perform(
        &mut self,
        locator: &Locator,
        action: &ElementAction,
        timeout: Duration,
    ) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut last_error: Option<Error> = None;

        loop {
            let attempt = match timeout_at(deadline, self.try_perform(locator, action)).await {
                Ok(attempt) => attempt,
                Err(_) => {
                    return Err(Error::action_failed(
                        action.name(),
                        &locator.to_string(),
                        &format!("driver did not respond within {}ms", timeout.as_millis()),
                    ))
                }
            };

            match attempt {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) if is_transient(&e) => {
                    tracing::trace!(locator = %locator, error = %e, "Element not actionable yet");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }

            if Instant::now() >= deadline {
                return Err(match last_error {
                    Some(e) => Error::action_failed(
                        action.name(),
                        &locator.to_string(),
                        &e.to_string(),
                    ),
                    None => Error::ElementNotFound {
                        locator: locator.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    },
                });
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn scroll_by(&mut self, delta_y: Option<i64>) -> Result<()> {
        self.focus_topmost_page().await?;
        let arg = delta_y.map(Value::from).unwrap_or(Value::Null);
        self.execute(SCROLL_SCRIPT, vec![arg]).await?;
        Ok(())
    }

    async fn is_text_visible(&mut self, text: &str, timeout: Duration) -> Result<bool> {
        let locator = Locator::text(text);
        let deadline = Instant::now() + timeout;
        loop {
            match timeout_at(deadline, self.find_visible_text(&locator)).await {
                Ok(Ok(true)) => return Ok(true),
                Ok(Ok(false)) => {}
                Ok(Err(e)) if is_transient(&e) => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => return Ok(false),
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn close_context(&mut self) -> Result<()> {
        if !self.context_open {
            return Ok(());
        }
        self.context_open = false;
        self.client()?
            .delete_all_cookies()
            .await
            .during("delete all cookies")?;
        self.focus_topmost_page().await?;
        self.execute(CLEAR_STORAGE_SCRIPT, Vec::new()).await?;
        Ok(())
    }

    async fn close_browser(&mut self) -> Result<()> {
        // Taken first so the session is never deleted twice
        match self.client.take() {
            Some(client) => client.close().await.during("delete session"),
            None => Ok(()),
        }
    }

    async fn stop_driver(&mut self) -> Result<()> {
        match self.driver.take() {
            Some(process) => process.stop().await,
            None => Ok(()),
        }
    }
}
