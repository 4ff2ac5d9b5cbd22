//! Local driver process management
//!
//! Spawns a driver executable (chromedriver by default) on a local port
//! and waits until its `/status` endpoint reports ready.

use std::net::TcpListener;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::{Child, Command};
use tokio::time::{sleep, Instant};

use crate::common::{Error, Result};

/// Interval between readiness polls while the driver starts
const READY_POLL: Duration = Duration::from_millis(100);

/// Upper bound on one `/status` request
const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Readiness reported by a driver's `/status` endpoint
#[derive(Debug, Deserialize)]
pub struct DriverStatus {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize)]
struct StatusEnvelope {
    value: DriverStatus,
}

/// Query the `/status` endpoint of a driver such as `http://127.0.0.1:9515`
pub async fn status(endpoint: &str) -> Result<DriverStatus> {
    let url = format!("{}/status", endpoint.trim_end_matches('/'));
    let response = reqwest::Client::new()
        .get(&url)
        .timeout(STATUS_TIMEOUT)
        .send()
        .await?;

    let http_status = response.status();
    let body = response.text().await?;
    let envelope: StatusEnvelope = serde_json::from_str(&body).map_err(|e| {
        Error::Protocol(format!(
            "'{}' returned an unexpected body (HTTP {}): {}",
            url, http_status, e
        ))
    })?;
    Ok(envelope.value)
}

/// A running driver executable
pub struct DriverProcess {
    /// Driver subprocess
    child: Child,
    /// Port the driver listens on
    port: u16,
}

impl DriverProcess {
    /// Spawn the driver and wait for it to accept sessions
    ///
    /// A `port` of 0 selects a free local port.
    pub async fn spawn(
        path: &Path,
        port: u16,
        args: &[String],
        startup_timeout: Duration,
    ) -> Result<Self> {
        let port = if port == 0 { free_port()? } else { port };

        let mut cmd = Command::new(path);
        cmd.arg(format!("--port={}", port))
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            Error::DriverStartFailed(format!("Failed to start {}: {}", path.display(), e))
        })?;

        tracing::debug!(path = %path.display(), port, pid = ?child.id(), "Driver process spawned");

        let mut process = Self { child, port };
        process.wait_ready(startup_timeout).await?;
        Ok(process)
    }

    /// Endpoint URL of the driver
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Poll `/status` until the driver is ready, has exited, or time runs out
    async fn wait_ready(&mut self, startup_timeout: Duration) -> Result<()> {
        let url = self.url();
        let deadline = Instant::now() + startup_timeout;

        loop {
            if let Some(exit) = self.child.try_wait()? {
                return Err(Error::DriverStartFailed(format!(
                    "Driver exited during startup with {}",
                    exit
                )));
            }

            match status(&url).await {
                Ok(status) if status.ready => {
                    tracing::debug!(message = %status.message, "Driver ready");
                    return Ok(());
                }
                Ok(status) => {
                    tracing::trace!(message = %status.message, "Driver not ready yet");
                }
                Err(e) => {
                    tracing::trace!(error = %e, "Driver not reachable yet");
                }
            }

            if Instant::now() >= deadline {
                let _ = self.child.kill().await;
                return Err(Error::DriverStartTimeout(startup_timeout.as_secs()));
            }
            sleep(READY_POLL).await;
        }
    }

    /// Kill the driver and reap it
    pub async fn stop(mut self) -> Result<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }
        self.child.kill().await?;
        tracing::debug!(port = self.port, "Driver process stopped");
        Ok(())
    }
}

/// Ask the OS for an unused local port
fn free_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
