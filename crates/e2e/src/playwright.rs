//! Playwright browser automation
//!
//! A [`PlaywrightDriver`] owns one `node` process running the embedded driver
//! script, which in turn owns one browser, context and page. Commands go out
//! as JSON lines on stdin; replies come back on stdout, matched by id.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command as TokioCommand};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::transport::{BrowserLauncher, Command, DriverReply, DriverRequest, Transport};

const DRIVER_SCRIPT: &str = include_str!("../driver/driver.js");

/// Reply id the driver uses to announce readiness
const READY_ID: u64 = 0;

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<DriverReply>>>>;

/// A request's reply slot; removed from the table when dropped, including
/// when the caller's future is cancelled mid-wait
struct PendingSlot {
    pending: Pending,
    id: u64,
}

impl PendingSlot {
    fn register(pending: &Pending, id: u64) -> (Self, oneshot::Receiver<DriverReply>) {
        let (tx, rx) = oneshot::channel();
        pending.lock().insert(id, tx);
        (Self { pending: pending.clone(), id }, rx)
    }
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> E2eResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::Playwright(format!("unknown browser: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport { width: 1280, height: 720 }
    }
}

/// What kind of browser context a suite needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BrowserProfile {
    Desktop {
        #[serde(default)]
        viewport: Viewport,
    },
    /// Playwright device descriptor, e.g. `iPhone 13`
    Mobile {
        #[serde(default = "default_device")]
        device: String,
    },
}

impl Default for BrowserProfile {
    fn default() -> Self {
        BrowserProfile::Desktop { viewport: Viewport::default() }
    }
}

impl BrowserProfile {
    pub fn mobile() -> Self {
        BrowserProfile::Mobile { device: default_device() }
    }
}

fn default_device() -> String {
    "iPhone 13".to_string()
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub base_url: String,
    pub browser: Browser,
    pub headless: bool,
    /// Directory with `node_modules/playwright`
    pub project_dir: PathBuf,
    /// Default per-action timeout inside the browser
    pub action_timeout: Duration,
    /// How long to wait for the browser to come up
    pub launch_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            base_url: soundcheck_common::env::DEFAULT_BASE_URL.to_string(),
            browser: Browser::Chromium,
            headless: true,
            project_dir: PathBuf::from("."),
            action_timeout: Duration::from_secs(10),
            launch_timeout: Duration::from_secs(60),
        }
    }
}

/// Configuration blob handed to the driver script through the environment
#[derive(Debug, Serialize)]
struct DriverConfig<'a> {
    base_url: &'a str,
    browser: &'static str,
    headless: bool,
    default_timeout_ms: u64,
    viewport: Option<Viewport>,
    device: Option<&'a str>,
}

/// Check if Playwright is installed
pub async fn check_playwright_installed(project_dir: &std::path::Path) -> E2eResult<()> {
    let status = TokioCommand::new("npx")
        .args(["--no-install", "playwright", "--version"])
        .current_dir(project_dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(status) if status.success() => Ok(()),
        _ => Err(E2eError::PlaywrightNotFound),
    }
}

/// Handle to a running driver process
pub struct PlaywrightDriver {
    child: AsyncMutex<Child>,
    stdin: AsyncMutex<ChildStdin>,
    pending: Pending,
    next_id: AtomicU64,
    _script_dir: tempfile::TempDir,
}

impl PlaywrightDriver {
    /// Launch a browser for the given profile and wait until its page is ready
    pub async fn launch(config: &PlaywrightConfig, profile: &BrowserProfile) -> E2eResult<Self> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("soundcheck-driver.js");
        std::fs::write(&script_path, DRIVER_SCRIPT)?;

        let (viewport, device) = match profile {
            BrowserProfile::Desktop { viewport } => (Some(*viewport), None),
            BrowserProfile::Mobile { device } => (None, Some(device.as_str())),
        };
        let driver_config = serde_json::to_string(&DriverConfig {
            base_url: &config.base_url,
            browser: config.browser.as_str(),
            headless: config.headless,
            default_timeout_ms: config.action_timeout.as_millis() as u64,
            viewport,
            device,
        })?;

        debug!("Launching {} driver: {}", config.browser.as_str(), script_path.display());

        let mut child = TokioCommand::new("node")
            .arg(&script_path)
            .current_dir(&config.project_dir)
            .env("SOUNDCHECK_DRIVER_CONFIG", driver_config)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::Playwright(format!("failed to spawn node: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Playwright("driver stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Playwright("driver stdout unavailable".into()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "soundcheck::driver", "{}", line);
                }
            });
        }

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let (ready_tx, ready_rx) = oneshot::channel();
        pending.lock().insert(READY_ID, ready_tx);

        let reader_pending = pending.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match serde_json::from_str::<DriverReply>(&line) {
                        Ok(reply) => {
                            if let Some(tx) = reader_pending.lock().remove(&reply.id) {
                                let _ = tx.send(reply);
                            } else {
                                debug!("Dropping reply for abandoned request {}", reply.id);
                            }
                        }
                        Err(_) => debug!(target: "soundcheck::driver", "{}", line),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Driver stdout read failed: {}", e);
                        break;
                    }
                }
            }
            // Dropping the senders fails every outstanding request.
            reader_pending.lock().clear();
        });

        let driver = Self {
            child: AsyncMutex::new(child),
            stdin: AsyncMutex::new(stdin),
            pending,
            next_id: AtomicU64::new(READY_ID + 1),
            _script_dir: script_dir,
        };

        match tokio::time::timeout(config.launch_timeout, ready_rx).await {
            Ok(Ok(reply)) if reply.ok => {
                info!("Browser ready ({})", config.browser.as_str());
                Ok(driver)
            }
            Ok(Ok(reply)) => Err(E2eError::Playwright(reply.error.unwrap_or_else(|| "launch failed".into()))),
            Ok(Err(_)) => Err(E2eError::Playwright(
                "driver exited during launch (is playwright installed in the project dir?)".into(),
            )),
            Err(_) => Err(E2eError::Timeout(format!(
                "browser launch after {} ms",
                config.launch_timeout.as_millis()
            ))),
        }
    }

    async fn write_request(&self, id: u64, command: &Command) -> E2eResult<()> {
        let mut line = serde_json::to_string(&DriverRequest { id, command })?;
        line.push('\n');

        let mut stdin = self.stdin.lock().await;
        stdin.write_all(line.as_bytes()).await.map_err(|_| E2eError::DriverClosed)?;
        stdin.flush().await.map_err(|_| E2eError::DriverClosed)?;
        Ok(())
    }
}

#[async_trait]
impl Transport for PlaywrightDriver {
    async fn send(&self, command: Command, timeout: Duration) -> E2eResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (_slot, rx) = PendingSlot::register(&self.pending, id);

        debug!("-> [{}] {}", id, command.label());

        self.write_request(id, &command).await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) if reply.ok => Ok(reply.value),
            Ok(Ok(reply)) => Err(E2eError::StepFailed {
                step: command.label(),
                reason: reply.error.unwrap_or_else(|| "unknown driver error".into()),
            }),
            Ok(Err(_)) => Err(E2eError::DriverClosed),
            Err(_) => Err(E2eError::Timeout(format!("{} after {} ms", command.label(), timeout.as_millis()))),
        }
    }

    async fn close(&self) -> E2eResult<()> {
        let _ = self.send(Command::Close, Duration::from_secs(5)).await;

        let mut child = self.child.lock().await;
        match tokio::time::timeout(Duration::from_secs(5), child.wait()).await {
            Ok(Ok(status)) => debug!("Driver exited: {}", status),
            _ => {
                warn!("Driver did not exit, killing it");
                let _ = child.kill().await;
            }
        }
        Ok(())
    }
}

/// Launches one driver process per test
pub struct PlaywrightLauncher {
    config: PlaywrightConfig,
}

impl PlaywrightLauncher {
    /// Verify Playwright is installed, then build a launcher
    pub async fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        check_playwright_installed(&config.project_dir).await?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PlaywrightConfig {
        &self.config
    }
}

#[async_trait]
impl BrowserLauncher for PlaywrightLauncher {
    async fn launch(&self, profile: &BrowserProfile) -> E2eResult<Arc<dyn Transport>> {
        let driver = PlaywrightDriver::launch(&self.config, profile).await?;
        Ok(Arc::new(driver))
    }
}
