//! Main test runner that orchestrates the app server, browsers and suites

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use soundcheck_common::HarnessEnv;
use tracing::{debug, error, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::gate::Gate;
use crate::page::Page;
use crate::playwright::PlaywrightConfig;
use crate::server::{ServerConfig, ServerHandle};
use crate::suite::{Filter, Suite, TestCase, TestContext, TestInfo};
use crate::transport::BrowserLauncher;

pub const RESULTS_FILE: &str = "test-results.json";

/// Time allowed for the failure screenshot
const SCREENSHOT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

/// Screenshot captured when a test failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureScreenshot {
    pub path: PathBuf,
    pub sha256: String,
}

/// Result of running a single test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub suite: String,
    pub name: String,
    pub status: TestStatus,
    pub attempts: u32,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub skip_reason: Option<String>,
    pub screenshot: Option<FailureScreenshot>,
}

impl TestResult {
    fn skipped(suite: &Suite, test: &TestCase, attempts: u32, reason: String) -> Self {
        Self {
            suite: suite.name.clone(),
            name: test.name.clone(),
            status: TestStatus::Skipped,
            attempts,
            duration_ms: 0,
            error: None,
            skip_reason: Some(reason),
            screenshot: None,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} › {}", self.suite, self.name)
    }
}

/// Result of running all tests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    fn from_results(results: Vec<TestResult>, duration_ms: u64) -> Self {
        let count = |status| results.iter().filter(|r| r.status == status).count();
        Self {
            total: results.len(),
            passed: count(TestStatus::Passed),
            failed: count(TestStatus::Failed),
            skipped: count(TestStatus::Skipped),
            duration_ms,
            results,
        }
    }

    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Configuration for the test runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// App server to spawn before the run
    pub server: Option<ServerConfig>,
    pub playwright: PlaywrightConfig,
    pub output_dir: PathBuf,
    pub workers: usize,
    pub retries: u32,
    pub test_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            server: None,
            playwright: PlaywrightConfig::default(),
            output_dir: PathBuf::from("test-results"),
            workers: 1,
            retries: 0,
            test_timeout: Duration::from_secs(120),
        }
    }
}

enum Attempt {
    Passed,
    Skipped(String),
    Failed(String, Option<FailureScreenshot>),
}

/// Main E2E test runner
pub struct TestRunner {
    config: RunnerConfig,
    env: Arc<HarnessEnv>,
    gate: Gate,
    launcher: Arc<dyn BrowserLauncher>,
    server: Option<ServerHandle>,
}

impl TestRunner {
    pub fn new(config: RunnerConfig, env: HarnessEnv, launcher: Arc<dyn BrowserLauncher>) -> Self {
        let gate = Gate::from_env(&env);
        debug!("Gate: {:?}", gate);
        Self {
            config,
            env: Arc::new(env),
            gate,
            launcher,
            server: None,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn gate(&self) -> Gate {
        self.gate
    }

    /// Start the app server, if one is configured
    pub async fn start_server(&mut self) -> E2eResult<()> {
        if self.server.is_some() {
            return Ok(()); // Already running
        }
        if let Some(config) = self.config.server.clone() {
            self.server = Some(ServerHandle::spawn(config).await?);
        }
        Ok(())
    }

    pub async fn stop_server(&mut self) -> E2eResult<()> {
        if let Some(mut server) = self.server.take() {
            server.stop().await?;
        }
        Ok(())
    }

    /// Run every test matching `filter`, then stop the server
    pub async fn run(&mut self, suites: &[Suite], filter: &Filter) -> E2eResult<TestSuiteResult> {
        self.start_server().await?;
        let result = self.run_selected(suites, filter).await;
        self.stop_server().await?;
        Ok(result)
    }

    async fn run_selected(&self, suites: &[Suite], filter: &Filter) -> TestSuiteResult {
        let start = Instant::now();
        let planned = filter.select(suites);

        info!("Running {} test(s) with {} worker(s)...", planned.len(), self.config.workers);

        let mut results: Vec<(usize, TestResult)> = stream::iter(planned.into_iter().enumerate())
            .map(|(index, (suite, test))| async move { (index, self.run_test(suite, test).await) })
            .buffer_unordered(self.config.workers.max(1))
            .collect()
            .await;
        results.sort_by_key(|(index, _)| *index);

        let duration_ms = start.elapsed().as_millis() as u64;
        let summary = TestSuiteResult::from_results(results.into_iter().map(|(_, r)| r).collect(), duration_ms);

        info!("");
        info!(
            "Test Results: {} passed, {} failed, {} skipped ({} ms)",
            summary.passed, summary.failed, summary.skipped, duration_ms
        );
        summary
    }

    /// Run a single test, with gating and retries
    pub async fn run_test(&self, suite: &Suite, test: &TestCase) -> TestResult {
        if let Err(reason) = self.gate.check(&suite.requirements_of(test)) {
            info!("- {} › {} (skipped: {})", suite.name, test.name, reason);
            return TestResult::skipped(suite, test, 0, reason);
        }

        let start = Instant::now();
        let max_attempts = self.config.retries + 1;
        let mut attempt = 1;

        loop {
            match self.run_attempt(suite, test, attempt).await {
                Attempt::Passed => {
                    let duration_ms = start.elapsed().as_millis() as u64;
                    info!("✓ {} › {} ({} ms)", suite.name, test.name, duration_ms);
                    return TestResult {
                        suite: suite.name.clone(),
                        name: test.name.clone(),
                        status: TestStatus::Passed,
                        attempts: attempt,
                        duration_ms,
                        error: None,
                        skip_reason: None,
                        screenshot: None,
                    };
                }
                Attempt::Skipped(reason) => {
                    info!("- {} › {} (skipped: {})", suite.name, test.name, reason);
                    let mut result = TestResult::skipped(suite, test, attempt, reason);
                    result.duration_ms = start.elapsed().as_millis() as u64;
                    return result;
                }
                Attempt::Failed(reason, screenshot) if attempt >= max_attempts => {
                    error!("✗ {} › {} - {}", suite.name, test.name, reason);
                    return TestResult {
                        suite: suite.name.clone(),
                        name: test.name.clone(),
                        status: TestStatus::Failed,
                        attempts: attempt,
                        duration_ms: start.elapsed().as_millis() as u64,
                        error: Some(reason),
                        skip_reason: None,
                        screenshot,
                    };
                }
                Attempt::Failed(reason, _) => {
                    warn!(
                        "{} › {} failed on attempt {}/{}: {}; retrying",
                        suite.name, test.name, attempt, max_attempts, reason
                    );
                    attempt += 1;
                }
            }
        }
    }

    async fn run_attempt(&self, suite: &Suite, test: &TestCase, attempt: u32) -> Attempt {
        debug!("Running test: {} › {} (attempt {})", suite.name, test.name, attempt);

        let transport = match self.launcher.launch(&suite.profile).await {
            Ok(transport) => transport,
            Err(e) => return Attempt::Failed(format!("browser launch failed: {e}"), None),
        };

        let page = Page::new(transport.clone(), self.config.playwright.action_timeout);
        let info = TestInfo {
            suite: suite.name.clone(),
            name: test.name.clone(),
            attempt,
            output_dir: self
                .config
                .output_dir
                .join("artifacts")
                .join(slug(&suite.name))
                .join(slug(&test.name)),
        };
        let ctx = TestContext {
            page: page.clone(),
            env: self.env.clone(),
            info: info.clone(),
        };

        let limit = test.timeout.unwrap_or(self.config.test_timeout);
        let outcome = match tokio::time::timeout(limit, (test.body)(ctx)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(E2eError::Timeout(format!("test exceeded {} ms", limit.as_millis()))),
        };

        let attempt_result = match outcome {
            Ok(()) => Attempt::Passed,
            Err(E2eError::Skipped(reason)) => Attempt::Skipped(reason),
            Err(e) => {
                let screenshot = self.capture_failure(&page, &info).await;
                Attempt::Failed(e.to_string(), screenshot)
            }
        };

        if let Err(e) = transport.close().await {
            warn!("Failed to close browser for {}: {}", test.name, e);
        }

        attempt_result
    }

    /// Best-effort screenshot of the page after a failure
    async fn capture_failure(&self, page: &Page, info: &TestInfo) -> Option<FailureScreenshot> {
        let dir = self.config.output_dir.join("screenshots");
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!("Cannot create {}: {}", dir.display(), e);
            return None;
        }
        let path = dir.join(format!(
            "{}-{}-attempt{}.png",
            slug(&info.suite),
            slug(&info.name),
            info.attempt
        ));

        match tokio::time::timeout(SCREENSHOT_TIMEOUT, page.screenshot(&path, true)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Failure screenshot for {} not captured: {}", info.name, e);
                return None;
            }
            Err(_) => {
                warn!("Failure screenshot for {} timed out", info.name);
                return None;
            }
        }

        match hash_file(&path) {
            Ok(sha256) => {
                info!("Failure screenshot: {} (sha256 {})", path.display(), sha256);
                Some(FailureScreenshot { path, sha256 })
            }
            Err(e) => {
                warn!("Failure screenshot {} unreadable: {}", path.display(), e);
                None
            }
        }
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        write_results(&self.config.output_dir, results)
    }
}

pub fn write_results(output_dir: &Path, results: &TestSuiteResult) -> E2eResult<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let path = output_dir.join(RESULTS_FILE);
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}

fn hash_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// File-name-safe form of a test or suite name
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}
