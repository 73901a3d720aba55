//! Run settings (`soundcheck.toml`)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use soundcheck_common::HarnessEnv;
use tracing::debug;

use crate::error::{E2eError, E2eResult};
use crate::playwright::{Browser, PlaywrightConfig};
use crate::runner::RunnerConfig;
use crate::server::ServerConfig;

pub const DEFAULT_CONFIG_FILE: &str = "soundcheck.toml";

/// Retries used on CI when nothing else is configured
pub const CI_RETRIES: u32 = 2;

/// Runner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Where results and failure screenshots go
    pub output_dir: PathBuf,

    /// Directory of YAML scenarios
    pub specs_dir: PathBuf,

    /// Concurrent tests, each with its own browser
    pub workers: usize,

    /// Retries per failed test; `None` means 2 on CI, 0 otherwise
    pub retries: Option<u32>,

    /// Per-test timeout in seconds
    pub test_timeout_secs: u64,

    /// Browser configuration
    pub browser: BrowserSettings,

    /// Local app server to spawn before running
    pub server: Option<ServerSettings>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("test-results"),
            specs_dir: PathBuf::from("scenarios"),
            workers: 1,
            retries: None,
            test_timeout_secs: 120,
            browser: BrowserSettings::default(),
            server: None,
        }
    }
}

/// Browser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub browser: Browser,
    pub headless: bool,

    /// Directory containing `node_modules/playwright`
    pub project_dir: PathBuf,

    /// Default action timeout in milliseconds
    pub action_timeout_ms: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            project_dir: PathBuf::from("."),
            action_timeout_ms: 10_000,
        }
    }
}

/// Local app server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Program to run, e.g. `npm`
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub cwd: Option<PathBuf>,

    #[serde(default = "default_health_path")]
    pub health_path: String,

    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
}

fn default_health_path() -> String {
    "/".to_string()
}

fn default_startup_timeout() -> u64 {
    120
}

impl RunSettings {
    pub fn from_toml(content: &str) -> E2eResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            debug!("Loading run settings from {}", path.display());
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn effective_retries(&self, env: &HarnessEnv) -> u32 {
        self.retries.unwrap_or(if env.ci { CI_RETRIES } else { 0 })
    }

    pub fn runner_config(&self, env: &HarnessEnv) -> RunnerConfig {
        RunnerConfig {
            server: self.server.as_ref().map(|s| ServerConfig {
                program: s.command.clone(),
                args: s.args.clone(),
                cwd: s.cwd.clone(),
                base_url: env.base_url.clone(),
                health_path: s.health_path.clone(),
                startup_timeout: Duration::from_secs(s.startup_timeout_secs),
            }),
            playwright: PlaywrightConfig {
                base_url: env.base_url.clone(),
                browser: self.browser.browser,
                headless: self.browser.headless,
                project_dir: self.browser.project_dir.clone(),
                action_timeout: Duration::from_millis(self.browser.action_timeout_ms),
                ..PlaywrightConfig::default()
            },
            output_dir: self.output_dir.clone(),
            workers: self.workers.max(1),
            retries: self.effective_retries(env),
            test_timeout: Duration::from_secs(self.test_timeout_secs),
        }
    }
}
