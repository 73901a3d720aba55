//! Error types for E2E testing

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Server failed to start: {0}")]
    ServerStartup(String),

    #[error("Server health check failed after {0} attempts")]
    ServerHealthCheck(usize),

    #[error("Playwright not found. Install with: npm i -D playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Browser driver exited")]
    DriverClosed,

    #[error("Test spec parse error: {0}")]
    SpecParse(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    /// Raised from a test body to mark the test skipped rather than failed
    #[error("Skipped: {0}")]
    Skipped(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Timed out after {waited_ms} ms ({attempts} attempts) waiting for {label}; last observed: {last}")]
    PollTimeout {
        label: String,
        waited_ms: u64,
        attempts: u32,
        last: String,
    },

    #[error(transparent)]
    Common(#[from] soundcheck_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    pub fn is_skip(&self) -> bool {
        matches!(self, E2eError::Skipped(_))
    }
}

pub type E2eResult<T> = Result<T, E2eError>;

/// Fail the current test with an assertion message unless `cond` holds
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::E2eError::AssertionFailed(format!($($arg)+)));
        }
    };
}

/// Mark the current test skipped
#[macro_export]
macro_rules! skip {
    ($($arg:tt)+) => {
        return Err($crate::E2eError::Skipped(format!($($arg)+)))
    };
}
