//! Harness environment
//!
//! Everything the suites need from the process environment is read once into
//! a [`HarnessEnv`]. Reads go through a lookup function so tests can supply a
//! map instead of mutating the real environment.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const TEST_ADMIN_EMAIL: &str = "TEST_ADMIN_EMAIL";
pub const TEST_ADMIN_PASSWORD: &str = "TEST_ADMIN_PASSWORD";
pub const TEST_USER_EMAIL: &str = "TEST_USER_EMAIL";
pub const TEST_USER_PASSWORD: &str = "TEST_USER_PASSWORD";
pub const TEST_ALLOW_USER_DELETION: &str = "TEST_ALLOW_USER_DELETION";
pub const FAST_START_MAX_MS: &str = "FAST_START_MAX_MS";
pub const CI: &str = "CI";
pub const PLAYWRIGHT_BASE_URL: &str = "PLAYWRIGHT_BASE_URL";

/// Base URL used when `PLAYWRIGHT_BASE_URL` is unset
pub const DEFAULT_BASE_URL: &str = "http://localhost:5173";

/// Fast-start budget used when `FAST_START_MAX_MS` is unset
pub const DEFAULT_FAST_START_MAX_MS: u64 = 3000;

/// An email/password pair for signing in
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Snapshot of the harness-relevant environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessEnv {
    /// Admin account, present only when both email and password are set
    pub admin: Option<Credentials>,

    /// Regular user account, present only when both email and password are set
    pub user: Option<Credentials>,

    /// Opt-in for the destructive user cleanup test
    pub allow_user_deletion: bool,

    /// Upper bound for tap-to-first-audio
    pub fast_start_max_ms: u64,

    /// Running under CI
    pub ci: bool,

    /// Deployment under test
    pub base_url: String,
}

impl Default for HarnessEnv {
    fn default() -> Self {
        Self {
            admin: None,
            user: None,
            allow_user_deletion: false,
            fast_start_max_ms: DEFAULT_FAST_START_MAX_MS,
            ci: false,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl HarnessEnv {
    /// Read from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through an arbitrary lookup function
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let credentials = |email_key: &str, password_key: &str| match (get(email_key), get(password_key)) {
            (Some(email), Some(password)) => Some(Credentials { email, password }),
            _ => None,
        };

        let fast_start_max_ms = match get(FAST_START_MAX_MS) {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                Error::InvalidConfig(format!("{FAST_START_MAX_MS} must be an integer, got {raw:?}"))
            })?,
            None => DEFAULT_FAST_START_MAX_MS,
        };

        let base_url = get(PLAYWRIGHT_BASE_URL)
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            admin: credentials(TEST_ADMIN_EMAIL, TEST_ADMIN_PASSWORD),
            user: credentials(TEST_USER_EMAIL, TEST_USER_PASSWORD),
            allow_user_deletion: get(TEST_ALLOW_USER_DELETION).map(|v| is_truthy(&v)).unwrap_or(false),
            fast_start_max_ms,
            ci: get(CI).map(|v| is_truthy(&v)).unwrap_or(false),
            base_url,
        })
    }

    /// Admin credentials or a descriptive error naming the missing variables
    pub fn require_admin(&self) -> Result<&Credentials> {
        self.admin.as_ref().ok_or(Error::MissingEnv("TEST_ADMIN_EMAIL/TEST_ADMIN_PASSWORD"))
    }

    /// User credentials or a descriptive error naming the missing variables
    pub fn require_user(&self) -> Result<&Credentials> {
        self.user.as_ref().ok_or(Error::MissingEnv("TEST_USER_EMAIL/TEST_USER_PASSWORD"))
    }

    /// Resolve a path against the base URL
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn is_truthy(value: &str) -> bool {
    !matches!(value.to_ascii_lowercase().as_str(), "" | "0" | "false" | "no" | "off")
}
