//! Credential-gated skips
//!
//! Suites and tests declare what they need; the [`Gate`] is computed once from
//! the environment and answers whether a requirement set is met. Unmet
//! requirements mark tests skipped, never failed.

use std::fmt;

use serde::{Deserialize, Serialize};
use soundcheck_common::HarnessEnv;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    AdminCredentials,
    UserCredentials,
    UserDeletionAllowed,
}

impl Requirement {
    /// Why a test is skipped when this requirement is unmet
    pub fn skip_reason(&self) -> &'static str {
        match self {
            Requirement::AdminCredentials => "TEST_ADMIN_EMAIL/TEST_ADMIN_PASSWORD not set",
            Requirement::UserCredentials => "TEST_USER_EMAIL/TEST_USER_PASSWORD not set",
            Requirement::UserDeletionAllowed => "TEST_ALLOW_USER_DELETION not enabled",
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Requirement::AdminCredentials => "admin-credentials",
            Requirement::UserCredentials => "user-credentials",
            Requirement::UserDeletionAllowed => "user-deletion-allowed",
        };
        f.write_str(name)
    }
}

/// Requirement answers, evaluated once
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Gate {
    pub has_admin: bool,
    pub has_user: bool,
    pub allow_user_deletion: bool,
}

impl Gate {
    pub fn from_env(env: &HarnessEnv) -> Self {
        Self {
            has_admin: env.admin.is_some(),
            has_user: env.user.is_some(),
            allow_user_deletion: env.allow_user_deletion,
        }
    }

    pub fn satisfies(&self, requirement: Requirement) -> bool {
        match requirement {
            Requirement::AdminCredentials => self.has_admin,
            Requirement::UserCredentials => self.has_user,
            Requirement::UserDeletionAllowed => self.allow_user_deletion,
        }
    }

    /// `Err(reason)` for the first unmet requirement
    pub fn check(&self, requirements: &[Requirement]) -> Result<(), String> {
        match requirements.iter().find(|r| !self.satisfies(**r)) {
            Some(unmet) => Err(unmet.skip_reason().to_string()),
            None => Ok(()),
        }
    }
}
