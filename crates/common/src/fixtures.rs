//! Synthetic test users
//!
//! Accounts created by the suites are named `e2e-user-{timestamp}@example.com`.
//! The destructive cleanup path may only ever touch accounts that follow that
//! convention; [`guard_deletion`] is the single check every deletion goes
//! through.

use chrono::Utc;

use crate::error::{Error, Result};

/// Prefix every synthetic test account starts with
pub const E2E_USER_PREFIX: &str = "e2e-user-";

/// Domain used for synthetic accounts
pub const E2E_USER_DOMAIN: &str = "example.com";

/// `data-testid` prefix of rows in the admin users table
pub const USER_ROW_TESTID_PREFIX: &str = "user-row-";

/// Generate a fresh throwaway email from the current time
pub fn generate_user_email() -> String {
    user_email_at(Utc::now().timestamp_millis())
}

/// Throwaway email for a given Unix-millisecond timestamp
pub fn user_email_at(timestamp_ms: i64) -> String {
    format!("{E2E_USER_PREFIX}{timestamp_ms}@{E2E_USER_DOMAIN}")
}

/// Whether an email follows the synthetic naming convention (exact, case-sensitive)
pub fn is_synthetic_user(email: &str) -> bool {
    email.starts_with(E2E_USER_PREFIX)
}

/// Extract the email from a users-table row test id (`user-row-{email}`)
pub fn email_from_row_testid(testid: &str) -> Option<&str> {
    testid
        .strip_prefix(USER_ROW_TESTID_PREFIX)
        .filter(|email| !email.is_empty())
}

/// Refuse to delete anything that is not a synthetic test user
pub fn guard_deletion(email: &str) -> Result<()> {
    if is_synthetic_user(email) {
        Ok(())
    } else {
        tracing::warn!(email, "refusing to delete non-synthetic account");
        Err(Error::UnsafeDeletion(email.to_string()))
    }
}

/// Guard a deletion identified by a users-table row test id
pub fn guard_row_deletion(testid: &str) -> Result<&str> {
    let email = email_from_row_testid(testid).ok_or_else(|| Error::UnsafeDeletion(testid.to_string()))?;
    guard_deletion(email)?;
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_email_shape() {
        assert_eq!(user_email_at(1733096880000), "e2e-user-1733096880000@example.com");
        let email = generate_user_email();
        assert!(is_synthetic_user(&email));
        assert!(email.ends_with("@example.com"));
    }

    #[test]
    fn test_guard_accepts_synthetic_rows() {
        let email = guard_row_deletion("user-row-e2e-user-1733096880000@example.com").unwrap();
        assert_eq!(email, "e2e-user-1733096880000@example.com");
    }

    #[test]
    fn test_guard_rejects_real_accounts() {
        for testid in [
            "user-row-alice@example.com",
            "user-row-admin@company.io",
            "user-row-e2e-admin@example.com",
            "user-row-",
            "e2e-user-123@example.com",
            "row-e2e-user-123@example.com",
            "user-row-E2E-USER-alice@corp.example",
            "user-row- e2e-user-123@example.com",
        ] {
            assert!(
                matches!(guard_row_deletion(testid), Err(Error::UnsafeDeletion(_))),
                "guard must refuse {testid}"
            );
        }
        assert!(guard_deletion("someone@example.com").is_err());
    }
}
