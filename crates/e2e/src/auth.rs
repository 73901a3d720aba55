//! Sign-in and admin navigation helpers shared by the suites

use std::time::Duration;

use soundcheck_common::Credentials;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};
use crate::page::{testid, Page};
use crate::selectors::{self, AdminTab};

/// How long to wait for the post-login indicator
pub const SIGN_IN_TIMEOUT: Duration = Duration::from_secs(15);

/// How long to wait for the admin dashboard after sign-in
pub const ADMIN_LOAD_TIMEOUT: Duration = Duration::from_secs(20);

pub async fn submit_auth_form(page: &Page, email: &str, password: &str) -> E2eResult<()> {
    page.fill(&testid(selectors::AUTH_EMAIL_INPUT), email).await?;
    page.fill(&testid(selectors::AUTH_PASSWORD_INPUT), password).await?;
    page.click(&testid(selectors::AUTH_SUBMIT_BUTTON)).await
}

/// Open `/` and make sure the auth form is showing
pub async fn open_auth_form(page: &Page) -> E2eResult<()> {
    page.goto("/").await?;
    // Some landing layouts render the form inline.
    if !page.appears(&testid(selectors::AUTH_EMAIL_INPUT), Duration::from_secs(2)).await {
        page.click(&testid(selectors::SIGN_IN_BUTTON)).await?;
    }
    page.wait_visible(&testid(selectors::AUTH_EMAIL_INPUT), page.timeout()).await
}

/// Sign in; `Ok(false)` when the post-login indicator never shows up
pub async fn sign_in(page: &Page, credentials: &Credentials) -> E2eResult<bool> {
    open_auth_form(page).await?;
    submit_auth_form(page, &credentials.email, &credentials.password).await?;

    match page.wait_visible(&testid(selectors::USER_MENU), SIGN_IN_TIMEOUT).await {
        Ok(()) => {
            info!("Signed in as {}", credentials.email);
            Ok(true)
        }
        Err(E2eError::StepFailed { .. }) | Err(E2eError::Timeout(_)) => {
            warn!("Sign-in for {} did not complete within {:?}", credentials.email, SIGN_IN_TIMEOUT);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Sign in or skip the test
pub async fn require_sign_in(page: &Page, credentials: &Credentials) -> E2eResult<()> {
    if sign_in(page, credentials).await? {
        Ok(())
    } else {
        Err(E2eError::Skipped(format!("could not sign in as {}", credentials.email)))
    }
}

/// Sign in and open the admin dashboard; `Ok(false)` on either timeout
pub async fn sign_in_as_admin(page: &Page, credentials: &Credentials) -> E2eResult<bool> {
    if !sign_in(page, credentials).await? {
        return Ok(false);
    }
    page.goto("/admin").await?;
    Ok(page.appears(&testid(selectors::ADMIN_DASHBOARD), ADMIN_LOAD_TIMEOUT).await)
}

/// Admin sign-in or skip the test
pub async fn require_admin(page: &Page, credentials: &Credentials) -> E2eResult<()> {
    if sign_in_as_admin(page, credentials).await? {
        Ok(())
    } else {
        Err(E2eError::Skipped(format!(
            "could not open the admin dashboard as {}",
            credentials.email
        )))
    }
}

/// Click an admin tab by its visible label and wait until that tab is active
pub async fn open_admin_tab(page: &Page, tab: AdminTab) -> E2eResult<()> {
    page.click(&tab.selector()).await?;
    page.wait_for_function(&tab.active_expression(), page.timeout())
        .await
        .map_err(|e| E2eError::AssertionFailed(format!("admin tab {} did not become active: {}", tab, e)))?;
    Ok(())
}

/// Register a new account; `Ok(false)` when the app never signs it in
pub async fn sign_up(page: &Page, email: &str, password: &str) -> E2eResult<bool> {
    open_auth_form(page).await?;
    page.click(&testid(selectors::SIGN_UP_LINK)).await?;
    submit_auth_form(page, email, password).await?;
    Ok(page.appears(&testid(selectors::USER_MENU), SIGN_IN_TIMEOUT).await)
}

pub async fn sign_out(page: &Page) -> E2eResult<()> {
    page.click(&testid(selectors::USER_MENU)).await?;
    page.click(&testid(selectors::SIGN_OUT_BUTTON)).await?;
    page.wait_hidden(&testid(selectors::USER_MENU), page.timeout()).await
}
