//! Admin dashboard: tabs, build info, library search, synthetic user cleanup

use std::time::Duration;

use soundcheck_common::fixtures::{guard_deletion, guard_row_deletion, USER_ROW_TESTID_PREFIX};
use soundcheck_common::BuildInfo;
use tracing::{info, warn};

use crate::auth::{open_admin_tab, require_admin};
use crate::error::E2eResult;
use crate::gate::Requirement;
use crate::page::{testid, testid_prefix, within};
use crate::poll::{poll_until, PollOptions};
use crate::selectors::{self, AdminTab};
use crate::suite::{Suite, TestCase, TestContext};

pub const LIBRARY_QUERY: &str = "focus";

/// How long the library search may take to return rows
pub const LIBRARY_SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

pub fn suite() -> Suite {
    Suite::new("admin")
        .describe("Admin dashboard flows")
        .tag("admin")
        .requires(Requirement::AdminCredentials)
        .test(TestCase::new("dashboard loads", dashboard_loads).tag("smoke"))
        .test(TestCase::new("every tab opens", every_tab_opens))
        .test(TestCase::new("build info label parses", build_info_parses))
        .test(TestCase::new("library search finds tracks", library_search))
        .test(
            TestCase::new("cleanup synthetic users", cleanup_synthetic_users)
                .tag("destructive")
                .requires(Requirement::UserDeletionAllowed),
        )
}

async fn sign_in(ctx: &TestContext) -> E2eResult<()> {
    let credentials = ctx.env.require_admin()?;
    require_admin(&ctx.page, credentials).await
}

async fn dashboard_loads(ctx: TestContext) -> E2eResult<()> {
    sign_in(&ctx).await?;
    let visible = ctx.page.is_visible(&testid(selectors::ADMIN_DASHBOARD)).await?;
    crate::ensure!(visible, "admin dashboard not visible after sign-in");
    Ok(())
}

async fn every_tab_opens(ctx: TestContext) -> E2eResult<()> {
    sign_in(&ctx).await?;
    for tab in AdminTab::ALL {
        open_admin_tab(&ctx.page, tab).await?;
        info!("Opened admin tab {}", tab);
    }
    Ok(())
}

async fn build_info_parses(ctx: TestContext) -> E2eResult<()> {
    sign_in(&ctx).await?;
    let selector = testid(selectors::ADMIN_BUILD_INFO);
    ctx.page.wait_visible(&selector, ctx.page.timeout()).await?;

    // The label is either the element text or its tooltip.
    let mut label = ctx.page.text(&selector).await?;
    if label.is_empty() {
        label = ctx.page.attribute(&selector, "title").await?.unwrap_or_default();
    }

    let build = BuildInfo::parse(&label)?;
    info!("Build: {} ({})", build, if build.is_local() { "local" } else { "deployed" });
    Ok(())
}

async fn library_search(ctx: TestContext) -> E2eResult<()> {
    sign_in(&ctx).await?;
    let page = &ctx.page;

    open_admin_tab(page, AdminTab::Library).await?;
    page.click(&testid(selectors::LIBRARY_MODAL_OPEN)).await?;
    page.wait_visible(&testid(selectors::LIBRARY_MODAL), page.timeout()).await?;
    page.fill(&testid(selectors::LIBRARY_SEARCH_INPUT), LIBRARY_QUERY).await?;

    // Zero rows is a failure, not a skip: the library is expected to be populated.
    let track_rows = within(&testid(selectors::LIBRARY_MODAL), &testid(selectors::TRACK_ROW));
    let rows = poll_until(
        &format!("track rows for {LIBRARY_QUERY:?}"),
        PollOptions::new(LIBRARY_SEARCH_TIMEOUT),
        || page.count(&track_rows),
        |count: &usize| *count > 0,
    )
    .await?;

    info!("Library search {:?} returned {} row(s)", LIBRARY_QUERY, rows);
    Ok(())
}

/// Row test ids that are safe to delete
pub fn deletable_rows(testids: &[String]) -> Vec<&str> {
    testids
        .iter()
        .filter_map(|testid| match guard_row_deletion(testid) {
            Ok(_) => Some(testid.as_str()),
            Err(e) => {
                warn!("Skipping row {}: {}", testid, e);
                None
            }
        })
        .collect()
}

async fn cleanup_synthetic_users(ctx: TestContext) -> E2eResult<()> {
    sign_in(&ctx).await?;
    let page = &ctx.page;

    open_admin_tab(page, AdminTab::Users).await?;

    let rows: Vec<String> = page
        .evaluate(&format!(
            "Array.from(document.querySelectorAll('{}')).map(el => el.getAttribute('data-testid'))",
            testid_prefix(USER_ROW_TESTID_PREFIX).replace('\'', "\\'")
        ))
        .await?;

    let targets = deletable_rows(&rows);
    info!("{} user row(s), {} synthetic", rows.len(), targets.len());

    let mut deleted = 0;
    for row_testid in targets {
        let email = guard_row_deletion(row_testid)?;
        guard_deletion(email)?;

        let row = testid(row_testid);
        page.click(&within(&row, &testid(selectors::USER_DELETE_BUTTON))).await?;
        page.click(&testid(selectors::CONFIRM_DELETE_BUTTON)).await?;
        page.wait_hidden(&row, page.timeout()).await?;
        info!("Deleted synthetic user {}", email);
        deleted += 1;
    }

    info!("Deleted {} synthetic user(s)", deleted);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deletable_rows_only_synthetic() {
        let rows = vec![
            "user-row-e2e-user-1733000000000@example.com".to_string(),
            "user-row-listener@example.com".to_string(),
            "user-row-".to_string(),
            "something-else".to_string(),
            "user-row-E2E-USER-7@example.com".to_string(),
        ];
        assert_eq!(
            deletable_rows(&rows),
            vec!["user-row-e2e-user-1733000000000@example.com"]
        );
    }
}
