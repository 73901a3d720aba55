//! Session timer persistence across navigation

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::error::E2eResult;
use crate::gate::Requirement;
use crate::page::testid;
use crate::selectors::{
    session_timer_option, NAV_CHANNELS, NAV_PROFILE, NAV_SETTINGS, SESSION_TIMER_BUTTON, SESSION_TIMER_DISPLAY,
};
use crate::suite::{Suite, TestCase, TestContext};

use super::flow::{open_channels, sign_in_listener};

pub const SESSION_TIMER_MINUTES: u32 = 15;

/// A 15-minute timer shows 15:00 down to 14:00 during the test
static TIMER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"1[45]:\d{2}").expect("timer pattern is valid"));

/// Route taken while the timer runs
pub const NAVIGATION: [&str; 4] = [NAV_CHANNELS, NAV_PROFILE, NAV_SETTINGS, NAV_CHANNELS];

pub fn suite() -> Suite {
    Suite::new("settings")
        .describe("Settings persistence")
        .tag("settings")
        .requires(Requirement::UserCredentials)
        .test(TestCase::new("session timer survives navigation", session_timer_survives))
}

pub fn timer_running(display: &str) -> bool {
    TIMER_PATTERN.is_match(display)
}

async fn timer_text(ctx: &TestContext) -> E2eResult<String> {
    let display = testid(SESSION_TIMER_DISPLAY);
    ctx.page.wait_visible(&display, ctx.page.timeout()).await?;
    ctx.page.text(&display).await
}

async fn session_timer_survives(ctx: TestContext) -> E2eResult<()> {
    sign_in_listener(&ctx).await?;
    open_channels(&ctx.page).await?;

    ctx.page.click(&testid(SESSION_TIMER_BUTTON)).await?;
    ctx.page.click(&testid(&session_timer_option(SESSION_TIMER_MINUTES))).await?;

    let started = timer_text(&ctx).await?;
    crate::ensure!(timer_running(&started), "timer shows {started:?} right after setting 15 minutes");

    for nav in NAVIGATION {
        ctx.page.click(&testid(nav)).await?;
        ctx.page.sleep(Duration::from_millis(300)).await?;
    }

    let after = timer_text(&ctx).await?;
    info!("Session timer {} -> {}", started, after);
    crate::ensure!(timer_running(&after), "timer shows {after:?} after Channels→Profile→Settings→Channels");
    Ok(())
}
