//! Crossfade mode setting

use std::time::Duration;

use soundcheck_common::snapshot::CrossfadeMode;
use tracing::{info, warn};

use crate::debug::PlayerDebug;
use crate::error::E2eResult;
use crate::gate::Requirement;
use crate::page::testid;
use crate::poll::{poll_until, PollOptions};
use crate::selectors::CROSSFADE_MODE_SELECT;
use crate::suite::{Suite, TestCase, TestContext};

use super::flow::sign_in_listener;

const APPLY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn suite() -> Suite {
    Suite::new("crossfade")
        .describe("Crossfade mode selection")
        .tag("settings")
        .requires(Requirement::UserCredentials)
        .test(TestCase::new("mode is applied and survives reload", mode_persists))
}

/// A mode other than `current`
pub fn pick_other_mode(current: Option<CrossfadeMode>) -> CrossfadeMode {
    CrossfadeMode::ALL
        .into_iter()
        .find(|mode| Some(*mode) != current)
        .unwrap_or(CrossfadeMode::Sequential)
}

async fn open_settings(ctx: &TestContext) -> E2eResult<PlayerDebug> {
    ctx.page.goto("/settings").await?;
    ctx.page
        .wait_visible(&testid(CROSSFADE_MODE_SELECT), ctx.page.timeout())
        .await?;
    PlayerDebug::require(&ctx.page).await
}

async fn wait_for_mode(debug: &PlayerDebug, mode: CrossfadeMode) -> E2eResult<()> {
    poll_until(
        &format!("crossfade mode {mode}"),
        PollOptions::new(APPLY_TIMEOUT),
        || debug.crossfade_mode(),
        |current: &Option<CrossfadeMode>| *current == Some(mode),
    )
    .await
    .map(|_| ())
}

async fn mode_persists(ctx: TestContext) -> E2eResult<()> {
    sign_in_listener(&ctx).await?;
    let debug = open_settings(&ctx).await?;

    let original = debug.crossfade_mode().await?;
    if original.is_none() {
        crate::skip!("getCrossfadeMode not exposed");
    }
    let target = pick_other_mode(original);
    info!("Switching crossfade {:?} -> {}", original, target);

    let select = testid(CROSSFADE_MODE_SELECT);
    ctx.page.select_option(&select, target.as_str()).await?;
    wait_for_mode(&debug, target).await?;

    ctx.page.reload().await?;
    let debug = open_settings(&ctx).await?;
    wait_for_mode(&debug, target).await?;

    if let Some(duration) = debug.crossfade_duration().await? {
        crate::ensure!(duration >= 0.0, "negative crossfade duration {duration}");
    }

    // Leave the account as we found it.
    if let Some(original) = original {
        if let Err(e) = ctx.page.select_option(&select, original.as_str()).await {
            warn!("Could not restore crossfade mode {}: {}", original, e);
        }
    }
    Ok(())
}
