//! iOS WebKit buffer clamp, forced on desktop through the debug hooks

use std::time::Duration;

use soundcheck_common::snapshot::IosClampState;
use tracing::{info, warn};

use crate::debug::{PlayerDebug, IOS_BUFFER_DEBUG};
use crate::error::E2eResult;
use crate::gate::Requirement;
use crate::poll::{poll_until, PollOptions};
use crate::suite::{Suite, TestCase, TestContext};

use super::flow::{open_player, start_playback};

const CLAMP_TIMEOUT: Duration = Duration::from_secs(10);

pub fn suite() -> Suite {
    Suite::new("ios_clamp")
        .describe("Forced iOS buffer clamp")
        .tag("playback")
        .tag("ios")
        .requires(Requirement::UserCredentials)
        .test(TestCase::new("forced clamp reports active state", forced_clamp))
}

async fn wait_for_clamp(debug: &PlayerDebug, active: bool) -> E2eResult<Option<IosClampState>> {
    poll_until(
        &format!("iOS clamp active == {active}"),
        PollOptions::new(CLAMP_TIMEOUT),
        || debug.ios_clamp_state(),
        |state: &Option<IosClampState>| state.as_ref().map(|s| s.active == active).unwrap_or(false),
    )
    .await
}

async fn forced_clamp(ctx: TestContext) -> E2eResult<()> {
    let debug = open_player(&ctx).await?;
    if debug.ios_clamp_state().await?.is_none() {
        crate::skip!("getIOSClampState not exposed");
    }
    if let Some(info) = debug.ios_info().await? {
        info!("isIOSWebKit = {}", info.is_ios_webkit);
    }

    debug.force_ios_clamp(true).await?;
    start_playback(&ctx.page, &debug).await?;
    let state = wait_for_clamp(&debug, true).await?;
    info!("Clamp state: {:?}", state);

    if debug.global_present(IOS_BUFFER_DEBUG).await {
        let events = debug.ios_buffer_events().await?;
        crate::ensure!(!events.is_empty(), "no iOS buffer events recorded while clamped");
        info!("{} iOS buffer event(s)", events.len());
    } else {
        warn!("window.{} not exposed; skipping event check", IOS_BUFFER_DEBUG);
    }

    debug.force_ios_clamp(false).await?;
    wait_for_clamp(&debug, false).await?;
    Ok(())
}
