//! Mobile bottom navigation under rapid switching

use std::time::Duration;

use tracing::info;

use crate::error::E2eResult;
use crate::gate::Requirement;
use crate::page::{testid, within};
use crate::playwright::BrowserProfile;
use crate::selectors::{MOBILE_NAV, NAV_CHANNELS, NAV_PROFILE, NAV_SETTINGS};
use crate::suite::{Suite, TestCase, TestContext};

use super::flow::{open_player, start_playback};

const ROUNDS: usize = 3;
const SWITCH_DELAY: Duration = Duration::from_millis(150);

pub fn suite() -> Suite {
    Suite::new("mobile")
        .describe("Mobile navigation resilience")
        .tag("mobile")
        .requires(Requirement::UserCredentials)
        .profile(BrowserProfile::mobile())
        .test(TestCase::new("rapid nav switching keeps playback", rapid_switching))
}

async fn rapid_switching(ctx: TestContext) -> E2eResult<()> {
    let debug = open_player(&ctx).await?;
    start_playback(&ctx.page, &debug).await?;
    let page = &ctx.page;

    let session = debug.session_id().await?;
    let nav = testid(MOBILE_NAV);

    for _ in 0..ROUNDS {
        for target in [NAV_PROFILE, NAV_SETTINGS, NAV_CHANNELS] {
            page.click(&within(&nav, &testid(target))).await?;
            page.sleep(SWITCH_DELAY).await?;
        }
    }

    let after = debug.session_id().await?;
    crate::ensure!(after == session, "session id changed from {session:?} to {after:?}");

    debug
        .wait_for_metrics("still playing after nav switching", Duration::from_secs(10), |m| m.is_playing())
        .await?;

    let errors = page.page_errors().await?;
    crate::ensure!(errors.is_empty(), "page errors during navigation: {errors:?}");

    info!("{} nav switches, session {:?} kept", ROUNDS * 3, session);
    Ok(())
}
