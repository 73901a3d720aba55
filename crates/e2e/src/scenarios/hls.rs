//! HLS to MP3 fallback

use std::time::Duration;

use tracing::{info, warn};

use crate::error::E2eResult;
use crate::gate::Requirement;
use crate::poll::{poll_until, PollOptions};
use crate::suite::{Suite, TestCase, TestContext};

use super::flow::{open_player, start_playback};

/// Request URLs aborted to force the fallback
pub const HLS_MANIFEST_PATTERN: &str = r"\.m3u8(\?|$)";

const FALLBACK_TIMEOUT: Duration = Duration::from_secs(30);

pub fn suite() -> Suite {
    Suite::new("hls")
        .describe("Fallback to progressive MP3 when HLS is unavailable")
        .tag("playback")
        .tag("resilience")
        .requires(Requirement::UserCredentials)
        .test(TestCase::new("falls back to mp3 when hls is blocked", mp3_fallback))
}

pub fn is_mp3_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.to_ascii_lowercase().ends_with(".mp3")
}

async fn mp3_fallback(ctx: TestContext) -> E2eResult<()> {
    let debug = open_player(&ctx).await?;
    if debug.hls_metrics().await?.is_none() {
        crate::skip!("build reports no HLS metrics");
    }

    ctx.page.route_abort(HLS_MANIFEST_PATTERN).await?;
    start_playback(&ctx.page, &debug).await?;

    let url = poll_until(
        "current track served as mp3",
        PollOptions::new(FALLBACK_TIMEOUT),
        || debug.current_track_url(),
        |url: &Option<String>| url.as_deref().map(is_mp3_url).unwrap_or(false),
    )
    .await?;

    let from = debug.current_time().await?.unwrap_or(0.0);
    debug.wait_for_progress(from, FALLBACK_TIMEOUT).await?;

    let events = debug.hls_fallback_events().await?;
    info!("Playing {:?} after {} fallback event(s)", url, events.len());

    if let Err(e) = ctx.page.unroute_all().await {
        warn!("Could not remove routes: {}", e);
    }
    Ok(())
}
