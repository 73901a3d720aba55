//! Steps shared by the listener-facing suites

use std::time::Duration;

use tracing::{debug, info};

use crate::auth;
use crate::debug::PlayerDebug;
use crate::error::E2eResult;
use crate::page::{nth, testid, Page};
use crate::poll::{poll_until, PollOptions};
use crate::selectors::{ATTR_PLAYING, CHANNEL_CARD, PLAYER_PLAY_PAUSE};
use crate::suite::TestContext;

/// How long playback may take to report `playing`
pub const PLAYBACK_START_TIMEOUT: Duration = Duration::from_secs(30);

/// Sign in as the configured listener, or skip
pub async fn sign_in_listener(ctx: &TestContext) -> E2eResult<()> {
    let credentials = ctx.env.require_user()?;
    auth::require_sign_in(&ctx.page, credentials).await
}

/// Go to `/channels` and wait for the grid
pub async fn open_channels(page: &Page) -> E2eResult<()> {
    page.goto("/channels").await?;
    page.wait_visible(&testid(CHANNEL_CARD), page.timeout()).await
}

/// Signed in on the channel grid with debug hooks present
pub async fn open_player(ctx: &TestContext) -> E2eResult<PlayerDebug> {
    sign_in_listener(ctx).await?;
    open_channels(&ctx.page).await?;
    PlayerDebug::require(&ctx.page).await
}

/// Start the first channel and wait until the engine reports playing
pub async fn start_playback(page: &Page, debug: &PlayerDebug) -> E2eResult<()> {
    page.click(&nth(&testid(CHANNEL_CARD), 0)).await?;

    // Selecting a card autoplays on most builds.
    let button = testid(PLAYER_PLAY_PAUSE);
    if page.appears(&button, Duration::from_secs(5)).await
        && page.attribute(&button, ATTR_PLAYING).await?.as_deref() != Some("true")
    {
        debug!("Player idle after channel select; pressing play");
        page.click(&button).await?;
    }

    let metrics = debug
        .wait_for_metrics("playbackState == playing", PLAYBACK_START_TIMEOUT, |m| m.is_playing())
        .await?;
    info!(
        "Playback started (track {:?}, session {:?})",
        metrics.current_track_id, metrics.playback_session_id
    );
    Ok(())
}

/// Poll an attribute until `accept` holds, returning the final value
pub async fn wait_for_attribute<P>(
    page: &Page,
    selector: &str,
    name: &str,
    timeout: Duration,
    mut accept: P,
) -> E2eResult<Option<String>>
where
    P: FnMut(Option<&str>) -> bool,
{
    poll_until(
        &format!("{selector}@{name}"),
        PollOptions::new(timeout),
        || page.attribute(selector, name),
        |value: &Option<String>| accept(value.as_deref()),
    )
    .await
}
