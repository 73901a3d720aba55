//! Playback engine: fast start, loading modal, monotonic time, session id,
//! offline recovery, request tracing

use std::time::Duration;

use soundcheck_common::snapshot::{PlaybackLoadingState, PlaybackTrace};
use tracing::{info, warn};

use crate::debug::{PlayerDebug, PLAYBACK_TRACE};
use crate::error::{E2eError, E2eResult};
use crate::gate::Requirement;
use crate::page::testid;
use crate::poll::{poll_until, PollOptions};
use crate::selectors::{ATTR_STATUS, NAV_CHANNELS, NAV_PROFILE, NAV_SETTINGS, PLAYBACK_LOADING_MODAL};
use crate::suite::{Suite, TestCase, TestContext};

use super::flow::{open_player, start_playback};

/// Largest tolerated backward step of `currentTime`, in seconds
pub const BACKWARD_JUMP_TOLERANCE: f64 = 0.5;

/// How long the network stays down in the recovery test
pub const OFFLINE_PERIOD: Duration = Duration::from_secs(4);

const SAMPLE_INTERVAL: Duration = Duration::from_millis(500);
const SAMPLE_COUNT: usize = 16;
const LOADING_CLEAR_TIMEOUT: Duration = Duration::from_secs(20);
const RECOVERY_TIMEOUT: Duration = Duration::from_secs(30);
const TRACE_TIMEOUT: Duration = Duration::from_secs(15);

pub fn suite() -> Suite {
    Suite::new("playback")
        .describe("Audio engine behavior observed through the debug hooks")
        .tag("playback")
        .requires(Requirement::UserCredentials)
        .test(TestCase::new("fast start within budget", fast_start).tag("smoke"))
        .test(TestCase::new("loading modal clears", loading_modal_clears))
        .test(TestCase::new("current time never jumps backward", monotonic_time))
        .test(TestCase::new("session id stable across navigation", session_id_stable))
        .test(TestCase::new("recovers after going offline", offline_recovery).tag("resilience"))
        .test(TestCase::new("trace reports hostnames", trace_hostnames))
}

async fn fast_start(ctx: TestContext) -> E2eResult<()> {
    let debug = open_player(&ctx).await?;
    start_playback(&ctx.page, &debug).await?;

    let metrics = debug
        .wait_for_metrics("fastStart.firstAudioMs", Duration::from_secs(10), |m| {
            m.first_audio_ms().is_some()
        })
        .await?;
    let first_audio_ms = metrics.first_audio_ms().unwrap_or(f64::INFINITY);
    let budget = ctx.env.fast_start_max_ms as f64;

    info!("First audio after {:.0} ms (budget {:.0} ms)", first_audio_ms, budget);
    crate::ensure!(
        first_audio_ms <= budget,
        "first audio after {first_audio_ms:.0} ms exceeds FAST_START_MAX_MS={budget:.0}"
    );
    Ok(())
}

async fn loading_modal_clears(ctx: TestContext) -> E2eResult<()> {
    let debug = open_player(&ctx).await?;
    start_playback(&ctx.page, &debug).await?;

    let modal = testid(PLAYBACK_LOADING_MODAL);
    if ctx.page.is_visible(&modal).await.unwrap_or(false) {
        let status = ctx.page.attribute(&modal, ATTR_STATUS).await.ok().flatten();
        crate::ensure!(status.as_deref() != Some("error"), "loading modal reports an error");
    }
    ctx.page.wait_hidden(&modal, LOADING_CLEAR_TIMEOUT).await?;

    if debug.loading_state().await?.is_some() {
        poll_until(
            "playback loading state idle",
            PollOptions::new(LOADING_CLEAR_TIMEOUT),
            || debug.loading_state(),
            |state: &Option<PlaybackLoadingState>| state.as_ref().map(|s| s.is_idle()).unwrap_or(false),
        )
        .await?;
    }
    Ok(())
}

/// First pair of consecutive samples where time moved back more than `tolerance`
pub fn first_backward_jump(samples: &[f64], tolerance: f64) -> Option<(f64, f64)> {
    samples
        .windows(2)
        .map(|w| (w[0], w[1]))
        .find(|(before, after)| after + tolerance < *before)
}

async fn monotonic_time(ctx: TestContext) -> E2eResult<()> {
    let debug = open_player(&ctx).await?;
    start_playback(&ctx.page, &debug).await?;

    let mut samples = Vec::with_capacity(SAMPLE_COUNT);
    for _ in 0..SAMPLE_COUNT {
        if let Some(t) = debug.current_time().await? {
            samples.push(t);
        }
        tokio::time::sleep(SAMPLE_INTERVAL).await;
    }

    if samples.len() < 2 {
        crate::skip!("getCurrentTime returned too few samples ({})", samples.len());
    }
    if let Some((before, after)) = first_backward_jump(&samples, BACKWARD_JUMP_TOLERANCE) {
        return Err(E2eError::AssertionFailed(format!(
            "currentTime jumped backward from {before:.2}s to {after:.2}s (samples {samples:?})"
        )));
    }

    let (first, last) = (samples[0], samples[samples.len() - 1]);
    crate::ensure!(last > first, "currentTime did not advance: {first:.2}s -> {last:.2}s");
    Ok(())
}

async fn session_id(debug: &PlayerDebug) -> E2eResult<String> {
    match debug.session_id().await? {
        Some(id) => Ok(id),
        None => crate::skip!("getPlaybackSessionId returned nothing"),
    }
}

async fn session_id_stable(ctx: TestContext) -> E2eResult<()> {
    let debug = open_player(&ctx).await?;
    start_playback(&ctx.page, &debug).await?;

    let original = session_id(&debug).await?;
    let channel = debug.active_channel().await?;
    for nav in [NAV_PROFILE, NAV_SETTINGS, NAV_CHANNELS] {
        ctx.page.click(&testid(nav)).await?;
        ctx.page.sleep(Duration::from_millis(500)).await?;

        let current = debug.session_id().await?;
        crate::ensure!(
            current.as_deref() == Some(original.as_str()),
            "session id changed from {original} to {current:?} after {nav}"
        );
    }

    if channel.is_some() {
        let after = debug.active_channel().await?;
        crate::ensure!(after == channel, "active channel changed from {channel:?} to {after:?}");
    }
    Ok(())
}

async fn offline_recovery(ctx: TestContext) -> E2eResult<()> {
    let debug = open_player(&ctx).await?;
    start_playback(&ctx.page, &debug).await?;

    ctx.page.set_offline(true).await?;
    tokio::time::sleep(OFFLINE_PERIOD).await;
    ctx.page.set_offline(false).await?;

    let resumed_from = debug.current_time().await?.unwrap_or(0.0);
    let reached = debug.wait_for_progress(resumed_from, RECOVERY_TIMEOUT).await?;
    debug
        .wait_for_metrics("playing after reconnect", RECOVERY_TIMEOUT, |m| m.is_playing())
        .await?;

    match debug.transport_state().await? {
        Some(state) => info!("Recovered: {:.2}s -> {:.2}s, transport {}", resumed_from, reached, state.name()),
        None => info!("Recovered: {:.2}s -> {:.2}s", resumed_from, reached),
    }
    Ok(())
}

async fn trace_hostnames(ctx: TestContext) -> E2eResult<()> {
    let debug = open_player(&ctx).await?;
    if !debug.global_present(PLAYBACK_TRACE).await {
        crate::skip!("window.{PLAYBACK_TRACE} not exposed");
    }
    if let Err(e) = debug.clear_traces().await {
        warn!("Could not clear traces: {}", e);
    }

    start_playback(&ctx.page, &debug).await?;

    let trace = poll_until(
        "playback trace with hostnames",
        PollOptions::new(TRACE_TIMEOUT),
        || debug.latest_trace(),
        |trace: &Option<PlaybackTrace>| {
            trace.as_ref().map(|t| t.hostnames().next().is_some()).unwrap_or(false)
        },
    )
    .await?;

    let hosts: Vec<String> = trace
        .map(|t| t.hostnames().map(String::from).collect())
        .unwrap_or_default();
    info!("Audio served from {}", hosts.join(", "));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backward_jump_detection() {
        assert_eq!(first_backward_jump(&[1.0, 1.5, 2.0, 2.5], BACKWARD_JUMP_TOLERANCE), None);
        // Small jitter within tolerance is fine.
        assert_eq!(first_backward_jump(&[3.0, 2.7, 3.2], BACKWARD_JUMP_TOLERANCE), None);
        assert_eq!(
            first_backward_jump(&[3.0, 3.5, 1.0, 1.5], BACKWARD_JUMP_TOLERANCE),
            Some((3.5, 1.0))
        );
        assert_eq!(first_backward_jump(&[], BACKWARD_JUMP_TOLERANCE), None);
    }
}
