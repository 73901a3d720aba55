//! Next-track prefetch

use std::time::Duration;

use serde_json::Value;
use tracing::info;

use crate::debug::track_id_of;
use crate::error::E2eResult;
use crate::gate::Requirement;
use crate::suite::{Suite, TestCase, TestContext};

use super::flow::{open_player, start_playback};

const PREFETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub fn suite() -> Suite {
    Suite::new("prefetch")
        .describe("Background fetch of the upcoming track")
        .tag("playback")
        .requires(Requirement::UserCredentials)
        .test(TestCase::new("next track is prefetched", next_track_prefetched))
}

/// Track id of the entry after `index`, if there is one
pub fn next_track_id(playlist: &[Value], index: i64) -> Option<String> {
    let next = usize::try_from(index).ok()?.checked_add(1)?;
    playlist.get(next).and_then(track_id_of)
}

async fn next_track_prefetched(ctx: TestContext) -> E2eResult<()> {
    let debug = open_player(&ctx).await?;
    start_playback(&ctx.page, &debug).await?;

    let playlist = debug.playlist().await?.unwrap_or_default();
    let index = debug.playlist_index().await?.unwrap_or(0);
    let Some(expected) = next_track_id(&playlist, index) else {
        crate::skip!("no next entry after index {index} in a playlist of {}", playlist.len());
    };

    let metrics = debug
        .wait_for_metrics("prefetch.source == next-track", PREFETCH_TIMEOUT, |m| {
            m.next_track_prefetch().is_some()
        })
        .await?;
    let prefetched = metrics.next_track_prefetch().and_then(|p| p.track_id.clone());

    info!("Prefetched {:?}, playlist next {}", prefetched, expected);
    crate::ensure!(
        prefetched.as_deref() == Some(expected.as_str()),
        "prefetched {prefetched:?} but the next playlist entry is {expected}"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_next_track_id() {
        let playlist = vec![json!({ "id": "a" }), json!("b"), json!({ "trackId": "c" })];
        assert_eq!(next_track_id(&playlist, 0), Some("b".into()));
        assert_eq!(next_track_id(&playlist, 1), Some("c".into()));
        assert_eq!(next_track_id(&playlist, 2), None);
        assert_eq!(next_track_id(&playlist, -1), None);
    }
}
