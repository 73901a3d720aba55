//! Client for the application's DEV-only debug hooks
//!
//! Production builds do not expose `window.__playerDebug` and friends; every
//! getter therefore returns `Option` and [`PlayerDebug::require`] turns a
//! missing hook into a skip.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use soundcheck_common::snapshot::{
    CrossfadeMode, HlsFallbackEvent, HlsMetrics, IosBufferEvent, IosClampState, IosInfo, PlaybackLoadingState,
    PlaybackTrace, PlayerMetrics, TransportState,
};
use tracing::debug;

use crate::error::{E2eError, E2eResult};
use crate::page::Page;
use crate::poll::{poll_until, PollOptions, DEFAULT_FETCH_TIMEOUT};

pub const PLAYER_DEBUG: &str = "__playerDebug";
pub const PLAYBACK_TRACE: &str = "__playbackTrace";
pub const IOS_BUFFER_DEBUG: &str = "__iosBufferDebug";

/// Expression calling `window[global][method](args)`, or `null` when absent
fn call_expression(global: &str, method: &str, args: &str) -> String {
    format!(
        "(() => {{ const hook = window.{global}; \
         if (!hook || typeof hook.{method} !== 'function') return null; \
         const value = hook.{method}({args}); \
         return value === undefined ? null : value; }})()"
    )
}

/// Expression reading `window[global][property]`, or `null` when absent
fn property_expression(global: &str, property: &str) -> String {
    format!(
        "(() => {{ const hook = window.{global}; \
         if (!hook) return null; \
         const value = hook.{property}; \
         return value === undefined ? null : value; }})()"
    )
}

fn presence_expression(global: &str) -> String {
    format!("typeof window.{global} !== 'undefined'")
}

/// Track id of a playlist entry, which may be a bare id or an object
pub fn track_id_of(entry: &Value) -> Option<String> {
    match entry {
        Value::String(id) => Some(id.clone()),
        Value::Object(map) => ["id", "trackId", "track_id"]
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Clone)]
pub struct PlayerDebug {
    page: Page,
    fetch_timeout: Duration,
}

impl PlayerDebug {
    pub fn new(page: &Page) -> Self {
        Self {
            page: page.clone(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Debug hooks, or a skip when the build does not expose them
    pub async fn require(page: &Page) -> E2eResult<Self> {
        let debug = Self::new(page);
        if debug.is_available().await {
            Ok(debug)
        } else {
            Err(E2eError::Skipped(format!(
                "window.{PLAYER_DEBUG} not exposed (production build?)"
            )))
        }
    }

    pub async fn is_available(&self) -> bool {
        self.global_present(PLAYER_DEBUG).await
    }

    pub async fn global_present(&self, global: &str) -> bool {
        self.page
            .evaluate_within::<bool>(&presence_expression(global), self.fetch_timeout)
            .await
            .unwrap_or(false)
    }

    async fn call<T: DeserializeOwned>(&self, global: &str, method: &str, args: &str) -> E2eResult<Option<T>> {
        self.page
            .evaluate_within::<Option<T>>(&call_expression(global, method, args), self.fetch_timeout)
            .await
    }

    async fn player<T: DeserializeOwned>(&self, method: &str) -> E2eResult<Option<T>> {
        self.call(PLAYER_DEBUG, method, "").await
    }

    pub async fn metrics(&self) -> E2eResult<Option<PlayerMetrics>> {
        self.player("getMetrics").await
    }

    pub async fn transport_state(&self) -> E2eResult<Option<TransportState>> {
        self.player("getTransportState").await
    }

    /// Playback position in seconds
    pub async fn current_time(&self) -> E2eResult<Option<f64>> {
        self.player("getCurrentTime").await
    }

    pub async fn current_track_url(&self) -> E2eResult<Option<String>> {
        self.player("getCurrentTrackUrl").await
    }

    pub async fn session_id(&self) -> E2eResult<Option<String>> {
        self.player("getPlaybackSessionId").await
    }

    pub async fn active_channel(&self) -> E2eResult<Option<Value>> {
        self.player("getActiveChannel").await
    }

    pub async fn playlist(&self) -> E2eResult<Option<Vec<Value>>> {
        self.player("getPlaylist").await
    }

    pub async fn playlist_index(&self) -> E2eResult<Option<i64>> {
        self.player("getPlaylistIndex").await
    }

    pub async fn ios_clamp_state(&self) -> E2eResult<Option<IosClampState>> {
        self.player("getIOSClampState").await
    }

    pub async fn ios_info(&self) -> E2eResult<Option<IosInfo>> {
        self.player("getIosInfo").await
    }

    /// Force the iOS buffer clamp on or off regardless of the user agent
    pub async fn force_ios_clamp(&self, enabled: bool) -> E2eResult<()> {
        let applied: Option<Value> = self
            .call(PLAYER_DEBUG, "forceIOSClampForTesting", if enabled { "true" } else { "false" })
            .await?;
        debug!("forceIOSClampForTesting({}) -> {:?}", enabled, applied);
        Ok(())
    }

    pub async fn crossfade_mode(&self) -> E2eResult<Option<CrossfadeMode>> {
        self.player("getCrossfadeMode").await
    }

    /// Crossfade duration in seconds
    pub async fn crossfade_duration(&self) -> E2eResult<Option<f64>> {
        self.player("getCrossfadeDuration").await
    }

    pub async fn loading_state(&self) -> E2eResult<Option<PlaybackLoadingState>> {
        self.player("getPlaybackLoadingState").await
    }

    pub async fn hls_metrics(&self) -> E2eResult<Option<HlsMetrics>> {
        self.player("getHLSMetrics").await
    }

    pub async fn hls_fallback_events(&self) -> E2eResult<Vec<HlsFallbackEvent>> {
        let events: Option<Vec<HlsFallbackEvent>> = self
            .page
            .evaluate_within(&property_expression(PLAYER_DEBUG, "hlsFallbackEvents"), self.fetch_timeout)
            .await?;
        Ok(events.unwrap_or_default())
    }

    pub async fn latest_trace(&self) -> E2eResult<Option<PlaybackTrace>> {
        self.call(PLAYBACK_TRACE, "latest", "").await
    }

    pub async fn traces(&self) -> E2eResult<Vec<PlaybackTrace>> {
        Ok(self.call(PLAYBACK_TRACE, "traces", "").await?.unwrap_or_default())
    }

    pub async fn clear_traces(&self) -> E2eResult<()> {
        let _: Option<Value> = self.call(PLAYBACK_TRACE, "clear", "").await?;
        Ok(())
    }

    pub async fn ios_buffer_events(&self) -> E2eResult<Vec<IosBufferEvent>> {
        Ok(self.call(IOS_BUFFER_DEBUG, "getEvents", "").await?.unwrap_or_default())
    }

    /// Poll `getMetrics()` until `predicate` holds
    pub async fn wait_for_metrics<P>(&self, label: &str, timeout: Duration, predicate: P) -> E2eResult<PlayerMetrics>
    where
        P: Fn(&PlayerMetrics) -> bool,
    {
        let options = PollOptions::new(timeout).fetch_timeout(self.fetch_timeout);
        let snapshot = poll_until(
            label,
            options,
            || self.metrics(),
            |metrics: &Option<PlayerMetrics>| metrics.as_ref().map(&predicate).unwrap_or(false),
        )
        .await?;
        snapshot.ok_or_else(|| E2eError::AssertionFailed(format!("{label}: metrics vanished")))
    }

    /// Poll `getCurrentTime()` until playback has moved past `after` seconds
    pub async fn wait_for_progress(&self, after: f64, timeout: Duration) -> E2eResult<f64> {
        let options = PollOptions::new(timeout).fetch_timeout(self.fetch_timeout);
        let time = poll_until(
            &format!("currentTime > {after:.2}s"),
            options,
            || self.current_time(),
            |t: &Option<f64>| t.map(|t| t > after).unwrap_or(false),
        )
        .await?;
        Ok(time.unwrap_or(after))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use serde_json::json;
    use std::sync::Arc;

    fn page(transport: ScriptedTransport) -> Page {
        Page::new(transport.into_arc(), Duration::from_secs(1))
    }

    #[test]
    fn test_call_expression_guards_absent_hooks() {
        let expr = call_expression(PLAYER_DEBUG, "getMetrics", "");
        assert!(expr.contains("window.__playerDebug"));
        assert!(expr.contains("typeof hook.getMetrics !== 'function'"));
        assert!(expr.contains("return null"));
    }

    #[test]
    fn test_track_id_of_shapes() {
        assert_eq!(track_id_of(&json!("t-1")), Some("t-1".into()));
        assert_eq!(track_id_of(&json!({ "id": "t-2", "title": "x" })), Some("t-2".into()));
        assert_eq!(track_id_of(&json!({ "trackId": 17 })), Some("17".into()));
        assert_eq!(track_id_of(&json!(null)), None);
    }

    #[tokio::test]
    async fn test_require_skips_without_hooks() {
        let page = page(ScriptedTransport::new().on_evaluate("typeof window.__playerDebug", vec![json!(false)]));
        let err = PlayerDebug::require(&page).await.err().unwrap();
        assert!(err.is_skip());
    }

    #[tokio::test]
    async fn test_getters_map_null_to_none() {
        let transport = ScriptedTransport::new()
            .on_evaluate("getMetrics", vec![json!({ "playbackState": "playing", "playbackSessionId": "s1" })])
            .on_evaluate("getCrossfadeMode", vec![json!("sequential")])
            .on_evaluate("hlsFallbackEvents", vec![json!([{ "reason": "manifest-error" }])]);
        let debug = PlayerDebug::new(&page(transport));

        let metrics = debug.metrics().await.unwrap().unwrap();
        assert_eq!(metrics.playback_session_id.as_deref(), Some("s1"));
        assert_eq!(debug.crossfade_mode().await.unwrap(), Some(CrossfadeMode::Sequential));
        assert_eq!(debug.hls_fallback_events().await.unwrap().len(), 1);
        // Unscripted getters resolve to null.
        assert!(debug.ios_info().await.unwrap().is_none());
        assert!(debug.traces().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wait_for_metrics_polls_until_match() {
        let transport = ScriptedTransport::new().on_evaluate(
            "getMetrics",
            vec![
                json!(null),
                json!({ "playbackState": "loading" }),
                json!({ "playbackState": "playing", "fastStart": { "firstAudioMs": 640 } }),
            ],
        );
        let transport = Arc::new(transport);
        let page = Page::new(transport.clone(), Duration::from_secs(1));
        let debug = PlayerDebug::new(&page);

        let metrics = debug
            .wait_for_metrics("first audio", Duration::from_secs(5), |m| m.first_audio_ms().is_some())
            .await
            .unwrap();
        assert_eq!(metrics.first_audio_ms(), Some(640.0));
        assert_eq!(transport.sent().len(), 3);
    }
}
