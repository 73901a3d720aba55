//! Debug snapshot types
//!
//! Values returned by the application's DEV-only debug hooks
//! (`window.__playerDebug`, `window.__playbackTrace`, `window.__iosBufferDebug`).
//! They are read, never constructed, by the suites. Every field is optional and
//! unknown fields land in `extra`, so additive changes in the app do not break
//! deserialization.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Prefetch source reported once the next playlist entry is being fetched
pub const PREFETCH_NEXT_TRACK: &str = "next-track";

/// Track ids arrive as strings or numbers depending on the catalogue source
fn track_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) => Ok(Some(id)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!("invalid track id: {other}"))),
    }
}

/// `getMetrics()`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerMetrics {
    pub playback_state: Option<String>,
    #[serde(deserialize_with = "track_id")]
    pub current_track_id: Option<String>,
    pub playback_session_id: Option<String>,
    pub prefetch: Option<PrefetchInfo>,
    pub fast_start: Option<FastStart>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlayerMetrics {
    pub fn is_playing(&self) -> bool {
        self.playback_state.as_deref() == Some("playing")
    }

    pub fn first_audio_ms(&self) -> Option<f64> {
        self.fast_start.as_ref().and_then(|f| f.first_audio_ms)
    }

    /// Prefetch info, only when it targets the next track
    pub fn next_track_prefetch(&self) -> Option<&PrefetchInfo> {
        self.prefetch
            .as_ref()
            .filter(|p| p.source.as_deref() == Some(PREFETCH_NEXT_TRACK))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrefetchInfo {
    pub source: Option<String>,
    #[serde(deserialize_with = "track_id")]
    pub track_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FastStart {
    pub first_audio_ms: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `getTransportState()`: either a bare state name or an object carrying one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransportState {
    Name(String),
    Detailed {
        state: String,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
}

impl TransportState {
    pub fn name(&self) -> &str {
        match self {
            TransportState::Name(name) => name,
            TransportState::Detailed { state, .. } => state,
        }
    }
}

/// `getIOSClampState()`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IosClampState {
    pub active: bool,
    pub forced: Option<bool>,
    pub max_buffer_seconds: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `getIosInfo()`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IosInfo {
    #[serde(rename = "isIOSWebKit")]
    pub is_ios_webkit: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `getCrossfadeMode()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossfadeMode {
    Sequential,
    Overlap,
    None,
}

impl CrossfadeMode {
    pub const ALL: [CrossfadeMode; 3] = [CrossfadeMode::Sequential, CrossfadeMode::Overlap, CrossfadeMode::None];

    pub fn as_str(&self) -> &'static str {
        match self {
            CrossfadeMode::Sequential => "sequential",
            CrossfadeMode::Overlap => "overlap",
            CrossfadeMode::None => "none",
        }
    }
}

impl fmt::Display for CrossfadeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `getPlaybackLoadingState()`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackLoadingState {
    #[serde(alias = "status")]
    pub state: Option<String>,
    pub channel_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlaybackLoadingState {
    pub fn is_idle(&self) -> bool {
        matches!(self.state.as_deref(), None | Some("idle") | Some("ready") | Some("playing"))
    }
}

/// `getHLSMetrics()`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HlsMetrics {
    pub is_hls_active: Option<bool>,
    pub fallback_count: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Entry of `hlsFallbackEvents`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HlsFallbackEvent {
    #[serde(deserialize_with = "track_id")]
    pub track_id: Option<String>,
    pub reason: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `__playbackTrace.latest()` and the entries of `traces()`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackTrace {
    pub summary: TraceSummary,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TraceSummary {
    pub by_hostname: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlaybackTrace {
    pub fn hostnames(&self) -> impl Iterator<Item = &str> {
        self.summary.by_hostname.keys().map(String::as_str)
    }
}

/// Entry of `__iosBufferDebug.getEvents()`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IosBufferEvent {
    #[serde(alias = "type")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
