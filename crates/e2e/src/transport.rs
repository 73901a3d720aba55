//! Browser command protocol
//!
//! Every browser interaction is a [`Command`] sent through a [`Transport`].
//! The Playwright driver is the production transport; tests substitute
//! scripted ones.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::E2eResult;
use crate::playwright::BrowserProfile;

/// Element state to wait for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

/// A single browser command, serialized as one JSON line to the driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    Goto { url: String },
    Reload,
    Url,
    Click { selector: String, timeout_ms: u64 },
    Hover { selector: String, timeout_ms: u64 },
    Fill { selector: String, value: String, timeout_ms: u64 },
    Press { selector: Option<String>, key: String },
    SelectOption { selector: String, value: String, timeout_ms: u64 },
    WaitForSelector { selector: String, state: WaitState, timeout_ms: u64 },
    WaitForTimeout { ms: u64 },
    WaitForUrl { pattern: String, timeout_ms: u64 },
    WaitForFunction { expression: String, timeout_ms: u64, polling_ms: u64 },
    Evaluate { expression: String },
    Count { selector: String },
    IsVisible { selector: String },
    GetAttribute { selector: String, name: String, timeout_ms: u64 },
    TextContent { selector: String, timeout_ms: u64 },
    InputValue { selector: String, timeout_ms: u64 },
    Screenshot { path: String, full_page: bool },
    SetOffline { offline: bool },
    RouteAbort { pattern: String },
    UnrouteAll,
    PageErrors,
    Close,
}

impl Command {
    /// Short label for logs and step results
    pub fn label(&self) -> String {
        match self {
            Command::Goto { url } => format!("goto:{}", url),
            Command::Reload => "reload".to_string(),
            Command::Url => "url".to_string(),
            Command::Click { selector, .. } => format!("click:{}", selector),
            Command::Hover { selector, .. } => format!("hover:{}", selector),
            Command::Fill { selector, .. } => format!("fill:{}", selector),
            Command::Press { key, .. } => format!("press:{}", key),
            Command::SelectOption { selector, value, .. } => format!("select:{}={}", selector, value),
            Command::WaitForSelector { selector, state, .. } => format!("wait:{}:{:?}", selector, state),
            Command::WaitForTimeout { ms } => format!("sleep:{}ms", ms),
            Command::WaitForUrl { pattern, .. } => format!("wait_url:{}", pattern),
            Command::WaitForFunction { .. } => "wait_function".to_string(),
            Command::Evaluate { expression } => {
                format!("evaluate:{}", expression.chars().take(40).collect::<String>())
            }
            Command::Count { selector } => format!("count:{}", selector),
            Command::IsVisible { selector } => format!("visible:{}", selector),
            Command::GetAttribute { selector, name, .. } => format!("attr:{}@{}", selector, name),
            Command::TextContent { selector, .. } => format!("text:{}", selector),
            Command::InputValue { selector, .. } => format!("value:{}", selector),
            Command::Screenshot { path, .. } => format!("screenshot:{}", path),
            Command::SetOffline { offline } => format!("offline:{}", offline),
            Command::RouteAbort { pattern } => format!("route_abort:{}", pattern),
            Command::UnrouteAll => "unroute_all".to_string(),
            Command::PageErrors => "page_errors".to_string(),
            Command::Close => "close".to_string(),
        }
    }

    /// Time the driver itself may spend on the command, if it carries one
    pub fn browser_timeout(&self) -> Option<Duration> {
        let ms = match self {
            Command::Click { timeout_ms, .. }
            | Command::Hover { timeout_ms, .. }
            | Command::Fill { timeout_ms, .. }
            | Command::SelectOption { timeout_ms, .. }
            | Command::WaitForSelector { timeout_ms, .. }
            | Command::WaitForUrl { timeout_ms, .. }
            | Command::WaitForFunction { timeout_ms, .. }
            | Command::GetAttribute { timeout_ms, .. }
            | Command::TextContent { timeout_ms, .. }
            | Command::InputValue { timeout_ms, .. } => *timeout_ms,
            Command::WaitForTimeout { ms } => *ms,
            _ => return None,
        };
        Some(Duration::from_millis(ms))
    }
}

/// Request envelope written to the driver
#[derive(Debug, Serialize)]
pub struct DriverRequest<'a> {
    pub id: u64,
    pub command: &'a Command,
}

/// Reply envelope read from the driver
#[derive(Debug, Clone, Deserialize)]
pub struct DriverReply {
    pub id: u64,
    pub ok: bool,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub error: Option<String>,
}

/// A channel to one browser page
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute a command, giving up after `timeout`
    async fn send(&self, command: Command, timeout: Duration) -> E2eResult<Value>;

    /// Release the browser
    async fn close(&self) -> E2eResult<()>;
}

/// Opens a fresh page for each test
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, profile: &BrowserProfile) -> E2eResult<Arc<dyn Transport>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_wire_format() {
        let cmd = Command::WaitForSelector {
            selector: "[data-testid=\"channel-card\"]".into(),
            state: WaitState::Hidden,
            timeout_ms: 5000,
        };
        let wire = serde_json::to_value(DriverRequest { id: 7, command: &cmd }).unwrap();
        assert_eq!(
            wire,
            json!({
                "id": 7,
                "command": {
                    "action": "wait_for_selector",
                    "selector": "[data-testid=\"channel-card\"]",
                    "state": "hidden",
                    "timeout_ms": 5000
                }
            })
        );
        assert_eq!(cmd.browser_timeout(), Some(Duration::from_millis(5000)));
    }

    #[test]
    fn test_reply_defaults() {
        let reply: DriverReply = serde_json::from_str(r#"{"id":3,"ok":false,"error":"boom"}"#).unwrap();
        assert!(!reply.ok);
        assert_eq!(reply.value, Value::Null);
        assert_eq!(reply.error.as_deref(), Some("boom"));
    }
}
