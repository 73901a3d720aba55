//! Page helpers on top of a [`Transport`]

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{E2eError, E2eResult};
use crate::transport::{Command, Transport, WaitState};

/// Extra time the transport waits beyond the browser-side timeout
const TRANSPORT_GRACE: Duration = Duration::from_secs(5);

/// `[data-testid="id"]`
pub fn testid(id: &str) -> String {
    format!("[data-testid=\"{}\"]", id)
}

/// `[data-testid^="prefix"]`
pub fn testid_prefix(prefix: &str) -> String {
    format!("[data-testid^=\"{}\"]", prefix)
}

/// The `index`-th match of `selector`
pub fn nth(selector: &str, index: usize) -> String {
    format!("{} >> nth={}", selector, index)
}

/// `selector` scoped inside `parent`
pub fn within(parent: &str, selector: &str) -> String {
    format!("{} >> {}", parent, selector)
}

/// A browser page
#[derive(Clone)]
pub struct Page {
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl Page {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Default action timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Send a raw command; the transport deadline covers the browser-side timeout
    pub async fn send(&self, command: Command) -> E2eResult<Value> {
        let deadline = command
            .browser_timeout()
            .map(|t| t + TRANSPORT_GRACE)
            .unwrap_or(self.timeout + TRANSPORT_GRACE);
        self.transport.send(command, deadline).await
    }

    fn ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    pub async fn goto(&self, url: &str) -> E2eResult<String> {
        let value = self.send(Command::Goto { url: url.to_string() }).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    pub async fn reload(&self) -> E2eResult<()> {
        self.send(Command::Reload).await.map(|_| ())
    }

    pub async fn url(&self) -> E2eResult<String> {
        let value = self.send(Command::Url).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    pub async fn click(&self, selector: &str) -> E2eResult<()> {
        self.click_within(selector, self.timeout).await
    }

    pub async fn click_within(&self, selector: &str, timeout: Duration) -> E2eResult<()> {
        self.send(Command::Click {
            selector: selector.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })
        .await
        .map(|_| ())
    }

    pub async fn hover(&self, selector: &str) -> E2eResult<()> {
        self.send(Command::Hover { selector: selector.to_string(), timeout_ms: self.ms() })
            .await
            .map(|_| ())
    }

    pub async fn fill(&self, selector: &str, value: &str) -> E2eResult<()> {
        self.send(Command::Fill {
            selector: selector.to_string(),
            value: value.to_string(),
            timeout_ms: self.ms(),
        })
        .await
        .map(|_| ())
    }

    pub async fn press(&self, selector: Option<&str>, key: &str) -> E2eResult<()> {
        self.send(Command::Press {
            selector: selector.map(String::from),
            key: key.to_string(),
        })
        .await
        .map(|_| ())
    }

    pub async fn select_option(&self, selector: &str, value: &str) -> E2eResult<()> {
        self.send(Command::SelectOption {
            selector: selector.to_string(),
            value: value.to_string(),
            timeout_ms: self.ms(),
        })
        .await
        .map(|_| ())
    }

    pub async fn wait_for(&self, selector: &str, state: WaitState, timeout: Duration) -> E2eResult<()> {
        self.send(Command::WaitForSelector {
            selector: selector.to_string(),
            state,
            timeout_ms: timeout.as_millis() as u64,
        })
        .await
        .map(|_| ())
    }

    pub async fn wait_visible(&self, selector: &str, timeout: Duration) -> E2eResult<()> {
        self.wait_for(selector, WaitState::Visible, timeout).await
    }

    pub async fn wait_hidden(&self, selector: &str, timeout: Duration) -> E2eResult<()> {
        self.wait_for(selector, WaitState::Hidden, timeout).await
    }

    /// Wait for an element, treating any failure as "not present"
    pub async fn appears(&self, selector: &str, timeout: Duration) -> bool {
        self.wait_visible(selector, timeout).await.is_ok()
    }

    pub async fn sleep(&self, duration: Duration) -> E2eResult<()> {
        self.send(Command::WaitForTimeout { ms: duration.as_millis() as u64 })
            .await
            .map(|_| ())
    }

    pub async fn wait_for_url(&self, pattern: &str, timeout: Duration) -> E2eResult<String> {
        let value = self
            .send(Command::WaitForUrl {
                pattern: pattern.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Wait until a JavaScript expression is truthy
    pub async fn wait_for_function(&self, expression: &str, timeout: Duration) -> E2eResult<Value> {
        self.send(Command::WaitForFunction {
            expression: expression.to_string(),
            timeout_ms: timeout.as_millis() as u64,
            polling_ms: 100,
        })
        .await
    }

    /// Evaluate a JavaScript expression and deserialize its result
    pub async fn evaluate<T: DeserializeOwned>(&self, expression: &str) -> E2eResult<T> {
        self.evaluate_within(expression, self.timeout).await
    }

    /// Evaluate with an explicit deadline, for probes that must not hang
    pub async fn evaluate_within<T: DeserializeOwned>(&self, expression: &str, timeout: Duration) -> E2eResult<T> {
        let value = self
            .transport
            .send(Command::Evaluate { expression: expression.to_string() }, timeout)
            .await?;
        serde_json::from_value(value).map_err(E2eError::from)
    }

    pub async fn count(&self, selector: &str) -> E2eResult<usize> {
        let value = self.send(Command::Count { selector: selector.to_string() }).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    pub async fn is_visible(&self, selector: &str) -> E2eResult<bool> {
        let value = self.send(Command::IsVisible { selector: selector.to_string() }).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    pub async fn attribute(&self, selector: &str, name: &str) -> E2eResult<Option<String>> {
        let value = self
            .send(Command::GetAttribute {
                selector: selector.to_string(),
                name: name.to_string(),
                timeout_ms: self.ms(),
            })
            .await?;
        Ok(value.as_str().map(String::from))
    }

    pub async fn text(&self, selector: &str) -> E2eResult<String> {
        let value = self
            .send(Command::TextContent { selector: selector.to_string(), timeout_ms: self.ms() })
            .await?;
        Ok(value.as_str().unwrap_or_default().trim().to_string())
    }

    pub async fn input_value(&self, selector: &str) -> E2eResult<String> {
        let value = self
            .send(Command::InputValue { selector: selector.to_string(), timeout_ms: self.ms() })
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    pub async fn screenshot(&self, path: &std::path::Path, full_page: bool) -> E2eResult<()> {
        self.send(Command::Screenshot {
            path: path.to_string_lossy().to_string(),
            full_page,
        })
        .await
        .map(|_| ())
    }

    pub async fn set_offline(&self, offline: bool) -> E2eResult<()> {
        self.send(Command::SetOffline { offline }).await.map(|_| ())
    }

    /// Abort every request whose URL matches `pattern` (a JavaScript regex)
    pub async fn route_abort(&self, pattern: &str) -> E2eResult<()> {
        self.send(Command::RouteAbort { pattern: pattern.to_string() })
            .await
            .map(|_| ())
    }

    pub async fn unroute_all(&self) -> E2eResult<()> {
        self.send(Command::UnrouteAll).await.map(|_| ())
    }

    /// Uncaught page errors seen since the page opened
    pub async fn page_errors(&self) -> E2eResult<Vec<String>> {
        let value = self.send(Command::PageErrors).await?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }
}
