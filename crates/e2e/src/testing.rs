//! Scripted transports for exercising suites without a browser

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{E2eError, E2eResult};
use crate::playwright::BrowserProfile;
use crate::transport::{BrowserLauncher, Command, Transport};

type Matcher = Box<dyn Fn(&Command) -> bool + Send + Sync>;

#[derive(Debug, Clone)]
pub enum Reply {
    Value(Value),
    Error(String),
    /// Never answers; the caller's deadline fires
    Stall,
}

struct Rule {
    matcher: Matcher,
    replies: VecDeque<Reply>,
}

/// A transport answering commands from a list of rules
///
/// Rules are tried in the order they were added. A rule with several replies
/// hands them out in order and then keeps repeating the last one. Commands no
/// rule matches succeed with `null`.
#[derive(Default)]
pub struct ScriptedTransport {
    rules: Mutex<Vec<Rule>>,
    sent: Mutex<Vec<Command>>,
    closed: AtomicBool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<M>(self, matcher: M, replies: Vec<Reply>) -> Self
    where
        M: Fn(&Command) -> bool + Send + Sync + 'static,
    {
        self.rules.lock().push(Rule {
            matcher: Box::new(matcher),
            replies: replies.into(),
        });
        self
    }

    pub fn respond<M>(self, matcher: M, value: Value) -> Self
    where
        M: Fn(&Command) -> bool + Send + Sync + 'static,
    {
        self.on(matcher, vec![Reply::Value(value)])
    }

    /// Answer evaluations whose expression contains `needle`
    pub fn on_evaluate(self, needle: &'static str, replies: Vec<Value>) -> Self {
        self.on(evaluating(needle), replies.into_iter().map(Reply::Value).collect())
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Every command received so far
    pub fn sent(&self) -> Vec<Command> {
        self.sent.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn next_reply(&self, command: &Command) -> Reply {
        let mut rules = self.rules.lock();
        for rule in rules.iter_mut() {
            if (rule.matcher)(command) {
                return if rule.replies.len() > 1 {
                    rule.replies.pop_front().unwrap_or(Reply::Value(Value::Null))
                } else {
                    rule.replies.front().cloned().unwrap_or(Reply::Value(Value::Null))
                };
            }
        }
        Reply::Value(Value::Null)
    }
}

/// Matcher for evaluate commands containing `needle`
pub fn evaluating(needle: &'static str) -> impl Fn(&Command) -> bool + Send + Sync + 'static {
    move |command| matches!(command, Command::Evaluate { expression } if expression.contains(needle))
}

/// Matcher for any command whose selector contains `needle`
pub fn selecting(needle: &'static str) -> impl Fn(&Command) -> bool + Send + Sync + 'static {
    move |command| {
        let selector = match command {
            Command::Click { selector, .. }
            | Command::Hover { selector, .. }
            | Command::Fill { selector, .. }
            | Command::SelectOption { selector, .. }
            | Command::WaitForSelector { selector, .. }
            | Command::Count { selector }
            | Command::IsVisible { selector }
            | Command::GetAttribute { selector, .. }
            | Command::TextContent { selector, .. }
            | Command::InputValue { selector, .. } => selector.as_str(),
            Command::Press { selector: Some(selector), .. } => selector.as_str(),
            _ => return false,
        };
        selector.contains(needle)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, command: Command, timeout: Duration) -> E2eResult<Value> {
        self.sent.lock().push(command.clone());
        match self.next_reply(&command) {
            Reply::Value(value) => Ok(value),
            Reply::Error(reason) => Err(E2eError::StepFailed { step: command.label(), reason }),
            Reply::Stall => {
                tokio::time::sleep(timeout).await;
                Err(E2eError::Timeout(command.label()))
            }
        }
    }

    async fn close(&self) -> E2eResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Launcher handing out transports built by a closure
pub struct ScriptedLauncher<F> {
    build: F,
    launches: AtomicUsize,
}

impl<F> ScriptedLauncher<F>
where
    F: Fn() -> Arc<ScriptedTransport> + Send + Sync,
{
    pub fn new(build: F) -> Self {
        Self { build, launches: AtomicUsize::new(0) }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<F> BrowserLauncher for ScriptedLauncher<F>
where
    F: Fn() -> Arc<ScriptedTransport> + Send + Sync,
{
    async fn launch(&self, _profile: &BrowserProfile) -> E2eResult<Arc<dyn Transport>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let transport: Arc<dyn Transport> = (self.build)();
        Ok(transport)
    }
}
