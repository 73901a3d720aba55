//! Bounded-retry polling
//!
//! Fetch a snapshot, test a predicate, repeat until it holds or the overall
//! deadline passes. Each fetch is time-boxed on its own so a wedged page
//! evaluation only costs one attempt. On timeout the error carries the last
//! snapshot observed, serialized as JSON.

use std::future::Future;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use crate::error::{E2eError, E2eResult};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy)]
pub struct PollOptions {
    /// Overall deadline
    pub timeout: Duration,
    /// Pause between attempts
    pub interval: Duration,
    /// Deadline for a single fetch
    pub fetch_timeout: Duration,
}

impl PollOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            interval: DEFAULT_POLL_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }
}

/// Poll `fetch` until `predicate` accepts a snapshot
pub async fn poll_until<T, F, Fut, P>(label: &str, options: PollOptions, mut fetch: F, mut predicate: P) -> E2eResult<T>
where
    T: Serialize,
    F: FnMut() -> Fut,
    Fut: Future<Output = E2eResult<T>>,
    P: FnMut(&T) -> bool,
{
    let start = Instant::now();
    let mut attempts: u32 = 0;
    let mut last_snapshot: Option<String> = None;
    let mut last_error: Option<String> = None;

    loop {
        attempts += 1;

        match tokio::time::timeout(options.fetch_timeout, fetch()).await {
            Ok(Ok(snapshot)) => {
                if predicate(&snapshot) {
                    debug!("{} satisfied after {} attempt(s)", label, attempts);
                    return Ok(snapshot);
                }
                last_snapshot = Some(
                    serde_json::to_string(&snapshot).unwrap_or_else(|e| format!("<unserializable snapshot: {e}>")),
                );
            }
            Ok(Err(e)) if e.is_skip() => return Err(e),
            Ok(Err(e)) => {
                debug!("{}: fetch failed: {}", label, e);
                last_error = Some(e.to_string());
            }
            Err(_) => {
                debug!("{}: fetch stalled", label);
                last_error = Some(format!(
                    "fetch timed out after {} ms",
                    options.fetch_timeout.as_millis()
                ));
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= options.timeout {
            let last = match (last_snapshot, last_error) {
                (Some(snapshot), _) => snapshot,
                (None, Some(error)) => format!("no snapshot (last error: {error})"),
                (None, None) => "no snapshot".to_string(),
            };
            return Err(E2eError::PollTimeout {
                label: label.to_string(),
                waited_ms: elapsed.as_millis() as u64,
                attempts,
                last,
            });
        }

        tokio::time::sleep(options.interval.min(options.timeout - elapsed)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast(timeout_ms: u64) -> PollOptions {
        PollOptions::new(Duration::from_millis(timeout_ms))
            .interval(Duration::from_millis(5))
            .fetch_timeout(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_returns_first_satisfying_snapshot() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let value = poll_until(
            "counter reaches 3",
            fast(2_000),
            || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Ok(json!({ "n": n })) }
            },
            |snapshot: &Value| snapshot["n"] == json!(3),
        )
        .await
        .unwrap();

        assert_eq!(value["n"], json!(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timeout_reports_last_snapshot() {
        let err = poll_until(
            "prefetch of next track",
            fast(60),
            || async { Ok(json!({ "prefetch": { "source": "slot-sequencer" } })) },
            |snapshot: &Value| snapshot["prefetch"]["source"] == json!("next-track"),
        )
        .await
        .unwrap_err();

        match &err {
            E2eError::PollTimeout { label, last, attempts, .. } => {
                assert_eq!(label, "prefetch of next track");
                assert!(last.contains("slot-sequencer"), "last snapshot missing: {last}");
                assert!(*attempts >= 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let rendered = err.to_string();
        assert!(rendered.contains("prefetch of next track"));
        assert!(rendered.contains("slot-sequencer"));
    }

    #[tokio::test]
    async fn test_stalled_fetch_is_time_boxed() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let value = poll_until(
            "eventually ready",
            fast(2_000),
            || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        // First evaluation wedges.
                        tokio::time::sleep(Duration::from_secs(60)).await;
                    }
                    Ok(json!({ "ready": true }))
                }
            },
            |snapshot: &Value| snapshot["ready"] == json!(true),
        )
        .await
        .unwrap();

        assert_eq!(value["ready"], json!(true));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_errors_feed_back_into_loop() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let value = poll_until(
            "recovers from errors",
            fast(2_000),
            || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(E2eError::DriverClosed)
                    } else {
                        Ok(json!(n))
                    }
                }
            },
            |_: &Value| true,
        )
        .await
        .unwrap();
        assert_eq!(value, json!(2));
    }

    #[tokio::test]
    async fn test_error_only_timeout_mentions_error() {
        let err = poll_until(
            "never fetches",
            fast(30),
            || async { Err::<Value, _>(E2eError::Playwright("context destroyed".into())) },
            |_: &Value| true,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("context destroyed"));
    }

    #[tokio::test]
    async fn test_skip_stops_polling() {
        let err = poll_until(
            "debug hooks",
            fast(2_000),
            || async { Err::<Value, _>(E2eError::Skipped("no debug hooks".into())) },
            |_: &Value| true,
        )
        .await
        .unwrap_err();
        assert!(err.is_skip());
    }
}
