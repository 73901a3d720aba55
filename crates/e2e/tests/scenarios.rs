//! Built-in suites driven through scripted transports
//!
//! No browser is involved: each test scripts the replies a page would give and
//! checks what the suite concludes from them.

use std::sync::Arc;

use serde_json::json;
use soundcheck_common::{Credentials, HarnessEnv};
use soundcheck_e2e::scenarios::all_suites;
use soundcheck_e2e::testing::{selecting, Reply, ScriptedLauncher, ScriptedTransport};
use soundcheck_e2e::transport::Command;
use soundcheck_e2e::{Filter, RunnerConfig, Suite, TestCase, TestResult, TestRunner, TestStatus};

fn creds(email: &str) -> Option<Credentials> {
    Some(Credentials { email: email.into(), password: "pw".into() })
}

fn full_env() -> HarnessEnv {
    HarnessEnv {
        admin: creds("admin@example.com"),
        user: creds("listener@example.com"),
        allow_user_deletion: true,
        ..HarnessEnv::default()
    }
}

fn find(suite: &str, test: &str) -> (Suite, TestCase) {
    let suite = all_suites()
        .into_iter()
        .find(|s| s.name == suite)
        .unwrap_or_else(|| panic!("no suite {suite}"));
    let case = suite
        .tests
        .iter()
        .find(|t| t.name == test)
        .cloned()
        .unwrap_or_else(|| panic!("no test {test} in {}", suite.name));
    (suite, case)
}

/// Run one built-in test against a single shared scripted page
async fn run_one(env: HarnessEnv, suite: &str, test: &str, transport: Arc<ScriptedTransport>) -> TestResult {
    let dir = tempfile::tempdir().unwrap();
    let (suite, case) = find(suite, test);
    let shared = transport.clone();
    let launcher = Arc::new(ScriptedLauncher::new(move || shared.clone()));
    let config = RunnerConfig {
        output_dir: dir.path().to_path_buf(),
        ..RunnerConfig::default()
    };
    let runner = TestRunner::new(config, env, launcher);
    runner.run_test(&suite, &case).await
}

#[tokio::test]
async fn missing_credentials_never_fail_or_pass_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = Arc::new(ScriptedLauncher::new(|| ScriptedTransport::new().into_arc()));
    let config = RunnerConfig {
        output_dir: dir.path().to_path_buf(),
        ..RunnerConfig::default()
    };
    let mut runner = TestRunner::new(config, HarnessEnv::default(), launcher.clone());

    let summary = runner.run(&all_suites(), &Filter::default()).await.unwrap();

    assert_eq!(summary.failed, 0);
    for result in &summary.results {
        match result.status {
            TestStatus::Skipped => assert!(result.skip_reason.is_some()),
            // Sign-up is the only suite test that needs no configured account.
            _ => assert_eq!(result.name, "sign up a fixture user", "{} ran without credentials", result.full_name()),
        }
    }
    assert_eq!(launcher.launches(), 1);
}

#[tokio::test]
async fn library_search_with_rows_passes() {
    let transport = ScriptedTransport::new()
        .respond(selecting("track-row"), json!(4))
        .into_arc();

    let result = run_one(full_env(), "admin", "library search finds tracks", transport.clone()).await;
    assert_eq!(result.status, TestStatus::Passed, "{:?}", result.error);
    assert!(transport
        .sent()
        .iter()
        .any(|c| matches!(c, Command::Fill { value, .. } if value == "focus")));
}

#[tokio::test]
async fn library_search_with_zero_rows_is_a_hard_failure() {
    let transport = ScriptedTransport::new()
        .respond(selecting("track-row"), json!(0))
        .into_arc();

    let result = run_one(full_env(), "admin", "library search finds tracks", transport).await;
    assert_eq!(result.status, TestStatus::Failed);
    let error = result.error.unwrap();
    assert!(error.contains("track rows"), "{error}");
    assert!(error.contains("last observed: 0"), "{error}");
}

#[tokio::test]
async fn cleanup_only_deletes_synthetic_rows() {
    let transport = ScriptedTransport::new()
        .on_evaluate(
            "querySelectorAll",
            vec![json!([
                "user-row-e2e-user-1733000000000@example.com",
                "user-row-listener@example.com",
                "user-row-admin@example.com"
            ])],
        )
        .into_arc();

    let result = run_one(full_env(), "admin", "cleanup synthetic users", transport.clone()).await;
    assert_eq!(result.status, TestStatus::Passed, "{:?}", result.error);

    let deletions: Vec<String> = transport
        .sent()
        .into_iter()
        .filter_map(|c| match c {
            Command::Click { selector, .. } if selector.contains("user-delete-button") => Some(selector),
            _ => None,
        })
        .collect();
    assert_eq!(deletions.len(), 1);
    assert!(deletions[0].contains("user-row-e2e-user-1733000000000@example.com"));
}

#[tokio::test]
async fn cleanup_is_skipped_without_deletion_opt_in() {
    let env = HarnessEnv { allow_user_deletion: false, ..full_env() };
    let transport = ScriptedTransport::new().into_arc();

    let result = run_one(env, "admin", "cleanup synthetic users", transport.clone()).await;
    assert_eq!(result.status, TestStatus::Skipped);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn session_timer_survives_navigation() {
    let transport = ScriptedTransport::new()
        .respond(selecting("session-timer-display"), json!("14:58"))
        .into_arc();

    let result = run_one(full_env(), "settings", "session timer survives navigation", transport.clone()).await;
    assert_eq!(result.status, TestStatus::Passed, "{:?}", result.error);

    let nav_clicks: Vec<String> = transport
        .sent()
        .into_iter()
        .filter_map(|c| match c {
            Command::Click { selector, .. } if selector.contains("nav-") => Some(selector),
            _ => None,
        })
        .collect();
    assert_eq!(nav_clicks.len(), 4);
    assert!(nav_clicks[1].contains("nav-profile"));
    assert!(nav_clicks[3].contains("nav-channels"));
}

#[tokio::test]
async fn session_timer_reset_fails() {
    let transport = ScriptedTransport::new()
        .on(
            selecting("session-timer-display"),
            vec![
                Reply::Value(json!(null)),
                Reply::Value(json!("15:00")),
                Reply::Value(json!(null)),
                Reply::Value(json!("00:00")),
            ],
        )
        .into_arc();

    let result = run_one(full_env(), "settings", "session timer survives navigation", transport).await;
    assert_eq!(result.status, TestStatus::Failed);
    assert!(result.error.unwrap().contains("00:00"));
}

#[tokio::test]
async fn preview_toggle_restores_playing_state() {
    let transport = ScriptedTransport::new()
        .on(
            |c| matches!(c, Command::GetAttribute { selector, name, .. }
                if selector.contains("channel-preview-button") && name == "data-playing"),
            vec![
                Reply::Value(json!("false")),
                Reply::Value(json!("true")),
                Reply::Value(json!("false")),
            ],
        )
        .into_arc();

    let result = run_one(full_env(), "channels", "preview toggled twice restores state", transport.clone()).await;
    assert_eq!(result.status, TestStatus::Passed, "{:?}", result.error);

    let toggles = transport
        .sent()
        .iter()
        .filter(|c| matches!(c, Command::Click { selector, .. } if selector.contains("channel-preview-button")))
        .count();
    assert_eq!(toggles, 2);
}

fn playing_page(first_audio_ms: u64) -> Arc<ScriptedTransport> {
    ScriptedTransport::new()
        .on_evaluate("typeof window.__playerDebug", vec![json!(true)])
        .on_evaluate(
            "getMetrics",
            vec![json!({
                "playbackState": "playing",
                "playbackSessionId": "session-1",
                "fastStart": { "firstAudioMs": first_audio_ms }
            })],
        )
        .into_arc()
}

#[tokio::test]
async fn fast_start_within_budget_passes() {
    let result = run_one(full_env(), "playback", "fast start within budget", playing_page(640)).await;
    assert_eq!(result.status, TestStatus::Passed, "{:?}", result.error);
}

#[tokio::test]
async fn fast_start_over_budget_fails() {
    let env = HarnessEnv { fast_start_max_ms: 500, ..full_env() };
    let result = run_one(env, "playback", "fast start within budget", playing_page(640)).await;
    assert_eq!(result.status, TestStatus::Failed);
    assert!(result.error.unwrap().contains("FAST_START_MAX_MS=500"));
}

#[tokio::test]
async fn playback_skips_without_debug_hooks() {
    let transport = ScriptedTransport::new()
        .on_evaluate("typeof window.__playerDebug", vec![json!(false)])
        .into_arc();

    let result = run_one(full_env(), "playback", "fast start within budget", transport).await;
    assert_eq!(result.status, TestStatus::Skipped);
    assert!(result.skip_reason.unwrap().contains("__playerDebug"));
}

#[tokio::test]
async fn prefetch_matches_next_playlist_entry() {
    let transport = ScriptedTransport::new()
        .on_evaluate("typeof window.__playerDebug", vec![json!(true)])
        .on_evaluate("getPlaylistIndex", vec![json!(0)])
        .on_evaluate("getPlaylist", vec![json!([{ "id": "t-1" }, { "id": "t-2" }])])
        .on_evaluate(
            "getMetrics",
            vec![json!({
                "playbackState": "playing",
                "prefetch": { "source": "next-track", "trackId": "t-2" }
            })],
        )
        .into_arc();

    let result = run_one(full_env(), "prefetch", "next track is prefetched", transport).await;
    assert_eq!(result.status, TestStatus::Passed, "{:?}", result.error);
}

#[test]
fn bundled_yaml_scenarios_parse() {
    let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../scenarios");
    let suites = soundcheck_e2e::spec::declarative_suites(&dir).unwrap();

    let names: Vec<&str> = suites
        .iter()
        .flat_map(|s| s.tests.iter().map(|t| t.name.as_str()))
        .collect();
    assert!(names.contains(&"landing page offers sign in"), "{names:?}");
    assert!(names.contains(&"mobile landing renders"), "{names:?}");
    assert!(suites.iter().all(|s| s.tags.iter().any(|t| t == "declarative")));
}
