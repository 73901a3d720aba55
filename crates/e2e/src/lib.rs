//! Soundcheck E2E Test Framework
//!
//! This crate drives a real browser against the music-streaming web app:
//! - Spawns the app server as a subprocess (optional)
//! - Controls Playwright through a persistent Node driver speaking JSON lines
//! - Reads the app's DEV-only debug hooks (`window.__playerDebug` and friends)
//! - Runs built-in Rust suites and declarative YAML scenarios
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── Gate (credentials, deletion opt-in)  -> skip         │
//! │    ├── BrowserLauncher::launch(profile) -> Transport        │
//! │    ├── TestCase::body(TestContext { page, env, info })      │
//! │    └── retries, timeouts, failure screenshots, JSON report  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Page / PlayerDebug / poll_until                            │
//! │    └── Command ──JSON line──> driver.js ──> Playwright      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Suites: admin auth channels playback prefetch hls          │
//! │          ios_clamp crossfade settings mobile + YAML specs   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod config;
pub mod debug;
pub mod error;
pub mod gate;
pub mod page;
pub mod playwright;
pub mod poll;
pub mod runner;
pub mod scenarios;
pub mod selectors;
pub mod server;
pub mod spec;
pub mod suite;
pub mod testing;
pub mod transport;

pub use config::RunSettings;
pub use debug::PlayerDebug;
pub use error::{E2eError, E2eResult};
pub use gate::{Gate, Requirement};
pub use page::Page;
pub use playwright::{BrowserProfile, PlaywrightLauncher};
pub use runner::{RunnerConfig, TestResult, TestRunner, TestStatus, TestSuiteResult};
pub use spec::{TestSpec, TestStep};
pub use suite::{Filter, Suite, TestCase, TestContext};

use std::path::Path;

/// Built-in suites plus the YAML scenarios found under `specs_dir`
pub fn load_suites(specs_dir: &Path) -> E2eResult<Vec<Suite>> {
    let mut suites = scenarios::all_suites();
    suites.extend(spec::declarative_suites(specs_dir)?);
    Ok(suites)
}
