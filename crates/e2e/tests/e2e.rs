//! E2E test harness entry point
//!
//! Runs the browser suites against a live deployment. Opt in with
//! `SOUNDCHECK_E2E=1`; otherwise the binary exits successfully without
//! touching a browser, so a plain `cargo test` stays hermetic.
//!
//! Run with: SOUNDCHECK_E2E=1 cargo test --package soundcheck-e2e --test e2e
//!
//! Filters: `SOUNDCHECK_SUITE`, `SOUNDCHECK_TAG`, `SOUNDCHECK_GREP`.
//! Settings: `SOUNDCHECK_CONFIG` (default `soundcheck.toml`).

use std::path::PathBuf;
use std::sync::Arc;

use soundcheck_common::HarnessEnv;
use soundcheck_e2e::config::DEFAULT_CONFIG_FILE;
use soundcheck_e2e::{load_suites, E2eResult, Filter, PlaywrightLauncher, RunSettings, TestRunner};
use tracing_subscriber::EnvFilter;

const OPT_IN: &str = "SOUNDCHECK_E2E";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if !std::env::var(OPT_IN).map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false) {
        eprintln!("{OPT_IN} not set; skipping browser suites");
        return;
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {e}");
            std::process::exit(2);
        }
    };

    match rt.block_on(async_main()) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

async fn async_main() -> E2eResult<bool> {
    let env = HarnessEnv::from_env()?;
    let config_path = std::env::var("SOUNDCHECK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
    let settings = RunSettings::load_or_default(&config_path)?;

    let filter = Filter {
        suite: std::env::var("SOUNDCHECK_SUITE").ok(),
        tag: std::env::var("SOUNDCHECK_TAG").ok(),
        grep: std::env::var("SOUNDCHECK_GREP").ok(),
    };

    let config = settings.runner_config(&env);
    let launcher = PlaywrightLauncher::new(config.playwright.clone()).await?;
    let suites = load_suites(&settings.specs_dir)?;

    let mut runner = TestRunner::new(config, env, Arc::new(launcher));
    let results = runner.run(&suites, &filter).await?;
    runner.write_results(&results)?;

    Ok(results.success())
}
