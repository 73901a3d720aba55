//! Run the browser suites

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use soundcheck_common::HarnessEnv;
use soundcheck_e2e::config::DEFAULT_CONFIG_FILE;
use soundcheck_e2e::{load_suites, Filter, PlaywrightLauncher, RunSettings, TestResult, TestRunner, TestStatus};
use tracing::info;

use crate::output::{print_list, render, OutputFormat, TableDisplay};

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Only run this suite
    #[arg(short, long)]
    pub suite: Option<String>,

    /// Only run tests carrying this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Only run tests whose name contains this text
    #[arg(short, long)]
    pub grep: Option<String>,

    /// Run settings file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// App URL, overrides PLAYWRIGHT_BASE_URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Concurrent browsers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Retries per failed test
    #[arg(long)]
    pub retries: Option<u32>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Results directory
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Do not spawn the configured app server
    #[arg(long)]
    pub no_server: bool,
}

impl RunArgs {
    pub fn filter(&self) -> Filter {
        Filter {
            suite: self.suite.clone(),
            tag: self.tag.clone(),
            grep: self.grep.clone(),
        }
    }

    /// Fold command-line overrides into the loaded settings
    pub fn apply(&self, settings: &mut RunSettings, env: &mut HarnessEnv) {
        if let Some(url) = &self.base_url {
            env.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(workers) = self.workers {
            settings.workers = workers.max(1);
        }
        if self.retries.is_some() {
            settings.retries = self.retries;
        }
        if self.headed {
            settings.browser.headless = false;
        }
        if let Some(dir) = &self.output_dir {
            settings.output_dir = dir.clone();
        }
        if self.no_server {
            settings.server = None;
        }
    }
}

/// One result line
#[derive(Serialize)]
struct ResultRow<'a>(&'a TestResult);

impl TableDisplay for ResultRow<'_> {
    fn headers() -> Vec<&'static str> {
        vec!["Suite", "Test", "Status", "Attempts", "Duration", "Detail"]
    }

    fn row(&self) -> Vec<String> {
        let r = self.0;
        let detail = r
            .error
            .as_deref()
            .or(r.skip_reason.as_deref())
            .unwrap_or_default()
            .lines()
            .next()
            .unwrap_or_default()
            .to_string();
        vec![
            r.suite.clone(),
            r.name.clone(),
            status_label(r.status),
            r.attempts.to_string(),
            format!("{:.1}s", r.duration_ms as f64 / 1000.0),
            detail,
        ]
    }
}

fn status_label(status: TestStatus) -> String {
    match status {
        TestStatus::Passed => "passed".green().to_string(),
        TestStatus::Failed => "failed".red().to_string(),
        TestStatus::Skipped => "skipped".yellow().to_string(),
    }
}

pub async fn execute(args: RunArgs, format: OutputFormat) -> Result<()> {
    let mut env = HarnessEnv::from_env()?;
    let mut settings = RunSettings::load_or_default(&args.config)?;
    args.apply(&mut settings, &mut env);

    let config = settings.runner_config(&env);
    info!("Running against {}", env.base_url);

    let launcher = PlaywrightLauncher::new(config.playwright.clone()).await?;
    let suites = load_suites(&settings.specs_dir)?;

    let mut runner = TestRunner::new(config, env, Arc::new(launcher));
    let results = runner.run(&suites, &args.filter()).await?;
    let report = runner.write_results(&results)?;

    if format.is_structured() {
        println!("{}", render(&results, format));
    } else {
        let rows: Vec<ResultRow> = results.results.iter().map(ResultRow).collect();
        print_list(&rows, format);
        println!(
            "{} passed, {} failed, {} skipped in {:.1}s ({})",
            results.passed.to_string().green(),
            results.failed.to_string().red(),
            results.skipped.to_string().yellow(),
            results.duration_ms as f64 / 1000.0,
            report.display()
        );
    }

    if !results.success() {
        anyhow::bail!("{} of {} tests failed", results.failed, results.total);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply() {
        let args = RunArgs {
            base_url: Some("http://staging.example/".into()),
            workers: Some(0),
            retries: Some(1),
            headed: true,
            no_server: true,
            ..RunArgs::default()
        };
        let mut settings = RunSettings::from_toml(
            r#"
            [server]
            command = "npm"
            "#,
        )
        .unwrap();
        let mut env = HarnessEnv::default();

        args.apply(&mut settings, &mut env);

        assert_eq!(env.base_url, "http://staging.example");
        assert_eq!(settings.workers, 1);
        assert_eq!(settings.retries, Some(1));
        assert!(!settings.browser.headless);
        assert!(settings.server.is_none());
    }

    #[test]
    fn test_no_overrides_keep_settings() {
        let mut settings = RunSettings { workers: 4, ..RunSettings::default() };
        let mut env = HarnessEnv::default();
        let before = env.base_url.clone();

        RunArgs::default().apply(&mut settings, &mut env);

        assert_eq!(settings.workers, 4);
        assert_eq!(settings.retries, None);
        assert_eq!(env.base_url, before);
    }
}
