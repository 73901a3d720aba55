//! Environment checks before a run

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use soundcheck_common::HarnessEnv;
use soundcheck_e2e::config::DEFAULT_CONFIG_FILE;
use soundcheck_e2e::playwright::check_playwright_installed;
use soundcheck_e2e::{Gate, Requirement, RunSettings};

use crate::client::StorageConfig;
use crate::output::{print_list, OutputFormat, TableDisplay};

const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Skip the request to the app
    #[arg(long)]
    pub offline: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Warn,
    Fail,
}

#[derive(Debug, Serialize)]
pub struct Check {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

impl Check {
    fn new(name: &str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            detail: detail.into(),
        }
    }
}

impl TableDisplay for Check {
    fn headers() -> Vec<&'static str> {
        vec!["Check", "Status", "Detail"]
    }

    fn row(&self) -> Vec<String> {
        let status = match self.status {
            CheckStatus::Ok => "ok".green(),
            CheckStatus::Warn => "warn".yellow(),
            CheckStatus::Fail => "fail".red(),
        };
        vec![self.name.clone(), status.to_string(), self.detail.clone()]
    }
}

/// Checks that need no network or subprocess
pub fn environment_checks(env: &HarnessEnv, storage_configured: bool) -> Vec<Check> {
    let gate = Gate::from_env(env);
    let mut checks = vec![Check::new("soundcheck", CheckStatus::Ok, format!("v{}", soundcheck_common::VERSION))];
    checks.extend([
        Requirement::AdminCredentials,
        Requirement::UserCredentials,
        Requirement::UserDeletionAllowed,
    ]
    .into_iter()
    .map(|requirement| {
        if gate.satisfies(requirement) {
            Check::new(&requirement.to_string(), CheckStatus::Ok, "configured")
        } else {
            Check::new(&requirement.to_string(), CheckStatus::Warn, requirement.skip_reason())
        }
    }));

    checks.push(Check::new(
        "fast-start-budget",
        CheckStatus::Ok,
        format!("{} ms", env.fast_start_max_ms),
    ));
    checks.push(Check::new(
        "ci",
        CheckStatus::Ok,
        if env.ci { "yes, retries default to 2" } else { "no" },
    ));
    checks.push(if storage_configured {
        Check::new("library-storage", CheckStatus::Ok, "SUPABASE_URL and service key set")
    } else {
        Check::new(
            "library-storage",
            CheckStatus::Warn,
            "SUPABASE_URL/SUPABASE_SERVICE_ROLE_KEY not set; library commands unavailable",
        )
    });
    checks
}

async fn reachability(base_url: &str) -> Check {
    let client = match reqwest::Client::builder().timeout(REACHABILITY_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => return Check::new("app-reachable", CheckStatus::Fail, e.to_string()),
    };
    match client.get(base_url).send().await {
        Ok(response) if response.status().is_success() => {
            Check::new("app-reachable", CheckStatus::Ok, format!("{} ({})", base_url, response.status()))
        }
        Ok(response) => Check::new(
            "app-reachable",
            CheckStatus::Warn,
            format!("{} answered {}", base_url, response.status()),
        ),
        Err(e) => Check::new("app-reachable", CheckStatus::Fail, format!("{}: {}", base_url, e)),
    }
}

pub async fn execute(args: DoctorArgs, format: OutputFormat) -> Result<()> {
    let env = HarnessEnv::from_env()?;
    let settings = RunSettings::load_or_default(&args.config)?;

    let mut checks = environment_checks(&env, StorageConfig::from_env().is_ok());

    checks.push(match check_playwright_installed(&settings.browser.project_dir).await {
        Ok(()) => Check::new("playwright", CheckStatus::Ok, "installed"),
        Err(e) => Check::new("playwright", CheckStatus::Fail, e.to_string()),
    });

    if args.offline {
        checks.push(Check::new("app-reachable", CheckStatus::Warn, "not checked"));
    } else if settings.server.is_some() {
        checks.push(Check::new(
            "app-reachable",
            CheckStatus::Ok,
            format!("server is started by `soundcheck run` at {}", env.base_url),
        ));
    } else {
        checks.push(reachability(&env.base_url).await);
    }

    print_list(&checks, format);

    let failed = checks.iter().filter(|c| c.status == CheckStatus::Fail).count();
    if failed > 0 {
        anyhow::bail!("{} check(s) failed", failed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use soundcheck_common::Credentials;

    fn status_of<'a>(checks: &'a [Check], name: &str) -> &'a Check {
        checks.iter().find(|c| c.name == name).unwrap()
    }

    #[test]
    fn test_missing_credentials_warn() {
        let checks = environment_checks(&HarnessEnv::default(), false);
        assert_eq!(status_of(&checks, "admin-credentials").status, CheckStatus::Warn);
        assert_eq!(status_of(&checks, "library-storage").status, CheckStatus::Warn);
        assert!(checks.iter().all(|c| c.status != CheckStatus::Fail));
    }

    #[test]
    fn test_configured_environment() {
        let env = HarnessEnv {
            admin: Some(Credentials { email: "a@example.com".into(), password: "pw".into() }),
            user: Some(Credentials { email: "u@example.com".into(), password: "pw".into() }),
            allow_user_deletion: true,
            ..HarnessEnv::default()
        };
        let checks = environment_checks(&env, true);
        assert!(checks.iter().all(|c| c.status == CheckStatus::Ok), "{checks:?}");
    }

    #[tokio::test]
    async fn test_unreachable_app_fails() {
        let check = reachability("http://127.0.0.1:9").await;
        assert_eq!(check.status, CheckStatus::Fail);
    }
}
