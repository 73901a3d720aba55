//! Declarative YAML test specification
//!
//! Simple flows can be written as YAML instead of Rust. Each file becomes one
//! test case in the `declarative` suite.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{E2eError, E2eResult};
use crate::gate::Requirement;
use crate::page::Page;
use crate::playwright::BrowserProfile;
use crate::suite::{Suite, TestCase, TestContext};
use crate::transport::WaitState;

/// A complete test specification parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSpec {
    /// Unique name for this test
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering tests
    #[serde(default)]
    pub tags: Vec<String>,

    /// Environment this test needs; unmet requirements skip it
    #[serde(default)]
    pub requires: Vec<Requirement>,

    /// Browser context
    #[serde(default)]
    pub profile: BrowserProfile,

    /// Steps to execute in order
    pub steps: Vec<TestStep>,
}

/// A single step in a test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Navigate to a URL (relative to base)
    Navigate {
        url: String,
        #[serde(default)]
        wait_for_selector: Option<String>,
    },

    /// Click an element
    Click {
        selector: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Fill an input field
    Fill { selector: String, value: String },

    /// Press a key
    Press {
        #[serde(default)]
        selector: Option<String>,
        key: String,
    },

    /// Wait for an element
    Wait {
        selector: String,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
        #[serde(default)]
        state: WaitState,
    },

    /// Wait until the page URL matches a regex
    WaitUrl {
        pattern: String,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
    },

    /// Wait for a fixed amount of time (use sparingly)
    Sleep { ms: u64 },

    /// Assert something about an element
    Assert {
        selector: String,
        #[serde(default)]
        visible: Option<bool>,
        #[serde(default)]
        text_contains: Option<String>,
        #[serde(default)]
        attribute: Option<AttributeAssertion>,
        #[serde(default)]
        count: Option<usize>,
        #[serde(default)]
        min_count: Option<usize>,
    },

    /// Evaluate JavaScript, optionally comparing the result
    Evaluate {
        script: String,
        #[serde(default)]
        expected: Option<serde_json::Value>,
    },

    /// Take a screenshot into the test's output directory
    Screenshot {
        name: String,
        #[serde(default)]
        full_page: bool,
    },

    /// Log a message (for debugging)
    Log { message: String },
}

fn default_wait_timeout() -> u64 {
    5000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeAssertion {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub contains: Option<String>,
}

impl TestStep {
    pub fn label(&self) -> String {
        match self {
            TestStep::Navigate { url, .. } => format!("navigate:{}", url),
            TestStep::Click { selector, .. } => format!("click:{}", selector),
            TestStep::Fill { selector, .. } => format!("fill:{}", selector),
            TestStep::Press { key, .. } => format!("press:{}", key),
            TestStep::Wait { selector, .. } => format!("wait:{}", selector),
            TestStep::WaitUrl { pattern, .. } => format!("wait_url:{}", pattern),
            TestStep::Sleep { ms } => format!("sleep:{}ms", ms),
            TestStep::Assert { selector, .. } => format!("assert:{}", selector),
            TestStep::Evaluate { .. } => "evaluate".to_string(),
            TestStep::Screenshot { name, .. } => format!("screenshot:{}", name),
            TestStep::Log { message } => format!("log:{}", message.chars().take(30).collect::<String>()),
        }
    }

    /// Execute the step against a page
    pub async fn execute(&self, ctx: &TestContext) -> E2eResult<()> {
        let page = &ctx.page;
        match self {
            TestStep::Navigate { url, wait_for_selector } => {
                page.goto(url).await?;
                if let Some(selector) = wait_for_selector {
                    page.wait_visible(selector, page.timeout()).await?;
                }
                Ok(())
            }
            TestStep::Click { selector, timeout_ms } => {
                let timeout = timeout_ms.map(Duration::from_millis).unwrap_or(page.timeout());
                page.click_within(selector, timeout).await
            }
            TestStep::Fill { selector, value } => page.fill(selector, value).await,
            TestStep::Press { selector, key } => page.press(selector.as_deref(), key).await,
            TestStep::Wait { selector, timeout_ms, state } => {
                page.wait_for(selector, *state, Duration::from_millis(*timeout_ms)).await
            }
            TestStep::WaitUrl { pattern, timeout_ms } => page
                .wait_for_url(pattern, Duration::from_millis(*timeout_ms))
                .await
                .map(|_| ()),
            TestStep::Sleep { ms } => page.sleep(Duration::from_millis(*ms)).await,
            TestStep::Assert { selector, visible, text_contains, attribute, count, min_count } => {
                self.assert(page, selector, *visible, text_contains.as_deref(), attribute.as_ref(), *count, *min_count)
                    .await
            }
            TestStep::Evaluate { script, expected } => {
                let actual: serde_json::Value = page.evaluate(script).await?;
                match expected {
                    Some(expected) if expected != &actual => Err(E2eError::AssertionFailed(format!(
                        "evaluate returned {actual}, expected {expected}"
                    ))),
                    _ => Ok(()),
                }
            }
            TestStep::Screenshot { name, full_page } => {
                std::fs::create_dir_all(&ctx.info.output_dir)?;
                page.screenshot(&ctx.info.output_dir.join(format!("{}.png", name)), *full_page)
                    .await
            }
            TestStep::Log { message } => {
                info!("[TEST LOG] {}", message);
                Ok(())
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn assert(
        &self,
        page: &Page,
        selector: &str,
        visible: Option<bool>,
        text_contains: Option<&str>,
        attribute: Option<&AttributeAssertion>,
        count: Option<usize>,
        min_count: Option<usize>,
    ) -> E2eResult<()> {
        if let Some(expected) = visible {
            let actual = page.is_visible(selector).await?;
            crate::ensure!(actual == expected, "{selector}: visible={actual}, expected {expected}");
        }

        if let Some(needle) = text_contains {
            let text = page.text(selector).await?;
            crate::ensure!(text.contains(needle), "{selector}: text {text:?} lacks {needle:?}");
        }

        if let Some(attr) = attribute {
            let actual = page.attribute(selector, &attr.name).await?;
            if let Some(value) = &attr.value {
                crate::ensure!(
                    actual.as_deref() == Some(value.as_str()),
                    "{selector}@{}: {actual:?}, expected {value:?}",
                    attr.name
                );
            }
            if let Some(needle) = &attr.contains {
                crate::ensure!(
                    actual.as_deref().map(|a| a.contains(needle.as_str())).unwrap_or(false),
                    "{selector}@{}: {actual:?} lacks {needle:?}",
                    attr.name
                );
            }
        }

        if count.is_some() || min_count.is_some() {
            let actual = page.count(selector).await?;
            if let Some(expected) = count {
                crate::ensure!(actual == expected, "{selector}: count={actual}, expected {expected}");
            }
            if let Some(min) = min_count {
                crate::ensure!(actual >= min, "{selector}: count={actual}, expected at least {min}");
            }
        }

        Ok(())
    }
}

async fn run_spec(spec: Arc<TestSpec>, ctx: TestContext) -> E2eResult<()> {
    for step in &spec.steps {
        step.execute(&ctx).await.map_err(|e| match e {
            E2eError::Skipped(_) | E2eError::StepFailed { .. } => e,
            other => E2eError::StepFailed { step: step.label(), reason: other.to_string() },
        })?;
    }
    Ok(())
}

impl TestSpec {
    /// Parse a test spec from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        serde_yaml::from_str(yaml).map_err(E2eError::from)
    }

    /// Parse a test spec from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all test specs from a directory
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            specs.push(Self::from_file(entry.path())?);
        }

        Ok(specs)
    }

    pub fn into_test_case(self) -> TestCase {
        let spec = Arc::new(self);
        let mut case = TestCase::new(spec.name.clone(), {
            let spec = spec.clone();
            move |ctx| run_spec(spec.clone(), ctx)
        });
        case.tags = spec.tags.clone();
        case.requires = spec.requires.clone();
        case
    }
}

/// One suite per browser profile holding the YAML specs found under `dir`
pub fn declarative_suites(dir: &Path) -> E2eResult<Vec<Suite>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut suites: Vec<Suite> = Vec::new();
    for spec in TestSpec::load_all(dir)? {
        let profile = spec.profile.clone();
        let position = suites.iter().position(|s| s.profile == profile);
        let index = match position {
            Some(index) => index,
            None => {
                let name = match &profile {
                    BrowserProfile::Desktop { .. } if suites.is_empty() => "declarative".to_string(),
                    _ => format!("declarative-{}", suites.len() + 1),
                };
                suites.push(
                    Suite::new(name)
                        .describe("YAML scenarios")
                        .tag("declarative")
                        .profile(profile),
                );
                suites.len() - 1
            }
        };
        suites[index].tests.push(spec.into_test_case());
    }
    Ok(suites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::TestInfo;
    use crate::testing::{selecting, ScriptedTransport};
    use serde_json::json;
    use soundcheck_common::HarnessEnv;

    const CHANNELS_YAML: &str = r#"
name: channel-grid
description: Channel grid renders for a signed-in listener
tags:
  - channels
  - smoke
requires:
  - user_credentials
steps:
  - action: navigate
    url: /channels
    wait_for_selector: '[data-testid="channel-card"]'
  - action: assert
    selector: '[data-testid="channel-card"]'
    min_count: 1
  - action: assert
    selector: '[data-testid="channel-card"] >> nth=0'
    attribute:
      name: data-selected
      value: "false"
  - action: screenshot
    name: channel-grid
"#;

    fn ctx(transport: ScriptedTransport, dir: &Path) -> TestContext {
        TestContext {
            page: Page::new(transport.into_arc(), Duration::from_secs(1)),
            env: Arc::new(HarnessEnv::default()),
            info: TestInfo {
                suite: "declarative".into(),
                name: "channel-grid".into(),
                attempt: 1,
                output_dir: dir.to_path_buf(),
            },
        }
    }

    #[test]
    fn test_parse_spec() {
        let spec = TestSpec::from_yaml(CHANNELS_YAML).unwrap();
        assert_eq!(spec.name, "channel-grid");
        assert_eq!(spec.steps.len(), 4);
        assert_eq!(spec.requires, vec![Requirement::UserCredentials]);
        assert_eq!(spec.profile, BrowserProfile::default());
    }

    #[tokio::test]
    async fn test_spec_runs_against_page() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new()
            .respond(|c| matches!(c, crate::transport::Command::Count { .. }), json!(6))
            .respond(selecting("nth=0"), json!("false"));
        let spec = Arc::new(TestSpec::from_yaml(CHANNELS_YAML).unwrap());
        run_spec(spec, ctx(transport, dir.path())).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_assertion_names_step() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new()
            .respond(|c| matches!(c, crate::transport::Command::Count { .. }), json!(0));
        let spec = Arc::new(TestSpec::from_yaml(CHANNELS_YAML).unwrap());
        let err = run_spec(spec, ctx(transport, dir.path())).await.unwrap_err();
        match err {
            E2eError::StepFailed { step, reason } => {
                assert!(step.starts_with("assert:"));
                assert!(reason.contains("at least 1"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_wait_url_step() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = "name: admin-route\nsteps:\n  - action: wait_url\n    pattern: /admin\n    timeout_ms: 500\n";
        let transport = ScriptedTransport::new().into_arc();
        let spec = Arc::new(TestSpec::from_yaml(yaml).unwrap());
        let mut context = ctx(ScriptedTransport::new(), dir.path());
        context.page = Page::new(transport.clone(), Duration::from_secs(1));
        run_spec(spec, context).await.unwrap();

        assert!(transport.sent().iter().any(|c| matches!(
            c,
            crate::transport::Command::WaitForUrl { pattern, timeout_ms: 500 } if pattern == "/admin"
        )));
    }

    #[test]
    fn test_declarative_suites_group_by_profile() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.yaml"), CHANNELS_YAML).unwrap();
        std::fs::write(
            dir.path().join("b.yml"),
            "name: mobile-home\nprofile:\n  kind: mobile\nsteps:\n  - action: navigate\n    url: /\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let suites = declarative_suites(dir.path()).unwrap();
        assert_eq!(suites.len(), 2);
        assert_eq!(suites[0].name, "declarative");
        assert_eq!(suites[0].tests[0].name, "channel-grid");
        assert_eq!(suites[1].profile, BrowserProfile::mobile());
        assert!(declarative_suites(&dir.path().join("missing")).unwrap().is_empty());
    }
}
