//! Suites and test cases

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use soundcheck_common::HarnessEnv;

use crate::error::E2eResult;
use crate::gate::Requirement;
use crate::page::Page;
use crate::playwright::BrowserProfile;

pub type TestFn = Arc<dyn Fn(TestContext) -> BoxFuture<'static, E2eResult<()>> + Send + Sync>;

/// Identity of the running test
#[derive(Debug, Clone)]
pub struct TestInfo {
    pub suite: String,
    pub name: String,
    pub attempt: u32,
    pub output_dir: PathBuf,
}

/// Everything a test body gets
#[derive(Clone)]
pub struct TestContext {
    pub page: Page,
    pub env: Arc<HarnessEnv>,
    pub info: TestInfo,
}

#[derive(Clone)]
pub struct TestCase {
    pub name: String,
    pub tags: Vec<String>,
    pub requires: Vec<Requirement>,
    /// Overrides the runner's per-test timeout
    pub timeout: Option<Duration>,
    pub body: TestFn,
}

impl TestCase {
    pub fn new<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = E2eResult<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            tags: Vec::new(),
            requires: Vec::new(),
            timeout: None,
            body: Arc::new(move |ctx| body(ctx).boxed()),
        }
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    pub fn requires(mut self, requirement: Requirement) -> Self {
        self.requires.push(requirement);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl std::fmt::Debug for TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("requires", &self.requires)
            .finish()
    }
}

/// A feature area: tests sharing requirements and a browser profile
#[derive(Debug, Clone)]
pub struct Suite {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub requires: Vec<Requirement>,
    pub profile: BrowserProfile,
    pub tests: Vec<TestCase>,
}

impl Suite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            tags: Vec::new(),
            requires: Vec::new(),
            profile: BrowserProfile::default(),
            tests: Vec::new(),
        }
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    pub fn requires(mut self, requirement: Requirement) -> Self {
        self.requires.push(requirement);
        self
    }

    pub fn profile(mut self, profile: BrowserProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn test(mut self, test: TestCase) -> Self {
        self.tests.push(test);
        self
    }

    /// Requirements of a test including the suite's own
    pub fn requirements_of<'a>(&'a self, test: &'a TestCase) -> Vec<Requirement> {
        let mut all = self.requires.clone();
        all.extend(test.requires.iter().copied().filter(|r| !self.requires.contains(r)));
        all
    }

    pub fn has_tag(&self, test: &TestCase, tag: &str) -> bool {
        self.tags.iter().chain(test.tags.iter()).any(|t| t == tag)
    }
}

/// Which tests to run
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub suite: Option<String>,
    pub tag: Option<String>,
    /// Substring of the test name
    pub grep: Option<String>,
}

impl Filter {
    pub fn matches(&self, suite: &Suite, test: &TestCase) -> bool {
        if let Some(name) = &self.suite {
            if &suite.name != name {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !suite.has_tag(test, tag) {
                return false;
            }
        }
        if let Some(grep) = &self.grep {
            if !test.name.contains(grep.as_str()) {
                return false;
            }
        }
        true
    }

    /// Matching tests in declaration order
    pub fn select<'a>(&self, suites: &'a [Suite]) -> Vec<(&'a Suite, &'a TestCase)> {
        suites
            .iter()
            .flat_map(|suite| suite.tests.iter().map(move |test| (suite, test)))
            .filter(|(suite, test)| self.matches(suite, test))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn noop(_ctx: TestContext) -> E2eResult<()> {
        Ok(())
    }

    fn suite() -> Suite {
        Suite::new("admin")
            .tag("admin")
            .requires(Requirement::AdminCredentials)
            .test(TestCase::new("dashboard loads", noop).tag("smoke"))
            .test(
                TestCase::new("cleanup synthetic users", noop)
                    .requires(Requirement::AdminCredentials)
                    .requires(Requirement::UserDeletionAllowed),
            )
    }

    #[test]
    fn test_requirements_merge_without_duplicates() {
        let suite = suite();
        assert_eq!(
            suite.requirements_of(&suite.tests[1]),
            vec![Requirement::AdminCredentials, Requirement::UserDeletionAllowed]
        );
    }

    #[test]
    fn test_filter() {
        let suite = suite();
        let smoke = Filter { tag: Some("smoke".into()), ..Default::default() };
        assert!(smoke.matches(&suite, &suite.tests[0]));
        assert!(!smoke.matches(&suite, &suite.tests[1]));

        let by_suite = Filter { suite: Some("admin".into()), grep: Some("cleanup".into()), ..Default::default() };
        assert!(!by_suite.matches(&suite, &suite.tests[0]));
        assert!(by_suite.matches(&suite, &suite.tests[1]));

        let suite_tag = Filter { tag: Some("admin".into()), ..Default::default() };
        assert!(suite_tag.matches(&suite, &suite.tests[1]));
    }
}
