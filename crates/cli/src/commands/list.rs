//! List suites and tests

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use soundcheck_common::HarnessEnv;
use soundcheck_e2e::config::DEFAULT_CONFIG_FILE;
use soundcheck_e2e::{load_suites, Filter, Gate, RunSettings, Suite, TestCase};

use crate::output::{print_list, OutputFormat, TableDisplay};

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    #[arg(short, long)]
    pub suite: Option<String>,

    #[arg(short, long)]
    pub tag: Option<String>,

    #[arg(short, long)]
    pub grep: Option<String>,

    /// Run settings file (for the scenarios directory)
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
}

/// A selected test and whether the current environment would run it
#[derive(Debug, Serialize)]
pub struct TestListing {
    pub suite: String,
    pub test: String,
    pub tags: Vec<String>,
    pub requires: Vec<String>,
    pub skip_reason: Option<String>,
}

impl TestListing {
    fn new(suite: &Suite, test: &TestCase, gate: &Gate) -> Self {
        let requirements = suite.requirements_of(test);
        Self {
            suite: suite.name.clone(),
            test: test.name.clone(),
            tags: merged_tags(&suite.tags, &test.tags),
            requires: requirements.iter().map(|r| r.to_string()).collect(),
            skip_reason: gate.check(&requirements).err(),
        }
    }
}

/// Suite and test tags, sorted and without duplicates
fn merged_tags(suite_tags: &[String], test_tags: &[String]) -> Vec<String> {
    suite_tags
        .iter()
        .chain(test_tags)
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

impl TableDisplay for TestListing {
    fn headers() -> Vec<&'static str> {
        vec!["Suite", "Test", "Tags", "Requires", "Would skip"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.suite.clone(),
            self.test.clone(),
            self.tags.join(", "),
            self.requires.join(", "),
            self.skip_reason.clone().unwrap_or_default(),
        ]
    }
}

pub fn listings(suites: &[Suite], filter: &Filter, env: &HarnessEnv) -> Vec<TestListing> {
    let gate = Gate::from_env(env);
    filter
        .select(suites)
        .into_iter()
        .map(|(suite, test)| TestListing::new(suite, test, &gate))
        .collect()
}

pub fn execute(args: ListArgs, format: OutputFormat) -> Result<()> {
    let env = HarnessEnv::from_env()?;
    let settings = RunSettings::load_or_default(&args.config)?;
    let suites = load_suites(&settings.specs_dir)?;
    let filter = Filter {
        suite: args.suite,
        tag: args.tag,
        grep: args.grep,
    };

    print_list(&listings(&suites, &filter, &env), format);
    Ok(())
}
