//! Parse a build-info label from the admin dashboard

use anyhow::Result;
use serde::Serialize;
use soundcheck_common::BuildInfo;

use crate::output::{print_item, OutputFormat, TableDisplay};

#[derive(Serialize)]
struct BuildInfoRow {
    #[serde(flatten)]
    info: BuildInfo,
    local: bool,
}

impl TableDisplay for BuildInfoRow {
    fn headers() -> Vec<&'static str> {
        vec!["Version", "Commit", "Environment", "Built (UTC)"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.info.version.clone(),
            self.info.commit.to_string(),
            self.info.environment.clone(),
            self.info.built_at.format("%Y-%m-%d %H:%M").to_string(),
        ]
    }
}

pub fn execute(label: &str, format: OutputFormat) -> Result<()> {
    let info = BuildInfo::parse(label)?;
    let local = info.is_local();
    print_item(&BuildInfoRow { info, local }, format);
    Ok(())
}
