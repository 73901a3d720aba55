//! Build-info label parsing
//!
//! The admin dashboard shows a label such as
//! `v1.3.0 #e3519ee · prod · 2025-12-01T23:48Z`: a semver version, a short
//! commit sha (or `local` for unversioned builds), the deploy environment and
//! the build time truncated to the minute.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

static LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^v(?P<version>\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?(?:\+[0-9A-Za-z.-]+)?) #(?P<commit>[0-9a-f]{7}|local) · (?P<env>[A-Za-z][A-Za-z0-9_-]*) · (?P<ts>\d{4}-\d{2}-\d{2}T\d{2}:\d{2})Z$",
    )
    .expect("build info pattern is valid")
});

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Commit a build was produced from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "sha")]
pub enum Commit {
    Sha(String),
    Local,
}

impl fmt::Display for Commit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Commit::Sha(sha) => f.write_str(sha),
            Commit::Local => f.write_str("local"),
        }
    }
}

/// Parsed build-info label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub version: String,
    pub commit: Commit,
    pub environment: String,
    /// UTC, minute precision
    pub built_at: NaiveDateTime,
}

impl BuildInfo {
    /// Parse a label, rejecting anything that is not exactly the four-field format
    pub fn parse(label: &str) -> Result<Self> {
        let caps = LABEL
            .captures(label.trim())
            .ok_or_else(|| Error::InvalidBuildInfo(label.to_string()))?;

        let commit = match &caps["commit"] {
            "local" => Commit::Local,
            sha => Commit::Sha(sha.to_string()),
        };

        let built_at = NaiveDateTime::parse_from_str(&caps["ts"], TIMESTAMP_FORMAT)
            .map_err(|_| Error::InvalidBuildInfo(label.to_string()))?;

        Ok(Self {
            version: caps["version"].to_string(),
            commit,
            environment: caps["env"].to_string(),
            built_at,
        })
    }

    pub fn is_local(&self) -> bool {
        self.commit == Commit::Local
    }
}

impl FromStr for BuildInfo {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v{} #{} · {} · {}Z",
            self.version,
            self.commit,
            self.environment,
            self.built_at.format(TIMESTAMP_FORMAT)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_parses_reference_label() {
        let info = BuildInfo::parse("v1.3.0 #e3519ee · prod · 2025-12-01T23:48Z").unwrap();
        assert_eq!(info.version, "1.3.0");
        assert_eq!(info.commit, Commit::Sha("e3519ee".into()));
        assert_eq!(info.environment, "prod");
        assert_eq!(info.built_at.format("%Y-%m-%d %H:%M").to_string(), "2025-12-01 23:48");
        assert_eq!(info.to_string(), "v1.3.0 #e3519ee · prod · 2025-12-01T23:48Z");
    }

    #[test]
    fn test_parses_local_build() {
        let info = BuildInfo::parse("v0.9.12 #local · dev · 2024-02-29T00:00Z").unwrap();
        assert!(info.is_local());
        assert_eq!(info.environment, "dev");
    }

    #[test_case("" ; "empty")]
    #[test_case("1.3.0 #e3519ee · prod · 2025-12-01T23:48Z" ; "missing v prefix")]
    #[test_case("v1.3.0 · prod · 2025-12-01T23:48Z" ; "missing commit")]
    #[test_case("v1.3.0 #e3519ee · 2025-12-01T23:48Z" ; "missing environment")]
    #[test_case("v1.3.0 #e3519ee · prod" ; "missing timestamp")]
    #[test_case("#e3519ee · prod · 2025-12-01T23:48Z" ; "missing version")]
    #[test_case("v1.3 #e3519ee · prod · 2025-12-01T23:48Z" ; "short semver")]
    #[test_case("v1.3.0 #e3519e · prod · 2025-12-01T23:48Z" ; "six hex sha")]
    #[test_case("v1.3.0 #E3519EE · prod · 2025-12-01T23:48Z" ; "uppercase sha")]
    #[test_case("v1.3.0 #e3519ee · prod · 2025-12-01T23:48" ; "missing zulu")]
    #[test_case("v1.3.0 #e3519ee · prod · 2025-12-01T23:48:10Z" ; "seconds present")]
    #[test_case("v1.3.0 #e3519ee · prod · 2025-13-01T23:48Z" ; "impossible month")]
    #[test_case("v1.3.0 #e3519ee - prod - 2025-12-01T23:48Z" ; "wrong separator")]
    fn test_rejects_malformed(label: &str) {
        assert!(matches!(BuildInfo::parse(label), Err(Error::InvalidBuildInfo(_))));
    }
}
