//! Built-in scenario suites, one per feature area

pub mod admin;
pub mod auth;
pub mod channels;
pub mod crossfade;
pub mod flow;
pub mod hls;
pub mod ios_clamp;
pub mod mobile;
pub mod playback;
pub mod prefetch;
pub mod settings;

use crate::suite::Suite;

/// Every built-in suite in run order
pub fn all_suites() -> Vec<Suite> {
    vec![
        auth::suite(),
        admin::suite(),
        channels::suite(),
        playback::suite(),
        prefetch::suite(),
        hls::suite(),
        ios_clamp::suite(),
        crossfade::suite(),
        settings::suite(),
        mobile::suite(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_suite_and_test_names_are_unique() {
        let suites = all_suites();
        let names: HashSet<_> = suites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names.len(), suites.len());

        for suite in &suites {
            assert!(!suite.tests.is_empty(), "{} has no tests", suite.name);
            let tests: HashSet<_> = suite.tests.iter().map(|t| t.name.as_str()).collect();
            assert_eq!(tests.len(), suite.tests.len(), "duplicate test in {}", suite.name);
        }
    }
}
