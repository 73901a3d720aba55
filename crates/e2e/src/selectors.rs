//! DOM contract of the application under test
//!
//! `data-testid` values the suites rely on, plus the admin tab labels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// Auth
pub const SIGN_IN_BUTTON: &str = "sign-in-button";
pub const SIGN_UP_LINK: &str = "sign-up-link";
pub const AUTH_EMAIL_INPUT: &str = "auth-email-input";
pub const AUTH_PASSWORD_INPUT: &str = "auth-password-input";
pub const AUTH_SUBMIT_BUTTON: &str = "auth-submit-button";
pub const AUTH_ERROR: &str = "auth-error";
pub const USER_MENU: &str = "user-menu";
pub const SIGN_OUT_BUTTON: &str = "sign-out-button";

// Navigation
pub const NAV_CHANNELS: &str = "nav-channels";
pub const NAV_PROFILE: &str = "nav-profile";
pub const NAV_SETTINGS: &str = "nav-settings";
pub const MOBILE_NAV: &str = "mobile-nav";

// Channels and player
pub const CHANNEL_CARD: &str = "channel-card";
pub const CHANNEL_PREVIEW_BUTTON: &str = "channel-preview-button";
pub const PLAYER_PLAY_PAUSE: &str = "player-play-pause";
pub const PLAYBACK_LOADING_MODAL: &str = "playback-loading-modal";

// Settings
pub const SESSION_TIMER_BUTTON: &str = "session-timer-button";
pub const SESSION_TIMER_DISPLAY: &str = "session-timer-display";
pub const CROSSFADE_MODE_SELECT: &str = "crossfade-mode-select";

// Admin
pub const ADMIN_DASHBOARD: &str = "admin-dashboard";
pub const ADMIN_BUILD_INFO: &str = "admin-build-info";
pub const LIBRARY_MODAL_OPEN: &str = "library-modal-open";
pub const LIBRARY_MODAL: &str = "library-modal";
pub const LIBRARY_SEARCH_INPUT: &str = "library-search-input";
pub const TRACK_ROW: &str = "track-row";
pub const USER_DELETE_BUTTON: &str = "user-delete-button";
pub const CONFIRM_DELETE_BUTTON: &str = "confirm-delete-button";

/// `data-testid` prefix of each admin tab's content panel
pub const ADMIN_TAB_PANEL_PREFIX: &str = "admin-tab-";

// Attributes
pub const ATTR_PLAYING: &str = "data-playing";
pub const ATTR_SELECTED: &str = "data-selected";
pub const ATTR_STATUS: &str = "data-status";

/// Session timer option for a number of minutes
pub fn session_timer_option(minutes: u32) -> String {
    format!("session-timer-option-{}", minutes)
}

/// Admin dashboard tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminTab {
    Analytics,
    Channels,
    Library,
    Users,
    Images,
    Quiz,
    Settings,
    Tests,
    Testing,
}

impl AdminTab {
    pub const ALL: [AdminTab; 9] = [
        AdminTab::Analytics,
        AdminTab::Channels,
        AdminTab::Library,
        AdminTab::Users,
        AdminTab::Images,
        AdminTab::Quiz,
        AdminTab::Settings,
        AdminTab::Tests,
        AdminTab::Testing,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            AdminTab::Analytics => "analytics",
            AdminTab::Channels => "channels",
            AdminTab::Library => "library",
            AdminTab::Users => "users",
            AdminTab::Images => "images",
            AdminTab::Quiz => "quiz",
            AdminTab::Settings => "settings",
            AdminTab::Tests => "tests",
            AdminTab::Testing => "testing",
        }
    }

    /// Visible text of the tab button
    pub fn label(&self) -> &'static str {
        match self {
            AdminTab::Analytics => "Analytics",
            AdminTab::Channels => "Channels",
            AdminTab::Library => "Music Library",
            AdminTab::Users => "Users",
            AdminTab::Images => "Images",
            AdminTab::Quiz => "Quiz",
            AdminTab::Settings => "Settings",
            AdminTab::Tests => "Tests",
            AdminTab::Testing => "Testing",
        }
    }

    /// Button selector matching the exact visible label
    pub fn selector(&self) -> String {
        format!("button:text-is(\"{}\") >> nth=0", self.label())
    }

    /// Truthy once this tab is the selected one: its button is marked
    /// selected/active, or its own content panel is rendered
    pub fn active_expression(&self) -> String {
        format!(
            r#"(() => {{
  const button = Array.from(document.querySelectorAll('button'))
    .find(b => (b.textContent || '').trim() === {label:?});
  const selected = !!button && (
    button.getAttribute('aria-selected') === 'true' ||
    button.getAttribute('data-state') === 'active' ||
    button.getAttribute('data-selected') === 'true' ||
    button.getAttribute('aria-current') === 'page');
  return selected || !!document.querySelector('[data-testid="{prefix}{slug}"]');
}})()"#,
            label = self.label(),
            prefix = ADMIN_TAB_PANEL_PREFIX,
            slug = self.slug(),
        )
    }
}

impl fmt::Display for AdminTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for AdminTab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AdminTab::ALL
            .iter()
            .copied()
            .find(|tab| tab.slug() == s)
            .ok_or_else(|| format!("unknown admin tab: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(AdminTab::Analytics, "Analytics")]
    #[test_case(AdminTab::Library, "Music Library")]
    #[test_case(AdminTab::Testing, "Testing")]
    fn test_tab_labels(tab: AdminTab, label: &str) {
        assert_eq!(tab.label(), label);
        assert!(tab.selector().contains(label));
    }

    #[test]
    fn test_active_expression_is_tab_specific() {
        let library = AdminTab::Library.active_expression();
        assert!(library.contains("\"Music Library\""));
        assert!(library.contains("admin-tab-library"));
        assert!(!library.contains("admin-tab-users"));
        assert_ne!(library, AdminTab::Users.active_expression());
    }

    #[test]
    fn test_slugs_round_trip() {
        for tab in AdminTab::ALL {
            assert_eq!(tab.slug().parse::<AdminTab>().unwrap(), tab);
        }
        assert!("billing".parse::<AdminTab>().is_err());
    }
}
