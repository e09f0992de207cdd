//! Block/allow classification.

use crate::RestrictionState;

/// Applications treated as browsers.
///
/// The agent cannot see which URL is loaded, so any website restriction
/// blocks every browser in this list.
pub const BROWSERS: &[&str] = &[
    // Android
    "com.android.chrome",
    "org.mozilla.firefox",
    "com.microsoft.emmx",
    "com.opera.browser",
    "com.brave.browser",
    "com.vivaldi.browser",
    "com.kiwibrowser.browser",
    "com.duckduckgo.mobile.android",
    // macOS
    "com.google.Chrome",
    "com.apple.Safari",
    "com.microsoft.edgemac",
    "com.brave.Browser",
    "com.operasoftware.Opera",
    "com.vivaldi.Vivaldi",
    "company.thebrowser.Browser",
];

/// Check if an application is a recognized browser.
pub fn is_browser(application_id: &str) -> bool {
    BROWSERS.contains(&application_id)
}

/// Outcome of classifying one observed application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockDecision {
    /// Leave the application alone.
    Allow,
    /// Remove the application from the foreground.
    Block {
        application_id: String,
        is_permanent: bool,
    },
}

impl BlockDecision {
    fn block(application_id: &str, is_permanent: bool) -> Self {
        Self::Block {
            application_id: application_id.to_string(),
            is_permanent,
        }
    }

    /// Check if this decision blocks.
    pub fn is_block(&self) -> bool {
        matches!(self, Self::Block { .. })
    }
}

/// Decide whether `application_id` must be blocked under `state`.
///
/// Permanent blocks win over task-based ones, for apps and for websites.
pub fn classify(
    state: &RestrictionState,
    own_application_id: &str,
    application_id: &str,
) -> BlockDecision {
    if !state.active || application_id == own_application_id {
        return BlockDecision::Allow;
    }

    if state.permanently_blocked_apps.contains(application_id) {
        return BlockDecision::block(application_id, true);
    }

    if state.restricted_apps.contains(application_id) {
        return BlockDecision::block(application_id, false);
    }

    if is_browser(application_id) && state.has_website_restrictions() {
        let is_permanent = !state.permanently_blocked_website_domains.is_empty();
        return BlockDecision::block(application_id, is_permanent);
    }

    BlockDecision::Allow
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWN: &str = "com.example.tasklock";

    fn state(active: bool) -> RestrictionState {
        RestrictionState::new(
            ["com.a.b".to_string(), OWN.to_string()],
            Vec::new(),
            active,
            Vec::new(),
            ["com.x.y".to_string(), "com.a.b".to_string()],
            Vec::new(),
        )
    }

    #[test]
    fn test_inactive_allows_everything() {
        let state = state(false);
        for id in ["com.a.b", "com.x.y", "com.android.chrome", "other"] {
            assert_eq!(classify(&state, OWN, id), BlockDecision::Allow);
        }
    }

    #[test]
    fn test_own_app_always_allowed() {
        let mut state = state(true);
        state.permanently_blocked_apps.insert(OWN.into());
        assert_eq!(classify(&state, OWN, OWN), BlockDecision::Allow);
    }

    #[test]
    fn test_permanent_wins_over_task_based() {
        let decision = classify(&state(true), OWN, "com.a.b");
        assert_eq!(
            decision,
            BlockDecision::Block {
                application_id: "com.a.b".into(),
                is_permanent: true,
            }
        );
    }

    #[test]
    fn test_task_based_app() {
        let state = RestrictionState::new(
            ["com.a.b".to_string()],
            Vec::new(),
            true,
            Vec::new(),
            Vec::new(),
            Vec::new(),
        );
        assert_eq!(
            classify(&state, OWN, "com.a.b"),
            BlockDecision::Block {
                application_id: "com.a.b".into(),
                is_permanent: false,
            }
        );
        assert_eq!(classify(&state, OWN, "com.c.d"), BlockDecision::Allow);
    }

    #[test]
    fn test_browser_with_task_based_websites() {
        let state = RestrictionState::new(
            Vec::new(),
            ["youtube.com".to_string()],
            true,
            Vec::new(),
            Vec::new(),
            Vec::new(),
        );
        assert_eq!(
            classify(&state, OWN, "com.android.chrome"),
            BlockDecision::Block {
                application_id: "com.android.chrome".into(),
                is_permanent: false,
            }
        );
        assert_eq!(classify(&state, OWN, "com.spotify.music"), BlockDecision::Allow);
    }

    #[test]
    fn test_browser_with_permanent_websites() {
        let state = RestrictionState::new(
            Vec::new(),
            ["youtube.com".to_string()],
            true,
            Vec::new(),
            Vec::new(),
            ["reddit.com".to_string()],
        );
        assert_eq!(
            classify(&state, OWN, "org.mozilla.firefox"),
            BlockDecision::Block {
                application_id: "org.mozilla.firefox".into(),
                is_permanent: true,
            }
        );
    }

    #[test]
    fn test_browser_without_website_restrictions() {
        let state = RestrictionState {
            active: true,
            ..Default::default()
        };
        assert_eq!(classify(&state, OWN, "com.android.chrome"), BlockDecision::Allow);
    }
}
