//! Restriction state snapshot.

use std::collections::BTreeSet;

/// Everything the classifier needs to decide, replaced as one unit.
///
/// Values are never mutated in place: an update builds a new
/// `RestrictionState` and the store swaps it in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestrictionState {
    /// Task-gated application restrictions.
    pub restricted_apps: BTreeSet<String>,
    /// Task-gated website restrictions (enforced per browser, not per URL).
    pub restricted_website_domains: BTreeSet<String>,
    /// Applications blocked regardless of tasks.
    pub permanently_blocked_apps: BTreeSet<String>,
    /// Websites blocked regardless of tasks.
    pub permanently_blocked_website_domains: BTreeSet<String>,
    /// Master switch. When false nothing is blocked.
    pub active: bool,
    /// Display data for the blocking screen.
    pub pending_tasks: Vec<TaskSummary>,
}

impl RestrictionState {
    /// Build a snapshot from the six ingress lists.
    pub fn new<A, W, P, Q>(
        apps: A,
        websites: W,
        active: bool,
        pending_tasks: Vec<TaskSummary>,
        permanent_apps: P,
        permanent_websites: Q,
    ) -> Self
    where
        A: IntoIterator<Item = String>,
        W: IntoIterator<Item = String>,
        P: IntoIterator<Item = String>,
        Q: IntoIterator<Item = String>,
    {
        Self {
            restricted_apps: apps.into_iter().collect(),
            restricted_website_domains: websites.into_iter().collect(),
            permanently_blocked_apps: permanent_apps.into_iter().collect(),
            permanently_blocked_website_domains: permanent_websites.into_iter().collect(),
            active,
            pending_tasks,
        }
    }

    /// True if any website restriction, permanent or task-based, exists.
    pub fn has_website_restrictions(&self) -> bool {
        !self.restricted_website_domains.is_empty()
            || !self.permanently_blocked_website_domains.is_empty()
    }
}

/// A pending task as shown on the blocking screen.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    /// Task identifier. Numeric ids from the main application are accepted.
    #[serde(default, deserialize_with = "lenient::id")]
    pub id: String,
    /// Task title.
    #[serde(default = "untitled", deserialize_with = "lenient::title")]
    pub title: String,
    /// Optional one-line description.
    #[serde(default, deserialize_with = "lenient::text")]
    pub description: String,
    /// Whether the task is past its due time.
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_overdue: bool,
}

impl TaskSummary {
    /// Create a task summary.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        is_overdue: bool,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            is_overdue,
        }
    }
}

fn untitled() -> String {
    "Untitled Task".to_string()
}

/// Task fields are display-only, so a null or mistyped value decodes to the
/// field's default instead of failing the whole task list.
mod lenient {
    use serde::de::IgnoredAny;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Int(i64),
        Float(f64),
        Other(IgnoredAny),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Text {
        Text(String),
        Other(IgnoredAny),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Other(IgnoredAny),
    }

    pub fn id<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Id::deserialize(deserializer)? {
            Id::Text(s) => s,
            Id::Int(n) => n.to_string(),
            Id::Float(n) => n.to_string(),
            Id::Other(_) => String::new(),
        })
    }

    pub fn title<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Text::deserialize(deserializer)? {
            Text::Text(s) => s,
            Text::Other(_) => super::untitled(),
        })
    }

    pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Text::deserialize(deserializer)? {
            Text::Text(s) => s,
            Text::Other(_) => String::new(),
        })
    }

    pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Flag::deserialize(deserializer)? {
            Flag::Bool(b) => b,
            Flag::Other(_) => false,
        })
    }
}
