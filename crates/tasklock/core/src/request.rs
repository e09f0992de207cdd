//! Configuration ingress wire format.
//!
//! One JSON object per line. Method names follow the main application's
//! channel (`updateRestrictions`, `checkOverlayPermission`, `status`).

use crate::{RestrictionState, TaskSummary};

/// A request from the main application.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum Request {
    /// Replace the whole restriction state.
    UpdateRestrictions(UpdateRestrictions),
    /// Ask whether the overlay capability is granted.
    CheckOverlayPermission,
    /// Ask for a summary of the agent's state.
    Status,
}

/// Arguments of `updateRestrictions`. Missing arguments are empty or false.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateRestrictions {
    pub apps: Vec<String>,
    pub websites: Vec<String>,
    pub active: bool,
    pub pending_tasks: Vec<TaskSummary>,
    pub permanently_blocked_apps: Vec<String>,
    pub permanently_blocked_websites: Vec<String>,
}

impl UpdateRestrictions {
    /// Convert into a fresh restriction snapshot.
    pub fn into_state(self) -> RestrictionState {
        RestrictionState::new(
            self.apps,
            self.websites,
            self.active,
            self.pending_tasks,
            self.permanently_blocked_apps,
            self.permanently_blocked_websites,
        )
    }
}

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// The agent is not monitoring, so there is nothing to update.
    NotActive,
    /// The request line could not be decoded.
    InvalidRequest,
    /// The state was applied in memory but could not be saved.
    Persist,
}

/// Reply to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Response {
    Updated,
    OverlayPermission { granted: bool },
    Status(StatusReport),
    Error { kind: ErrorKind, message: String },
}

/// Summary of the agent's state.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub monitoring: bool,
    pub restrictions_active: bool,
    pub restricted_apps: usize,
    pub restricted_websites: usize,
    pub permanently_blocked_apps: usize,
    pub permanently_blocked_websites: usize,
    pub pending_tasks: usize,
}

impl StatusReport {
    /// Summarize a restriction snapshot.
    pub fn from_state(state: &RestrictionState) -> Self {
        Self {
            monitoring: true,
            restrictions_active: state.active,
            restricted_apps: state.restricted_apps.len(),
            restricted_websites: state.restricted_website_domains.len(),
            permanently_blocked_apps: state.permanently_blocked_apps.len(),
            permanently_blocked_websites: state.permanently_blocked_website_domains.len(),
            pending_tasks: state.pending_tasks.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_update_with_missing_arguments() {
        let line = r#"{"method":"updateRestrictions","apps":["com.a.b"],"active":true}"#;
        let request: Request = serde_json::from_str(line).unwrap();

        let Request::UpdateRestrictions(update) = request else {
            panic!("expected updateRestrictions");
        };
        let state = update.into_state();
        assert!(state.active);
        assert!(state.restricted_apps.contains("com.a.b"));
        assert!(state.permanently_blocked_apps.is_empty());
        assert!(state.pending_tasks.is_empty());
    }

    #[test]
    fn test_parse_unit_methods() {
        let request: Request = serde_json::from_str(r#"{"method":"status"}"#).unwrap();
        assert_eq!(request, Request::Status);

        let request: Request =
            serde_json::from_str(r#"{"method":"checkOverlayPermission"}"#).unwrap();
        assert_eq!(request, Request::CheckOverlayPermission);
    }

    #[test]
    fn test_error_response_shape() {
        let response = Response::Error {
            kind: ErrorKind::NotActive,
            message: "agent is not running".into(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["kind"], "notActive");
    }
}
