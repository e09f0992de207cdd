//! Blocking screen content.
//!
//! Layout is the host's business. This module only decides what the screen
//! says and which actions it offers.

use std::fmt::Write as _;

use crate::TaskSummary;

/// Maximum number of task cards on the blocking screen.
pub const MAX_TASK_CARDS: usize = 5;

const PERMANENT_TITLE: &str = "App Permanently Blocked";
const PERMANENT_MESSAGE: &str =
    "This app has been permanently blocked.\nYou chose to block this app 24/7.";
const PERMANENT_HINT: &str = "To unblock this app, go to Settings > Restrictions in the main app and remove it from the 'Always Block' list.";
const TASKS_TITLE: &str = "App Blocked";
const TASKS_MESSAGE: &str = "Complete your pending tasks to unlock access";
const NO_TASKS_MESSAGE: &str = "No pending tasks found.\nOpen the app to refresh.";

/// The only ways off the blocking screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScreenAction {
    /// Go to the home screen.
    ReturnHome,
    /// Relaunch the main application.
    OpenMainApplication,
}

/// One pending task card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCard {
    pub id: String,
    pub title: String,
    pub description: String,
    pub overdue: bool,
}

/// What sits below the title and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenBody {
    /// Permanent block: how to lift it, no tasks.
    Permanent { hint: &'static str },
    /// Task-based block with the highest-priority pending tasks.
    Tasks {
        cards: Vec<TaskCard>,
        total_pending: usize,
    },
    /// Task-based block before task data has arrived.
    NoTasks { message: &'static str },
}

/// Content of the blocking surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockingScreen {
    pub application_id: String,
    pub is_permanent: bool,
    pub title: &'static str,
    pub message: &'static str,
    pub body: ScreenBody,
    pub open_app_label: &'static str,
    pub actions: [ScreenAction; 2],
}

impl BlockingScreen {
    /// Build the screen for a blocked application.
    ///
    /// Overdue tasks come first; otherwise the main application's order is
    /// kept.
    pub fn build(application_id: &str, is_permanent: bool, tasks: &[TaskSummary]) -> Self {
        let (title, message, body, open_app_label) = if is_permanent {
            (
                PERMANENT_TITLE,
                PERMANENT_MESSAGE,
                ScreenBody::Permanent {
                    hint: PERMANENT_HINT,
                },
                "Open Main App",
            )
        } else if tasks.is_empty() {
            (
                TASKS_TITLE,
                TASKS_MESSAGE,
                ScreenBody::NoTasks {
                    message: NO_TASKS_MESSAGE,
                },
                "Open App to Complete Tasks",
            )
        } else {
            let mut ordered: Vec<&TaskSummary> = tasks.iter().collect();
            ordered.sort_by_key(|t| !t.is_overdue);
            let cards = ordered
                .into_iter()
                .take(MAX_TASK_CARDS)
                .map(|t| TaskCard {
                    id: t.id.clone(),
                    title: t.title.clone(),
                    description: t.description.clone(),
                    overdue: t.is_overdue,
                })
                .collect();
            (
                TASKS_TITLE,
                TASKS_MESSAGE,
                ScreenBody::Tasks {
                    cards,
                    total_pending: tasks.len(),
                },
                "Open App to Complete Tasks",
            )
        };

        Self {
            application_id: application_id.to_string(),
            is_permanent,
            title,
            message,
            body,
            open_app_label,
            actions: [ScreenAction::ReturnHome, ScreenAction::OpenMainApplication],
        }
    }

    /// Task cards shown, if any.
    pub fn task_cards(&self) -> &[TaskCard] {
        match &self.body {
            ScreenBody::Tasks { cards, .. } => cards,
            _ => &[],
        }
    }

    /// Plain-text rendering for hosts without a layout engine.
    pub fn render_text(&self) -> String {
        let mut out = format!("{}\n\n{}\n", self.title, self.message);

        match &self.body {
            ScreenBody::Permanent { hint } => {
                let _ = write!(out, "\n{hint}\n");
            }
            ScreenBody::NoTasks { message } => {
                let _ = write!(out, "\n{message}\n");
            }
            ScreenBody::Tasks {
                cards,
                total_pending,
            } => {
                let _ = write!(out, "\nPENDING TASKS ({total_pending})\n");
                for card in cards {
                    let marker = if card.overdue { " [OVERDUE]" } else { "" };
                    let _ = writeln!(out, "- {}{}", card.title, marker);
                }
            }
        }

        out
    }
}
