//! Host capabilities the agent drives.
//!
//! Every call is fallible and must return promptly. Callers log failures and
//! carry on.

use tasklock_core::BlockingScreen;

/// Kind of a visible window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Application,
    InputMethod,
    System,
    AccessibilityOverlay,
    SplitScreenDivider,
    Unknown,
}

/// A window currently on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    /// Application owning the window.
    pub application_id: String,
    pub kind: WindowKind,
}

impl WindowInfo {
    /// An ordinary application window.
    pub fn application(application_id: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            kind: WindowKind::Application,
        }
    }
}

/// An entry in the host's running task list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningTask {
    pub id: u32,
    /// Application of the task's root activity.
    pub base_application_id: Option<String>,
    /// Application of the task's topmost activity.
    pub top_application_id: Option<String>,
}

impl RunningTask {
    /// Check if either end of the task belongs to `application_id`.
    pub fn belongs_to(&self, application_id: &str) -> bool {
        self.base_application_id.as_deref() == Some(application_id)
            || self.top_application_id.as_deref() == Some(application_id)
    }
}

/// Visible-window enumeration.
pub trait WindowInspector: Send + Sync {
    /// List every window currently on screen.
    fn visible_windows(&self) -> color_eyre::eyre::Result<Vec<WindowInfo>>;
}

/// Global navigation actions.
pub trait GlobalActions: Send + Sync {
    /// Dismiss the current foreground surface.
    fn navigate_back(&self) -> color_eyre::eyre::Result<()>;

    /// Go to the home screen.
    fn navigate_home(&self) -> color_eyre::eyre::Result<()>;
}

/// Background process termination.
pub trait ProcessControl: Send + Sync {
    /// Terminate the background processes of an application.
    fn terminate_background(&self, application_id: &str) -> color_eyre::eyre::Result<()>;
}

/// Running task list access.
pub trait TaskManager: Send + Sync {
    /// List running tasks.
    fn running_tasks(&self) -> color_eyre::eyre::Result<Vec<RunningTask>>;

    /// Remove a task from the running list.
    fn remove_task(&self, task: &RunningTask) -> color_eyre::eyre::Result<()>;
}

/// Windows drawn above every other application.
pub trait OverlayWindows: Send + Sync {
    /// Check if the overlay capability is granted.
    fn can_draw_overlays(&self) -> bool;

    /// Add a full-screen, input-capturing overlay.
    fn add_overlay(&self, screen: &BlockingScreen) -> color_eyre::eyre::Result<()>;

    /// Remove the overlay if one is showing.
    fn remove_overlay(&self) -> color_eyre::eyre::Result<()>;
}

/// Ordinary application screens.
pub trait ScreenLauncher: Send + Sync {
    /// Show the blocking screen through the normal presentation path.
    fn show_fallback(&self, screen: &BlockingScreen) -> color_eyre::eyre::Result<()>;

    /// Bring the main application to the front.
    fn launch_main_application(&self) -> color_eyre::eyre::Result<()>;
}

/// Combined host trait.
pub trait Host:
    WindowInspector + GlobalActions + ProcessControl + TaskManager + OverlayWindows + ScreenLauncher
{
}

impl<T> Host for T where
    T: WindowInspector
        + GlobalActions
        + ProcessControl
        + TaskManager
        + OverlayWindows
        + ScreenLauncher
{
}
