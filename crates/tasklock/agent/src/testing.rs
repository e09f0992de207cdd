//! Recording host for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use color_eyre::eyre::eyre;
use tasklock_core::BlockingScreen;

use crate::host::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Back,
    Home,
    Terminate(String),
    RemoveTask(u32),
    AddOverlay(String),
    RemoveOverlay,
    ShowFallback(String),
    LaunchMain,
}

/// Host that records every capability call.
///
/// `windows` set to `None` makes the window scan fail.
pub struct FakeHost {
    calls: Mutex<Vec<Call>>,
    windows: Mutex<Option<Vec<WindowInfo>>>,
    tasks: Mutex<Vec<RunningTask>>,
    screens: Mutex<Vec<BlockingScreen>>,
    pub overlay_permitted: AtomicBool,
    pub fail_back: AtomicBool,
    pub fail_terminate: AtomicBool,
    pub fail_overlay: AtomicBool,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            windows: Mutex::new(Some(Vec::new())),
            tasks: Mutex::new(Vec::new()),
            screens: Mutex::new(Vec::new()),
            overlay_permitted: AtomicBool::new(true),
            fail_back: AtomicBool::new(false),
            fail_terminate: AtomicBool::new(false),
            fail_overlay: AtomicBool::new(false),
        }
    }

    pub fn set_windows(&self, ids: &[&str]) {
        let windows = ids.iter().map(|id| WindowInfo::application(*id)).collect();
        *self.windows.lock().unwrap() = Some(windows);
    }

    pub fn fail_scan(&self) {
        *self.windows.lock().unwrap() = None;
    }

    pub fn set_tasks(&self, tasks: Vec<RunningTask>) {
        *self.tasks.lock().unwrap() = tasks;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    /// Screens handed to the fallback path.
    pub fn screens(&self) -> Vec<BlockingScreen> {
        self.screens.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl WindowInspector for FakeHost {
    fn visible_windows(&self) -> color_eyre::eyre::Result<Vec<WindowInfo>> {
        self.windows
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| eyre!("window list unavailable"))
    }
}

impl GlobalActions for FakeHost {
    fn navigate_back(&self) -> color_eyre::eyre::Result<()> {
        self.record(Call::Back);
        if self.fail_back.load(Ordering::Relaxed) {
            return Err(eyre!("back action rejected"));
        }
        Ok(())
    }

    fn navigate_home(&self) -> color_eyre::eyre::Result<()> {
        self.record(Call::Home);
        Ok(())
    }
}

impl ProcessControl for FakeHost {
    fn terminate_background(&self, application_id: &str) -> color_eyre::eyre::Result<()> {
        self.record(Call::Terminate(application_id.to_string()));
        if self.fail_terminate.load(Ordering::Relaxed) {
            return Err(eyre!("permission denied"));
        }
        Ok(())
    }
}

impl TaskManager for FakeHost {
    fn running_tasks(&self) -> color_eyre::eyre::Result<Vec<RunningTask>> {
        Ok(self.tasks.lock().unwrap().clone())
    }

    fn remove_task(&self, task: &RunningTask) -> color_eyre::eyre::Result<()> {
        self.record(Call::RemoveTask(task.id));
        Ok(())
    }
}

impl OverlayWindows for FakeHost {
    fn can_draw_overlays(&self) -> bool {
        self.overlay_permitted.load(Ordering::Relaxed)
    }

    fn add_overlay(&self, screen: &BlockingScreen) -> color_eyre::eyre::Result<()> {
        self.record(Call::AddOverlay(screen.application_id.clone()));
        if self.fail_overlay.load(Ordering::Relaxed) {
            return Err(eyre!("overlay add failed"));
        }
        Ok(())
    }

    fn remove_overlay(&self) -> color_eyre::eyre::Result<()> {
        self.record(Call::RemoveOverlay);
        Ok(())
    }
}

impl ScreenLauncher for FakeHost {
    fn show_fallback(&self, screen: &BlockingScreen) -> color_eyre::eyre::Result<()> {
        self.record(Call::ShowFallback(screen.application_id.clone()));
        self.screens.lock().unwrap().push(screen.clone());
        Ok(())
    }

    fn launch_main_application(&self) -> color_eyre::eyre::Result<()> {
        self.record(Call::LaunchMain);
        Ok(())
    }
}
