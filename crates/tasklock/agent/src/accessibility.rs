//! macOS host via lsappinfo, osascript and signals.
//!
//! macOS has no global back action or overlay permission. Back hides the
//! frontmost process, home brings Finder forward, and the blocking screen is
//! a dialog.

use color_eyre::eyre::{WrapErr as _, bail, eyre};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::io::Read as _;
use std::process::{Child, Command};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

use tasklock_core::{BlockingScreen, ScreenAction};

use crate::agent::AgentEvent;
use crate::host::*;

const HOME_APP: &str = "Finder";
const RETURN_HOME_BUTTON: &str = "Return Home";
const OPEN_APP_BUTTON: &str = "Open App";

/// Host backed by the macOS command line tools.
pub struct MacHost {
    application_id: String,
    events: mpsc::Sender<AgentEvent>,
    dialog: Arc<DialogSlot<Child>>,
}

impl MacHost {
    /// `events` receives the action chosen on the blocking dialog.
    pub fn new(application_id: impl Into<String>, events: mpsc::Sender<AgentEvent>) -> Self {
        Self {
            application_id: application_id.into(),
            events,
            dialog: Arc::new(DialogSlot::new()),
        }
    }
}

impl Drop for MacHost {
    fn drop(&mut self) {
        self.dialog.close();
    }
}

/// A running dialog process.
trait DialogProcess {
    fn id(&self) -> u32;

    /// Close the dialog and reap it.
    fn dismiss(&mut self);

    /// Reap a dialog that closed on its own.
    fn reap(&mut self);
}

impl DialogProcess for Child {
    fn id(&self) -> u32 {
        Child::id(self)
    }

    fn dismiss(&mut self) {
        if let Err(e) = self.kill() {
            tracing::debug!(error = %e, "blocking dialog already gone");
        }
        self.reap();
    }

    fn reap(&mut self) {
        if let Err(e) = self.wait() {
            tracing::warn!(error = %e, "failed to reap blocking dialog");
        }
    }
}

/// Holds the one blocking dialog that may be on screen.
struct DialogSlot<P> {
    current: Mutex<Option<P>>,
}

impl<P: DialogProcess> DialogSlot<P> {
    fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    /// Show `next` in place of any earlier dialog. Returns the id of the
    /// dialog that was dismissed.
    fn replace(&self, next: P) -> Option<u32> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let dismissed = current.take().map(|mut previous| {
            previous.dismiss();
            previous.id()
        });
        *current = Some(next);
        dismissed
    }

    /// Called when dialog `id` has closed. False if it had been replaced, in
    /// which case its answer is stale.
    fn finish(&self, id: u32) -> bool {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        match current.as_ref() {
            Some(dialog) if dialog.id() == id => {
                if let Some(mut dialog) = current.take() {
                    dialog.reap();
                }
                true
            }
            _ => false,
        }
    }

    fn close(&self) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut dialog) = current.take() {
            dialog.dismiss();
        }
    }
}

/// Get the bundle ID of the frontmost application.
pub fn get_frontmost_app() -> color_eyre::eyre::Result<Option<String>> {
    let output = Command::new("lsappinfo")
        .args(["info", "-only", "bundleid", "-app", "front"])
        .output()
        .wrap_err("failed to run lsappinfo")?;

    if !output.status.success() {
        return Ok(None);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_lsappinfo_output(&stdout).map(|(bundle_id, _)| bundle_id))
}

/// Get all running applications as (bundle_id, name).
pub fn get_all_running_apps() -> color_eyre::eyre::Result<Vec<(String, String)>> {
    let output = Command::new("lsappinfo")
        .args(["list", "-only", "bundleid", "-only", "name"])
        .output()
        .wrap_err("failed to run lsappinfo")?;

    if !output.status.success() {
        bail!("lsappinfo list exited with {}", output.status);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout
        .split("\n\n")
        .filter_map(parse_lsappinfo_output)
        .collect())
}

/// Get all PIDs for a bundle ID.
pub fn get_pids_for_bundle(bundle_id: &str) -> color_eyre::eyre::Result<Vec<i32>> {
    let output = Command::new("lsappinfo")
        .args(["info", "-only", "pid", "-app", bundle_id])
        .output()
        .wrap_err("failed to run lsappinfo")?;

    if !output.status.success() {
        return Ok(Vec::new());
    }

    Ok(parse_pids(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_pids(output: &str) -> Vec<i32> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("\"pid\"="))
        .filter_map(|pid| pid.trim().parse::<i32>().ok())
        .collect()
}

fn parse_lsappinfo_output(output: &str) -> Option<(String, String)> {
    let mut bundle_id = None;
    let mut name = None;

    for line in output.lines() {
        let line = line.trim();

        if let Some(value) = line.strip_prefix("\"bundleid\"=") {
            bundle_id = Some(value.trim_matches('"').to_string());
        } else if let Some(value) = line.strip_prefix("\"name\"=") {
            name = Some(value.trim_matches('"').to_string());
        }
    }

    match (bundle_id, name) {
        (Some(b), _) if b.is_empty() || b == "[ NULL ]" => None,
        (Some(b), Some(n)) => Some((b, n)),
        (Some(b), None) => Some((b.clone(), b)),
        _ => None,
    }
}

fn signal_bundle(bundle_id: &str, signal: Signal) -> color_eyre::eyre::Result<()> {
    let pids = get_pids_for_bundle(bundle_id)?;

    let mut failures = 0;
    for pid in &pids {
        tracing::info!(
            bundle_id = %bundle_id,
            pid = pid,
            signal = ?signal,
            "signalling blocked app"
        );
        if let Err(e) = kill(Pid::from_raw(*pid), signal) {
            tracing::warn!(pid = pid, error = %e, "failed to signal");
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{failures} of {} processes of {bundle_id} survived", pids.len());
    }
    Ok(())
}

fn osascript(script: &str) -> color_eyre::eyre::Result<()> {
    let output = Command::new("osascript")
        .args(["-e", script])
        .output()
        .wrap_err("failed to run osascript")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("osascript failed: {}", stderr.trim());
    }
    Ok(())
}

fn applescript_string(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

fn dialog_script(screen: &BlockingScreen) -> String {
    format!(
        "display dialog {} with title {} buttons {{{}, {}}} default button {} with icon stop",
        applescript_string(&screen.render_text()),
        applescript_string(screen.title),
        applescript_string(RETURN_HOME_BUTTON),
        applescript_string(OPEN_APP_BUTTON),
        applescript_string(RETURN_HOME_BUTTON),
    )
}

fn parse_dialog_choice(output: &str) -> Option<ScreenAction> {
    let choice = output.trim().strip_prefix("button returned:")?;
    match choice {
        RETURN_HOME_BUTTON => Some(ScreenAction::ReturnHome),
        OPEN_APP_BUTTON => Some(ScreenAction::OpenMainApplication),
        _ => None,
    }
}

impl WindowInspector for MacHost {
    fn visible_windows(&self) -> color_eyre::eyre::Result<Vec<WindowInfo>> {
        Ok(get_all_running_apps()?
            .into_iter()
            .map(|(bundle_id, _name)| WindowInfo::application(bundle_id))
            .collect())
    }
}

impl GlobalActions for MacHost {
    fn navigate_back(&self) -> color_eyre::eyre::Result<()> {
        osascript(
            "tell application \"System Events\" to set visible of first process whose frontmost is true to false",
        )
    }

    fn navigate_home(&self) -> color_eyre::eyre::Result<()> {
        let status = Command::new("open")
            .args(["-a", HOME_APP])
            .status()
            .wrap_err("failed to run open")?;

        if !status.success() {
            bail!("open -a {HOME_APP} exited with {status}");
        }
        Ok(())
    }
}

impl ProcessControl for MacHost {
    fn terminate_background(&self, application_id: &str) -> color_eyre::eyre::Result<()> {
        signal_bundle(application_id, Signal::SIGTERM)
    }
}

impl TaskManager for MacHost {
    fn running_tasks(&self) -> color_eyre::eyre::Result<Vec<RunningTask>> {
        Ok(get_all_running_apps()?
            .into_iter()
            .enumerate()
            .map(|(i, (bundle_id, _name))| RunningTask {
                id: i as u32,
                base_application_id: Some(bundle_id.clone()),
                top_application_id: Some(bundle_id),
            })
            .collect())
    }

    fn remove_task(&self, task: &RunningTask) -> color_eyre::eyre::Result<()> {
        let bundle_id = task
            .base_application_id
            .as_deref()
            .or(task.top_application_id.as_deref())
            .ok_or_else(|| eyre!("task {} has no application", task.id))?;

        signal_bundle(bundle_id, Signal::SIGKILL)
    }
}

impl OverlayWindows for MacHost {
    fn can_draw_overlays(&self) -> bool {
        false
    }

    fn add_overlay(&self, _screen: &BlockingScreen) -> color_eyre::eyre::Result<()> {
        bail!("overlay windows are not available on macOS")
    }

    fn remove_overlay(&self) -> color_eyre::eyre::Result<()> {
        Ok(())
    }
}

impl ScreenLauncher for MacHost {
    fn show_fallback(&self, screen: &BlockingScreen) -> color_eyre::eyre::Result<()> {
        let script = dialog_script(screen);
        let mut child = Command::new("osascript")
            .args(["-e", script.as_str()])
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .spawn()
            .wrap_err("failed to show blocking dialog")?;

        let id = child.id();
        let stdout = child.stdout.take();
        if let Some(previous) = self.dialog.replace(child) {
            tracing::debug!(previous, "replaced blocking dialog");
        }

        // The dialog stays up until the user answers; wait off the agent task.
        let Some(mut stdout) = stdout else {
            return Ok(());
        };
        let events = self.events.clone();
        let dialog = Arc::clone(&self.dialog);
        std::thread::spawn(move || {
            let mut answer = String::new();
            if let Err(e) = stdout.read_to_string(&mut answer) {
                tracing::warn!(error = %e, "blocking dialog failed");
            }

            if !dialog.finish(id) {
                return;
            }
            let Some(action) = parse_dialog_choice(&answer) else {
                return;
            };
            if events.blocking_send(AgentEvent::Action(action)).is_err() {
                tracing::debug!("agent gone, dropping dialog action");
            }
        });

        Ok(())
    }

    fn launch_main_application(&self) -> color_eyre::eyre::Result<()> {
        let status = Command::new("open")
            .args(["-b", self.application_id.as_str()])
            .status()
            .wrap_err("failed to run open")?;

        if !status.success() {
            bail!("open -b {} exited with {status}", self.application_id);
        }
        Ok(())
    }
}
