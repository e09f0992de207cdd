//! App enforcement.
//!
//! A block runs a fixed, redundant remediation round (back, back on every
//! window of the app, home, terminate, drop its tasks), shows the blocking
//! screen shortly after, and re-checks once. The re-check retries at most one
//! round so an app that respawns on purpose is not fought forever.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tasklock_core::{BlockDecision, ScreenAction, TaskSummary};
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::TimingConfig;
use crate::host::Host;
use crate::presenter::BlockingSurfacePresenter;

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Remediating,
    AwaitingVerification,
}

/// A remediation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Back,
    WindowScan,
    WindowBack,
    Home,
    Terminate,
    TaskScan,
    RemoveTask,
}

/// Result of one remediation round. Failed steps are listed, not fatal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemediationReport {
    pub failed: Vec<Step>,
    pub windows_dismissed: usize,
    pub tasks_removed: usize,
}

impl RemediationReport {
    fn step(&mut self, step: Step, result: color_eyre::eyre::Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(step = ?step, error = %format!("{e:#}"), "remediation step failed");
                self.failed.push(step);
                false
            }
        }
    }
}

/// A block in flight.
#[derive(Debug, Clone)]
pub struct EnforcementSession {
    pub id: Uuid,
    pub target_application_id: String,
    pub is_permanent: bool,
    pub started_at: Instant,
    pub started_at_wall: DateTime<Utc>,
}

/// Deferred work. Each carries its own copy of the block parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    Present {
        session_id: Uuid,
        application_id: String,
        is_permanent: bool,
        pending_tasks: Vec<TaskSummary>,
    },
    Verify {
        session_id: Uuid,
        application_id: String,
    },
}

/// A continuation to run after `delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheduled {
    pub delay: Duration,
    pub continuation: Continuation,
}

/// Outcome of the delayed re-check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The app is gone.
    Clear,
    /// The app was still visible; one more round was issued.
    Retried(RemediationReport),
    /// The window list could not be read.
    Skipped,
}

/// Drives remediation for block decisions.
pub struct EnforcementController<H: ?Sized> {
    host: Arc<H>,
    presenter: BlockingSurfacePresenter<H>,
    timing: TimingConfig,
    state: ControllerState,
    session: Option<EnforcementSession>,
    /// Most recently enforced target and when enforcement began.
    last_enforced: Option<(String, Instant)>,
}

impl<H: Host + ?Sized> EnforcementController<H> {
    pub fn new(host: Arc<H>, timing: TimingConfig) -> Self {
        Self {
            presenter: BlockingSurfacePresenter::new(Arc::clone(&host)),
            host,
            timing,
            state: ControllerState::Idle,
            session: None,
            last_enforced: None,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn session(&self) -> Option<&EnforcementSession> {
        self.session.as_ref()
    }

    /// Enforce a decision. Returns the continuations to schedule.
    ///
    /// `Allow` and repeats of the last target inside the cooldown do nothing.
    pub fn enforce(
        &mut self,
        decision: &BlockDecision,
        pending_tasks: &[TaskSummary],
        now: Instant,
    ) -> Vec<Scheduled> {
        let BlockDecision::Block {
            application_id,
            is_permanent,
        } = decision
        else {
            return Vec::new();
        };

        if let Some((last, at)) = &self.last_enforced {
            if last == application_id
                && now.saturating_duration_since(*at) < self.timing.cooldown()
            {
                tracing::debug!(
                    application_id = %application_id,
                    "block inside cooldown, skipping"
                );
                return Vec::new();
            }
        }

        let session = EnforcementSession {
            id: Uuid::new_v4(),
            target_application_id: application_id.clone(),
            is_permanent: *is_permanent,
            started_at: now,
            started_at_wall: Utc::now(),
        };

        if let Some(previous) = &self.session {
            if previous.target_application_id != *application_id {
                tracing::debug!(
                    previous = %previous.target_application_id,
                    application_id = %application_id,
                    "superseding enforcement session"
                );
            }
        }

        tracing::info!(
            session = %session.id,
            application_id = %application_id,
            is_permanent = *is_permanent,
            started_at = %session.started_at_wall,
            "blocking app"
        );

        let session_id = session.id;
        self.last_enforced = Some((application_id.clone(), now));
        self.session = Some(session);
        self.state = ControllerState::Remediating;

        let report = self.remediate(application_id, true);
        tracing::debug!(
            session = %session_id,
            failed = ?report.failed,
            windows_dismissed = report.windows_dismissed,
            tasks_removed = report.tasks_removed,
            "remediation round done"
        );

        self.state = ControllerState::AwaitingVerification;

        vec![
            Scheduled {
                delay: self.timing.present_delay(),
                continuation: Continuation::Present {
                    session_id,
                    application_id: application_id.clone(),
                    is_permanent: *is_permanent,
                    pending_tasks: pending_tasks.to_vec(),
                },
            },
            Scheduled {
                delay: self.timing.verify_delay(),
                continuation: Continuation::Verify {
                    session_id,
                    application_id: application_id.clone(),
                },
            },
        ]
    }

    /// Run a continuation. Returns the re-check outcome for `Verify`.
    pub fn fire(&mut self, continuation: Continuation) -> Option<VerifyOutcome> {
        match continuation {
            Continuation::Present {
                application_id,
                is_permanent,
                pending_tasks,
                ..
            } => {
                self.presenter
                    .present(&application_id, is_permanent, &pending_tasks);
                None
            }
            Continuation::Verify {
                session_id,
                application_id,
            } => {
                let outcome = self.verify(&application_id);

                if self.session.as_ref().is_some_and(|s| s.id == session_id) {
                    self.session = None;
                    self.state = ControllerState::Idle;
                }

                Some(outcome)
            }
        }
    }

    /// Carry out an action chosen on the blocking screen.
    pub fn handle_action(&mut self, action: ScreenAction) {
        self.presenter.handle_action(action);
    }

    fn verify(&self, application_id: &str) -> VerifyOutcome {
        let windows = match self.host.visible_windows() {
            Ok(windows) => windows,
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "re-check scan failed");
                return VerifyOutcome::Skipped;
            }
        };

        if !windows.iter().any(|w| w.application_id == application_id) {
            tracing::debug!(application_id = %application_id, "blocked app gone");
            return VerifyOutcome::Clear;
        }

        tracing::warn!(
            application_id = %application_id,
            "blocked app still visible, retrying once"
        );
        VerifyOutcome::Retried(self.remediate(application_id, false))
    }

    /// One remediation round. Every step runs regardless of earlier failures.
    fn remediate(&self, application_id: &str, dismiss_windows: bool) -> RemediationReport {
        let mut report = RemediationReport::default();

        report.step(Step::Back, self.host.navigate_back());

        if dismiss_windows {
            match self.host.visible_windows() {
                Ok(windows) => {
                    for _ in windows.iter().filter(|w| w.application_id == application_id) {
                        if report.step(Step::WindowBack, self.host.navigate_back()) {
                            report.windows_dismissed += 1;
                        }
                    }
                }
                Err(e) => {
                    report.step(Step::WindowScan, Err(e));
                }
            }
        }

        report.step(Step::Home, self.host.navigate_home());
        report.step(Step::Terminate, self.host.terminate_background(application_id));

        match self.host.running_tasks() {
            Ok(tasks) => {
                for task in tasks.iter().filter(|t| t.belongs_to(application_id)) {
                    if report.step(Step::RemoveTask, self.host.remove_task(task)) {
                        report.tasks_removed += 1;
                    }
                }
            }
            Err(e) => {
                report.step(Step::TaskScan, Err(e));
            }
        }

        report
    }
}
