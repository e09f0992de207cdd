//! Blocking surface presentation.

use std::sync::Arc;

use tasklock_core::{BlockingScreen, ScreenAction, TaskSummary};

use crate::host::Host;

/// What was put on screen for one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PresentOutcome {
    pub overlay_shown: bool,
    pub fallback_shown: bool,
}

/// Shows the blocking screen as an overlay when allowed, and always through
/// the ordinary screen path as well.
pub struct BlockingSurfacePresenter<H: ?Sized> {
    host: Arc<H>,
    overlay_showing: bool,
}

impl<H: Host + ?Sized> BlockingSurfacePresenter<H> {
    pub fn new(host: Arc<H>) -> Self {
        Self {
            host,
            overlay_showing: false,
        }
    }

    /// Present the blocking screen for `application_id`.
    pub fn present(
        &mut self,
        application_id: &str,
        is_permanent: bool,
        pending_tasks: &[TaskSummary],
    ) -> PresentOutcome {
        let screen = BlockingScreen::build(application_id, is_permanent, pending_tasks);
        let mut outcome = PresentOutcome::default();

        if self.host.can_draw_overlays() {
            if self.overlay_showing {
                self.remove_overlay();
            }

            match self.host.add_overlay(&screen) {
                Ok(()) => {
                    self.overlay_showing = true;
                    outcome.overlay_shown = true;
                    tracing::info!(application_id = %application_id, "overlay shown");
                }
                Err(e) => {
                    tracing::warn!(error = %format!("{e:#}"), "failed to add overlay");
                }
            }
        } else {
            tracing::warn!("overlay permission not granted, using fallback screen only");
        }

        match self.host.show_fallback(&screen) {
            Ok(()) => outcome.fallback_shown = true,
            Err(e) => tracing::warn!(error = %format!("{e:#}"), "failed to show fallback screen"),
        }

        outcome
    }

    /// Carry out an action chosen on the blocking screen.
    pub fn handle_action(&mut self, action: ScreenAction) {
        tracing::info!(action = ?action, "blocking screen action");

        let result = match action {
            ScreenAction::ReturnHome => self.host.navigate_home(),
            ScreenAction::OpenMainApplication => self.host.launch_main_application(),
        };
        if let Err(e) = result {
            tracing::warn!(action = ?action, error = %format!("{e:#}"), "screen action failed");
        }

        self.remove_overlay();
    }

    /// Check if an overlay is currently up.
    pub fn overlay_showing(&self) -> bool {
        self.overlay_showing
    }

    fn remove_overlay(&mut self) {
        if !self.overlay_showing {
            return;
        }
        if let Err(e) = self.host.remove_overlay() {
            tracing::warn!(error = %format!("{e:#}"), "failed to remove overlay");
        }
        self.overlay_showing = false;
    }
}
