//! Foreground observation.
//!
//! A focus change alone misses floating windows, split-screen panes and
//! overlays, so every notification also triggers a scan of all visible
//! windows.

use std::collections::HashSet;
use std::sync::Arc;

use crate::host::WindowInspector;

/// Where an observation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationSource {
    /// A window of this application is visible.
    Scan,
    /// The host reported this application taking focus.
    Notification,
}

/// An application seen on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub application_id: String,
    pub source: ObservationSource,
}

/// Turns host notifications into observations for the classifier.
pub struct ForegroundObserver<W: ?Sized> {
    inspector: Arc<W>,
    own_application_id: String,
}

impl<W: WindowInspector + ?Sized> ForegroundObserver<W> {
    pub fn new(inspector: Arc<W>, own_application_id: impl Into<String>) -> Self {
        Self {
            inspector,
            own_application_id: own_application_id.into(),
        }
    }

    /// Observations for a focus/window change naming `application_id`.
    ///
    /// Scan results come first, then the notified application.
    pub fn on_window_changed(&self, application_id: &str) -> Vec<Observation> {
        let mut observations = self.scan();

        if application_id.is_empty() {
            tracing::debug!("window change without application id");
        } else if application_id != self.own_application_id {
            observations.push(Observation {
                application_id: application_id.to_string(),
                source: ObservationSource::Notification,
            });
        }

        observations
    }

    /// Observations for a periodic scan.
    pub fn on_tick(&self) -> Vec<Observation> {
        self.scan()
    }

    fn scan(&self) -> Vec<Observation> {
        let windows = match self.inspector.visible_windows() {
            Ok(windows) => windows,
            Err(e) => {
                tracing::warn!(
                    error = %format!("{e:#}"),
                    "window scan failed, using notification only"
                );
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        windows
            .into_iter()
            .map(|w| w.application_id)
            .filter(|id| !id.is_empty() && *id != self.own_application_id)
            .filter(|id| seen.insert(id.clone()))
            .map(|application_id| Observation {
                application_id,
                source: ObservationSource::Scan,
            })
            .collect()
    }
}
