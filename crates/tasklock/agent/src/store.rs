//! In-memory restriction state with durable backing.

use color_eyre::eyre::WrapErr as _;
use std::sync::{Arc, PoisonError, RwLock};

use tasklock_core::RestrictionState;

use crate::storage::SnapshotStore;

/// Holds the current restriction snapshot.
///
/// The snapshot is an immutable value behind one `Arc`. `replace` swaps the
/// `Arc`, so a reader sees either the old state or the new one, never a mix.
pub struct RestrictionStore {
    current: RwLock<Arc<RestrictionState>>,
    storage: Box<dyn SnapshotStore>,
}

impl RestrictionStore {
    /// Load the last durable snapshot, falling back to an inactive, empty
    /// state if there is none or it cannot be read.
    pub fn activate(storage: Box<dyn SnapshotStore>) -> Self {
        let state = match storage.load() {
            Ok(Some(state)) => {
                tracing::info!(
                    active = state.active,
                    restricted_apps = state.restricted_apps.len(),
                    restricted_websites = state.restricted_website_domains.len(),
                    permanent_apps = state.permanently_blocked_apps.len(),
                    permanent_websites = state.permanently_blocked_website_domains.len(),
                    pending_tasks = state.pending_tasks.len(),
                    "loaded restrictions"
                );
                state
            }
            Ok(None) => {
                tracing::info!("no saved restrictions, starting empty");
                RestrictionState::default()
            }
            Err(e) => {
                tracing::warn!(
                    error = %format!("{e:#}"),
                    "saved restrictions unreadable, starting empty"
                );
                RestrictionState::default()
            }
        };

        Self {
            current: RwLock::new(Arc::new(state)),
            storage,
        }
    }

    /// Current snapshot.
    pub fn current(&self) -> Arc<RestrictionState> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the whole state and persist it.
    ///
    /// The in-memory swap always happens. A persistence failure is returned
    /// after the new state is already in force.
    pub fn replace(&self, state: RestrictionState) -> color_eyre::eyre::Result<()> {
        let state = Arc::new(state);

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&state);

        tracing::info!(
            active = state.active,
            restricted_apps = state.restricted_apps.len(),
            restricted_websites = state.restricted_website_domains.len(),
            permanent_apps = state.permanently_blocked_apps.len(),
            permanent_websites = state.permanently_blocked_website_domains.len(),
            pending_tasks = state.pending_tasks.len(),
            "restrictions replaced"
        );

        self.storage
            .save(&state)
            .wrap_err("failed to persist restrictions")
    }
}
