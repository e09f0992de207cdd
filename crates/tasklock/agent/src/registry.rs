//! Handle through which outside configuration reaches a running agent.

use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

use tasklock_core::{StatusReport, UpdateRestrictions};

use crate::store::RestrictionStore;

#[derive(Error, Debug)]
pub enum IngressError {
    #[error("agent is not running; restrictions were not applied")]
    NotActive,
    #[error("restrictions applied but not saved: {0}")]
    Persist(String),
}

/// Slot holding the running agent's store.
///
/// Installed on activation and cleared on deactivation. Updates pushed while
/// the slot is empty fail with [`IngressError::NotActive`].
#[derive(Default)]
pub struct Registry {
    slot: RwLock<Option<Arc<RestrictionStore>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the running agent's store.
    pub fn activate(&self, store: Arc<RestrictionStore>) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(store);
        tracing::info!("agent registered for configuration updates");
    }

    /// Remove the store. Later updates are rejected.
    pub fn deactivate(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
        tracing::info!("agent unregistered");
    }

    pub fn is_active(&self) -> bool {
        self.store().is_some()
    }

    fn store(&self) -> Option<Arc<RestrictionStore>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the running agent's restrictions.
    pub fn update_restrictions(&self, update: UpdateRestrictions) -> Result<(), IngressError> {
        tracing::debug!(
            apps = update.apps.len(),
            websites = update.websites.len(),
            active = update.active,
            pending_tasks = update.pending_tasks.len(),
            permanent_apps = update.permanently_blocked_apps.len(),
            permanent_websites = update.permanently_blocked_websites.len(),
            "update restrictions requested"
        );

        let Some(store) = self.store() else {
            tracing::error!("no running agent, cannot update restrictions");
            return Err(IngressError::NotActive);
        };

        store.replace(update.into_state()).map_err(|e| {
            tracing::warn!(error = %format!("{e:#}"), "restrictions not persisted");
            IngressError::Persist(format!("{e:#}"))
        })
    }

    /// Summarize the running agent's state.
    pub fn status(&self) -> StatusReport {
        match self.store() {
            Some(store) => StatusReport::from_state(&store.current()),
            None => StatusReport::default(),
        }
    }
}
