//! Tasklock Agent
//!
//! Watches the foreground, classifies it against the restriction state and
//! forces blocked applications off screen.

pub mod accessibility;
pub mod agent;
pub mod config;
pub mod enforcer;
pub mod host;
pub mod ipc;
pub mod observer;
pub mod presenter;
pub mod registry;
pub mod storage;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::{Agent, AgentEvent};
pub use config::Config;
pub use registry::{IngressError, Registry};
pub use store::RestrictionStore;
