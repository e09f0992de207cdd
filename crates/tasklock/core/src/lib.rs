//! Tasklock Core Types
//!
//! Restriction state, the block/allow classifier, blocking-screen content and
//! the configuration ingress wire format. Nothing in here touches the host.

mod decision;
mod request;
mod screen;
mod state;

pub use decision::*;
pub use request::*;
pub use screen::*;
pub use state::*;
