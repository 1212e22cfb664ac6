//! UI notification system for chainshell.
//!
//! This crate provides the broadcast bus the orchestration layer
//! publishes on and the typed notification vocabulary the shell's UI
//! consumes.

mod bus;
mod types;

pub use bus::EventBus;
pub use types::*;
