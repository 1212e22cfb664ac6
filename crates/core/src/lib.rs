//! Domain model for the chainshell node lifecycle.
//!
//! This crate holds the types shared across the workspace: the node
//! settings enums, the startup phase state machine, the per-run session
//! record, sync progress snapshots and persisted key records.

pub mod domain;
pub mod error;
pub mod locale;

pub use domain::*;
pub use error::CoreError;
