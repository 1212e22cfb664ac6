//! Lifecycle orchestration for the chainshell node.
//!
//! One [`LifecycleOrchestrator`] owns at most one startup session at a
//! time. A session stops the chain observer, provisions the node binary,
//! starts or restarts the node process, waits for one full sync attempt,
//! refreshes persisted state and restarts the observer, broadcasting
//! progress on the [`events::EventBus`] throughout. Failures terminate
//! the session and leave the observer stopped.
//!
//! The subsystems the orchestrator drives are injected as trait objects
//! (see [`subsystems`]); nothing here owns a global.

pub mod error;
mod forwarders;
pub mod key_store;
pub mod lifecycle;
pub mod subsystems;
mod sync_monitor;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use error::{OrchestratorError, Result};
pub use key_store::KeyStore;
pub use lifecycle::{LifecycleOrchestrator, OrchestratorConfig, Subsystems};
pub use sync_monitor::SyncOutcome;
