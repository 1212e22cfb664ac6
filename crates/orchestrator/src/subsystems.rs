//! Interfaces to the subsystems the orchestrator drives.
//!
//! All of these are process-wide services injected at construction
//! time; the orchestrator owns the wiring between them, never the
//! subsystems themselves.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use chainshell_core::{Network, NodeState, NodeType, SyncMode, SyncProgress};

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ProvisionError(pub String);

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct NodeError(pub String);

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct StateRefreshError(pub String);

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct WipeError(pub String);

/// Progress report emitted by the binary provisioner while it works.
#[derive(Debug, Clone)]
pub struct ProvisionerStatus {
    pub code: String,
    pub data: Option<serde_json::Value>,
}

/// Event emitted by the node controller.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    State {
        state: NodeState,
        text: String,
        /// Populated by controllers when they have a last error; the
        /// forwarder only passes it on for the `Error` state.
        error: Option<String>,
    },
    Log(String),
    ConnectionTimeout,
}

/// One sync attempt's event.
///
/// `Error` and `Finished` are mutually exclusive terminals for a single
/// attempt; everything else is intermediate and never gates a waiter.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    Progress(SyncProgress),
    Block { current: u64, highest: u64 },
    Stopped,
    Error(String),
    Finished,
}

/// Ensures the node executable is present and up to date.
#[async_trait]
pub trait BinaryProvisioner: Send + Sync {
    async fn provision(&self, force_refresh: bool) -> Result<(), ProvisionError>;

    /// Stream of progress reports, forwarded to the UI for the life of
    /// the process.
    fn status_events(&self) -> mpsc::Receiver<ProvisionerStatus>;
}

/// Starts, restarts and stops the node subprocess.
#[async_trait]
pub trait NodeController: Send + Sync {
    /// First-time start with the controller's current settings.
    /// Resolves when the process is ready, not when it is synced.
    async fn init(&self) -> Result<(), NodeError>;

    /// Stop-then-start under new settings.
    async fn restart(
        &self,
        node_type: NodeType,
        network: Network,
        sync_mode: SyncMode,
    ) -> Result<(), NodeError>;

    /// Idempotent; resolving means the process is fully gone.
    async fn stop(&self) -> Result<(), NodeError>;

    fn node_events(&self) -> mpsc::Receiver<NodeEvent>;
}

/// Source of sync attempts. Each `attach` arms one fresh attempt whose
/// events arrive on the returned channel until the attempt ends.
pub trait SyncFeed: Send + Sync {
    fn attach(&self) -> mpsc::Receiver<SyncEvent>;
}

/// Watches on-chain state once the node is synced. Both operations are
/// idempotent.
#[async_trait]
pub trait ChainObserver: Send + Sync {
    async fn start(&self);
    async fn stop(&self);
}

/// Persisted application state, reloaded and republished on demand.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn refresh(&self) -> Result<(), StateRefreshError>;
}

/// Owns destruction of the node's on-disk chain data.
#[async_trait]
pub trait ChainData: Send + Sync {
    async fn wipe(&self) -> Result<(), WipeError>;
}
