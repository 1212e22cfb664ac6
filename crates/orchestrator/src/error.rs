use thiserror::Error;
use uuid::Uuid;

use crate::subsystems::{NodeError, ProvisionError, StateRefreshError, WipeError};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("session already active: {0}")]
    SessionActive(Uuid),

    #[error("binary provisioning failed: {0}")]
    Provisioning(#[from] ProvisionError),

    #[error("node start failed: {0}")]
    NodeStart(NodeError),

    #[error("node stop failed: {0}")]
    NodeStop(NodeError),

    #[error("node sync failed: {0}")]
    Sync(String),

    #[error("state refresh failed: {0}")]
    StateRefresh(#[from] StateRefreshError),

    #[error("chain data wipe failed: {0}")]
    Wipe(#[from] WipeError),

    #[error("sync feed closed before reporting an outcome")]
    SyncFeedClosed,

    #[error("startup sequence cancelled")]
    Cancelled,

    #[error(transparent)]
    Core(#[from] chainshell_core::CoreError),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
