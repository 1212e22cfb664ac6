use serde::{Deserialize, Serialize};

/// Snapshot of sync progress reported by the node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncProgress {
    pub starting_block: u64,
    pub current_block: u64,
    pub highest_block: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub known_states: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pulled_states: Option<u64>,
}
