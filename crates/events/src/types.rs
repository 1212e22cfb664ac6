//! Notification types delivered to the shell UI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chainshell_core::{KeyRecord, NodeState, SyncProgress};

/// Envelope wrapping every notification with delivery metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event: Event,
}

impl EventEnvelope {
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Whether a sync attempt is currently making progress.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatusKind {
    InProgress,
    Stopped,
}

/// Everything the orchestration layer tells the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A startup sequence is about to run; the UI resets its local state.
    #[serde(rename = "relaunch.initiated")]
    RelaunchInitiated,

    /// Node process state changed. `error` is populated only when the
    /// node is in its error state.
    #[serde(rename = "node.status_changed")]
    NodeStatusChanged {
        state: NodeState,
        status: String,
        error: Option<String>,
    },

    /// The node stopped answering within its connection deadline.
    #[serde(rename = "node.connection_timeout")]
    NodeConnectionTimeout,

    /// One line of node output, with the log prefix scrubbed.
    #[serde(rename = "node.log")]
    NodeLogLine { line: String },

    /// Progress report from the binary provisioner.
    #[serde(rename = "binary.status_changed")]
    BinaryStatusChanged {
        code: String,
        data: Option<serde_json::Value>,
    },

    /// Sync attempt activity changed.
    #[serde(rename = "sync.status_changed")]
    SyncStatusChanged {
        status: SyncStatusKind,
        progress: Option<SyncProgress>,
    },

    /// Per-block progress while syncing.
    #[serde(rename = "sync.block_progress")]
    SyncBlockProgress {
        current_block: u64,
        highest_block: u64,
    },

    /// The shell finished exporting the node log file.
    #[serde(rename = "log.downloaded")]
    LogDownloaded,

    /// Persisted key records were reloaded and republished.
    #[serde(rename = "keys.refreshed")]
    KeysRefreshed { keys: Vec<KeyRecord> },

    /// The whole startup sequence completed.
    #[serde(rename = "startup.complete")]
    AllOperationsComplete,

    /// The startup sequence terminated early.
    #[serde(rename = "startup.failed")]
    StartupFailed { phase: String, error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_creation() {
        let envelope = EventEnvelope::new(Event::RelaunchInitiated);

        assert!(!envelope.id.is_nil());
        assert!(envelope.timestamp <= Utc::now());
    }

    #[test]
    fn test_event_serialization_tags() {
        let json = serde_json::to_string(&Event::AllOperationsComplete).unwrap();
        assert!(json.contains("startup.complete"));

        let json = serde_json::to_string(&Event::SyncBlockProgress {
            current_block: 42,
            highest_block: 100,
        })
        .unwrap();
        assert!(json.contains("sync.block_progress"));
        assert!(json.contains("current_block"));
    }

    #[test]
    fn test_node_status_serialization() {
        let event = Event::NodeStatusChanged {
            state: NodeState::Error,
            status: "error".to_string(),
            error: Some("connection refused".to_string()),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("node.status_changed"));
        assert!(json.contains("connection refused"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"sync.status_changed","status":"in_progress","progress":{"starting_block":0,"current_block":5,"highest_block":10}}"#;
        let event: Event = serde_json::from_str(json).unwrap();

        match event {
            Event::SyncStatusChanged { status, progress } => {
                assert_eq!(status, SyncStatusKind::InProgress);
                assert_eq!(progress.map(|p| p.current_block), Some(5));
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_startup_failed_payload() {
        let event = Event::StartupFailed {
            phase: "provisioning_binary".to_string(),
            error: "download interrupted".to_string(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("startup.failed"));
        assert!(json.contains("provisioning_binary"));
    }
}
