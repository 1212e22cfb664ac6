use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted key entry, republished to the UI on state refresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyRecord {
    pub id: Uuid,
    pub label: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

impl KeyRecord {
    pub fn new(label: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            address: address.into(),
            created_at: Utc::now(),
        }
    }
}
