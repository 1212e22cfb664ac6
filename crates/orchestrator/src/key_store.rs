//! Provided state store for the persisted key list.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use chainshell_core::KeyRecord;
use events::{Event, EventBus};

use crate::subsystems::{StateRefreshError, StateStore};

/// Key records republished to the UI, newest first, whenever the
/// orchestrator signals a state refresh.
pub struct KeyStore {
    bus: EventBus,
    keys: RwLock<Vec<KeyRecord>>,
}

impl KeyStore {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            keys: RwLock::new(Vec::new()),
        }
    }

    pub async fn insert(&self, key: KeyRecord) {
        self.keys.write().await.push(key);
    }

    /// Current records, newest first.
    pub async fn keys(&self) -> Vec<KeyRecord> {
        let mut keys = self.keys.read().await.clone();
        sort_newest_first(&mut keys);
        keys
    }
}

fn sort_newest_first(keys: &mut [KeyRecord]) {
    keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[async_trait]
impl StateStore for KeyStore {
    async fn refresh(&self) -> Result<(), StateRefreshError> {
        let mut keys = self.keys.write().await;
        sort_newest_first(keys.as_mut_slice());
        info!(count = keys.len(), "republishing key records");
        self.bus.publish(Event::KeysRefreshed { keys: keys.clone() });
        Ok(())
    }
}
