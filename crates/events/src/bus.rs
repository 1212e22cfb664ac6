//! Broadcast bus between the orchestration layer and the shell UI.

use tokio::sync::broadcast;

use crate::types::{Event, EventEnvelope};

/// Room for a burst of node log lines without lagging subscribers.
const DEFAULT_CAPACITY: usize = 1024;

/// Fire-and-forget notification bus.
///
/// Publishing never fails observably: with no subscribers the event is
/// dropped, and a lagging subscriber loses old events rather than
/// blocking the publisher. Delivery order matches publish order per
/// publisher.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Wrap `event` in an envelope and broadcast it.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, event: Event) -> usize {
        self.sender.send(EventEnvelope::new(event)).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
