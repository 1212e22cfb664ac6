//! Bridge from one sync attempt to a single terminal outcome.
//!
//! The pump forwards intermediate events to the bus the moment they
//! arrive and resolves a one-shot channel with the attempt's first
//! terminal event. The one-shot sender is consumed on first use, so a
//! feed that misbehaves and emits a second terminal is ignored, and the
//! pump dies with the feed, so nothing lingers into a later session.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use events::{Event, EventBus, SyncStatusKind};

use crate::subsystems::SyncEvent;

/// Terminal result of one sync attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Finished,
    Error(String),
}

/// Drive an armed sync attempt in the background.
///
/// The returned receiver yields the attempt's first terminal outcome;
/// it errors if the feed closes without ever producing one. Dropping
/// the receiver (a cancelled session) just makes the terminal send a
/// no-op.
pub(crate) fn arm(
    mut feed: mpsc::Receiver<SyncEvent>,
    bus: EventBus,
) -> oneshot::Receiver<SyncOutcome> {
    let (outcome_tx, outcome_rx) = oneshot::channel();

    tokio::spawn(async move {
        let mut outcome_tx = Some(outcome_tx);

        while let Some(event) = feed.recv().await {
            match event {
                SyncEvent::Progress(progress) => {
                    bus.publish(Event::SyncStatusChanged {
                        status: SyncStatusKind::InProgress,
                        progress: Some(progress),
                    });
                }
                SyncEvent::Block { current, highest } => {
                    bus.publish(Event::SyncBlockProgress {
                        current_block: current,
                        highest_block: highest,
                    });
                }
                SyncEvent::Stopped => {
                    bus.publish(Event::SyncStatusChanged {
                        status: SyncStatusKind::Stopped,
                        progress: None,
                    });
                }
                SyncEvent::Error(cause) => {
                    warn!(cause = %cause, "sync attempt reported an error");
                    if let Some(tx) = outcome_tx.take() {
                        let _ = tx.send(SyncOutcome::Error(cause));
                    }
                }
                SyncEvent::Finished => {
                    if let Some(tx) = outcome_tx.take() {
                        let _ = tx.send(SyncOutcome::Finished);
                    }
                }
            }
        }

        debug!("sync feed closed");
    });

    outcome_rx
}
