//! The startup/restart/wipe coordinator.
//!
//! `kick_start` claims the single session slot, arms the sync bridge,
//! and runs the ordered sequence in a background task. The UI observes
//! progress and completion on the bus; the returned session id is only
//! an identity, never a completion signal.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use chainshell_core::{Network, NodeType, Phase, Session, SyncMode};
use events::{Event, EventBus};

use crate::error::{OrchestratorError, Result};
use crate::forwarders;
use crate::subsystems::{
    BinaryProvisioner, ChainData, ChainObserver, NodeController, StateStore, SyncFeed,
};
use crate::sync_monitor::{self, SyncOutcome};

/// The currently configured node settings, handed to `restart`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrchestratorConfig {
    pub node_type: NodeType,
    pub network: Network,
    pub sync_mode: SyncMode,
}

/// The injected subsystems the orchestrator drives.
pub struct Subsystems {
    pub provisioner: Arc<dyn BinaryProvisioner>,
    pub node: Arc<dyn NodeController>,
    pub sync_feed: Arc<dyn SyncFeed>,
    pub observer: Arc<dyn ChainObserver>,
    pub state_store: Arc<dyn StateStore>,
    pub chain_data: Arc<dyn ChainData>,
}

struct ActiveSession {
    id: Uuid,
    cancel: CancellationToken,
}

/// Drives the node startup lifecycle. Cheap to clone; all clones share
/// the same session slot.
#[derive(Clone)]
pub struct LifecycleOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    config: OrchestratorConfig,
    subsystems: Subsystems,
    bus: EventBus,
    active: Mutex<Option<ActiveSession>>,
}

/// Releases the session slot when the background run ends, even if it
/// panics.
struct SlotRelease {
    inner: Arc<Inner>,
    id: Uuid,
}

impl Drop for SlotRelease {
    fn drop(&mut self) {
        let mut active = self.inner.active_slot();
        if active.as_ref().is_some_and(|session| session.id == self.id) {
            *active = None;
        }
    }
}

impl LifecycleOrchestrator {
    /// Build the orchestrator and install the always-active forwarders
    /// for node and provisioner events. Must be called inside a tokio
    /// runtime.
    pub fn new(config: OrchestratorConfig, subsystems: Subsystems, bus: EventBus) -> Self {
        forwarders::spawn_node_forwarder(subsystems.node.node_events(), bus.clone());
        forwarders::spawn_provisioner_forwarder(subsystems.provisioner.status_events(), bus.clone());

        Self {
            inner: Arc::new(Inner {
                config,
                subsystems,
                bus,
                active: Mutex::new(None),
            }),
        }
    }

    /// Start the full startup sequence, fire-and-forget.
    ///
    /// With `restart` set, the node is restarted under the configured
    /// settings instead of first-time initialized. Returns the new
    /// session id, or `SessionActive` if a session is already running.
    /// Completion arrives as `startup.complete` on the bus, failure as
    /// `startup.failed`.
    pub fn kick_start(&self, restart: bool) -> Result<Uuid> {
        let session = Session::new(restart);
        let cancel = CancellationToken::new();

        {
            let mut active = self.inner.active_slot();
            if let Some(current) = active.as_ref() {
                return Err(OrchestratorError::SessionActive(current.id));
            }
            *active = Some(ActiveSession {
                id: session.id,
                cancel: cancel.clone(),
            });
        }

        // Armed before the first step runs: a sync that finishes before
        // the wait begins is buffered in the bridge, not lost.
        let outcome = sync_monitor::arm(
            self.inner.subsystems.sync_feed.attach(),
            self.inner.bus.clone(),
        );

        let id = session.id;
        info!(session_id = %id, restart = restart, "startup sequence starting");

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.run_session(session, outcome, cancel).await;
        });

        Ok(id)
    }

    /// Stop the node, destroy its chain data, then start over.
    ///
    /// Chain data is only touched once `stop()` has resolved, and a
    /// failed stop or wipe is reported without any restart.
    pub async fn wipe_and_restart(&self) -> Result<Uuid> {
        {
            let active = self.inner.active_slot();
            if let Some(current) = active.as_ref() {
                return Err(OrchestratorError::SessionActive(current.id));
            }
        }

        info!("wipe requested, stopping node");
        if let Err(cause) = self.inner.subsystems.node.stop().await {
            error!(error = %cause, "node stop failed, leaving chain data in place");
            return Err(OrchestratorError::NodeStop(cause));
        }

        if let Err(cause) = self.inner.subsystems.chain_data.wipe().await {
            error!(error = %cause, "chain data wipe failed");
            return Err(OrchestratorError::Wipe(cause));
        }

        info!("chain data removed");
        self.kick_start(false)
    }

    /// Cancel the active session, if any. The session terminates as
    /// failed at its current suspension point.
    pub fn cancel(&self) -> bool {
        let active = self.inner.active_slot();
        match active.as_ref() {
            Some(session) => {
                info!(session_id = %session.id, "cancelling active session");
                session.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn active_session(&self) -> Option<Uuid> {
        self.inner.active_slot().as_ref().map(|session| session.id)
    }
}

impl Inner {
    fn active_slot(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_session(
        self: Arc<Self>,
        mut session: Session,
        outcome: oneshot::Receiver<SyncOutcome>,
        cancel: CancellationToken,
    ) {
        let _slot = SlotRelease {
            inner: Arc::clone(&self),
            id: session.id,
        };

        match self.run_sequence(&mut session, outcome, &cancel).await {
            Ok(()) => {
                info!(session_id = %session.id, "all operations complete");
            }
            Err(cause) => {
                let phase = session.phase;
                error!(
                    session_id = %session.id,
                    phase = %phase.as_str(),
                    error = %cause,
                    "startup sequence failed"
                );
                session.fail(cause.to_string());
                self.bus.publish(Event::StartupFailed {
                    phase: phase.as_str().to_string(),
                    error: cause.to_string(),
                });
            }
        }
    }

    async fn run_sequence(
        &self,
        session: &mut Session,
        outcome: oneshot::Receiver<SyncOutcome>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.advance(session, Phase::StoppingObserver)?;
        self.subsystems.observer.stop().await;

        // Unconditional: the UI resets its local state before the new
        // sequence proceeds.
        self.bus.publish(Event::RelaunchInitiated);

        self.advance(session, Phase::ProvisioningBinary)?;
        self.guarded(cancel, self.subsystems.provisioner.provision(true))
            .await??;

        self.advance(session, Phase::StartingNode)?;
        if session.restart {
            let restart = self.subsystems.node.restart(
                self.config.node_type,
                self.config.network,
                self.config.sync_mode,
            );
            self.guarded(cancel, restart)
                .await?
                .map_err(OrchestratorError::NodeStart)?;
        } else {
            self.guarded(cancel, self.subsystems.node.init())
                .await?
                .map_err(OrchestratorError::NodeStart)?;
        }
        info!(session_id = %session.id, "node process ready");

        self.advance(session, Phase::AwaitingSync)?;
        let outcome = self
            .guarded(cancel, outcome)
            .await?
            .map_err(|_| OrchestratorError::SyncFeedClosed)?;
        match outcome {
            SyncOutcome::Finished => {}
            SyncOutcome::Error(cause) => return Err(OrchestratorError::Sync(cause)),
        }

        self.advance(session, Phase::RefreshingState)?;
        self.guarded(cancel, self.subsystems.state_store.refresh())
            .await??;

        self.advance(session, Phase::RestartingObserver)?;
        self.subsystems.observer.start().await;

        self.advance(session, Phase::Done)?;
        self.bus.publish(Event::AllOperationsComplete);

        Ok(())
    }

    fn advance(&self, session: &mut Session, to: Phase) -> Result<()> {
        session.advance(to)?;
        debug!(session_id = %session.id, phase = %to.as_str(), "phase transition");
        Ok(())
    }

    /// Race a suspension point against the session's cancellation token.
    async fn guarded<T>(&self, cancel: &CancellationToken, fut: impl Future<Output = T>) -> Result<T> {
        tokio::select! {
            _ = cancel.cancelled() => Err(OrchestratorError::Cancelled),
            out = fut => Ok(out),
        }
    }
}
