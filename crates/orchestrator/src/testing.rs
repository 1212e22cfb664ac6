//! Recording fakes for the subsystem interfaces.
//!
//! Built for the lifecycle tests: every fake logs its calls into a
//! shared [`Recorder`] so ordering across subsystems can be asserted,
//! and failure modes are opt-in per fake.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use chainshell_core::{Network, NodeType, SyncMode};

use crate::subsystems::{
    BinaryProvisioner, ChainData, ChainObserver, NodeController, NodeError, NodeEvent,
    ProvisionError, ProvisionerStatus, StateRefreshError, StateStore, SyncEvent, SyncFeed,
    WipeError,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared journal of subsystem calls, in invocation order.
#[derive(Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: impl Into<String>) {
        lock(&self.calls).push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn count_of(&self, call: &str) -> usize {
        lock(&self.calls).iter().filter(|c| c.as_str() == call).count()
    }

    pub fn position_of(&self, call: &str) -> Option<usize> {
        lock(&self.calls).iter().position(|c| c.as_str() == call)
    }
}

/// Provisioner fake; succeeds immediately unless configured otherwise.
pub struct FakeProvisioner {
    recorder: Recorder,
    fail_with: Option<String>,
    delay: Option<Duration>,
    hang: bool,
    status_txs: Mutex<Vec<mpsc::Sender<ProvisionerStatus>>>,
}

impl FakeProvisioner {
    pub fn new(recorder: Recorder) -> Self {
        Self {
            recorder,
            fail_with: None,
            delay: None,
            hang: false,
            status_txs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(recorder: Recorder, error: impl Into<String>) -> Self {
        Self {
            fail_with: Some(error.into()),
            ..Self::new(recorder)
        }
    }

    /// Resolves only after `delay`; useful for racing the sync bridge.
    pub fn delayed(recorder: Recorder, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(recorder)
        }
    }

    /// Never resolves; useful for cancellation tests.
    pub fn hanging(recorder: Recorder) -> Self {
        Self {
            hang: true,
            ..Self::new(recorder)
        }
    }

    pub fn emit_status(&self, status: ProvisionerStatus) {
        lock(&self.status_txs).retain(|tx| tx.try_send(status.clone()).is_ok());
    }
}

#[async_trait]
impl BinaryProvisioner for FakeProvisioner {
    async fn provision(&self, force_refresh: bool) -> Result<(), ProvisionError> {
        self.recorder
            .record(format!("provision(force_refresh={force_refresh})"));
        if self.hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.fail_with {
            Some(error) => Err(ProvisionError(error.clone())),
            None => Ok(()),
        }
    }

    fn status_events(&self) -> mpsc::Receiver<ProvisionerStatus> {
        let (tx, rx) = mpsc::channel(16);
        lock(&self.status_txs).push(tx);
        rx
    }
}

/// Node controller fake recording init/restart/stop calls.
pub struct FakeNode {
    recorder: Recorder,
    init_fails_with: Option<String>,
    stop_fails_with: Option<String>,
    restart_calls: Mutex<Vec<(NodeType, Network, SyncMode)>>,
    event_txs: Mutex<Vec<mpsc::Sender<NodeEvent>>>,
}

impl FakeNode {
    pub fn new(recorder: Recorder) -> Self {
        Self {
            recorder,
            init_fails_with: None,
            stop_fails_with: None,
            restart_calls: Mutex::new(Vec::new()),
            event_txs: Mutex::new(Vec::new()),
        }
    }

    pub fn with_failing_init(recorder: Recorder, error: impl Into<String>) -> Self {
        Self {
            init_fails_with: Some(error.into()),
            ..Self::new(recorder)
        }
    }

    pub fn with_failing_stop(recorder: Recorder, error: impl Into<String>) -> Self {
        Self {
            stop_fails_with: Some(error.into()),
            ..Self::new(recorder)
        }
    }

    pub fn restart_calls(&self) -> Vec<(NodeType, Network, SyncMode)> {
        lock(&self.restart_calls).clone()
    }

    pub fn emit(&self, event: NodeEvent) {
        lock(&self.event_txs).retain(|tx| tx.try_send(event.clone()).is_ok());
    }
}

#[async_trait]
impl NodeController for FakeNode {
    async fn init(&self) -> Result<(), NodeError> {
        self.recorder.record("node.init");
        match &self.init_fails_with {
            Some(error) => Err(NodeError(error.clone())),
            None => Ok(()),
        }
    }

    async fn restart(
        &self,
        node_type: NodeType,
        network: Network,
        sync_mode: SyncMode,
    ) -> Result<(), NodeError> {
        self.recorder.record("node.restart");
        lock(&self.restart_calls).push((node_type, network, sync_mode));
        Ok(())
    }

    async fn stop(&self) -> Result<(), NodeError> {
        self.recorder.record("node.stop");
        match &self.stop_fails_with {
            Some(error) => Err(NodeError(error.clone())),
            None => Ok(()),
        }
    }

    fn node_events(&self) -> mpsc::Receiver<NodeEvent> {
        let (tx, rx) = mpsc::channel(64);
        lock(&self.event_txs).push(tx);
        rx
    }
}

/// Sync feed replaying a fixed script on every `attach`.
pub struct ScriptedSyncFeed {
    events: Vec<SyncEvent>,
    hold_open: bool,
}

impl ScriptedSyncFeed {
    pub fn new(events: Vec<SyncEvent>) -> Self {
        Self {
            events,
            hold_open: false,
        }
    }

    /// Replay the script, then keep the attempt open forever instead of
    /// closing the feed.
    pub fn holding_open(events: Vec<SyncEvent>) -> Self {
        Self {
            events,
            hold_open: true,
        }
    }
}

impl SyncFeed for ScriptedSyncFeed {
    fn attach(&self) -> mpsc::Receiver<SyncEvent> {
        let (tx, rx) = mpsc::channel(32);
        let events = self.events.clone();
        let hold_open = self.hold_open;

        tokio::spawn(async move {
            for event in events {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            if hold_open {
                std::future::pending::<()>().await;
            }
        });

        rx
    }
}

/// Observer fake; records starts and stops.
pub struct FakeObserver {
    recorder: Recorder,
    running: AtomicBool,
}

impl FakeObserver {
    pub fn new(recorder: Recorder) -> Self {
        Self {
            recorder,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainObserver for FakeObserver {
    async fn start(&self) {
        self.recorder.record("observer.start");
        self.running.store(true, Ordering::SeqCst);
    }

    async fn stop(&self) {
        self.recorder.record("observer.stop");
        self.running.store(false, Ordering::SeqCst);
    }
}

/// State store fake; records refresh calls.
pub struct FakeStateStore {
    recorder: Recorder,
    fail_with: Option<String>,
}

impl FakeStateStore {
    pub fn new(recorder: Recorder) -> Self {
        Self {
            recorder,
            fail_with: None,
        }
    }

    pub fn failing(recorder: Recorder, error: impl Into<String>) -> Self {
        Self {
            recorder,
            fail_with: Some(error.into()),
        }
    }
}

#[async_trait]
impl StateStore for FakeStateStore {
    async fn refresh(&self) -> Result<(), StateRefreshError> {
        self.recorder.record("state.refresh");
        match &self.fail_with {
            Some(error) => Err(StateRefreshError(error.clone())),
            None => Ok(()),
        }
    }
}

/// Chain data fake; records wipes.
pub struct FakeChainData {
    recorder: Recorder,
    fail_with: Option<String>,
}

impl FakeChainData {
    pub fn new(recorder: Recorder) -> Self {
        Self {
            recorder,
            fail_with: None,
        }
    }

    pub fn failing(recorder: Recorder, error: impl Into<String>) -> Self {
        Self {
            recorder,
            fail_with: Some(error.into()),
        }
    }
}

#[async_trait]
impl ChainData for FakeChainData {
    async fn wipe(&self) -> Result<(), WipeError> {
        self.recorder.record("chain_data.wipe");
        match &self.fail_with {
            Some(error) => Err(WipeError(error.clone())),
            None => Ok(()),
        }
    }
}
