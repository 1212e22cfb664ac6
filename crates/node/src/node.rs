//! Supervision of the node subprocess.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chainshell_core::{Network, NodeState, NodeType, SyncMode};
use orchestrator::subsystems::{NodeController, NodeError, NodeEvent};

use crate::config::{build_args, NodeConfig};

const EVENT_CHANNEL_CAPACITY: usize = 256;

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Supervises the local node subprocess.
///
/// One process at a time; `stop` is idempotent and `restart` adopts the
/// new settings before relaunching. Output lines and state changes are
/// fanned out to every `node_events` subscriber.
pub struct LocalNode {
    shared: Arc<Shared>,
}

struct Shared {
    config: RwLock<NodeConfig>,
    running: Mutex<Option<RunningNode>>,
    event_txs: StdMutex<Vec<mpsc::Sender<NodeEvent>>>,
    last_error: StdMutex<Option<String>>,
}

struct RunningNode {
    stop: CancellationToken,
    done: oneshot::Receiver<()>,
}

impl LocalNode {
    pub fn new(config: NodeConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config: RwLock::new(config),
                running: Mutex::new(None),
                event_txs: StdMutex::new(Vec::new()),
                last_error: StdMutex::new(None),
            }),
        }
    }

    pub async fn current_config(&self) -> NodeConfig {
        self.shared.config.read().await.clone()
    }

    /// Most recent process failure, if any.
    pub fn last_error(&self) -> Option<String> {
        lock(&self.shared.last_error).clone()
    }
}

#[async_trait]
impl NodeController for LocalNode {
    async fn init(&self) -> Result<(), NodeError> {
        let mut running = self.shared.running.lock().await;
        if running.is_some() {
            return Err(NodeError("node is already running".to_string()));
        }

        let config = self.shared.config.read().await.clone();
        info!(
            binary = %config.binary.display(),
            network = %config.network.as_str(),
            sync_mode = %config.sync_mode.as_str(),
            "starting node process"
        );
        self.shared.emit_state(NodeState::Starting, None);

        let mut command = Command::new(&config.binary);
        command
            .args(build_args(&config))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(cause) => {
                let message = format!("failed to spawn {}: {}", config.binary.display(), cause);
                self.shared.set_last_error(&message);
                self.shared.emit_state(NodeState::Error, Some(message.clone()));
                return Err(NodeError(message));
            }
        };

        let saw_output = Arc::new(AtomicBool::new(false));
        if let Some(stdout) = child.stdout.take() {
            spawn_log_reader(&self.shared, stdout, saw_output.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_log_reader(&self.shared, stderr, saw_output.clone());
        }

        let stop = CancellationToken::new();
        let (done_tx, done_rx) = oneshot::channel();
        spawn_watchdog(
            &self.shared,
            saw_output,
            stop.clone(),
            config.startup_timeout,
        );
        spawn_supervisor(&self.shared, child, stop.clone(), done_tx);

        *running = Some(RunningNode {
            stop,
            done: done_rx,
        });
        self.shared.emit_state(NodeState::Started, None);
        Ok(())
    }

    async fn restart(
        &self,
        node_type: NodeType,
        network: Network,
        sync_mode: SyncMode,
    ) -> Result<(), NodeError> {
        info!(
            node_type = %node_type.as_str(),
            network = %network.as_str(),
            sync_mode = %sync_mode.as_str(),
            "restarting node"
        );
        {
            let mut config = self.shared.config.write().await;
            config.node_type = node_type;
            config.network = network;
            config.sync_mode = sync_mode;
        }

        self.stop().await?;
        self.init().await
    }

    async fn stop(&self) -> Result<(), NodeError> {
        let running = { self.shared.running.lock().await.take() };
        let Some(running) = running else {
            debug!("stop requested but node is not running");
            return Ok(());
        };

        self.shared.emit_state(NodeState::Stopping, None);
        running.stop.cancel();
        let _ = running.done.await;
        Ok(())
    }

    fn node_events(&self) -> mpsc::Receiver<NodeEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        lock(&self.shared.event_txs).push(tx);
        rx
    }
}

impl Shared {
    fn emit(&self, event: NodeEvent) {
        let mut txs = lock(&self.event_txs);
        txs.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            // Keep a slow subscriber, drop a gone one.
            Err(mpsc::error::TrySendError::Full(_)) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    fn emit_state(&self, state: NodeState, error: Option<String>) {
        self.emit(NodeEvent::State {
            state,
            text: state.as_str().to_string(),
            error,
        });
    }

    fn set_last_error(&self, message: &str) {
        *lock(&self.last_error) = Some(message.to_string());
    }
}

fn spawn_log_reader(
    shared: &Arc<Shared>,
    stream: impl AsyncRead + Unpin + Send + 'static,
    saw_output: Arc<AtomicBool>,
) {
    let shared = Arc::clone(shared);
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            saw_output.store(true, Ordering::Relaxed);
            shared.emit(NodeEvent::Log(line));
        }
    });
}

fn spawn_watchdog(
    shared: &Arc<Shared>,
    saw_output: Arc<AtomicBool>,
    stop: CancellationToken,
    deadline: Duration,
) {
    let shared = Arc::clone(shared);
    tokio::spawn(async move {
        tokio::select! {
            _ = stop.cancelled() => {}
            _ = tokio::time::sleep(deadline) => {
                if !saw_output.load(Ordering::Relaxed) {
                    warn!("node produced no output within the connection deadline");
                    shared.emit(NodeEvent::ConnectionTimeout);
                }
            }
        }
    });
}

fn spawn_supervisor(
    shared: &Arc<Shared>,
    mut child: Child,
    stop: CancellationToken,
    done: oneshot::Sender<()>,
) {
    let shared = Arc::clone(shared);
    tokio::spawn(async move {
        tokio::select! {
            status = child.wait() => {
                // Unexpected exit; clear the slot first so a fresh init
                // can run as soon as the state event lands, and tear
                // down the watchdog.
                stop.cancel();
                *shared.running.lock().await = None;
                match status {
                    Ok(status) if status.success() => {
                        info!("node process exited cleanly");
                        shared.emit_state(NodeState::Stopped, None);
                    }
                    Ok(status) => {
                        let message = format!("node process exited with {status}");
                        warn!(message = %message, "node process died");
                        shared.set_last_error(&message);
                        shared.emit_state(NodeState::Error, Some(message));
                    }
                    Err(cause) => {
                        let message = format!("failed waiting on node process: {cause}");
                        shared.set_last_error(&message);
                        shared.emit_state(NodeState::Error, Some(message));
                    }
                }
            }
            _ = stop.cancelled() => {
                if let Err(cause) = child.start_kill() {
                    warn!(error = %cause, "failed to kill node process");
                }
                let _ = child.wait().await;
                shared.emit_state(NodeState::Stopped, None);
            }
        }
        let _ = done.send(());
    });
}
