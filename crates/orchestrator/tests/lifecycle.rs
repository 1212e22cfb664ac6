//! End-to-end lifecycle scenarios against recording fakes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::timeout;

use chainshell_core::{Network, NodeType, SyncMode, SyncProgress};
use events::{Event, EventBus, EventEnvelope, SyncStatusKind};
use orchestrator::subsystems::{NodeEvent, ProvisionerStatus, SyncEvent};
use orchestrator::testing::{
    FakeChainData, FakeNode, FakeObserver, FakeProvisioner, FakeStateStore, Recorder,
    ScriptedSyncFeed,
};
use orchestrator::{LifecycleOrchestrator, OrchestratorConfig, OrchestratorError, Subsystems};

const EVENT_WAIT: Duration = Duration::from_secs(5);

fn progress(current: u64) -> SyncProgress {
    SyncProgress {
        starting_block: 0,
        current_block: current,
        highest_block: 100,
        known_states: None,
        pulled_states: None,
    }
}

fn default_subsystems(recorder: &Recorder, feed: ScriptedSyncFeed) -> Subsystems {
    Subsystems {
        provisioner: Arc::new(FakeProvisioner::new(recorder.clone())),
        node: Arc::new(FakeNode::new(recorder.clone())),
        sync_feed: Arc::new(feed),
        observer: Arc::new(FakeObserver::new(recorder.clone())),
        state_store: Arc::new(FakeStateStore::new(recorder.clone())),
        chain_data: Arc::new(FakeChainData::new(recorder.clone())),
    }
}

async fn next_event(rx: &mut broadcast::Receiver<EventEnvelope>) -> Event {
    timeout(EVENT_WAIT, rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event bus closed")
        .event
}

/// Collect events until `pred` matches, returning everything seen
/// including the matching event.
async fn events_until(
    rx: &mut broadcast::Receiver<EventEnvelope>,
    pred: impl Fn(&Event) -> bool,
) -> Vec<Event> {
    let mut seen = Vec::new();
    loop {
        let event = next_event(rx).await;
        let done = pred(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

async fn wait_until_idle(orchestrator: &LifecycleOrchestrator) {
    timeout(EVENT_WAIT, async {
        while orchestrator.active_session().is_some() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("session never released the slot");
}

#[tokio::test]
async fn finished_sync_runs_the_full_sequence_in_order() {
    let recorder = Recorder::new();
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let feed = ScriptedSyncFeed::new(vec![
        SyncEvent::Progress(progress(10)),
        SyncEvent::Progress(progress(60)),
        SyncEvent::Finished,
    ]);
    let orchestrator = LifecycleOrchestrator::new(
        OrchestratorConfig::default(),
        default_subsystems(&recorder, feed),
        bus.clone(),
    );

    orchestrator.kick_start(false).unwrap();

    let seen = events_until(&mut rx, |e| matches!(e, Event::AllOperationsComplete)).await;

    let relaunches = seen
        .iter()
        .filter(|e| matches!(e, Event::RelaunchInitiated))
        .count();
    assert_eq!(relaunches, 1);

    let progress_events = seen
        .iter()
        .filter(|e| {
            matches!(
                e,
                Event::SyncStatusChanged {
                    status: SyncStatusKind::InProgress,
                    ..
                }
            )
        })
        .count();
    assert_eq!(progress_events, 2);

    // Exactly one refresh, one observer start, in that order, after the
    // observer was stopped.
    assert_eq!(recorder.count_of("state.refresh"), 1);
    assert_eq!(recorder.count_of("observer.start"), 1);
    assert_eq!(recorder.count_of("node.init"), 1);
    assert_eq!(recorder.count_of("node.restart"), 0);
    assert_eq!(recorder.count_of("provision(force_refresh=true)"), 1);
    let stop = recorder.position_of("observer.stop").unwrap();
    let refresh = recorder.position_of("state.refresh").unwrap();
    let start = recorder.position_of("observer.start").unwrap();
    assert!(stop < refresh);
    assert!(refresh < start);

    wait_until_idle(&orchestrator).await;

    // No second completion arrives after the sequence is done.
    while let Ok(envelope) = rx.try_recv() {
        assert!(!matches!(envelope.event, Event::AllOperationsComplete));
    }
}

#[tokio::test]
async fn sync_error_skips_refresh_observer_and_completion() {
    let recorder = Recorder::new();
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let feed = ScriptedSyncFeed::new(vec![
        SyncEvent::Progress(progress(5)),
        SyncEvent::Error("timeout".to_string()),
    ]);
    let orchestrator = LifecycleOrchestrator::new(
        OrchestratorConfig::default(),
        default_subsystems(&recorder, feed),
        bus.clone(),
    );

    orchestrator.kick_start(false).unwrap();

    let seen = events_until(&mut rx, |e| matches!(e, Event::StartupFailed { .. })).await;

    match seen.last() {
        Some(Event::StartupFailed { phase, error }) => {
            assert_eq!(phase, "awaiting_sync");
            assert!(error.contains("timeout"));
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(!seen
        .iter()
        .any(|e| matches!(e, Event::AllOperationsComplete)));

    assert_eq!(recorder.count_of("state.refresh"), 0);
    assert_eq!(recorder.count_of("observer.start"), 0);
    assert_eq!(recorder.count_of("observer.stop"), 1);

    wait_until_idle(&orchestrator).await;
}

#[tokio::test]
async fn restart_uses_configured_settings_never_init() {
    let recorder = Recorder::new();
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let node = Arc::new(FakeNode::new(recorder.clone()));
    let subsystems = Subsystems {
        node: node.clone(),
        ..default_subsystems(&recorder, ScriptedSyncFeed::new(vec![SyncEvent::Finished]))
    };
    let config = OrchestratorConfig {
        node_type: NodeType::Lite,
        network: Network::Test,
        sync_mode: SyncMode::Light,
    };
    let orchestrator = LifecycleOrchestrator::new(config, subsystems, bus.clone());

    orchestrator.kick_start(true).unwrap();

    events_until(&mut rx, |e| matches!(e, Event::AllOperationsComplete)).await;

    assert_eq!(
        node.restart_calls(),
        vec![(NodeType::Lite, Network::Test, SyncMode::Light)]
    );
    assert_eq!(recorder.count_of("node.init"), 0);
}

#[tokio::test]
async fn wipe_never_touches_chain_data_when_stop_fails() {
    let recorder = Recorder::new();
    let bus = EventBus::new();
    let subsystems = Subsystems {
        node: Arc::new(FakeNode::with_failing_stop(recorder.clone(), "rpc hung")),
        ..default_subsystems(&recorder, ScriptedSyncFeed::new(vec![SyncEvent::Finished]))
    };
    let orchestrator =
        LifecycleOrchestrator::new(OrchestratorConfig::default(), subsystems, bus.clone());

    let result = orchestrator.wipe_and_restart().await;

    assert!(matches!(result, Err(OrchestratorError::NodeStop(_))));
    assert_eq!(recorder.count_of("chain_data.wipe"), 0);
    assert_eq!(recorder.count_of("provision(force_refresh=true)"), 0);
    assert!(orchestrator.active_session().is_none());
}

#[tokio::test]
async fn wipe_and_restart_stops_wipes_then_kicks_off() {
    let recorder = Recorder::new();
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let feed = ScriptedSyncFeed::new(vec![SyncEvent::Finished]);
    let orchestrator = LifecycleOrchestrator::new(
        OrchestratorConfig::default(),
        default_subsystems(&recorder, feed),
        bus.clone(),
    );

    orchestrator.wipe_and_restart().await.unwrap();

    events_until(&mut rx, |e| matches!(e, Event::AllOperationsComplete)).await;

    let stop = recorder.position_of("node.stop").unwrap();
    let wipe = recorder.position_of("chain_data.wipe").unwrap();
    let provision = recorder.position_of("provision(force_refresh=true)").unwrap();
    assert!(stop < wipe);
    assert!(wipe < provision);
}

#[tokio::test]
async fn provisioning_failure_aborts_before_node_start() {
    let recorder = Recorder::new();
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let subsystems = Subsystems {
        provisioner: Arc::new(FakeProvisioner::failing(
            recorder.clone(),
            "mirror unreachable",
        )),
        ..default_subsystems(&recorder, ScriptedSyncFeed::holding_open(vec![]))
    };
    let orchestrator =
        LifecycleOrchestrator::new(OrchestratorConfig::default(), subsystems, bus.clone());

    orchestrator.kick_start(false).unwrap();

    let seen = events_until(&mut rx, |e| matches!(e, Event::StartupFailed { .. })).await;

    match seen.last() {
        Some(Event::StartupFailed { phase, error }) => {
            assert_eq!(phase, "provisioning_binary");
            assert!(error.contains("mirror unreachable"));
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(recorder.count_of("node.init"), 0);
    assert_eq!(recorder.count_of("observer.start"), 0);
}

#[tokio::test]
async fn node_start_failure_aborts_before_sync() {
    let recorder = Recorder::new();
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let subsystems = Subsystems {
        node: Arc::new(FakeNode::with_failing_init(recorder.clone(), "bad genesis")),
        ..default_subsystems(&recorder, ScriptedSyncFeed::holding_open(vec![]))
    };
    let orchestrator =
        LifecycleOrchestrator::new(OrchestratorConfig::default(), subsystems, bus.clone());

    orchestrator.kick_start(false).unwrap();

    let seen = events_until(&mut rx, |e| matches!(e, Event::StartupFailed { .. })).await;

    match seen.last() {
        Some(Event::StartupFailed { phase, error }) => {
            assert_eq!(phase, "starting_node");
            assert!(error.contains("bad genesis"));
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(recorder.count_of("state.refresh"), 0);
    assert_eq!(recorder.count_of("observer.start"), 0);
}

#[tokio::test]
async fn state_refresh_failure_leaves_observer_stopped() {
    let recorder = Recorder::new();
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let subsystems = Subsystems {
        state_store: Arc::new(FakeStateStore::failing(recorder.clone(), "store corrupt")),
        ..default_subsystems(&recorder, ScriptedSyncFeed::new(vec![SyncEvent::Finished]))
    };
    let orchestrator =
        LifecycleOrchestrator::new(OrchestratorConfig::default(), subsystems, bus.clone());

    orchestrator.kick_start(false).unwrap();

    let seen = events_until(&mut rx, |e| matches!(e, Event::StartupFailed { .. })).await;

    match seen.last() {
        Some(Event::StartupFailed { phase, .. }) => assert_eq!(phase, "refreshing_state"),
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(recorder.count_of("observer.start"), 0);
}

#[tokio::test]
async fn sync_finishing_before_the_wait_begins_is_not_lost() {
    let recorder = Recorder::new();
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let subsystems = Subsystems {
        // The sync attempt finishes while provisioning is still running;
        // the bridge must buffer the outcome.
        provisioner: Arc::new(FakeProvisioner::delayed(
            recorder.clone(),
            Duration::from_millis(100),
        )),
        ..default_subsystems(&recorder, ScriptedSyncFeed::new(vec![SyncEvent::Finished]))
    };
    let orchestrator =
        LifecycleOrchestrator::new(OrchestratorConfig::default(), subsystems, bus.clone());

    orchestrator.kick_start(false).unwrap();

    events_until(&mut rx, |e| matches!(e, Event::AllOperationsComplete)).await;
    assert_eq!(recorder.count_of("observer.start"), 1);
}

#[tokio::test]
async fn first_terminal_wins_over_a_late_finished() {
    let recorder = Recorder::new();
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let feed = ScriptedSyncFeed::new(vec![
        SyncEvent::Error("desync".to_string()),
        SyncEvent::Finished,
    ]);
    let orchestrator = LifecycleOrchestrator::new(
        OrchestratorConfig::default(),
        default_subsystems(&recorder, feed),
        bus.clone(),
    );

    orchestrator.kick_start(false).unwrap();

    let seen = events_until(&mut rx, |e| matches!(e, Event::StartupFailed { .. })).await;

    match seen.last() {
        Some(Event::StartupFailed { error, .. }) => assert!(error.contains("desync")),
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(!seen
        .iter()
        .any(|e| matches!(e, Event::AllOperationsComplete)));
    assert_eq!(recorder.count_of("observer.start"), 0);
}

#[tokio::test]
async fn cancelling_mid_provision_fails_the_session() {
    let recorder = Recorder::new();
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let subsystems = Subsystems {
        provisioner: Arc::new(FakeProvisioner::hanging(recorder.clone())),
        ..default_subsystems(&recorder, ScriptedSyncFeed::holding_open(vec![]))
    };
    let orchestrator =
        LifecycleOrchestrator::new(OrchestratorConfig::default(), subsystems, bus.clone());

    orchestrator.kick_start(false).unwrap();
    // Let the sequence reach the provisioning suspension point.
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(orchestrator.cancel());

    let seen = events_until(&mut rx, |e| matches!(e, Event::StartupFailed { .. })).await;

    match seen.last() {
        Some(Event::StartupFailed { phase, error }) => {
            assert_eq!(phase, "provisioning_binary");
            assert!(error.contains("cancelled"));
        }
        other => panic!("unexpected event: {:?}", other),
    }

    wait_until_idle(&orchestrator).await;
    assert!(orchestrator.active_session().is_none());
}

#[tokio::test]
async fn subsystem_events_forward_without_an_active_session() {
    let recorder = Recorder::new();
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let node = Arc::new(FakeNode::new(recorder.clone()));
    let provisioner = Arc::new(FakeProvisioner::new(recorder.clone()));
    let subsystems = Subsystems {
        node: node.clone(),
        provisioner: provisioner.clone(),
        ..default_subsystems(&recorder, ScriptedSyncFeed::new(vec![]))
    };
    let orchestrator =
        LifecycleOrchestrator::new(OrchestratorConfig::default(), subsystems, bus.clone());
    assert!(orchestrator.active_session().is_none());

    node.emit(NodeEvent::Log(
        "INFO [08-04|12:00:01] peer connected".to_string(),
    ));
    provisioner.emit_status(ProvisionerStatus {
        code: "check".to_string(),
        data: None,
    });

    // The two forwarders run independently, so arrival order between
    // them is not fixed.
    let mut log_line = None;
    let mut saw_binary = false;
    while log_line.is_none() || !saw_binary {
        match next_event(&mut rx).await {
            Event::NodeLogLine { line } => log_line = Some(line),
            Event::BinaryStatusChanged { code, .. } => {
                assert_eq!(code, "check");
                saw_binary = true;
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
    assert_eq!(log_line.as_deref(), Some(" peer connected"));
}

#[tokio::test]
async fn wipe_rejected_while_a_session_is_active() {
    let recorder = Recorder::new();
    let bus = EventBus::new();
    let feed = ScriptedSyncFeed::holding_open(vec![]);
    let orchestrator = LifecycleOrchestrator::new(
        OrchestratorConfig::default(),
        default_subsystems(&recorder, feed),
        bus.clone(),
    );

    let active = orchestrator.kick_start(false).unwrap();
    let result = orchestrator.wipe_and_restart().await;

    match result {
        Err(OrchestratorError::SessionActive(id)) => assert_eq!(id, active),
        other => panic!("expected SessionActive, got {:?}", other.map(|_| ())),
    }
    assert_eq!(recorder.count_of("node.stop"), 0);
    assert_eq!(recorder.count_of("chain_data.wipe"), 0);
}
