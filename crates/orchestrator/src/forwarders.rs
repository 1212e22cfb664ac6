//! Always-active forwarders from subsystem events to UI notifications.
//!
//! Installed once per orchestrator, not per session; they outlive
//! sessions and interleave freely with session notifications. Each task
//! ends when its subsystem's channel closes.

use regex::Regex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use chainshell_core::NodeState;
use events::{Event, EventBus};

use crate::subsystems::{NodeEvent, ProvisionerStatus};

/// Matches the `INFO [08-04|12:00:01]`-style prefix node clients put on
/// every log line.
const LOG_PREFIX_PATTERN: &str = r"^.*[0-9]\]";

pub(crate) fn spawn_node_forwarder(
    mut events: mpsc::Receiver<NodeEvent>,
    bus: EventBus,
) -> JoinHandle<()> {
    let prefix = Regex::new(LOG_PREFIX_PATTERN).ok();

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                NodeEvent::State { state, text, error } => {
                    bus.publish(Event::NodeStatusChanged {
                        state,
                        status: text,
                        error: if state == NodeState::Error { error } else { None },
                    });
                }
                NodeEvent::Log(line) => {
                    bus.publish(Event::NodeLogLine {
                        line: scrub_log_line(prefix.as_ref(), &line),
                    });
                }
                NodeEvent::ConnectionTimeout => {
                    bus.publish(Event::NodeConnectionTimeout);
                }
            }
        }
    })
}

pub(crate) fn spawn_provisioner_forwarder(
    mut events: mpsc::Receiver<ProvisionerStatus>,
    bus: EventBus,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(status) = events.recv().await {
            bus.publish(Event::BinaryStatusChanged {
                code: status.code,
                data: status.data,
            });
        }
    })
}

fn scrub_log_line(prefix: Option<&Regex>, line: &str) -> String {
    match prefix {
        Some(re) => re.replace(line, "").into_owned(),
        None => line.to_string(),
    }
}
