//! Startup phase state machine.
//!
//! A session walks the phases strictly in order; `Failed` is reachable
//! from every non-terminal phase and, like `Done`, is terminal.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    StoppingObserver,
    ProvisioningBinary,
    StartingNode,
    AwaitingSync,
    RefreshingState,
    RestartingObserver,
    Done,
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::StoppingObserver => "stopping_observer",
            Self::ProvisioningBinary => "provisioning_binary",
            Self::StartingNode => "starting_node",
            Self::AwaitingSync => "awaiting_sync",
            Self::RefreshingState => "refreshing_state",
            Self::RestartingObserver => "restarting_observer",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "stopping_observer" => Some(Self::StoppingObserver),
            "provisioning_binary" => Some(Self::ProvisioningBinary),
            "starting_node" => Some(Self::StartingNode),
            "awaiting_sync" => Some(Self::AwaitingSync),
            "refreshing_state" => Some(Self::RefreshingState),
            "restarting_observer" => Some(Self::RestartingObserver),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

pub struct PhaseMachine;

impl PhaseMachine {
    pub fn validate_transition(from: &Phase, to: &Phase) -> Result<(), CoreError> {
        let allowed = Self::allowed_transitions(from);

        if allowed.contains(to) {
            Ok(())
        } else {
            Err(CoreError::InvalidPhaseTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }

    fn allowed_transitions(from: &Phase) -> Vec<Phase> {
        match from {
            Phase::Idle => vec![Phase::StoppingObserver, Phase::Failed],
            Phase::StoppingObserver => vec![Phase::ProvisioningBinary, Phase::Failed],
            Phase::ProvisioningBinary => vec![Phase::StartingNode, Phase::Failed],
            Phase::StartingNode => vec![Phase::AwaitingSync, Phase::Failed],
            Phase::AwaitingSync => vec![Phase::RefreshingState, Phase::Failed],
            Phase::RefreshingState => vec![Phase::RestartingObserver, Phase::Failed],
            Phase::RestartingObserver => vec![Phase::Done, Phase::Failed],
            Phase::Done | Phase::Failed => vec![],
        }
    }

    pub fn can_transition(from: &Phase, to: &Phase) -> bool {
        Self::validate_transition(from, to).is_ok()
    }

    /// The next phase on the success path, `None` from a terminal phase.
    pub fn next_phase(current: &Phase) -> Option<Phase> {
        match current {
            Phase::Idle => Some(Phase::StoppingObserver),
            Phase::StoppingObserver => Some(Phase::ProvisioningBinary),
            Phase::ProvisioningBinary => Some(Phase::StartingNode),
            Phase::StartingNode => Some(Phase::AwaitingSync),
            Phase::AwaitingSync => Some(Phase::RefreshingState),
            Phase::RefreshingState => Some(Phase::RestartingObserver),
            Phase::RestartingObserver => Some(Phase::Done),
            Phase::Done | Phase::Failed => None,
        }
    }
}
