use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Phase, PhaseMachine};
use crate::error::CoreError;

/// One in-flight startup run.
///
/// Exactly one session is active per orchestrator at a time; the phase
/// only ever moves through `PhaseMachine`-validated transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    /// Whether this run restarts an already-configured node instead of
    /// doing a first-time init.
    pub restart: bool,
    pub phase: Phase,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(restart: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            restart,
            phase: Phase::default(),
            last_error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Move to the next phase, validating the transition.
    pub fn advance(&mut self, to: Phase) -> Result<(), CoreError> {
        PhaseMachine::validate_transition(&self.phase, &to)?;
        self.phase = to;
        if to == Phase::Done {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Terminate the session as failed, recording the cause.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.phase = Phase::Failed;
        self.last_error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }
}
