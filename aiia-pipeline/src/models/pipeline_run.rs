//! Directory run state machine
//!
//! SCANNING → CURATING → ANALYZING → PERSISTING → DONE, with DONE also
//! reachable directly from CURATING when nothing survives scoring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Directory run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PipelineState {
    /// Directory traversal, file discovery
    Scanning,
    /// Quality scoring and top-fraction selection
    Curating,
    /// Vision backend classification
    Analyzing,
    /// Metadata writes
    Persisting,
    /// Terminal
    Done,
}

impl PipelineState {
    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Scanning, Curating)
                | (Scanning, Analyzing)
                | (Scanning, Done)
                | (Curating, Analyzing)
                | (Curating, Done)
                | (Analyzing, Persisting)
                | (Analyzing, Done)
                | (Persisting, Done)
        )
    }
}

/// State transition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub run_id: Uuid,
    pub old_state: PipelineState,
    pub new_state: PipelineState,
    pub transitioned_at: DateTime<Utc>,
}

/// In-memory record of one directory run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub state: PipelineState,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub transitions: Vec<StateTransition>,
}

impl PipelineRun {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state: PipelineState::Scanning,
            started_at: Utc::now(),
            ended_at: None,
            transitions: Vec::new(),
        }
    }

    /// Transition to a new state
    ///
    /// Illegal transitions are logged and still applied; the orchestrator
    /// is the only caller and the log makes a sequencing bug visible.
    pub fn transition_to(&mut self, new_state: PipelineState) -> &StateTransition {
        if new_state == self.state {
            tracing::trace!(run_id = %self.run_id, state = ?new_state, "Already in state");
        } else if !self.state.can_transition_to(new_state) {
            tracing::warn!(
                run_id = %self.run_id,
                from = ?self.state,
                to = ?new_state,
                "Unexpected pipeline state transition"
            );
        } else {
            tracing::debug!(run_id = %self.run_id, from = ?self.state, to = ?new_state, "Pipeline state transition");
        }

        self.transitions.push(StateTransition {
            run_id: self.run_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        });
        self.state = new_state;

        if new_state == PipelineState::Done {
            self.ended_at = Some(Utc::now());
        }

        &self.transitions[self.transitions.len() - 1]
    }

    pub fn is_terminal(&self) -> bool {
        self.state == PipelineState::Done
    }

    /// States visited so far, starting with the initial one
    pub fn path(&self) -> Vec<PipelineState> {
        let mut path = vec![PipelineState::Scanning];
        path.extend(self.transitions.iter().map(|t| t.new_state));
        path
    }
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}
