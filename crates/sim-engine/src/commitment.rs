//! Commitment Tracker
//!
//! Promises made during conversations, resolved deterministically against
//! the simulation clock: `open` → `kept` | `broken` | `cancelled`.

use std::collections::HashMap;

use sim_state::{
    generate_commitment_id, AgentId, Commitment, CommitmentId, CommitmentStatus, ConversationId,
    SimTime, SimulationId,
};
use tracing::debug;

use crate::conversation::ConversationRegistry;
use crate::error::{EngineError, EngineResult};

/// Trust signal emitted into the opinion EMA when a promise is kept.
pub const KEPT_SIGNAL: f64 = 0.9;
/// Trust signal emitted when a promise is broken.
pub const BROKEN_SIGNAL: f64 = 0.1;

/// One resolved commitment and the opinion update it generates.
///
/// The signal lands on the counterparty's opinion row of the promising
/// agent: broken promises cost the promiser trust.
#[derive(Debug, Clone)]
pub struct CommitmentResolution {
    pub commitment_id: CommitmentId,
    pub promiser: AgentId,
    pub counterparty: AgentId,
    pub status: CommitmentStatus,
    pub trust_signal: f64,
    pub resolved_at: SimTime,
}

/// Per-simulation commitment state.
#[derive(Debug)]
pub struct CommitmentTracker {
    simulation_id: SimulationId,
    commitments: HashMap<CommitmentId, Commitment>,
}

impl CommitmentTracker {
    pub fn new(simulation_id: SimulationId) -> Self {
        Self {
            simulation_id,
            commitments: HashMap::new(),
        }
    }

    /// Records a new promise made inside a conversation.
    pub fn create(
        &mut self,
        conversation_id: &ConversationId,
        promiser: &AgentId,
        counterparty: &AgentId,
        description: impl Into<String>,
        due_time: Option<SimTime>,
        now: SimTime,
    ) -> CommitmentId {
        let commitment_id = generate_commitment_id();
        self.commitments.insert(
            commitment_id.clone(),
            Commitment {
                commitment_id: commitment_id.clone(),
                simulation_id: self.simulation_id.clone(),
                conversation_id: conversation_id.clone(),
                agent_id: promiser.clone(),
                counterparty: counterparty.clone(),
                description: description.into(),
                due_time,
                status: CommitmentStatus::Open,
                created_at: now,
                resolved_at: None,
            },
        );
        commitment_id
    }

    pub fn get(&self, id: &CommitmentId) -> Option<&Commitment> {
        self.commitments.get(id)
    }

    pub fn commitments(&self) -> impl Iterator<Item = &Commitment> {
        self.commitments.values()
    }

    /// Net commitment balance of `agent` within a conversation, in [-1, 1]:
    /// (kept - broken) over resolved commitments. Zero when none resolved.
    pub fn balance_for(&self, conversation_id: &ConversationId, agent: &AgentId) -> f64 {
        let mut kept = 0i32;
        let mut broken = 0i32;
        for c in self.commitments.values() {
            if &c.conversation_id == conversation_id && &c.agent_id == agent {
                match c.status {
                    CommitmentStatus::Kept => kept += 1,
                    CommitmentStatus::Broken => broken += 1,
                    _ => {}
                }
            }
        }
        let resolved = kept + broken;
        if resolved == 0 {
            return 0.0;
        }
        f64::from(kept - broken) / f64::from(resolved)
    }

    /// Explicit cancellation by either party: `open` → `cancelled`.
    /// Cancellation emits no trust signal.
    pub fn cancel(&mut self, id: &CommitmentId, now: SimTime) -> EngineResult<()> {
        let commitment = self
            .commitments
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownReference {
                kind: "commitment",
                id: id.to_string(),
            })?;
        if commitment.status.is_terminal() {
            return Err(EngineError::InvalidTransition(format!(
                "commitment '{}' already resolved",
                id
            )));
        }
        commitment.status = CommitmentStatus::Cancelled;
        commitment.resolved_at = Some(now);
        Ok(())
    }

    /// Cancels every open commitment (simulation teardown). Returns how
    /// many were cancelled.
    pub fn cancel_all_open(&mut self, now: SimTime) -> usize {
        let mut count = 0;
        for commitment in self.commitments.values_mut() {
            if commitment.status == CommitmentStatus::Open {
                commitment.status = CommitmentStatus::Cancelled;
                commitment.resolved_at = Some(now);
                count += 1;
            }
        }
        count
    }

    /// Resolves every open commitment whose due time the clock has passed.
    ///
    /// Kept if a fulfilling action by the promiser was logged against the
    /// same conversation before the due time, broken otherwise. Resolution
    /// is stamped at the due time itself, not at `now`, so late ticks
    /// produce the same rows. Results are ordered by commitment id for
    /// deterministic downstream application.
    pub fn resolve_due(
        &mut self,
        now: SimTime,
        conversations: &ConversationRegistry,
    ) -> Vec<CommitmentResolution> {
        let mut resolutions = Vec::new();
        for commitment in self.commitments.values_mut() {
            if commitment.status != CommitmentStatus::Open {
                continue;
            }
            let Some(due) = commitment.due_time else {
                continue;
            };
            if due > now {
                continue;
            }

            let fulfilled = conversations.has_fulfilling_action(
                &commitment.conversation_id,
                &commitment.agent_id,
                due,
            );
            let status = if fulfilled {
                CommitmentStatus::Kept
            } else {
                CommitmentStatus::Broken
            };
            commitment.status = status;
            commitment.resolved_at = Some(due);
            debug!(commitment = %commitment.commitment_id, ?status, "commitment resolved");

            resolutions.push(CommitmentResolution {
                commitment_id: commitment.commitment_id.clone(),
                promiser: commitment.agent_id.clone(),
                counterparty: commitment.counterparty.clone(),
                status,
                trust_signal: if fulfilled { KEPT_SIGNAL } else { BROKEN_SIGNAL },
                resolved_at: due,
            });
        }
        resolutions.sort_by(|a, b| a.commitment_id.cmp(&b.commitment_id));
        resolutions
    }

    /// Restores a persisted commitment during replay.
    pub fn restore(&mut self, commitment: Commitment) -> EngineResult<()> {
        match (commitment.status, commitment.resolved_at) {
            (CommitmentStatus::Open, Some(_)) => {
                return Err(EngineError::ReplayInconsistency(format!(
                    "open commitment '{}' has resolved_at set",
                    commitment.commitment_id
                )));
            }
            (s, None) if s.is_terminal() => {
                return Err(EngineError::ReplayInconsistency(format!(
                    "resolved commitment '{}' is missing resolved_at",
                    commitment.commitment_id
                )));
            }
            _ => {}
        }
        self.commitments
            .insert(commitment.commitment_id.clone(), commitment);
        Ok(())
    }
}
