//! Conversation Rows
//!
//! Dyadic conversations, their ordered turns, and the commitments made
//! inside them.

use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, ChannelId, CommitmentId, ConversationId, SimulationId};
use crate::time::SimTime;

/// Lifecycle of a conversation. `Completed` and `Abandoned` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Completed,
    Abandoned,
}

impl ConversationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ConversationStatus::Active)
    }
}

/// A dyadic conversation between an initiator and a recipient.
///
/// The ordered pair matters: (a, b) and (b, a) are distinct conversations
/// for exclusivity purposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: ConversationId,
    pub simulation_id: SimulationId,
    pub initiator: AgentId,
    pub recipient: AgentId,
    pub channel_id: ChannelId,
    pub status: ConversationStatus,
    pub started_at: SimTime,
    /// Set exactly once, on transition to a terminal status.
    pub ended_at: Option<SimTime>,
    /// Trust delta applied to the initiator's opinion of the recipient.
    pub initiator_trust_delta: f64,
    /// Trust delta applied to the recipient's opinion of the initiator.
    pub recipient_trust_delta: f64,
}

/// Kind of content a turn carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    Text,
    Action,
    Commitment,
}

/// One ordered turn inside a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub conversation_id: ConversationId,
    /// Strictly increasing per conversation, starting at 1.
    pub turn_number: u32,
    pub speaker: AgentId,
    pub message: String,
    pub kind: TurnKind,
    pub timestamp: SimTime,
}

/// Lifecycle of a commitment. Everything but `Open` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentStatus {
    Open,
    Kept,
    Broken,
    Cancelled,
}

impl CommitmentStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, CommitmentStatus::Open)
    }
}

/// A promise made during a conversation, resolved against the clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commitment {
    pub commitment_id: CommitmentId,
    pub simulation_id: SimulationId,
    pub conversation_id: ConversationId,
    /// The agent who made the promise.
    pub agent_id: AgentId,
    /// The agent the promise was made to.
    pub counterparty: AgentId,
    pub description: String,
    pub due_time: Option<SimTime>,
    pub status: CommitmentStatus,
    pub created_at: SimTime,
    pub resolved_at: Option<SimTime>,
}
