//! Conversation Registry
//!
//! Dyadic conversation lifecycle: exclusive ownership per ordered agent
//! pair, ordered turns, and the trust signals computed on completion.

use std::collections::{HashMap, HashSet};

use sim_state::{
    generate_conversation_id, AgentId, Channel, ChannelStatus, Conversation, ConversationId,
    ConversationStatus, ConversationTurn, SimTime, SimulationId, TurnKind,
};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::opinion::NEUTRAL_OPINION;

/// Trust signals produced when a conversation completes.
///
/// Each signal is an EMA input in [0, 1]; `about_recipient` feeds the
/// initiator's opinion row of the recipient and vice versa.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConversationOutcome {
    pub signal_about_recipient: f64,
    pub signal_about_initiator: f64,
}

/// Completion trust signal: neutral plus a credibility-scaled term that
/// saturates with turn count, plus the counterpart's commitment balance.
///
/// `commitment_balance` is (kept - broken) / max(1, resolved) in [-1, 1].
fn completion_signal(turns: u32, credibility: f64, commitment_balance: f64) -> f64 {
    let depth = 1.0 - (-f64::from(turns) / 4.0).exp();
    (NEUTRAL_OPINION + 0.3 * credibility * depth + 0.2 * commitment_balance).clamp(0.0, 1.0)
}

/// Per-simulation conversation state.
#[derive(Debug)]
pub struct ConversationRegistry {
    simulation_id: SimulationId,
    conversations: HashMap<ConversationId, Conversation>,
    turns: HashMap<ConversationId, Vec<ConversationTurn>>,
    /// Ordered pairs with an active conversation.
    active_pairs: HashSet<(AgentId, AgentId)>,
}

impl ConversationRegistry {
    pub fn new(simulation_id: SimulationId) -> Self {
        Self {
            simulation_id,
            conversations: HashMap::new(),
            turns: HashMap::new(),
            active_pairs: HashSet::new(),
        }
    }

    /// Opens a conversation on a channel.
    ///
    /// At most one conversation may be active per ordered pair; a second
    /// attempt is rejected, not queued. Inactive channels are rejected at
    /// this boundary.
    pub fn open(
        &mut self,
        initiator: &AgentId,
        recipient: &AgentId,
        channel: &Channel,
        now: SimTime,
    ) -> EngineResult<ConversationId> {
        if channel.status == ChannelStatus::Inactive {
            return Err(EngineError::ChannelInactive(channel.channel_id.clone()));
        }
        let pair = (initiator.clone(), recipient.clone());
        if self.active_pairs.contains(&pair) {
            return Err(EngineError::ConcurrentConversation {
                initiator: initiator.clone(),
                recipient: recipient.clone(),
            });
        }

        let conversation_id = generate_conversation_id();
        self.conversations.insert(
            conversation_id.clone(),
            Conversation {
                conversation_id: conversation_id.clone(),
                simulation_id: self.simulation_id.clone(),
                initiator: initiator.clone(),
                recipient: recipient.clone(),
                channel_id: channel.channel_id.clone(),
                status: ConversationStatus::Active,
                started_at: now,
                ended_at: None,
                initiator_trust_delta: 0.0,
                recipient_trust_delta: 0.0,
            },
        );
        self.turns.insert(conversation_id.clone(), Vec::new());
        self.active_pairs.insert(pair);
        debug!(conversation = %conversation_id, %initiator, %recipient, "conversation opened");
        Ok(conversation_id)
    }

    pub fn get(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    pub fn turns(&self, id: &ConversationId) -> &[ConversationTurn] {
        self.turns.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn conversations(&self) -> impl Iterator<Item = &Conversation> {
        self.conversations.values()
    }

    /// Appends a turn. The conversation must be active and the speaker a
    /// participant; turn numbers are strictly increasing from 1.
    pub fn append_turn(
        &mut self,
        id: &ConversationId,
        speaker: &AgentId,
        message: impl Into<String>,
        kind: TurnKind,
        now: SimTime,
    ) -> EngineResult<u32> {
        let conversation = self
            .conversations
            .get(id)
            .ok_or_else(|| EngineError::UnknownReference {
                kind: "conversation",
                id: id.to_string(),
            })?;
        if conversation.status != ConversationStatus::Active {
            return Err(EngineError::InvalidTransition(format!(
                "conversation '{}' is not active",
                id
            )));
        }
        if speaker != &conversation.initiator && speaker != &conversation.recipient {
            return Err(EngineError::UnknownReference {
                kind: "participant",
                id: speaker.to_string(),
            });
        }

        let turns = self.turns.entry(id.clone()).or_default();
        let turn_number = turns.len() as u32 + 1;
        turns.push(ConversationTurn {
            conversation_id: id.clone(),
            turn_number,
            speaker: speaker.clone(),
            message: message.into(),
            kind,
            timestamp: now,
        });
        Ok(turn_number)
    }

    /// Whether a fulfilling action by `agent` was logged against the
    /// conversation at or before `deadline`.
    pub fn has_fulfilling_action(
        &self,
        id: &ConversationId,
        agent: &AgentId,
        deadline: SimTime,
    ) -> bool {
        self.turns(id).iter().any(|turn| {
            turn.kind == TurnKind::Action && &turn.speaker == agent && turn.timestamp <= deadline
        })
    }

    /// Completes an active conversation and computes both trust signals.
    ///
    /// `initiator_balance` / `recipient_balance` summarize how well each
    /// side kept commitments made in this conversation, in [-1, 1].
    pub fn complete(
        &mut self,
        id: &ConversationId,
        now: SimTime,
        initiator_balance: f64,
        recipient_balance: f64,
        credibility: f64,
    ) -> EngineResult<ConversationOutcome> {
        let turn_count = self.turns(id).len() as u32;
        let conversation = self.end(id, ConversationStatus::Completed, now)?;

        let outcome = ConversationOutcome {
            // What the initiator now thinks of the recipient depends on the
            // recipient's behavior, and vice versa.
            signal_about_recipient: completion_signal(turn_count, credibility, recipient_balance),
            signal_about_initiator: completion_signal(turn_count, credibility, initiator_balance),
        };
        conversation.initiator_trust_delta = outcome.signal_about_recipient - NEUTRAL_OPINION;
        conversation.recipient_trust_delta = outcome.signal_about_initiator - NEUTRAL_OPINION;
        Ok(outcome)
    }

    /// Abandons an active conversation (agent walked away, or teardown).
    pub fn abandon(&mut self, id: &ConversationId, now: SimTime) -> EngineResult<()> {
        self.end(id, ConversationStatus::Abandoned, now)?;
        Ok(())
    }

    /// Tears down every active conversation, marking each `abandoned`.
    /// Returns the ids that were closed.
    pub fn abandon_all(&mut self, now: SimTime) -> Vec<ConversationId> {
        let mut active: Vec<ConversationId> = self
            .conversations
            .values()
            .filter(|c| c.status == ConversationStatus::Active)
            .map(|c| c.conversation_id.clone())
            .collect();
        active.sort();
        for id in &active {
            // Cannot fail: the status was just observed as active.
            let _ = self.end(id, ConversationStatus::Abandoned, now);
        }
        active
    }

    fn end(
        &mut self,
        id: &ConversationId,
        status: ConversationStatus,
        now: SimTime,
    ) -> EngineResult<&mut Conversation> {
        let conversation = self
            .conversations
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownReference {
                kind: "conversation",
                id: id.to_string(),
            })?;
        if conversation.status.is_terminal() {
            return Err(EngineError::InvalidTransition(format!(
                "conversation '{}' already ended",
                id
            )));
        }
        conversation.status = status;
        conversation.ended_at = Some(now);
        self.active_pairs
            .remove(&(conversation.initiator.clone(), conversation.recipient.clone()));
        Ok(conversation)
    }

    /// Restores a persisted conversation during replay.
    pub fn restore(&mut self, conversation: Conversation, turns: Vec<ConversationTurn>) -> EngineResult<()> {
        match (conversation.status, conversation.ended_at) {
            (ConversationStatus::Active, Some(_)) => {
                return Err(EngineError::ReplayInconsistency(format!(
                    "active conversation '{}' has ended_at set",
                    conversation.conversation_id
                )));
            }
            (ConversationStatus::Completed | ConversationStatus::Abandoned, None) => {
                return Err(EngineError::ReplayInconsistency(format!(
                    "ended conversation '{}' is missing ended_at",
                    conversation.conversation_id
                )));
            }
            _ => {}
        }
        for (i, turn) in turns.iter().enumerate() {
            if turn.turn_number != i as u32 + 1 {
                return Err(EngineError::ReplayInconsistency(format!(
                    "conversation '{}' has non-sequential turn numbers",
                    conversation.conversation_id
                )));
            }
        }
        if conversation.status == ConversationStatus::Active {
            let pair = (conversation.initiator.clone(), conversation.recipient.clone());
            if !self.active_pairs.insert(pair) {
                return Err(EngineError::ReplayInconsistency(format!(
                    "two active conversations for pair ({}, {})",
                    conversation.initiator, conversation.recipient
                )));
            }
        }
        self.turns.insert(conversation.conversation_id.clone(), turns);
        self.conversations
            .insert(conversation.conversation_id.clone(), conversation);
        Ok(())
    }
}
