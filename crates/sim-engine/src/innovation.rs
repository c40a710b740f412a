//! Innovation Lifecycle
//!
//! Ideas move proposed -> prototyping -> evaluating -> published/rejected;
//! prototypes move active -> evaluating -> published/killed. Transitions
//! outside those paths are rejected. Publication produces a feed-style
//! usage event so the artifact diffuses like any other content.

use std::collections::HashMap;

use sim_state::{
    generate_prototype_id, generate_usage_id, AgentId, ChannelId, ChannelUsage, IdeaId,
    IdeaStatus, InnovationIdea, Prototype, PrototypeId, PrototypeStatus, SimTime, SimulationId,
    UsageKind,
};
use tracing::debug;

use crate::error::{EngineError, EngineResult};

/// Per-simulation idea and prototype state.
#[derive(Debug)]
pub struct InnovationBoard {
    simulation_id: SimulationId,
    ideas: HashMap<IdeaId, InnovationIdea>,
    prototypes: HashMap<PrototypeId, Prototype>,
}

impl InnovationBoard {
    pub fn new(simulation_id: SimulationId) -> Self {
        Self {
            simulation_id,
            ideas: HashMap::new(),
            prototypes: HashMap::new(),
        }
    }

    pub fn propose_idea(
        &mut self,
        idea_id: IdeaId,
        proposer: &AgentId,
        title: &str,
        now: SimTime,
    ) -> &InnovationIdea {
        let idea = InnovationIdea {
            idea_id: idea_id.clone(),
            simulation_id: self.simulation_id.clone(),
            proposer: proposer.clone(),
            title: title.to_string(),
            status: IdeaStatus::Proposed,
            proposed_at: now,
            updated_at: now,
        };
        debug!(idea = %idea_id, proposer = %proposer, "idea proposed");
        self.ideas.entry(idea_id).or_insert(idea)
    }

    pub fn idea(&self, id: &IdeaId) -> EngineResult<&InnovationIdea> {
        self.ideas.get(id).ok_or_else(|| EngineError::UnknownReference {
            kind: "idea",
            id: id.to_string(),
        })
    }

    pub fn ideas(&self) -> impl Iterator<Item = &InnovationIdea> {
        self.ideas.values()
    }

    pub fn prototype(&self, id: &PrototypeId) -> EngineResult<&Prototype> {
        self.prototypes
            .get(id)
            .ok_or_else(|| EngineError::UnknownReference {
                kind: "prototype",
                id: id.to_string(),
            })
    }

    pub fn prototypes(&self) -> impl Iterator<Item = &Prototype> {
        self.prototypes.values()
    }

    /// Moves an idea to `next`, rejecting transitions the lifecycle does
    /// not allow.
    pub fn advance_idea(
        &mut self,
        id: &IdeaId,
        next: IdeaStatus,
        now: SimTime,
    ) -> EngineResult<&InnovationIdea> {
        let idea = self
            .ideas
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownReference {
                kind: "idea",
                id: id.to_string(),
            })?;
        if !idea.status.can_transition_to(next) {
            return Err(EngineError::InvalidTransition(format!(
                "idea '{}' cannot move {:?} -> {:?}",
                id, idea.status, next
            )));
        }
        idea.status = next;
        idea.updated_at = now;
        Ok(idea)
    }

    /// Builds a prototype from an idea that has entered prototyping.
    pub fn build_prototype(&mut self, idea_id: &IdeaId, now: SimTime) -> EngineResult<&Prototype> {
        let idea = self.idea(idea_id)?;
        if idea.status != IdeaStatus::Prototyping {
            return Err(EngineError::InvalidTransition(format!(
                "idea '{}' is {:?}, not prototyping",
                idea_id, idea.status
            )));
        }
        let prototype = Prototype {
            prototype_id: generate_prototype_id(),
            simulation_id: self.simulation_id.clone(),
            idea_id: idea_id.clone(),
            status: PrototypeStatus::Active,
            created_at: now,
            updated_at: now,
        };
        let id = prototype.prototype_id.clone();
        self.prototypes.insert(id.clone(), prototype);
        Ok(&self.prototypes[&id])
    }

    pub fn advance_prototype(
        &mut self,
        id: &PrototypeId,
        next: PrototypeStatus,
        now: SimTime,
    ) -> EngineResult<&Prototype> {
        let prototype =
            self.prototypes
                .get_mut(id)
                .ok_or_else(|| EngineError::UnknownReference {
                    kind: "prototype",
                    id: id.to_string(),
                })?;
        if !prototype.status.can_transition_to(next) {
            return Err(EngineError::InvalidTransition(format!(
                "prototype '{}' cannot move {:?} -> {:?}",
                id, prototype.status, next
            )));
        }
        prototype.status = next;
        prototype.updated_at = now;
        Ok(prototype)
    }

    /// Publishes an evaluating idea and returns the feed usage event that
    /// carries the announcement. The caller submits it to the diffusion
    /// engine on its channel of choice.
    pub fn publish_idea(
        &mut self,
        id: &IdeaId,
        channel_id: &ChannelId,
        now: SimTime,
    ) -> EngineResult<ChannelUsage> {
        let idea = self.advance_idea(id, IdeaStatus::Published, now)?;
        debug!(idea = %id, "idea published");
        Ok(ChannelUsage {
            usage_id: generate_usage_id(),
            simulation_id: idea.simulation_id.clone(),
            channel_id: channel_id.clone(),
            actor: idea.proposer.clone(),
            kind: UsageKind::Post,
            timestamp: now,
            recipient: None,
            place_ref: None,
            entity_ref: Some(idea.idea_id.to_string()),
            message: format!("published: {}", idea.title),
        })
    }

    /// Restores persisted rows during replay.
    pub fn restore_idea(&mut self, idea: InnovationIdea) {
        self.ideas.insert(idea.idea_id.clone(), idea);
    }

    pub fn restore_prototype(&mut self, prototype: Prototype) {
        self.prototypes
            .insert(prototype.prototype_id.clone(), prototype);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_state::generate_idea_id;

    fn t0() -> SimTime {
        SimTime::from_ymd_hms(2025, 6, 1, 8, 0, 0)
    }

    fn board() -> InnovationBoard {
        InnovationBoard::new(SimulationId::new("sim"))
    }

    #[test]
    fn test_full_lifecycle_to_publication() {
        let mut board = board();
        let id = generate_idea_id();
        board.propose_idea(id.clone(), &AgentId::new("a"), "community newsletter", t0());

        board.advance_idea(&id, IdeaStatus::Prototyping, t0()).unwrap();
        let proto_id = board.build_prototype(&id, t0()).unwrap().prototype_id.clone();
        board
            .advance_prototype(&proto_id, PrototypeStatus::Evaluating, t0())
            .unwrap();
        board
            .advance_prototype(&proto_id, PrototypeStatus::Published, t0())
            .unwrap();
        board.advance_idea(&id, IdeaStatus::Evaluating, t0()).unwrap();

        let usage = board
            .publish_idea(&id, &ChannelId::new("ch_feed"), t0())
            .unwrap();
        assert_eq!(usage.kind, UsageKind::Post);
        assert_eq!(usage.entity_ref, Some(id.to_string()));
        assert_eq!(board.idea(&id).unwrap().status, IdeaStatus::Published);
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let mut board = board();
        let id = generate_idea_id();
        board.propose_idea(id.clone(), &AgentId::new("a"), "x", t0());

        // Cannot jump straight to published.
        assert!(matches!(
            board.advance_idea(&id, IdeaStatus::Published, t0()),
            Err(EngineError::InvalidTransition(_))
        ));

        // Terminal states never move again.
        board.advance_idea(&id, IdeaStatus::Rejected, t0()).unwrap();
        assert!(board.advance_idea(&id, IdeaStatus::Prototyping, t0()).is_err());
    }

    #[test]
    fn test_prototype_requires_prototyping_idea() {
        let mut board = board();
        let id = generate_idea_id();
        board.propose_idea(id.clone(), &AgentId::new("a"), "x", t0());
        assert!(matches!(
            board.build_prototype(&id, t0()),
            Err(EngineError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_unknown_idea() {
        let board = board();
        assert!(matches!(
            board.idea(&IdeaId::new("idea_missing")),
            Err(EngineError::UnknownReference { .. })
        ));
    }
}
