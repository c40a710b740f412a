//! Innovation Rows
//!
//! Creative-artifact lifecycle: ideas and the prototypes built from them.

use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, IdeaId, PrototypeId, SimulationId};
use crate::time::SimTime;

/// Lifecycle of an idea. `Published` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdeaStatus {
    Proposed,
    Prototyping,
    Evaluating,
    Published,
    Rejected,
}

impl IdeaStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, IdeaStatus::Published | IdeaStatus::Rejected)
    }

    /// Whether `next` is a legal transition from this status.
    pub fn can_transition_to(self, next: IdeaStatus) -> bool {
        matches!(
            (self, next),
            (IdeaStatus::Proposed, IdeaStatus::Prototyping)
                | (IdeaStatus::Proposed, IdeaStatus::Rejected)
                | (IdeaStatus::Prototyping, IdeaStatus::Evaluating)
                | (IdeaStatus::Evaluating, IdeaStatus::Published)
                | (IdeaStatus::Evaluating, IdeaStatus::Rejected)
        )
    }
}

/// A communication artifact proposed by an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InnovationIdea {
    pub idea_id: IdeaId,
    pub simulation_id: SimulationId,
    pub proposer: AgentId,
    pub title: String,
    pub status: IdeaStatus,
    pub proposed_at: SimTime,
    pub updated_at: SimTime,
}

/// Lifecycle of a prototype. `Published` and `Killed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrototypeStatus {
    Active,
    Evaluating,
    Published,
    Killed,
}

impl PrototypeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PrototypeStatus::Published | PrototypeStatus::Killed)
    }

    pub fn can_transition_to(self, next: PrototypeStatus) -> bool {
        matches!(
            (self, next),
            (PrototypeStatus::Active, PrototypeStatus::Evaluating)
                | (PrototypeStatus::Active, PrototypeStatus::Killed)
                | (PrototypeStatus::Evaluating, PrototypeStatus::Published)
                | (PrototypeStatus::Evaluating, PrototypeStatus::Killed)
        )
    }
}

/// A working build of an idea.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prototype {
    pub prototype_id: PrototypeId,
    pub simulation_id: SimulationId,
    pub idea_id: IdeaId,
    pub status: PrototypeStatus,
    pub created_at: SimTime,
    pub updated_at: SimTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idea_transitions() {
        assert!(IdeaStatus::Proposed.can_transition_to(IdeaStatus::Prototyping));
        assert!(IdeaStatus::Prototyping.can_transition_to(IdeaStatus::Evaluating));
        assert!(IdeaStatus::Evaluating.can_transition_to(IdeaStatus::Published));
        assert!(!IdeaStatus::Published.can_transition_to(IdeaStatus::Proposed));
        assert!(!IdeaStatus::Proposed.can_transition_to(IdeaStatus::Published));
    }

    #[test]
    fn test_prototype_transitions() {
        assert!(PrototypeStatus::Active.can_transition_to(PrototypeStatus::Evaluating));
        assert!(PrototypeStatus::Evaluating.can_transition_to(PrototypeStatus::Killed));
        assert!(!PrototypeStatus::Killed.can_transition_to(PrototypeStatus::Active));
    }
}
