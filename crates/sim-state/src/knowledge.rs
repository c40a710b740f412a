//! Knowledge & Opinion Rows
//!
//! An agent's accumulating picture of the world: places seen and visited,
//! beliefs about external entities and roles, and scalar sentiment toward
//! people and places.

use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, PoiId, SimulationId};
use crate::time::SimTime;

/// How an agent first came to know about something.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoverySource {
    /// Pre-seeded at simulation start.
    Init,
    /// Passed by along a route.
    Route,
    /// Found through a need-driven search.
    Need,
    /// Referred by another agent.
    Social,
    /// Injected by the system.
    System,
}

/// Per-(agent, poi) visibility statistics ("poi_seen").
///
/// Counters only ever increase; `times_seen >= times_visited` always holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoiVisibility {
    pub simulation_id: SimulationId,
    pub agent_id: AgentId,
    pub poi_id: PoiId,
    /// Computed once from the agent's home coordinate; immutable after.
    pub distance_from_home_km: f64,
    pub times_seen: u32,
    pub times_visited: u32,
    pub first_time_seen: SimTime,
    pub last_time_seen: SimTime,
    pub first_time_visited: Option<SimTime>,
    pub last_time_visited: Option<SimTime>,
    /// Channel of the most recent update.
    pub source: DiscoverySource,
    pub seeded_at_start: bool,
}

impl PoiVisibility {
    /// Checks the row's internal invariants.
    pub fn invariants_hold(&self) -> bool {
        self.times_seen >= self.times_visited
            && self.last_time_seen >= self.first_time_seen
            && match (self.first_time_visited, self.last_time_visited) {
                (Some(first), Some(last)) => last >= first,
                (None, None) => self.times_visited == 0,
                _ => false,
            }
    }
}

/// Kind of external entity a belief is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Place,
    Firm,
    Person,
    Channel,
    Role,
    Product,
}

/// A per-agent belief about an external entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEntity {
    pub simulation_id: SimulationId,
    pub agent_id: AgentId,
    pub entity_ref: String,
    pub kind: EntityKind,
    /// Belief confidence in [0,1].
    pub confidence: f64,
    pub source: DiscoverySource,
    pub first_learned: SimTime,
    pub last_reinforced: SimTime,
}

/// A per-agent belief that some person holds a social role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeRole {
    pub simulation_id: SimulationId,
    pub agent_id: AgentId,
    pub person: AgentId,
    pub role: String,
    pub confidence: f64,
    pub source: DiscoverySource,
    pub last_reinforced: SimTime,
}

/// Continuously updated sentiment toward another agent.
///
/// Summary statistics, not a log: each field is an EMA in [0,1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpinionPerson {
    pub simulation_id: SimulationId,
    pub agent_id: AgentId,
    pub about: AgentId,
    pub trust: f64,
    pub liking: f64,
    pub last_interaction: SimTime,
}

/// Continuously updated sentiment toward a place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpinionPlace {
    pub simulation_id: SimulationId,
    pub agent_id: AgentId,
    pub poi_id: PoiId,
    pub liking: f64,
    pub satisfaction: f64,
    pub last_interaction: SimTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::SimTime;

    fn visibility() -> PoiVisibility {
        PoiVisibility {
            simulation_id: SimulationId::new("sim"),
            agent_id: AgentId::new("a"),
            poi_id: PoiId::new("p"),
            distance_from_home_km: 1.0,
            times_seen: 3,
            times_visited: 2,
            first_time_seen: SimTime(100),
            last_time_seen: SimTime(300),
            first_time_visited: Some(SimTime(150)),
            last_time_visited: Some(SimTime(250)),
            source: DiscoverySource::Route,
            seeded_at_start: false,
        }
    }

    #[test]
    fn test_visibility_invariants_hold() {
        assert!(visibility().invariants_hold());
    }

    #[test]
    fn test_visibility_invariants_violations() {
        let mut v = visibility();
        v.times_visited = 5;
        assert!(!v.invariants_hold());

        let mut v = visibility();
        v.last_time_seen = SimTime(50);
        assert!(!v.invariants_hold());

        let mut v = visibility();
        v.first_time_visited = None;
        assert!(!v.invariants_hold());
    }

    #[test]
    fn test_source_serialization() {
        assert_eq!(serde_json::to_string(&DiscoverySource::Init).unwrap(), r#""init""#);
        assert_eq!(serde_json::to_string(&DiscoverySource::Social).unwrap(), r#""social""#);
    }
}
