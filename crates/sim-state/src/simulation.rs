//! Simulation Row
//!
//! The root entity every other row is scoped to.

use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;
use crate::ids::{AgentId, SimulationId};
use crate::time::{SimTime, TickGranularity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationStatus {
    #[default]
    Created,
    Running,
    Completed,
    Cancelled,
}

impl SimulationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SimulationStatus::Completed | SimulationStatus::Cancelled)
    }
}

/// A simulation run: identifier, time bounds, status.
///
/// Owns every other entity transitively; deleting a simulation cascades.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    pub simulation_id: SimulationId,
    pub start_time: SimTime,
    pub end_time: SimTime,
    pub granularity: TickGranularity,
    pub status: SimulationStatus,
}

impl Simulation {
    pub fn contains(&self, t: SimTime) -> bool {
        t >= self.start_time && t <= self.end_time
    }
}

/// Read-only reference attributes for one agent.
///
/// Demographics come from external voter-file loading and are never written
/// by the engine; the home coordinate seeds mobility before the first route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub agent_id: AgentId,
    pub simulation_id: SimulationId,
    pub home: Coordinate,
    pub has_vehicle: bool,
    pub age: Option<u32>,
}
