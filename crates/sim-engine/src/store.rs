//! Simulation Store
//!
//! One context object per simulation holding every scoped table: agent
//! roster, mobility timelines, visibility rows, opinions, conversations,
//! commitments, channels, and innovation artifacts. All lookups are keyed
//! by simulation id first, so concurrent simulations never share state.

use std::collections::{BTreeMap, HashMap};

use sim_state::{
    AgentId, AgentProfile, PoiId, Simulation, SimulationId, SimulationStatus, SimTime,
};
use tracing::info;

use crate::commitment::CommitmentTracker;
use crate::config::EngineConfig;
use crate::conversation::ConversationRegistry;
use crate::diffusion::DiffusionEngine;
use crate::error::{EngineError, EngineResult};
use crate::innovation::InnovationBoard;
use crate::mobility::MobilityTracker;
use crate::opinion::OpinionStore;
use crate::visibility::{PoiRef, VisibilityLedger};

/// Everything scoped to one simulation.
pub struct SimulationContext {
    pub simulation: Simulation,
    pub agents: BTreeMap<AgentId, AgentProfile>,
    /// Ordered so per-tick exposure draws consume the RNG in a stable order.
    pub catalog: BTreeMap<PoiId, PoiRef>,
    pub mobility: MobilityTracker,
    pub visibility: VisibilityLedger,
    pub opinions: OpinionStore,
    pub conversations: ConversationRegistry,
    pub commitments: CommitmentTracker,
    pub diffusion: DiffusionEngine,
    pub innovation: InnovationBoard,
}

impl SimulationContext {
    fn new(simulation: Simulation, config: &EngineConfig) -> Self {
        let id = simulation.simulation_id.clone();
        Self {
            simulation,
            agents: BTreeMap::new(),
            catalog: BTreeMap::new(),
            mobility: MobilityTracker::new(id.clone()),
            visibility: VisibilityLedger::new(id.clone(), config.visibility.clone()),
            opinions: OpinionStore::new(id.clone(), config.opinion.clone()),
            conversations: ConversationRegistry::new(id.clone()),
            commitments: CommitmentTracker::new(id.clone()),
            diffusion: DiffusionEngine::new(id.clone(), config.opinion.clone()),
            innovation: InnovationBoard::new(id),
        }
    }

    /// Registers an agent: profile row, mobility seed position, and the
    /// home anchor for visibility distances.
    pub fn register_agent(&mut self, profile: AgentProfile) {
        self.mobility
            .seed_agent(profile.agent_id.clone(), profile.home);
        self.visibility
            .set_home(profile.agent_id.clone(), profile.home);
        self.agents.insert(profile.agent_id.clone(), profile);
    }

    pub fn register_poi(&mut self, poi: PoiRef) {
        self.catalog.insert(poi.poi_id.clone(), poi);
    }

    /// Agent ids in stable (sorted) order, the iteration order every
    /// per-tick pass uses.
    pub fn roster(&self) -> Vec<AgentId> {
        self.agents.keys().cloned().collect()
    }
}

/// All live simulations, keyed by id.
pub struct SimulationStore {
    config: EngineConfig,
    contexts: HashMap<SimulationId, SimulationContext>,
}

impl SimulationStore {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            contexts: HashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Creates a simulation context. The id must be fresh and the window
    /// must be non-empty.
    pub fn create_simulation(
        &mut self,
        simulation: Simulation,
    ) -> EngineResult<&mut SimulationContext> {
        if simulation.end_time <= simulation.start_time {
            return Err(EngineError::Configuration(format!(
                "simulation '{}': end_time must be after start_time",
                simulation.simulation_id
            )));
        }
        if self.contexts.contains_key(&simulation.simulation_id) {
            return Err(EngineError::Configuration(format!(
                "simulation '{}' already exists",
                simulation.simulation_id
            )));
        }
        let id = simulation.simulation_id.clone();
        info!(simulation = %id, "simulation created");
        let context = SimulationContext::new(simulation, &self.config);
        Ok(self.contexts.entry(id).or_insert(context))
    }

    pub fn context(&self, id: &SimulationId) -> EngineResult<&SimulationContext> {
        self.contexts
            .get(id)
            .ok_or_else(|| EngineError::UnknownReference {
                kind: "simulation",
                id: id.to_string(),
            })
    }

    pub fn context_mut(&mut self, id: &SimulationId) -> EngineResult<&mut SimulationContext> {
        self.contexts
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownReference {
                kind: "simulation",
                id: id.to_string(),
            })
    }

    pub fn simulation_ids(&self) -> Vec<SimulationId> {
        let mut ids: Vec<SimulationId> = self.contexts.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn start(&mut self, id: &SimulationId) -> EngineResult<()> {
        let context = self.context_mut(id)?;
        if context.simulation.status != SimulationStatus::Created {
            return Err(EngineError::InvalidTransition(format!(
                "simulation '{}' is {:?}, not created",
                id, context.simulation.status
            )));
        }
        context.simulation.status = SimulationStatus::Running;
        Ok(())
    }

    /// Ends a running simulation. Active conversations are abandoned and
    /// open commitments cancelled before the status flips, so no scoped
    /// row is left non-terminal.
    pub fn end(
        &mut self,
        id: &SimulationId,
        now: SimTime,
        status: SimulationStatus,
    ) -> EngineResult<()> {
        if !matches!(
            status,
            SimulationStatus::Completed | SimulationStatus::Cancelled
        ) {
            return Err(EngineError::InvalidTransition(format!(
                "simulation '{}' cannot end as {:?}",
                id, status
            )));
        }
        let context = self.context_mut(id)?;
        if matches!(
            context.simulation.status,
            SimulationStatus::Completed | SimulationStatus::Cancelled
        ) {
            return Err(EngineError::InvalidTransition(format!(
                "simulation '{}' already ended as {:?}",
                id, context.simulation.status
            )));
        }
        let abandoned = context.conversations.abandon_all(now).len();
        let cancelled = context.commitments.cancel_all_open(now);
        context.simulation.status = status;
        info!(
            simulation = %id,
            abandoned_conversations = abandoned,
            cancelled_commitments = cancelled,
            final_status = ?status,
            "simulation ended"
        );
        Ok(())
    }

    /// Deletes a simulation and every table scoped to it.
    pub fn delete(&mut self, id: &SimulationId) -> EngineResult<()> {
        if self.contexts.remove(id).is_none() {
            return Err(EngineError::UnknownReference {
                kind: "simulation",
                id: id.to_string(),
            });
        }
        info!(simulation = %id, "simulation deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_state::{
        Channel, ChannelConfig, ChannelId, ChannelStatus, ChannelTopology, CommitmentStatus,
        ConversationStatus, Coordinate, TickGranularity,
    };

    fn t0() -> SimTime {
        SimTime::from_ymd_hms(2025, 6, 1, 0, 0, 0)
    }

    fn simulation(id: &str) -> Simulation {
        Simulation {
            simulation_id: SimulationId::new(id),
            start_time: t0(),
            end_time: t0().plus_seconds(7 * 86_400),
            granularity: TickGranularity::M15,
            status: SimulationStatus::Created,
        }
    }

    fn profile(sim: &str, agent: &str) -> AgentProfile {
        AgentProfile {
            agent_id: AgentId::new(agent),
            simulation_id: SimulationId::new(sim),
            home: Coordinate::new(43.80, -70.16),
            has_vehicle: true,
            age: Some(40),
        }
    }

    fn feed_channel(sim: &str) -> Channel {
        Channel {
            channel_id: ChannelId::new("ch_feed"),
            simulation_id: SimulationId::new(sim),
            name: "feed".to_string(),
            topology: ChannelTopology::Feed,
            status: ChannelStatus::Active,
            config: ChannelConfig::default(),
            credibility: 0.7,
            latency_s: 0,
            reach_cap: 10,
            tick_capacity: 100,
        }
    }

    #[test]
    fn test_create_duplicate_rejected() {
        let mut store = SimulationStore::new(EngineConfig::default());
        store.create_simulation(simulation("sim_a")).unwrap();
        assert!(matches!(
            store.create_simulation(simulation("sim_a")),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn test_empty_window_rejected() {
        let mut store = SimulationStore::new(EngineConfig::default());
        let mut sim = simulation("sim_a");
        sim.end_time = sim.start_time;
        assert!(store.create_simulation(sim).is_err());
    }

    #[test]
    fn test_contexts_are_isolated() {
        let mut store = SimulationStore::new(EngineConfig::default());
        store.create_simulation(simulation("sim_a")).unwrap();
        store.create_simulation(simulation("sim_b")).unwrap();

        store
            .context_mut(&SimulationId::new("sim_a"))
            .unwrap()
            .register_agent(profile("sim_a", "agent_01"));

        assert_eq!(store.context(&SimulationId::new("sim_a")).unwrap().agents.len(), 1);
        assert!(store.context(&SimulationId::new("sim_b")).unwrap().agents.is_empty());
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut store = SimulationStore::new(EngineConfig::default());
        let id = SimulationId::new("sim_a");
        store.create_simulation(simulation("sim_a")).unwrap();

        store.start(&id).unwrap();
        assert!(store.start(&id).is_err(), "running simulation cannot start again");

        store.end(&id, t0(), SimulationStatus::Completed).unwrap();
        assert!(
            store.end(&id, t0(), SimulationStatus::Cancelled).is_err(),
            "terminal status never changes"
        );
    }

    #[test]
    fn test_teardown_closes_scoped_rows() {
        let mut store = SimulationStore::new(EngineConfig::default());
        let id = SimulationId::new("sim_a");
        store.create_simulation(simulation("sim_a")).unwrap();
        store.start(&id).unwrap();

        let context = store.context_mut(&id).unwrap();
        context.register_agent(profile("sim_a", "agent_01"));
        context.register_agent(profile("sim_a", "agent_02"));
        context.diffusion.create_channel(feed_channel("sim_a")).unwrap();
        let conv = context
            .conversations
            .open(
                &AgentId::new("agent_01"),
                &AgentId::new("agent_02"),
                &feed_channel("sim_a"),
                t0(),
            )
            .unwrap();
        context.commitments.create(
            &conv,
            &AgentId::new("agent_01"),
            &AgentId::new("agent_02"),
            "bring firewood",
            Some(t0().plus_seconds(86_400)),
            t0(),
        );

        store.end(&id, t0().plus_seconds(3600), SimulationStatus::Cancelled).unwrap();

        let context = store.context(&id).unwrap();
        assert!(context
            .conversations
            .conversations()
            .all(|c| c.status != ConversationStatus::Active));
        assert!(context
            .commitments
            .commitments()
            .all(|c| c.status != CommitmentStatus::Open));
        assert_eq!(context.simulation.status, SimulationStatus::Cancelled);
    }

    #[test]
    fn test_delete_cascades() {
        let mut store = SimulationStore::new(EngineConfig::default());
        let id = SimulationId::new("sim_a");
        store.create_simulation(simulation("sim_a")).unwrap();
        store.context_mut(&id).unwrap().register_agent(profile("sim_a", "agent_01"));

        store.delete(&id).unwrap();
        assert!(matches!(
            store.context(&id),
            Err(EngineError::UnknownReference { .. })
        ));
        assert!(store.delete(&id).is_err());
    }
}
