//! Replay Loader
//!
//! Rebuilds a simulation context from persisted rows. Loading is strict:
//! rows are applied in timestamp order and every structural invariant is
//! re-checked on the way in; any violation aborts with
//! `ReplayInconsistency` rather than repairing silently.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sim_state::{
    AgentProfile, Channel, ChannelUsage, Commitment, Conversation, ConversationTurn,
    InnovationIdea, KnowledgeEntity, OpinionPerson, OpinionPlace, PoiVisibility, Prototype, Route,
    Simulation, SimulationId,
};
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::store::{SimulationContext, SimulationStore};

/// Every persisted row of one simulation, as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    pub simulation: Simulation,
    pub agents: Vec<AgentProfile>,
    pub channels: Vec<Channel>,
    pub routes: Vec<Route>,
    pub visibility: Vec<PoiVisibility>,
    pub conversations: Vec<Conversation>,
    pub turns: Vec<ConversationTurn>,
    pub commitments: Vec<Commitment>,
    pub usages: Vec<ChannelUsage>,
    pub persons: Vec<OpinionPerson>,
    pub places: Vec<OpinionPlace>,
    pub entities: Vec<KnowledgeEntity>,
    pub ideas: Vec<InnovationIdea>,
    pub prototypes: Vec<Prototype>,
}

/// Exports every row of a context into a snapshot.
pub fn snapshot_context(context: &SimulationContext) -> SimulationSnapshot {
    let mut routes: Vec<Route> = Vec::new();
    for agent in context.roster() {
        routes.extend(context.mobility.routes_for(&agent).iter().cloned());
    }
    routes.sort_by(|a, b| {
        a.start_time
            .cmp(&b.start_time)
            .then_with(|| a.route_id.cmp(&b.route_id))
    });

    let mut conversations: Vec<Conversation> =
        context.conversations.conversations().cloned().collect();
    conversations.sort_by(|a, b| {
        a.started_at
            .cmp(&b.started_at)
            .then_with(|| a.conversation_id.cmp(&b.conversation_id))
    });
    let mut turns: Vec<ConversationTurn> = Vec::new();
    for conversation in &conversations {
        turns.extend(
            context
                .conversations
                .turns(&conversation.conversation_id)
                .iter()
                .cloned(),
        );
    }

    let mut commitments: Vec<Commitment> = context.commitments.commitments().cloned().collect();
    commitments.sort_by(|a, b| a.commitment_id.cmp(&b.commitment_id));

    let mut visibility: Vec<PoiVisibility> = context.visibility.rows().cloned().collect();
    visibility.sort_by(|a, b| {
        (&a.agent_id, &a.poi_id).cmp(&(&b.agent_id, &b.poi_id))
    });

    let mut channels: Vec<Channel> = context.diffusion.channels().cloned().collect();
    channels.sort_by(|a, b| a.channel_id.cmp(&b.channel_id));

    let mut persons: Vec<OpinionPerson> = context.opinions.person_rows().cloned().collect();
    persons.sort_by(|a, b| (&a.agent_id, &a.about).cmp(&(&b.agent_id, &b.about)));
    let mut places: Vec<OpinionPlace> = context.opinions.place_rows().cloned().collect();
    places.sort_by(|a, b| (&a.agent_id, &a.poi_id).cmp(&(&b.agent_id, &b.poi_id)));
    let mut entities: Vec<KnowledgeEntity> = context.opinions.entity_rows().cloned().collect();
    entities.sort_by(|a, b| (&a.agent_id, &a.entity_ref).cmp(&(&b.agent_id, &b.entity_ref)));

    let mut ideas: Vec<InnovationIdea> = context.innovation.ideas().cloned().collect();
    ideas.sort_by(|a, b| a.idea_id.cmp(&b.idea_id));
    let mut prototypes: Vec<Prototype> = context.innovation.prototypes().cloned().collect();
    prototypes.sort_by(|a, b| a.prototype_id.cmp(&b.prototype_id));

    let mut usages: Vec<ChannelUsage> = context.diffusion.usage_log().to_vec();
    usages.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.usage_id.cmp(&b.usage_id))
    });

    SimulationSnapshot {
        simulation: context.simulation.clone(),
        agents: context.agents.values().cloned().collect(),
        channels,
        routes,
        visibility,
        conversations,
        turns,
        commitments,
        usages,
        persons,
        places,
        entities,
        ideas,
        prototypes,
    }
}

/// Rebuilds a simulation context inside `store` from a snapshot.
///
/// Row order inside the snapshot does not have to be trusted: routes and
/// conversations are re-sorted by timestamp before application, and each
/// restore re-validates its invariants.
pub fn load_snapshot(
    store: &mut SimulationStore,
    snapshot: SimulationSnapshot,
) -> EngineResult<SimulationId> {
    let simulation_id = snapshot.simulation.simulation_id.clone();
    let context = store.create_simulation(snapshot.simulation)?;

    for profile in snapshot.agents {
        if profile.simulation_id != simulation_id {
            return Err(foreign_row("agent", &profile.agent_id.to_string()));
        }
        context.register_agent(profile);
    }

    for channel in snapshot.channels {
        if channel.simulation_id != simulation_id {
            return Err(foreign_row("channel", &channel.channel_id.to_string()));
        }
        context.diffusion.create_channel(channel)?;
    }

    let mut routes = snapshot.routes;
    routes.sort_by(|a, b| a.start_time.cmp(&b.start_time));
    for route in routes {
        let route_id = route.route_id.clone();
        context.mobility.insert_route(route).map_err(|e| match e {
            EngineError::RouteOverlap { agent_id, .. } => EngineError::ReplayInconsistency(
                format!("route '{}' overlaps agent '{}' timeline", route_id, agent_id),
            ),
            other => other,
        })?;
    }

    for row in snapshot.visibility {
        context.visibility.restore(row)?;
    }

    let mut conversations = snapshot.conversations;
    conversations.sort_by(|a, b| a.started_at.cmp(&b.started_at));
    for conversation in conversations {
        let turns: Vec<ConversationTurn> = snapshot
            .turns
            .iter()
            .filter(|t| t.conversation_id == conversation.conversation_id)
            .cloned()
            .collect();
        context.conversations.restore(conversation, turns)?;
    }

    for commitment in snapshot.commitments {
        if context.conversations.get(&commitment.conversation_id).is_none() {
            return Err(EngineError::ReplayInconsistency(format!(
                "commitment '{}' references unknown conversation '{}'",
                commitment.commitment_id, commitment.conversation_id
            )));
        }
        context.commitments.restore(commitment)?;
    }

    for usage in snapshot.usages {
        context.diffusion.restore_usage(usage);
    }

    for row in snapshot.persons {
        context.opinions.restore_person(row);
    }
    for row in snapshot.places {
        context.opinions.restore_place(row);
    }
    for row in snapshot.entities {
        context.opinions.restore_entity(row);
    }

    for idea in snapshot.ideas {
        context.innovation.restore_idea(idea);
    }
    for prototype in snapshot.prototypes {
        context.innovation.restore_prototype(prototype);
    }

    info!(simulation = %simulation_id, "snapshot loaded");
    Ok(simulation_id)
}

fn foreign_row(kind: &str, id: &str) -> EngineError {
    EngineError::ReplayInconsistency(format!(
        "{} '{}' belongs to a different simulation",
        kind, id
    ))
}

/// Writes a snapshot as pretty JSON.
pub fn write_snapshot(path: impl AsRef<Path>, snapshot: &SimulationSnapshot) -> EngineResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), snapshot)?;
    Ok(())
}

/// Reads a snapshot back from JSON.
pub fn read_snapshot(path: impl AsRef<Path>) -> EngineResult<SimulationSnapshot> {
    let file = File::open(path)?;
    let snapshot = serde_json::from_reader(BufReader::new(file))?;
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::visibility::PoiRef;
    use sim_state::{
        generate_route_id, AgentId, ChannelConfig, ChannelId, ChannelStatus, ChannelTopology,
        Coordinate, DiscoverySource, PoiId, RouteProviderKind, SimTime, SimulationStatus,
        TickGranularity, TravelMode,
    };

    fn t0() -> SimTime {
        SimTime::from_ymd_hms(2025, 6, 1, 8, 0, 0)
    }

    fn simulation() -> Simulation {
        Simulation {
            simulation_id: SimulationId::new("sim"),
            start_time: t0(),
            end_time: t0().plus_seconds(86_400),
            granularity: TickGranularity::M15,
            status: SimulationStatus::Running,
        }
    }

    fn route(agent: &str, offset_s: i64, duration_s: i64) -> Route {
        let origin = Coordinate::new(43.80, -70.16);
        let destination = Coordinate::new(43.81, -70.20);
        Route {
            route_id: generate_route_id(),
            simulation_id: SimulationId::new("sim"),
            agent_id: AgentId::new(agent),
            start_time: t0().plus_seconds(offset_s),
            end_time: t0().plus_seconds(offset_s + duration_s),
            origin,
            destination,
            destination_place: None,
            mode: TravelMode::Auto,
            distance_km: origin.haversine_km(destination),
            duration_s,
            geometry: vec![origin, destination],
            provider: RouteProviderKind::GreatCircle,
        }
    }

    fn populated_store() -> SimulationStore {
        let mut store = SimulationStore::new(EngineConfig::default());
        let context = store.create_simulation(simulation()).unwrap();
        context.register_agent(AgentProfile {
            agent_id: AgentId::new("agent_01"),
            simulation_id: SimulationId::new("sim"),
            home: Coordinate::new(43.80, -70.16),
            has_vehicle: true,
            age: Some(50),
        });
        context.register_agent(AgentProfile {
            agent_id: AgentId::new("agent_02"),
            simulation_id: SimulationId::new("sim"),
            home: Coordinate::new(43.79, -70.15),
            has_vehicle: false,
            age: None,
        });
        context
            .diffusion
            .create_channel(Channel {
                channel_id: ChannelId::new("ch_dm"),
                simulation_id: SimulationId::new("sim"),
                name: "dm".to_string(),
                topology: ChannelTopology::Dm,
                status: ChannelStatus::Active,
                config: ChannelConfig::default(),
                credibility: 0.8,
                latency_s: 0,
                reach_cap: 1,
                tick_capacity: 16,
            })
            .unwrap();

        context.mobility.insert_route(route("agent_01", 0, 600)).unwrap();
        context.visibility.record_visit(
            &AgentId::new("agent_01"),
            &PoiRef {
                poi_id: PoiId::new("poi_diner"),
                position: Coordinate::new(43.81, -70.20),
                category_weight: 0.9,
            },
            t0().plus_seconds(600),
            DiscoverySource::Need,
        );
        context.opinions.apply_trust_signal(
            &AgentId::new("agent_01"),
            &AgentId::new("agent_02"),
            0.9,
            0.2,
            t0(),
        );

        let channel = context.diffusion.channel(&ChannelId::new("ch_dm")).unwrap().clone();
        let conv = context
            .conversations
            .open(
                &AgentId::new("agent_01"),
                &AgentId::new("agent_02"),
                &channel,
                t0(),
            )
            .unwrap();
        context.commitments.create(
            &conv,
            &AgentId::new("agent_01"),
            &AgentId::new("agent_02"),
            "share the harvest",
            Some(t0().plus_seconds(7200)),
            t0(),
        );
        store
    }

    #[test]
    fn test_snapshot_roundtrip_reproduces_state() {
        let store = populated_store();
        let context = store.context(&SimulationId::new("sim")).unwrap();
        let snapshot = snapshot_context(context);

        let mut rebuilt = SimulationStore::new(EngineConfig::default());
        load_snapshot(&mut rebuilt, snapshot.clone()).unwrap();
        let restored = rebuilt.context(&SimulationId::new("sim")).unwrap();

        assert_eq!(
            restored.mobility.routes_for(&AgentId::new("agent_01")).len(),
            1
        );
        let row = restored
            .visibility
            .get(&AgentId::new("agent_01"), &PoiId::new("poi_diner"))
            .unwrap();
        assert_eq!(row.times_visited, 1);

        let trust_original = context.opinions.trust(
            &AgentId::new("agent_01"),
            &AgentId::new("agent_02"),
            t0(),
        );
        let trust_restored = restored.opinions.trust(
            &AgentId::new("agent_01"),
            &AgentId::new("agent_02"),
            t0(),
        );
        assert_eq!(trust_original, trust_restored);

        // Snapshotting the rebuilt context gives identical rows.
        let again = snapshot_context(restored);
        assert_eq!(
            serde_json::to_string(&snapshot).unwrap(),
            serde_json::to_string(&again).unwrap()
        );
    }

    #[test]
    fn test_load_rejects_overlapping_routes() {
        let store = populated_store();
        let mut snapshot = snapshot_context(store.context(&SimulationId::new("sim")).unwrap());
        snapshot.routes.push(route("agent_01", 300, 600));

        let mut rebuilt = SimulationStore::new(EngineConfig::default());
        assert!(matches!(
            load_snapshot(&mut rebuilt, snapshot),
            Err(EngineError::ReplayInconsistency(_))
        ));
    }

    #[test]
    fn test_load_rejects_orphan_commitment() {
        let store = populated_store();
        let mut snapshot = snapshot_context(store.context(&SimulationId::new("sim")).unwrap());
        snapshot.conversations.clear();
        snapshot.turns.clear();

        let mut rebuilt = SimulationStore::new(EngineConfig::default());
        assert!(matches!(
            load_snapshot(&mut rebuilt, snapshot),
            Err(EngineError::ReplayInconsistency(_))
        ));
    }

    #[test]
    fn test_load_rejects_corrupt_visibility_row() {
        let store = populated_store();
        let mut snapshot = snapshot_context(store.context(&SimulationId::new("sim")).unwrap());
        snapshot.visibility[0].times_visited = snapshot.visibility[0].times_seen + 5;

        let mut rebuilt = SimulationStore::new(EngineConfig::default());
        assert!(matches!(
            load_snapshot(&mut rebuilt, snapshot),
            Err(EngineError::ReplayInconsistency(_))
        ));
    }

    #[test]
    fn test_file_roundtrip() {
        let store = populated_store();
        let snapshot = snapshot_context(store.context(&SimulationId::new("sim")).unwrap());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        write_snapshot(&path, &snapshot).unwrap();
        let read_back = read_snapshot(&path).unwrap();
        assert_eq!(read_back.agents.len(), 2);
        assert_eq!(read_back.commitments.len(), 1);
    }
}
