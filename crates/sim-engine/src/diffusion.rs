//! Diffusion Engine
//!
//! Propagates information across channels: a usage event is held until the
//! channel's latency elapses, then evaluated against the channel's
//! targeting, friction, and capacity configuration to pick the receiving
//! agents and run their adoption draws. Adoption strengthens knowledge and
//! visibility rows; `event` topology additionally spawns travel and
//! conversation intents.

use std::collections::{BTreeMap, HashMap};

use rand::Rng;
use sim_state::{
    AgentId, Channel, ChannelId, ChannelStatus, ChannelTopology, ChannelUsage, DiscoverySource,
    EntityKind, PoiId, SimTime, SimulationId, UsageKind,
};
use tracing::{debug, warn};

use crate::config::OpinionConfig;
use crate::error::{EngineError, EngineResult};
use crate::opinion::OpinionStore;
use crate::visibility::{PoiRef, VisibilityLedger};

/// Result of evaluating one usage event.
#[derive(Debug, Clone, Default)]
pub struct DiffusionOutcome {
    /// Agents selected for an adoption attempt, in tie-break order.
    pub attempted: Vec<AgentId>,
    /// Subset whose adoption draw succeeded.
    pub adopters: Vec<AgentId>,
    /// Agents who should travel to the event venue (event topology only).
    pub travel_intents: Vec<(AgentId, PoiId)>,
    /// Organizer → attendee conversations to open (event topology only).
    pub conversation_intents: Vec<(AgentId, AgentId)>,
}

fn usage_kind_allowed(topology: ChannelTopology, kind: UsageKind) -> bool {
    matches!(
        (topology, kind),
        (ChannelTopology::Feed, UsageKind::Post)
            | (ChannelTopology::Dm, UsageKind::DirectMessage)
            | (ChannelTopology::Event, UsageKind::OrganizeEvent)
    )
}

/// Validates a channel's targeting/cost/friction configuration.
///
/// Runs once at creation; usage-time code assumes these bounds.
pub fn validate_channel(channel: &Channel) -> EngineResult<()> {
    let c = &channel.config;
    if !(0.0..=1.0).contains(&c.adoption_probability) {
        return Err(EngineError::Configuration(format!(
            "channel '{}': adoption_probability must be in [0,1]",
            channel.channel_id
        )));
    }
    if !(0.0..=1.0).contains(&c.min_affinity) {
        return Err(EngineError::Configuration(format!(
            "channel '{}': min_affinity must be in [0,1]",
            channel.channel_id
        )));
    }
    if c.cost_per_use < 0.0 {
        return Err(EngineError::Configuration(format!(
            "channel '{}': cost_per_use must be non-negative",
            channel.channel_id
        )));
    }
    if !(0.0..=1.0).contains(&c.friction) {
        return Err(EngineError::Configuration(format!(
            "channel '{}': friction must be in [0,1]",
            channel.channel_id
        )));
    }
    if !(0.0..=1.0).contains(&channel.credibility) {
        return Err(EngineError::Configuration(format!(
            "channel '{}': credibility must be in [0,1]",
            channel.channel_id
        )));
    }
    if channel.latency_s < 0 {
        return Err(EngineError::Configuration(format!(
            "channel '{}': latency_s must be non-negative",
            channel.channel_id
        )));
    }
    if channel.reach_cap == 0 || channel.tick_capacity == 0 {
        return Err(EngineError::Configuration(format!(
            "channel '{}': reach_cap and tick_capacity must be at least 1",
            channel.channel_id
        )));
    }
    Ok(())
}

/// A usage event whose effects are not yet observable.
#[derive(Debug, Clone)]
struct PendingEffect {
    apply_at: SimTime,
    usage: ChannelUsage,
}

/// Per-simulation channel and diffusion state.
#[derive(Debug)]
pub struct DiffusionEngine {
    simulation_id: SimulationId,
    channels: HashMap<ChannelId, Channel>,
    /// Append-only usage log.
    usages: Vec<ChannelUsage>,
    pending: Vec<PendingEffect>,
    /// Reach consumed per (channel, tick): the compare-and-increment
    /// counter behind per-tick capacity caps.
    tick_reach: HashMap<(ChannelId, u64), u32>,
    opinion_config: OpinionConfig,
}

impl DiffusionEngine {
    pub fn new(simulation_id: SimulationId, opinion_config: OpinionConfig) -> Self {
        Self {
            simulation_id,
            channels: HashMap::new(),
            usages: Vec::new(),
            pending: Vec::new(),
            tick_reach: HashMap::new(),
            opinion_config,
        }
    }

    /// Registers a channel after validating its configuration. The row
    /// must be scoped to this engine's simulation.
    pub fn create_channel(&mut self, channel: Channel) -> EngineResult<()> {
        if channel.simulation_id != self.simulation_id {
            return Err(EngineError::Configuration(format!(
                "channel '{}' belongs to simulation '{}'",
                channel.channel_id, channel.simulation_id
            )));
        }
        validate_channel(&channel)?;
        self.channels.insert(channel.channel_id.clone(), channel);
        Ok(())
    }

    pub fn channel(&self, id: &ChannelId) -> EngineResult<&Channel> {
        self.channels
            .get(id)
            .ok_or_else(|| EngineError::UnknownReference {
                kind: "channel",
                id: id.to_string(),
            })
    }

    pub fn set_channel_status(&mut self, id: &ChannelId, status: ChannelStatus) -> EngineResult<()> {
        let channel = self
            .channels
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownReference {
                kind: "channel",
                id: id.to_string(),
            })?;
        channel.status = status;
        Ok(())
    }

    pub fn usage_log(&self) -> &[ChannelUsage] {
        &self.usages
    }

    /// Accepts a usage event: appended to the log, effects queued until
    /// `timestamp + latency_s`. Inactive channels and kind/topology
    /// mismatches are rejected at this boundary.
    pub fn submit_usage(&mut self, usage: ChannelUsage) -> EngineResult<()> {
        let channel = self.channel(&usage.channel_id)?;
        if channel.status == ChannelStatus::Inactive {
            return Err(EngineError::ChannelInactive(usage.channel_id.clone()));
        }
        if !usage_kind_allowed(channel.topology, usage.kind) {
            return Err(EngineError::Configuration(format!(
                "usage kind {:?} not allowed on {:?} channel '{}'",
                usage.kind, channel.topology, usage.channel_id
            )));
        }
        if usage.kind == UsageKind::DirectMessage && usage.recipient.is_none() {
            return Err(EngineError::Configuration(format!(
                "direct message on '{}' is missing a recipient",
                usage.channel_id
            )));
        }
        if usage.kind == UsageKind::OrganizeEvent && usage.place_ref.is_none() {
            return Err(EngineError::Configuration(format!(
                "organize_event on '{}' is missing a venue",
                usage.channel_id
            )));
        }

        let apply_at = usage.timestamp.plus_seconds(channel.latency_s);
        self.pending.push(PendingEffect {
            apply_at,
            usage: usage.clone(),
        });
        self.usages.push(usage);
        Ok(())
    }

    /// Pops every usage whose latency has elapsed by `now`, ordered by
    /// (apply_at, usage_id) so replay applies effects identically.
    pub fn drain_ready(&mut self, now: SimTime) -> Vec<ChannelUsage> {
        let mut ready: Vec<PendingEffect> = Vec::new();
        let mut remaining: Vec<PendingEffect> = Vec::new();
        for effect in self.pending.drain(..) {
            if effect.apply_at <= now {
                ready.push(effect);
            } else {
                remaining.push(effect);
            }
        }
        self.pending = remaining;
        ready.sort_by(|a, b| {
            a.apply_at
                .cmp(&b.apply_at)
                .then_with(|| a.usage.usage_id.cmp(&b.usage.usage_id))
        });
        ready.into_iter().map(|e| e.usage).collect()
    }

    /// Number of usage events still waiting on latency.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Prior affinity of an agent for a usage's content, the primary
    /// tie-break key for capped selection.
    fn affinity(
        &self,
        usage: &ChannelUsage,
        agent: &AgentId,
        visibility: &VisibilityLedger,
        opinions: &OpinionStore,
        now: SimTime,
    ) -> f64 {
        if let Some(place) = &usage.place_ref {
            return visibility.knowledge_strength(agent, place, now);
        }
        if let Some(entity) = &usage.entity_ref {
            return opinions.entity_confidence(agent, entity, now);
        }
        opinions.trust(agent, &usage.actor, now)
    }

    /// Evaluates a ready usage event and applies its effects.
    ///
    /// Selection: eligible agents (everyone but the actor, at or above the
    /// channel's affinity threshold; the named recipient for DMs) are
    /// ordered by (affinity descending, agent id ascending) and truncated
    /// to the per-usage reach cap, then to whatever per-tick capacity
    /// remains. Each selected agent runs one adoption draw; adoption
    /// reinforces the knowledge/visibility rows at the channel's
    /// credibility.
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate_usage<R: Rng>(
        &mut self,
        usage: &ChannelUsage,
        roster: &[AgentId],
        tick_index: u64,
        visibility: &mut VisibilityLedger,
        opinions: &mut OpinionStore,
        catalog: &BTreeMap<PoiId, PoiRef>,
        rng: &mut R,
        now: SimTime,
    ) -> EngineResult<DiffusionOutcome> {
        let channel = self.channel(&usage.channel_id)?.clone();

        let mut selected: Vec<AgentId> = match channel.topology {
            ChannelTopology::Dm => usage.recipient.iter().cloned().collect(),
            ChannelTopology::Feed | ChannelTopology::Event => {
                let mut candidates: Vec<(f64, AgentId)> = roster
                    .iter()
                    .filter(|agent| *agent != &usage.actor)
                    .map(|agent| {
                        (
                            self.affinity(usage, agent, visibility, opinions, now),
                            agent.clone(),
                        )
                    })
                    .filter(|(affinity, _)| *affinity >= channel.config.min_affinity)
                    .collect();
                candidates.sort_by(|a, b| {
                    b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1))
                });
                candidates.truncate(channel.reach_cap as usize);
                candidates.into_iter().map(|(_, agent)| agent).collect()
            }
        };

        // Per-tick capacity: compare-and-increment against the shared
        // counter, never read-then-write. DMs bypass fan-out caps.
        if channel.topology != ChannelTopology::Dm {
            let used = self
                .tick_reach
                .entry((channel.channel_id.clone(), tick_index))
                .or_insert(0);
            let remaining = channel.tick_capacity.saturating_sub(*used) as usize;
            if selected.len() > remaining {
                warn!(
                    channel = %channel.channel_id,
                    tick = tick_index,
                    dropped = selected.len() - remaining,
                    "tick capacity cap reached"
                );
                selected.truncate(remaining);
            }
            *used += selected.len() as u32;
        }

        let p_adopt = channel.config.adoption_probability * (1.0 - channel.config.friction);
        let mut outcome = DiffusionOutcome {
            attempted: selected.clone(),
            ..Default::default()
        };

        for agent in &selected {
            if rng.gen::<f64>() >= p_adopt {
                continue;
            }
            // Fixed internal order per adopter: visibility first, then
            // knowledge, so replay is deterministic.
            if let Some(place) = &usage.place_ref {
                let poi = catalog.get(place).cloned().unwrap_or(PoiRef {
                    poi_id: place.clone(),
                    position: sim_state::Coordinate::new(0.0, 0.0),
                    category_weight: 0.5,
                });
                visibility.record_seen(agent, &poi, now, DiscoverySource::Social);
            }
            if let Some(entity) = &usage.entity_ref {
                opinions.reinforce_entity(
                    agent,
                    entity,
                    EntityKind::Place,
                    channel.credibility,
                    self.opinion_config.adoption_rate,
                    DiscoverySource::Social,
                    now,
                );
            }
            outcome.adopters.push(agent.clone());

            if channel.topology == ChannelTopology::Event {
                if let Some(place) = &usage.place_ref {
                    outcome.travel_intents.push((agent.clone(), place.clone()));
                }
                outcome
                    .conversation_intents
                    .push((usage.actor.clone(), agent.clone()));
            }
        }

        debug!(
            usage = %usage.usage_id,
            attempted = outcome.attempted.len(),
            adopted = outcome.adopters.len(),
            "usage evaluated"
        );
        Ok(outcome)
    }

    /// Drops per-tick counters older than `tick_index`.
    pub fn expire_tick_counters(&mut self, tick_index: u64) {
        self.tick_reach.retain(|(_, tick), _| *tick >= tick_index);
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    /// Restores a persisted usage row during replay (no pending effect is
    /// queued; replay re-applies effects through the ledger).
    pub fn restore_usage(&mut self, usage: ChannelUsage) {
        self.usages.push(usage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VisibilityConfig;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use sim_state::{generate_usage_id, ChannelConfig, Coordinate};

    fn sim_id() -> SimulationId {
        SimulationId::new("sim")
    }

    fn t0() -> SimTime {
        SimTime::from_ymd_hms(2025, 6, 1, 8, 0, 0)
    }

    fn feed_channel(reach_cap: u32) -> Channel {
        Channel {
            channel_id: ChannelId::new("ch_feed"),
            simulation_id: sim_id(),
            name: "town feed".to_string(),
            topology: ChannelTopology::Feed,
            status: ChannelStatus::Active,
            config: ChannelConfig {
                adoption_probability: 1.0,
                min_affinity: 0.0,
                cost_per_use: 0.0,
                friction: 0.0,
            },
            credibility: 0.7,
            latency_s: 0,
            reach_cap,
            tick_capacity: 1000,
        }
    }

    fn post(entity: Option<&str>, place: Option<&str>) -> ChannelUsage {
        ChannelUsage {
            usage_id: generate_usage_id(),
            simulation_id: sim_id(),
            channel_id: ChannelId::new("ch_feed"),
            actor: AgentId::new("agent_00"),
            kind: UsageKind::Post,
            timestamp: t0(),
            recipient: None,
            place_ref: place.map(PoiId::new),
            entity_ref: entity.map(str::to_string),
            message: "heard about this place".to_string(),
        }
    }

    fn setup(reach_cap: u32) -> (DiffusionEngine, VisibilityLedger, OpinionStore) {
        let mut engine = DiffusionEngine::new(sim_id(), OpinionConfig::default());
        engine.create_channel(feed_channel(reach_cap)).unwrap();
        (
            engine,
            VisibilityLedger::new(sim_id(), VisibilityConfig::default()),
            OpinionStore::new(sim_id(), OpinionConfig::default()),
        )
    }

    fn roster(n: usize) -> Vec<AgentId> {
        (0..n).map(|i| AgentId::new(format!("agent_{:02}", i))).collect()
    }

    #[test]
    fn test_validate_rejects_bad_config() {
        let mut channel = feed_channel(5);
        channel.config.adoption_probability = 1.5;
        assert!(matches!(
            validate_channel(&channel),
            Err(EngineError::Configuration(_))
        ));

        let mut channel = feed_channel(5);
        channel.latency_s = -10;
        assert!(validate_channel(&channel).is_err());

        let mut channel = feed_channel(5);
        channel.reach_cap = 0;
        assert!(validate_channel(&channel).is_err());
    }

    #[test]
    fn test_foreign_simulation_channel_rejected() {
        let mut engine = DiffusionEngine::new(sim_id(), OpinionConfig::default());
        let mut channel = feed_channel(5);
        channel.simulation_id = SimulationId::new("other_sim");
        assert!(matches!(
            engine.create_channel(channel),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn test_inactive_channel_usage_rejected() {
        let (mut engine, _, _) = setup(5);
        engine
            .set_channel_status(&ChannelId::new("ch_feed"), ChannelStatus::Inactive)
            .unwrap();
        let err = engine.submit_usage(post(Some("place_diner"), None)).unwrap_err();
        assert!(matches!(err, EngineError::ChannelInactive(_)));
        assert!(engine.usage_log().is_empty());
    }

    #[test]
    fn test_kind_topology_mismatch_rejected() {
        let (mut engine, _, _) = setup(5);
        let mut usage = post(Some("x"), None);
        usage.kind = UsageKind::OrganizeEvent;
        usage.place_ref = Some(PoiId::new("poi_hall"));
        assert!(matches!(
            engine.submit_usage(usage),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn test_latency_delays_effects() {
        let (mut engine, _, _) = setup(5);
        let mut channel = feed_channel(5);
        channel.channel_id = ChannelId::new("ch_slow");
        channel.latency_s = 600;
        engine.create_channel(channel).unwrap();

        let mut usage = post(Some("place_diner"), None);
        usage.channel_id = ChannelId::new("ch_slow");
        engine.submit_usage(usage).unwrap();

        // Not observable before timestamp + latency.
        assert!(engine.drain_ready(t0().plus_seconds(599)).is_empty());
        assert_eq!(engine.pending_count(), 1);
        let ready = engine.drain_ready(t0().plus_seconds(600));
        assert_eq!(ready.len(), 1);
        assert_eq!(engine.pending_count(), 0);
    }

    #[test]
    fn test_scenario_c_cap_selects_exactly_five_deterministically() {
        let (mut engine, mut visibility, mut opinions) = setup(5);
        let agents = roster(21); // agent_00 is the actor, 20 eligible

        // Give four specific agents prior affinity for the place.
        let place = PoiRef {
            poi_id: PoiId::new("place_diner"),
            position: Coordinate::new(43.80, -70.16),
            category_weight: 0.9,
        };
        for favored in ["agent_07", "agent_11", "agent_15", "agent_19"] {
            visibility.record_visit(
                &AgentId::new(favored),
                &place,
                t0(),
                sim_state::DiscoverySource::Need,
            );
        }

        let usage = post(None, Some("place_diner"));
        let catalog: BTreeMap<PoiId, PoiRef> = [(place.poi_id.clone(), place.clone())].into();
        let mut rng = SmallRng::seed_from_u64(42);
        let outcome = engine
            .evaluate_usage(
                &usage, &agents, 0, &mut visibility, &mut opinions, &catalog, &mut rng, t0(),
            )
            .unwrap();

        assert_eq!(outcome.attempted.len(), 5);
        // Highest prior affinity first, then lowest agent id for the tie.
        assert_eq!(
            outcome.attempted,
            vec![
                AgentId::new("agent_07"),
                AgentId::new("agent_11"),
                AgentId::new("agent_15"),
                AgentId::new("agent_19"),
                AgentId::new("agent_01"),
            ]
        );
        // adoption_probability is 1.0, so all attempts adopt.
        assert_eq!(outcome.adopters.len(), 5);
    }

    #[test]
    fn test_actor_never_selected() {
        let (mut engine, mut visibility, mut opinions) = setup(50);
        let agents = roster(10);
        let usage = post(Some("firm_bakery"), None);
        let mut rng = SmallRng::seed_from_u64(1);
        let outcome = engine
            .evaluate_usage(
                &usage, &agents, 0, &mut visibility, &mut opinions, &BTreeMap::new(), &mut rng, t0(),
            )
            .unwrap();
        assert!(!outcome.attempted.contains(&AgentId::new("agent_00")));
        assert_eq!(outcome.attempted.len(), 9);
    }

    #[test]
    fn test_adoption_strengthens_knowledge() {
        let (mut engine, mut visibility, mut opinions) = setup(50);
        let agents = roster(3);
        let usage = post(Some("firm_bakery"), None);
        let mut rng = SmallRng::seed_from_u64(1);
        engine
            .evaluate_usage(
                &usage, &agents, 0, &mut visibility, &mut opinions, &BTreeMap::new(), &mut rng, t0(),
            )
            .unwrap();
        // p_adopt is 1.0, so both non-actors now believe in the bakery.
        assert!(opinions.entity_confidence(&AgentId::new("agent_01"), "firm_bakery", t0()) > 0.0);
        assert!(opinions.entity_confidence(&AgentId::new("agent_02"), "firm_bakery", t0()) > 0.0);
    }

    #[test]
    fn test_tick_capacity_shared_across_usages() {
        let (mut engine, mut visibility, mut opinions) = setup(8);
        // Cap the channel to 10 reached agents per tick.
        engine
            .channels
            .get_mut(&ChannelId::new("ch_feed"))
            .unwrap()
            .tick_capacity = 10;
        let agents = roster(20);
        let mut rng = SmallRng::seed_from_u64(9);

        let first = engine
            .evaluate_usage(
                &post(Some("e"), None), &agents, 5, &mut visibility, &mut opinions,
                &BTreeMap::new(), &mut rng, t0(),
            )
            .unwrap();
        let second = engine
            .evaluate_usage(
                &post(Some("e"), None), &agents, 5, &mut visibility, &mut opinions,
                &BTreeMap::new(), &mut rng, t0(),
            )
            .unwrap();
        assert_eq!(first.attempted.len(), 8);
        assert_eq!(second.attempted.len(), 2, "only the remaining capacity is granted");

        // A new tick resets the counter.
        let third = engine
            .evaluate_usage(
                &post(Some("e"), None), &agents, 6, &mut visibility, &mut opinions,
                &BTreeMap::new(), &mut rng, t0(),
            )
            .unwrap();
        assert_eq!(third.attempted.len(), 8);
    }

    #[test]
    fn test_dm_targets_exactly_recipient() {
        let mut engine = DiffusionEngine::new(sim_id(), OpinionConfig::default());
        engine
            .create_channel(Channel {
                channel_id: ChannelId::new("ch_dm"),
                simulation_id: sim_id(),
                name: "dm".to_string(),
                topology: ChannelTopology::Dm,
                status: ChannelStatus::Active,
                config: ChannelConfig {
                    adoption_probability: 1.0,
                    ..ChannelConfig::default()
                },
                credibility: 0.9,
                latency_s: 0,
                reach_cap: 1,
                tick_capacity: 1,
            })
            .unwrap();
        let mut visibility = VisibilityLedger::new(sim_id(), VisibilityConfig::default());
        let mut opinions = OpinionStore::new(sim_id(), OpinionConfig::default());

        let usage = ChannelUsage {
            usage_id: generate_usage_id(),
            simulation_id: sim_id(),
            channel_id: ChannelId::new("ch_dm"),
            actor: AgentId::new("agent_00"),
            kind: UsageKind::DirectMessage,
            timestamp: t0(),
            recipient: Some(AgentId::new("agent_03")),
            place_ref: None,
            entity_ref: Some("firm_bakery".to_string()),
            message: "try the bakery".to_string(),
        };
        let mut rng = SmallRng::seed_from_u64(3);
        let outcome = engine
            .evaluate_usage(
                &usage, &roster(10), 0, &mut visibility, &mut opinions, &BTreeMap::new(),
                &mut rng, t0(),
            )
            .unwrap();
        assert_eq!(outcome.attempted, vec![AgentId::new("agent_03")]);
    }

    #[test]
    fn test_event_topology_spawns_intents() {
        let mut engine = DiffusionEngine::new(sim_id(), OpinionConfig::default());
        engine
            .create_channel(Channel {
                channel_id: ChannelId::new("ch_event"),
                simulation_id: sim_id(),
                name: "town events".to_string(),
                topology: ChannelTopology::Event,
                status: ChannelStatus::Active,
                config: ChannelConfig {
                    adoption_probability: 1.0,
                    ..ChannelConfig::default()
                },
                credibility: 0.8,
                latency_s: 0,
                reach_cap: 3,
                tick_capacity: 100,
            })
            .unwrap();
        let mut visibility = VisibilityLedger::new(sim_id(), VisibilityConfig::default());
        let mut opinions = OpinionStore::new(sim_id(), OpinionConfig::default());

        let usage = ChannelUsage {
            usage_id: generate_usage_id(),
            simulation_id: sim_id(),
            channel_id: ChannelId::new("ch_event"),
            actor: AgentId::new("agent_00"),
            kind: UsageKind::OrganizeEvent,
            timestamp: t0(),
            recipient: None,
            place_ref: Some(PoiId::new("poi_hall")),
            entity_ref: None,
            message: "potluck at the hall".to_string(),
        };
        let mut rng = SmallRng::seed_from_u64(3);
        let outcome = engine
            .evaluate_usage(
                &usage, &roster(6), 0, &mut visibility, &mut opinions, &BTreeMap::new(),
                &mut rng, t0(),
            )
            .unwrap();

        assert_eq!(outcome.adopters.len(), 3);
        assert_eq!(outcome.travel_intents.len(), 3);
        for (_, place) in &outcome.travel_intents {
            assert_eq!(place, &PoiId::new("poi_hall"));
        }
        for (organizer, _) in &outcome.conversation_intents {
            assert_eq!(organizer, &AgentId::new("agent_00"));
        }
    }
}
