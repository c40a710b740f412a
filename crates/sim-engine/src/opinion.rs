//! Opinion & Belief State
//!
//! Continuously updated summary statistics: scalar sentiment toward people
//! and places, and confidence in knowledge about external entities. All
//! updates go through one exponential-moving-average rule; inactivity decay
//! is applied lazily from `last_interaction`, so no background sweep exists
//! and replay stays deterministic.

use std::collections::HashMap;

use sim_state::{
    AgentId, DiscoverySource, EntityKind, KnowledgeEntity, KnowledgeRole, OpinionPerson,
    OpinionPlace, PoiId, SimTime, SimulationId,
};

use crate::config::OpinionConfig;

/// Neutral resting value opinion scores decay toward.
pub const NEUTRAL_OPINION: f64 = 0.5;

/// EMA update: `new = old + rate * (signal - old)`, clamped to [0, 1].
///
/// Rate 0 leaves the value unchanged; rate in (0, 1] moves it monotonically
/// toward the signal.
pub fn ema_update(old: f64, signal: f64, rate: f64) -> f64 {
    (old + rate * (signal - old)).clamp(0.0, 1.0)
}

/// Exponential decay of `value` toward `target` over `days`, with the
/// configured half-life.
pub fn decay_toward(value: f64, target: f64, days: f64, half_life_days: f64) -> f64 {
    if days <= 0.0 {
        return value;
    }
    target + (value - target) * 0.5_f64.powf(days / half_life_days)
}

/// Per-simulation opinion and belief tables.
#[derive(Debug)]
pub struct OpinionStore {
    simulation_id: SimulationId,
    persons: HashMap<(AgentId, AgentId), OpinionPerson>,
    places: HashMap<(AgentId, PoiId), OpinionPlace>,
    entities: HashMap<(AgentId, String), KnowledgeEntity>,
    roles: HashMap<(AgentId, AgentId, String), KnowledgeRole>,
    config: OpinionConfig,
}

impl OpinionStore {
    pub fn new(simulation_id: SimulationId, config: OpinionConfig) -> Self {
        Self {
            simulation_id,
            persons: HashMap::new(),
            places: HashMap::new(),
            entities: HashMap::new(),
            roles: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &OpinionConfig {
        &self.config
    }

    /// Applies a trust signal to (agent's opinion of `about`).
    ///
    /// Any decay owed since the last interaction is settled first, then the
    /// EMA update runs at `rate`.
    pub fn apply_trust_signal(
        &mut self,
        agent_id: &AgentId,
        about: &AgentId,
        signal: f64,
        rate: f64,
        now: SimTime,
    ) -> f64 {
        let half_life = self.config.decay_half_life_days;
        let simulation_id = self.simulation_id.clone();
        let row = self
            .persons
            .entry((agent_id.clone(), about.clone()))
            .or_insert_with(|| OpinionPerson {
                simulation_id,
                agent_id: agent_id.clone(),
                about: about.clone(),
                trust: NEUTRAL_OPINION,
                liking: NEUTRAL_OPINION,
                last_interaction: now,
            });
        let idle_days = now.days_since(row.last_interaction);
        row.trust = decay_toward(row.trust, NEUTRAL_OPINION, idle_days, half_life);
        row.liking = decay_toward(row.liking, NEUTRAL_OPINION, idle_days, half_life);
        row.trust = ema_update(row.trust, signal, rate);
        row.last_interaction = now;
        row.trust
    }

    /// Applies liking/satisfaction signals to (agent's opinion of a place).
    pub fn apply_place_signal(
        &mut self,
        agent_id: &AgentId,
        poi_id: &PoiId,
        liking_signal: f64,
        satisfaction_signal: f64,
        rate: f64,
        now: SimTime,
    ) {
        let half_life = self.config.decay_half_life_days;
        let simulation_id = self.simulation_id.clone();
        let row = self
            .places
            .entry((agent_id.clone(), poi_id.clone()))
            .or_insert_with(|| OpinionPlace {
                simulation_id,
                agent_id: agent_id.clone(),
                poi_id: poi_id.clone(),
                liking: NEUTRAL_OPINION,
                satisfaction: NEUTRAL_OPINION,
                last_interaction: now,
            });
        let idle_days = now.days_since(row.last_interaction);
        row.liking = decay_toward(row.liking, NEUTRAL_OPINION, idle_days, half_life);
        row.satisfaction = decay_toward(row.satisfaction, NEUTRAL_OPINION, idle_days, half_life);
        row.liking = ema_update(row.liking, liking_signal, rate);
        row.satisfaction = ema_update(row.satisfaction, satisfaction_signal, rate);
        row.last_interaction = now;
    }

    /// Creates or strengthens a belief about an external entity.
    pub fn reinforce_entity(
        &mut self,
        agent_id: &AgentId,
        entity_ref: &str,
        kind: EntityKind,
        confidence_signal: f64,
        rate: f64,
        source: DiscoverySource,
        now: SimTime,
    ) -> f64 {
        let half_life = self.config.decay_half_life_days;
        let simulation_id = self.simulation_id.clone();
        let row = self
            .entities
            .entry((agent_id.clone(), entity_ref.to_string()))
            .or_insert_with(|| KnowledgeEntity {
                simulation_id,
                agent_id: agent_id.clone(),
                entity_ref: entity_ref.to_string(),
                kind,
                confidence: 0.0,
                source,
                first_learned: now,
                last_reinforced: now,
            });
        let idle_days = now.days_since(row.last_reinforced);
        // Knowledge confidence decays toward zero, not toward neutral.
        row.confidence = decay_toward(row.confidence, 0.0, idle_days, half_life);
        row.confidence = ema_update(row.confidence, confidence_signal, rate);
        row.source = source;
        row.last_reinforced = now;
        row.confidence
    }

    /// Creates or strengthens a believed social role.
    pub fn reinforce_role(
        &mut self,
        agent_id: &AgentId,
        person: &AgentId,
        role: &str,
        confidence_signal: f64,
        rate: f64,
        source: DiscoverySource,
        now: SimTime,
    ) {
        let half_life = self.config.decay_half_life_days;
        let simulation_id = self.simulation_id.clone();
        let row = self
            .roles
            .entry((agent_id.clone(), person.clone(), role.to_string()))
            .or_insert_with(|| KnowledgeRole {
                simulation_id,
                agent_id: agent_id.clone(),
                person: person.clone(),
                role: role.to_string(),
                confidence: 0.0,
                source,
                last_reinforced: now,
            });
        let idle_days = now.days_since(row.last_reinforced);
        row.confidence = decay_toward(row.confidence, 0.0, idle_days, half_life);
        row.confidence = ema_update(row.confidence, confidence_signal, rate);
        row.source = source;
        row.last_reinforced = now;
    }

    /// Current trust of `agent_id` in `about`, with decay applied on the
    /// fly. Neutral if the pair never interacted.
    pub fn trust(&self, agent_id: &AgentId, about: &AgentId, now: SimTime) -> f64 {
        match self.persons.get(&(agent_id.clone(), about.clone())) {
            Some(row) => decay_toward(
                row.trust,
                NEUTRAL_OPINION,
                now.days_since(row.last_interaction),
                self.config.decay_half_life_days,
            ),
            None => NEUTRAL_OPINION,
        }
    }

    /// Current confidence in an entity belief, decayed; zero if unknown.
    pub fn entity_confidence(&self, agent_id: &AgentId, entity_ref: &str, now: SimTime) -> f64 {
        match self.entities.get(&(agent_id.clone(), entity_ref.to_string())) {
            Some(row) => decay_toward(
                row.confidence,
                0.0,
                now.days_since(row.last_reinforced),
                self.config.decay_half_life_days,
            ),
            None => 0.0,
        }
    }

    pub fn person_row(&self, agent_id: &AgentId, about: &AgentId) -> Option<&OpinionPerson> {
        self.persons.get(&(agent_id.clone(), about.clone()))
    }

    pub fn person_rows(&self) -> impl Iterator<Item = &OpinionPerson> {
        self.persons.values()
    }

    pub fn place_rows(&self) -> impl Iterator<Item = &OpinionPlace> {
        self.places.values()
    }

    pub fn entity_rows(&self) -> impl Iterator<Item = &KnowledgeEntity> {
        self.entities.values()
    }

    /// Restores persisted rows during replay.
    pub fn restore_person(&mut self, row: OpinionPerson) {
        self.persons
            .insert((row.agent_id.clone(), row.about.clone()), row);
    }

    pub fn restore_place(&mut self, row: OpinionPlace) {
        self.places
            .insert((row.agent_id.clone(), row.poi_id.clone()), row);
    }

    pub fn restore_entity(&mut self, row: KnowledgeEntity) {
        self.entities
            .insert((row.agent_id.clone(), row.entity_ref.clone()), row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> SimTime {
        SimTime::from_ymd_hms(2025, 6, 1, 8, 0, 0)
    }

    #[test]
    fn test_ema_rate_zero_is_identity() {
        assert_eq!(ema_update(0.42, 1.0, 0.0), 0.42);
        assert_eq!(ema_update(0.42, 0.0, 0.0), 0.42);
    }

    #[test]
    fn test_ema_moves_toward_signal() {
        let mut v = 0.1;
        for _ in 0..10 {
            let next = ema_update(v, 0.9, 0.3);
            assert!(next > v);
            assert!(next <= 0.9);
            v = next;
        }
        // Full rate jumps straight to the signal.
        assert_eq!(ema_update(0.1, 0.9, 1.0), 0.9);
    }

    #[test]
    fn test_ema_clamped() {
        assert_eq!(ema_update(0.95, 2.0, 1.0), 1.0);
        assert_eq!(ema_update(0.05, -1.0, 1.0), 0.0);
    }

    #[test]
    fn test_decay_halves_at_half_life() {
        let v = decay_toward(1.0, 0.5, 45.0, 45.0);
        assert!((v - 0.75).abs() < 1e-9);
        // No time, no decay.
        assert_eq!(decay_toward(1.0, 0.5, 0.0, 45.0), 1.0);
    }

    #[test]
    fn test_trust_signal_from_neutral() {
        let mut store = OpinionStore::new(SimulationId::new("sim"), OpinionConfig::default());
        let a = AgentId::new("a");
        let b = AgentId::new("b");

        assert_eq!(store.trust(&a, &b, t0()), NEUTRAL_OPINION);
        let after = store.apply_trust_signal(&a, &b, 1.0, 0.2, t0());
        assert!(after > NEUTRAL_OPINION);
        assert!((after - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_trust_decays_toward_neutral_when_idle() {
        let mut store = OpinionStore::new(SimulationId::new("sim"), OpinionConfig::default());
        let a = AgentId::new("a");
        let b = AgentId::new("b");

        store.apply_trust_signal(&a, &b, 1.0, 1.0, t0());
        assert_eq!(store.trust(&a, &b, t0()), 1.0);

        let much_later = t0().plus_seconds(90 * 86_400);
        let decayed = store.trust(&a, &b, much_later);
        assert!(decayed < 1.0);
        assert!(decayed > NEUTRAL_OPINION);
        // Two half-lives: 0.5 + 0.5 * 0.25 = 0.625
        assert!((decayed - 0.625).abs() < 1e-9);
    }

    #[test]
    fn test_entity_confidence_decays_toward_zero() {
        let mut store = OpinionStore::new(SimulationId::new("sim"), OpinionConfig::default());
        let a = AgentId::new("a");

        store.reinforce_entity(
            &a,
            "firm_bakery",
            EntityKind::Firm,
            1.0,
            1.0,
            DiscoverySource::Social,
            t0(),
        );
        assert_eq!(store.entity_confidence(&a, "firm_bakery", t0()), 1.0);

        let later = t0().plus_seconds(45 * 86_400);
        let decayed = store.entity_confidence(&a, "firm_bakery", later);
        assert!((decayed - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_reinforcement_strengthens_belief() {
        let mut store = OpinionStore::new(SimulationId::new("sim"), OpinionConfig::default());
        let a = AgentId::new("a");

        let first = store.reinforce_entity(
            &a,
            "place_diner",
            EntityKind::Place,
            0.8,
            0.3,
            DiscoverySource::Social,
            t0(),
        );
        let second = store.reinforce_entity(
            &a,
            "place_diner",
            EntityKind::Place,
            0.8,
            0.3,
            DiscoverySource::Social,
            t0().plus_seconds(3600),
        );
        assert!(second > first);
        assert!(second <= 0.8 + 1e-9);
    }

    #[test]
    fn test_role_belief() {
        let mut store = OpinionStore::new(SimulationId::new("sim"), OpinionConfig::default());
        let a = AgentId::new("a");
        let b = AgentId::new("b");
        store.reinforce_role(&a, &b, "selectboard", 0.9, 0.5, DiscoverySource::Social, t0());
        assert_eq!(store.roles.len(), 1);
    }
}
