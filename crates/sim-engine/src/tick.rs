//! Tick Runner
//!
//! Advances the simulation clock one granularity step at a time and applies
//! each tick's effects in a fixed order: route completions, matured channel
//! effects, due commitments, then fresh agent intents. The runner owns the
//! only RNG, so a seed fully determines a run.

use std::collections::VecDeque;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use sim_state::{
    AgentId, ChannelId, ConversationId, ConversationStatus, Coordinate, PoiId, SimTime,
    Simulation, SimulationId, TickGranularity, TravelMode, TurnKind,
};
use tracing::{debug, warn};

use crate::commitment::CommitmentResolution;
use crate::conversation::ConversationOutcome;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::ledger::{ActionKind, ActionLedger, ActionRecord};
use crate::routing::{RouteRequest, RouteResolver};
use crate::store::SimulationContext;

/// The simulation clock: a cursor over [start, end] stepping by the tick
/// granularity, never past `end`.
#[derive(Debug, Clone)]
pub struct SimClock {
    pub simulation_id: SimulationId,
    pub start: SimTime,
    pub current: SimTime,
    pub granularity: TickGranularity,
    pub end: SimTime,
}

impl SimClock {
    pub fn new(simulation: &Simulation) -> Self {
        Self {
            simulation_id: simulation.simulation_id.clone(),
            start: simulation.start_time,
            current: simulation.start_time,
            granularity: simulation.granularity,
            end: simulation.end_time,
        }
    }

    /// Zero-based index of the tick that ends at `current`.
    pub fn tick_index(&self) -> u64 {
        let elapsed = self.current.seconds_since(self.start);
        (elapsed / self.granularity.seconds()) as u64
    }

    pub fn is_finished(&self) -> bool {
        self.current >= self.end
    }

    /// Advances one tick, capped at `end`. Returns the covered window
    /// (previous, new current], or `None` once the end is reached.
    pub fn advance_tick(&mut self) -> Option<(SimTime, SimTime)> {
        if self.is_finished() {
            return None;
        }
        let prev = self.current;
        let next = prev.plus_seconds(self.granularity.seconds());
        self.current = if next > self.end { self.end } else { next };
        Some((prev, self.current))
    }
}

/// What an agent wants to do this tick. The engine executes intentions; it
/// never invents them.
#[derive(Debug, Clone)]
pub enum AgentIntent {
    Travel {
        destination: Coordinate,
        place: Option<PoiId>,
        mode: TravelMode,
    },
    Visit {
        place: PoiId,
    },
    Converse {
        with: AgentId,
        channel: ChannelId,
        opening_message: String,
    },
    Post {
        channel: ChannelId,
        place_ref: Option<PoiId>,
        entity_ref: Option<String>,
        message: String,
    },
    OrganizeEvent {
        channel: ChannelId,
        venue: PoiId,
        message: String,
    },
    ProposeIdea {
        title: String,
    },
}

/// Source of agent decisions, queried once per agent per tick.
pub trait DecisionOracle {
    fn decide(
        &mut self,
        agent: &AgentId,
        now: SimTime,
        tick_index: u64,
        context: &SimulationContext,
    ) -> Option<AgentIntent>;
}

/// An oracle that replays a pre-written script keyed by (tick, agent).
/// Ships for the demo binary and tests.
#[derive(Default)]
pub struct ScriptedOracle {
    script: Vec<(u64, AgentId, AgentIntent)>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, tick: u64, agent: AgentId, intent: AgentIntent) {
        self.script.push((tick, agent, intent));
    }
}

impl DecisionOracle for ScriptedOracle {
    fn decide(
        &mut self,
        agent: &AgentId,
        _now: SimTime,
        tick_index: u64,
        _context: &SimulationContext,
    ) -> Option<AgentIntent> {
        let position = self
            .script
            .iter()
            .position(|(tick, who, _)| *tick == tick_index && who == agent)?;
        Some(self.script.remove(position).2)
    }
}

/// What one tick did, for the caller's logging.
#[derive(Debug)]
pub struct TickSummary {
    pub tick_index: u64,
    pub now: SimTime,
    pub completed_routes: usize,
    pub pass_by_exposures: usize,
    pub usages_applied: usize,
    pub conversations_opened: usize,
    pub conversations_completed: usize,
    pub commitments_resolved: usize,
    pub intents_executed: usize,
    pub intents_deferred: usize,
}

struct DeferredStep {
    agent: AgentId,
    intent: AgentIntent,
}

/// Drives one simulation: clock, route resolver, RNG, action ledger, and
/// the bounded carry-over queue for steps a tick could not absorb.
pub struct TickRunner {
    clock: SimClock,
    resolver: RouteResolver,
    rng: SmallRng,
    ledger: ActionLedger,
    deferred: VecDeque<DeferredStep>,
    max_deferred: usize,
    sample_interval_s: i64,
}

impl TickRunner {
    pub fn new(
        simulation: &Simulation,
        config: &EngineConfig,
        resolver: RouteResolver,
        ledger: ActionLedger,
        seed: u64,
    ) -> Self {
        Self {
            clock: SimClock::new(simulation),
            resolver,
            rng: SmallRng::seed_from_u64(seed),
            ledger,
            deferred: VecDeque::new(),
            max_deferred: config.clock.max_deferred_steps,
            sample_interval_s: config.clock.sample_interval_s,
        }
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn ledger(&self) -> &ActionLedger {
        &self.ledger
    }

    pub fn into_ledger(self) -> ActionLedger {
        self.ledger
    }

    /// Runs one tick against the context. Returns `None` once the clock
    /// has reached the simulation's end.
    pub fn run_tick(
        &mut self,
        context: &mut SimulationContext,
        oracle: &mut dyn DecisionOracle,
    ) -> EngineResult<Option<TickSummary>> {
        let Some((prev, now)) = self.clock.advance_tick() else {
            return Ok(None);
        };
        let tick_index = self.clock.tick_index();
        let mut summary = TickSummary {
            tick_index,
            now,
            completed_routes: 0,
            pass_by_exposures: 0,
            usages_applied: 0,
            conversations_opened: 0,
            conversations_completed: 0,
            commitments_resolved: 0,
            intents_executed: 0,
            intents_deferred: 0,
        };
        let roster = context.roster();

        // 1. Route completions: exposures along the path, then the arrival
        // itself. Order per action is fixed: route, visibility, opinion.
        for agent in &roster {
            let completed: Vec<_> = context
                .mobility
                .routes_completing(agent, prev, now)
                .into_iter()
                .cloned()
                .collect();
            for route in completed {
                let catalog: Vec<_> = context.catalog.values().cloned().collect();
                let noted = context
                    .visibility
                    .process_route_exposures(&route, &catalog, &mut self.rng);
                summary.pass_by_exposures += noted.len();

                if let Some(place) = &route.destination_place {
                    if let Some(poi) = context.catalog.get(place).cloned() {
                        context.visibility.record_visit(
                            agent,
                            &poi,
                            route.end_time,
                            sim_state::DiscoverySource::Need,
                        );
                    }
                    let action_id = self.ledger.next_id();
                    self.ledger.record(&ActionRecord {
                        action_id,
                        simulation_id: context.simulation.simulation_id.clone(),
                        agent_id: agent.clone(),
                        kind: ActionKind::Visit,
                        timestamp: route.end_time,
                        route_id: Some(route.route_id.clone()),
                        location: Some(route.destination),
                        place_id: Some(place.clone()),
                        detail: format!("arrived at {}", place),
                    })?;
                }
                summary.completed_routes += 1;
            }
        }

        // 2. Channel effects whose latency has elapsed.
        let ready = context.diffusion.drain_ready(now);
        for usage in ready {
            let outcome = context.diffusion.evaluate_usage(
                &usage,
                &roster,
                tick_index,
                &mut context.visibility,
                &mut context.opinions,
                &context.catalog,
                &mut self.rng,
                now,
            )?;
            summary.usages_applied += 1;

            for (adopter, venue) in outcome.travel_intents {
                self.defer(adopter, AgentIntent::Travel {
                    destination: match context.catalog.get(&venue) {
                        Some(poi) => poi.position,
                        None => continue,
                    },
                    place: Some(venue),
                    mode: TravelMode::Pedestrian,
                });
            }
            for (organizer, attendee) in outcome.conversation_intents {
                self.defer(organizer, AgentIntent::Converse {
                    with: attendee,
                    channel: usage.channel_id.clone(),
                    opening_message: usage.message.clone(),
                });
            }
        }

        // 3. Commitments past due. The trust hit lands on how the
        // counterparty sees the promiser.
        let resolutions = context.commitments.resolve_due(now, &context.conversations);
        summary.commitments_resolved = resolutions.len();
        apply_resolutions(context, &resolutions);

        // Conversations that have run through a full tick wrap up; their
        // trust signals land on both directed opinion rows. Ordered by
        // (started_at, pair) rather than id, which is not seed-derived.
        let mut ending: Vec<(SimTime, AgentId, AgentId, ConversationId)> = context
            .conversations
            .conversations()
            .filter(|c| c.status == ConversationStatus::Active && c.started_at <= prev)
            .map(|c| {
                (
                    c.started_at,
                    c.initiator.clone(),
                    c.recipient.clone(),
                    c.conversation_id.clone(),
                )
            })
            .collect();
        ending.sort();
        for (_, _, _, id) in &ending {
            complete_conversation(context, id, now)?;
            summary.conversations_completed += 1;
        }

        // 4. Carried-over steps from earlier ticks, then fresh intents.
        let carried: Vec<DeferredStep> = self.deferred.drain(..).collect();
        for step in carried {
            self.execute_intent(context, &step.agent, step.intent, now, &mut summary)?;
        }
        for agent in &roster {
            if let Some(intent) = oracle.decide(agent, now, tick_index, context) {
                self.execute_intent(context, agent, intent, now, &mut summary)?;
            }
        }

        // Tick counters older than this tick can no longer be consulted.
        context.diffusion.expire_tick_counters(tick_index);
        debug!(
            tick = tick_index,
            now = %now,
            routes = summary.completed_routes,
            usages = summary.usages_applied,
            resolved = summary.commitments_resolved,
            "tick applied"
        );
        Ok(Some(summary))
    }

    /// Materializes location samples for every agent over the whole run so
    /// far, at the configured interval.
    pub fn materialize_all_samples(
        &self,
        context: &SimulationContext,
    ) -> EngineResult<Vec<sim_state::LocationSample>> {
        let mut samples = Vec::new();
        for agent in context.roster() {
            samples.extend(context.mobility.materialize_samples(
                &agent,
                self.clock.start,
                self.clock.current,
                self.sample_interval_s,
            )?);
        }
        Ok(samples)
    }

    fn defer(&mut self, agent: AgentId, intent: AgentIntent) {
        if self.deferred.len() >= self.max_deferred {
            warn!(agent = %agent, "deferred-step queue full, intent dropped");
            return;
        }
        self.deferred.push_back(DeferredStep { agent, intent });
    }

    fn execute_intent(
        &mut self,
        context: &mut SimulationContext,
        agent: &AgentId,
        intent: AgentIntent,
        now: SimTime,
        summary: &mut TickSummary,
    ) -> EngineResult<()> {
        match intent {
            AgentIntent::Travel {
                destination,
                place,
                mode,
            } => {
                let fix = context.mobility.position_at(agent, now)?;
                if fix.is_traveling {
                    // Already in flight; try again next tick.
                    summary.intents_deferred += 1;
                    self.defer(agent.clone(), AgentIntent::Travel {
                        destination,
                        place,
                        mode,
                    });
                    return Ok(());
                }
                let request = RouteRequest {
                    origin: fix.position,
                    destination,
                    mode,
                };
                let mut route = self.resolver.resolve_route(
                    &context.simulation.simulation_id,
                    agent,
                    &request,
                    now,
                )?;
                route.destination_place = place;
                let route_id = route.route_id.clone();
                context.mobility.insert_route(route)?;
                let action_id = self.ledger.next_id();
                self.ledger.record(&ActionRecord {
                    action_id,
                    simulation_id: context.simulation.simulation_id.clone(),
                    agent_id: agent.clone(),
                    kind: ActionKind::Travel,
                    timestamp: now,
                    route_id: Some(route_id),
                    location: Some(fix.position),
                    place_id: None,
                    detail: "departed".to_string(),
                })?;
            }
            AgentIntent::Visit { place } => {
                let poi = context.catalog.get(&place).cloned().ok_or_else(|| {
                    EngineError::UnknownReference {
                        kind: "poi",
                        id: place.to_string(),
                    }
                })?;
                context.visibility.record_visit(
                    agent,
                    &poi,
                    now,
                    sim_state::DiscoverySource::Need,
                );
                let action_id = self.ledger.next_id();
                self.ledger.record(&ActionRecord {
                    action_id,
                    simulation_id: context.simulation.simulation_id.clone(),
                    agent_id: agent.clone(),
                    kind: ActionKind::Visit,
                    timestamp: now,
                    route_id: None,
                    location: Some(poi.position),
                    place_id: Some(place),
                    detail: "visited".to_string(),
                })?;
            }
            AgentIntent::Converse {
                with,
                channel,
                opening_message,
            } => {
                let channel_row = context.diffusion.channel(&channel)?.clone();
                match context
                    .conversations
                    .open(agent, &with, &channel_row, now)
                {
                    Ok(conversation_id) => {
                        context.conversations.append_turn(
                            &conversation_id,
                            agent,
                            opening_message,
                            TurnKind::Text,
                            now,
                        )?;
                        summary.conversations_opened += 1;
                        let action_id = self.ledger.next_id();
                        self.ledger.record(&ActionRecord {
                            action_id,
                            simulation_id: context.simulation.simulation_id.clone(),
                            agent_id: agent.clone(),
                            kind: ActionKind::Converse,
                            timestamp: now,
                            route_id: None,
                            location: None,
                            place_id: None,
                            detail: format!("opened conversation with {}", with),
                        })?;
                    }
                    Err(EngineError::ConcurrentConversation { .. }) => {
                        // The pair is busy; the intent is dropped, not queued.
                        debug!(initiator = %agent, recipient = %with, "pair busy, intent dropped");
                    }
                    Err(e) => return Err(e),
                }
            }
            AgentIntent::Post {
                channel,
                place_ref,
                entity_ref,
                message,
            } => {
                let usage = sim_state::ChannelUsage {
                    usage_id: sim_state::generate_usage_id(),
                    simulation_id: context.simulation.simulation_id.clone(),
                    channel_id: channel,
                    actor: agent.clone(),
                    kind: sim_state::UsageKind::Post,
                    timestamp: now,
                    recipient: None,
                    place_ref,
                    entity_ref,
                    message,
                };
                context.diffusion.submit_usage(usage)?;
                let action_id = self.ledger.next_id();
                self.ledger.record(&ActionRecord {
                    action_id,
                    simulation_id: context.simulation.simulation_id.clone(),
                    agent_id: agent.clone(),
                    kind: ActionKind::Post,
                    timestamp: now,
                    route_id: None,
                    location: None,
                    place_id: None,
                    detail: "posted".to_string(),
                })?;
            }
            AgentIntent::OrganizeEvent {
                channel,
                venue,
                message,
            } => {
                let usage = sim_state::ChannelUsage {
                    usage_id: sim_state::generate_usage_id(),
                    simulation_id: context.simulation.simulation_id.clone(),
                    channel_id: channel,
                    actor: agent.clone(),
                    kind: sim_state::UsageKind::OrganizeEvent,
                    timestamp: now,
                    recipient: None,
                    place_ref: Some(venue.clone()),
                    entity_ref: None,
                    message,
                };
                context.diffusion.submit_usage(usage)?;
                let action_id = self.ledger.next_id();
                self.ledger.record(&ActionRecord {
                    action_id,
                    simulation_id: context.simulation.simulation_id.clone(),
                    agent_id: agent.clone(),
                    kind: ActionKind::OrganizeEvent,
                    timestamp: now,
                    route_id: None,
                    location: None,
                    place_id: Some(venue),
                    detail: "organized event".to_string(),
                })?;
            }
            AgentIntent::ProposeIdea { title } => {
                let idea_id = sim_state::generate_idea_id();
                context
                    .innovation
                    .propose_idea(idea_id, agent, &title, now);
                let action_id = self.ledger.next_id();
                self.ledger.record(&ActionRecord {
                    action_id,
                    simulation_id: context.simulation.simulation_id.clone(),
                    agent_id: agent.clone(),
                    kind: ActionKind::ProposeIdea,
                    timestamp: now,
                    route_id: None,
                    location: None,
                    place_id: None,
                    detail: title,
                })?;
            }
        }
        summary.intents_executed += 1;
        Ok(())
    }
}

/// Applies commitment resolutions to the opinion store. Broken promises
/// cost the promiser trust in the counterparty's eyes.
pub fn apply_resolutions(context: &mut SimulationContext, resolutions: &[CommitmentResolution]) {
    let rate = context.opinions.config().commitment_rate;
    for resolution in resolutions {
        context.opinions.apply_trust_signal(
            &resolution.counterparty,
            &resolution.promiser,
            resolution.trust_signal,
            rate,
            resolution.resolved_at,
        );
    }
}

/// Completes a conversation and applies both trust signals to the paired
/// opinion rows at the conversation rate. Each side's commitment balance
/// within the conversation feeds the other side's signal.
pub fn complete_conversation(
    context: &mut SimulationContext,
    id: &ConversationId,
    now: SimTime,
) -> EngineResult<ConversationOutcome> {
    let (initiator, recipient, channel_id) = {
        let conversation =
            context
                .conversations
                .get(id)
                .ok_or_else(|| EngineError::UnknownReference {
                    kind: "conversation",
                    id: id.to_string(),
                })?;
        (
            conversation.initiator.clone(),
            conversation.recipient.clone(),
            conversation.channel_id.clone(),
        )
    };
    let credibility = context.diffusion.channel(&channel_id)?.credibility;
    let initiator_balance = context.commitments.balance_for(id, &initiator);
    let recipient_balance = context.commitments.balance_for(id, &recipient);

    let outcome = context.conversations.complete(
        id,
        now,
        initiator_balance,
        recipient_balance,
        credibility,
    )?;
    let rate = context.opinions.config().conversation_rate;
    context.opinions.apply_trust_signal(
        &initiator,
        &recipient,
        outcome.signal_about_recipient,
        rate,
        now,
    );
    context.opinions.apply_trust_signal(
        &recipient,
        &initiator,
        outcome.signal_about_initiator,
        rate,
        now,
    );
    Ok(outcome)
}
