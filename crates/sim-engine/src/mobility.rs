//! Mobility Tracker
//!
//! Answers "where is agent A at time T" from the agent's route timeline and
//! materializes periodic location samples for playback.
//!
//! Within a route, elapsed time maps to cumulative arc length along the
//! geometry, so uneven waypoint spacing is respected. Outside any route the
//! agent is stationary at the last completed route's destination, or at the
//! seed location before the first route.

use std::collections::HashMap;

use sim_state::{
    AgentId, Coordinate, LocationSample, PoiId, Route, RouteId, SimTime, SimulationId,
};

use crate::error::{EngineError, EngineResult};

/// A resolved position for one agent at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionFix {
    pub position: Coordinate,
    pub is_traveling: bool,
    pub active_route: Option<RouteId>,
    pub place_id: Option<PoiId>,
}

#[derive(Debug, Default)]
struct AgentTimeline {
    seed: Option<Coordinate>,
    /// Sorted by start_time; pairwise non-overlapping.
    routes: Vec<Route>,
}

/// Per-simulation position index over agent route timelines.
#[derive(Debug)]
pub struct MobilityTracker {
    simulation_id: SimulationId,
    timelines: HashMap<AgentId, AgentTimeline>,
}

impl MobilityTracker {
    pub fn new(simulation_id: SimulationId) -> Self {
        Self {
            simulation_id,
            timelines: HashMap::new(),
        }
    }

    /// Sets the agent's pre-first-route location (home).
    pub fn seed_agent(&mut self, agent_id: AgentId, home: Coordinate) {
        self.timelines.entry(agent_id).or_default().seed = Some(home);
    }

    /// Inserts a route, rejecting any overlap with the agent's existing
    /// timeline. At most one route is in flight per agent at any instant.
    pub fn insert_route(&mut self, route: Route) -> EngineResult<()> {
        if route.simulation_id != self.simulation_id {
            return Err(EngineError::UnknownReference {
                kind: "simulation",
                id: route.simulation_id.to_string(),
            });
        }
        if route.end_time < route.start_time {
            return Err(EngineError::InvalidTransition(format!(
                "route '{}' ends before it starts",
                route.route_id
            )));
        }

        let timeline = self.timelines.entry(route.agent_id.clone()).or_default();
        let overlaps = timeline.routes.iter().any(|existing| {
            route.start_time < existing.end_time && existing.start_time < route.end_time
        });
        if overlaps {
            return Err(EngineError::RouteOverlap {
                agent_id: route.agent_id.clone(),
                route_id: route.route_id.clone(),
            });
        }

        let idx = timeline
            .routes
            .partition_point(|existing| existing.start_time <= route.start_time);
        timeline.routes.insert(idx, route);
        Ok(())
    }

    /// All routes for an agent, in start-time order.
    pub fn routes_for(&self, agent_id: &AgentId) -> &[Route] {
        self.timelines
            .get(agent_id)
            .map(|t| t.routes.as_slice())
            .unwrap_or(&[])
    }

    /// Routes that complete within (from, to].
    pub fn routes_completing(&self, agent_id: &AgentId, from: SimTime, to: SimTime) -> Vec<&Route> {
        self.routes_for(agent_id)
            .iter()
            .filter(|r| r.end_time > from && r.end_time <= to)
            .collect()
    }

    /// Resolves the agent's position at `t`.
    ///
    /// Errors with `MobilityState` if the agent has no route history before
    /// `t` and no seed location.
    pub fn position_at(&self, agent_id: &AgentId, t: SimTime) -> EngineResult<PositionFix> {
        let timeline = self
            .timelines
            .get(agent_id)
            .ok_or_else(|| EngineError::MobilityState(agent_id.clone()))?;

        // In flight: t within [start, end) of some route. An instant route
        // (start == end) never counts as in flight.
        for route in &timeline.routes {
            if route.start_time <= t && t < route.end_time {
                return Ok(PositionFix {
                    position: position_along_route(route, t),
                    is_traveling: true,
                    active_route: Some(route.route_id.clone()),
                    place_id: None,
                });
            }
        }

        // Stationary at the most recent completed route's destination.
        let last_completed = timeline
            .routes
            .iter()
            .filter(|r| r.end_time <= t)
            .max_by_key(|r| r.end_time);
        if let Some(route) = last_completed {
            return Ok(PositionFix {
                position: route.destination,
                is_traveling: false,
                active_route: None,
                place_id: route.destination_place.clone(),
            });
        }

        // Before the first route: at the seed location.
        match timeline.seed {
            Some(home) => Ok(PositionFix {
                position: home,
                is_traveling: false,
                active_route: None,
                place_id: None,
            }),
            None => Err(EngineError::MobilityState(agent_id.clone())),
        }
    }

    /// Materializes location samples every `interval_s` seconds over
    /// [from, to], always including `to` itself.
    pub fn materialize_samples(
        &self,
        agent_id: &AgentId,
        from: SimTime,
        to: SimTime,
        interval_s: i64,
    ) -> EngineResult<Vec<LocationSample>> {
        let interval_s = interval_s.max(1);
        let mut samples = Vec::new();
        let mut t = from;
        while t <= to {
            samples.push(self.sample_at(agent_id, t)?);
            t = t.plus_seconds(interval_s);
        }
        if samples.last().map(|s| s.timestamp) != Some(to) {
            samples.push(self.sample_at(agent_id, to)?);
        }
        Ok(samples)
    }

    fn sample_at(&self, agent_id: &AgentId, t: SimTime) -> EngineResult<LocationSample> {
        let fix = self.position_at(agent_id, t)?;
        Ok(LocationSample {
            simulation_id: self.simulation_id.clone(),
            agent_id: agent_id.clone(),
            timestamp: t,
            position: fix.position,
            is_traveling: fix.is_traveling,
            active_route: fix.active_route,
            place_id: fix.place_id,
        })
    }
}

/// Interpolates a position along a route's geometry at time `t`.
///
/// Elapsed time maps to a fraction of the total arc length; the point at
/// that cumulative distance is found by walking the segments. Zero-duration
/// or zero-length routes resolve to the destination immediately.
pub fn position_along_route(route: &Route, t: SimTime) -> Coordinate {
    let total_duration = route.end_time.seconds_since(route.start_time);
    if total_duration <= 0 || route.geometry.len() < 2 {
        return route.destination;
    }

    let elapsed = t.seconds_since(route.start_time).clamp(0, total_duration);
    let fraction = elapsed as f64 / total_duration as f64;

    let mut cumulative = Vec::with_capacity(route.geometry.len());
    cumulative.push(0.0);
    for pair in route.geometry.windows(2) {
        let d = pair[0].haversine_km(pair[1]);
        cumulative.push(cumulative.last().copied().unwrap_or(0.0) + d);
    }
    let total_distance = *cumulative.last().unwrap_or(&0.0);
    if total_distance <= 0.0 {
        return route.destination;
    }

    let target = fraction * total_distance;
    for i in 0..cumulative.len() - 1 {
        if cumulative[i] <= target && target <= cumulative[i + 1] {
            let segment_length = cumulative[i + 1] - cumulative[i];
            let segment_progress = if segment_length > 0.0 {
                (target - cumulative[i]) / segment_length
            } else {
                0.0
            };
            return route.geometry[i].interpolate(route.geometry[i + 1], segment_progress);
        }
    }
    route.destination
}
