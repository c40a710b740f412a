//! Route Resolver
//!
//! Turns an (origin, destination, mode) decision into a timed route with a
//! cached network provider in front and a great-circle estimator behind it.

use std::collections::HashMap;

use sim_state::{
    generate_route_id, AgentId, Coordinate, Route, RouteProviderKind, SimTime, SimulationId,
    TravelMode,
};
use tracing::warn;

use crate::config::RoutingConfig;
use crate::error::{EngineError, EngineResult};

/// What the resolver asks a provider for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteRequest {
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub mode: TravelMode,
}

/// Distance, duration, and geometry returned by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPath {
    pub distance_km: f64,
    pub duration_s: i64,
    /// Ordered geometry including both endpoints.
    pub geometry: Vec<Coordinate>,
    pub provider: RouteProviderKind,
}

/// Provider failure modes. Transient failures are retried once; permanent
/// ones surface as `RouteResolution` errors.
#[derive(Debug, Clone)]
pub enum ProviderFailure {
    Transient(String),
    Permanent(String),
}

/// Seam for the external network routing backend.
pub trait RouteProvider {
    fn resolve(&self, request: &RouteRequest) -> Result<ResolvedPath, ProviderFailure>;
}

/// Straight-line fallback: haversine distance at the mode's default speed.
pub fn great_circle_estimate(request: &RouteRequest) -> ResolvedPath {
    let distance_km = request.origin.haversine_km(request.destination);
    let speed_kmh = request.mode.default_speed_kmh().max(0.1);
    let duration_s = (distance_km / speed_kmh * 3600.0).round() as i64;
    ResolvedPath {
        distance_km,
        duration_s,
        geometry: vec![request.origin, request.destination],
        provider: RouteProviderKind::GreatCircle,
    }
}

/// Decodes a Google/Valhalla encoded polyline.
///
/// `precision` is the coordinate scale exponent: 5 for classic polylines,
/// 6 for Valhalla's polyline6.
pub fn decode_polyline(encoded: &str, precision: u32) -> EngineResult<Vec<Coordinate>> {
    let scale = 10_f64.powi(precision as i32);
    let bytes = encoded.as_bytes();
    let mut coords = Vec::new();
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lon: i64 = 0;

    let next_varint = |index: &mut usize| -> EngineResult<i64> {
        let mut result: i64 = 0;
        let mut shift = 0;
        loop {
            let byte = *bytes.get(*index).ok_or_else(|| {
                EngineError::RouteResolution("truncated polyline".to_string())
            })?;
            let b = i64::from(byte) - 63;
            if b < 0 {
                return Err(EngineError::RouteResolution(
                    "invalid polyline byte".to_string(),
                ));
            }
            *index += 1;
            result |= (b & 0x1f) << shift;
            shift += 5;
            if b < 0x20 {
                break;
            }
        }
        Ok(if result & 1 != 0 { !(result >> 1) } else { result >> 1 })
    };

    while index < bytes.len() {
        lat += next_varint(&mut index)?;
        lon += next_varint(&mut index)?;
        coords.push(Coordinate::new(lat as f64 / scale, lon as f64 / scale));
    }
    Ok(coords)
}

// Cache key: coordinates rounded to 4 decimals (~11 m), plus mode.
type CacheKey = (i64, i64, i64, i64, TravelMode);

fn cache_key(request: &RouteRequest) -> CacheKey {
    let r = |v: f64| (v * 1e4).round() as i64;
    (
        r(request.origin.lat),
        r(request.origin.lon),
        r(request.destination.lat),
        r(request.destination.lon),
        request.mode,
    )
}

/// Bounded LRU over resolved paths.
struct PathCache {
    max_size: usize,
    store: HashMap<CacheKey, (ResolvedPath, u64)>,
    counter: u64,
}

impl PathCache {
    fn new(max_size: usize) -> Self {
        Self {
            max_size,
            store: HashMap::new(),
            counter: 0,
        }
    }

    fn get(&mut self, key: &CacheKey) -> Option<ResolvedPath> {
        self.counter += 1;
        let counter = self.counter;
        self.store.get_mut(key).map(|(path, stamp)| {
            *stamp = counter;
            path.clone()
        })
    }

    fn set(&mut self, key: CacheKey, value: ResolvedPath) {
        self.counter += 1;
        self.store.insert(key, (value, self.counter));
        if self.store.len() > self.max_size {
            if let Some(oldest) = self
                .store
                .iter()
                .min_by_key(|(_, (_, stamp))| *stamp)
                .map(|(k, _)| k.clone())
            {
                self.store.remove(&oldest);
            }
        }
    }
}

/// Resolves decisions into timed routes.
pub struct RouteResolver {
    provider: Option<Box<dyn RouteProvider>>,
    cache: PathCache,
    retry_transient: bool,
}

impl RouteResolver {
    pub fn new(config: &RoutingConfig, provider: Option<Box<dyn RouteProvider>>) -> Self {
        Self {
            provider,
            cache: PathCache::new(config.cache_size),
            retry_transient: config.retry_transient,
        }
    }

    /// Resolver with no network provider; everything is estimated.
    pub fn offline(config: &RoutingConfig) -> Self {
        Self::new(config, None)
    }

    /// Resolves a path, consulting the cache, then the provider (with one
    /// retry on transient failure), then the great-circle estimator.
    pub fn resolve_path(&mut self, request: &RouteRequest) -> EngineResult<ResolvedPath> {
        let key = cache_key(request);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let path = match &self.provider {
            Some(provider) => match provider.resolve(request) {
                Ok(path) => path,
                Err(ProviderFailure::Transient(msg)) if self.retry_transient => {
                    match provider.resolve(request) {
                        Ok(path) => path,
                        Err(_) => {
                            warn!(reason = %msg, "route provider unavailable, falling back to great-circle estimate");
                            great_circle_estimate(request)
                        }
                    }
                }
                Err(ProviderFailure::Transient(msg)) => {
                    warn!(reason = %msg, "route provider unavailable, falling back to great-circle estimate");
                    great_circle_estimate(request)
                }
                Err(ProviderFailure::Permanent(msg)) => {
                    return Err(EngineError::RouteResolution(msg));
                }
            },
            None => great_circle_estimate(request),
        };

        self.cache.set(key, path.clone());
        Ok(path)
    }

    /// Resolves a full route row for an agent departing at `start_time`.
    pub fn resolve_route(
        &mut self,
        simulation_id: &SimulationId,
        agent_id: &AgentId,
        request: &RouteRequest,
        start_time: SimTime,
    ) -> EngineResult<Route> {
        let path = self.resolve_path(request)?;
        Ok(Route {
            route_id: generate_route_id(),
            simulation_id: simulation_id.clone(),
            agent_id: agent_id.clone(),
            start_time,
            end_time: start_time.plus_seconds(path.duration_s),
            origin: request.origin,
            destination: request.destination,
            destination_place: None,
            mode: request.mode,
            distance_km: path.distance_km,
            duration_s: path.duration_s,
            geometry: path.geometry,
            provider: path.provider,
        })
    }
}
