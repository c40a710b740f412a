//! Mobility Rows
//!
//! Routes and the interpolated location samples derived from them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::geo::Coordinate;
use crate::ids::{AgentId, PoiId, RouteId, SimulationId};
use crate::time::SimTime;

/// Travel mode for a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelMode {
    Auto,
    #[default]
    Pedestrian,
    Bicycle,
}

impl TravelMode {
    /// Fallback cruising speed used by the great-circle estimator, in km/h.
    pub fn default_speed_kmh(self) -> f64 {
        match self {
            TravelMode::Auto => 45.0,
            TravelMode::Pedestrian => 5.0,
            TravelMode::Bicycle => 16.0,
        }
    }
}

impl fmt::Display for TravelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TravelMode::Auto => write!(f, "auto"),
            TravelMode::Pedestrian => write!(f, "pedestrian"),
            TravelMode::Bicycle => write!(f, "bicycle"),
        }
    }
}

/// Error type for parsing TravelMode from strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseModeError(pub String);

impl fmt::Display for ParseModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown travel mode: '{}'", self.0)
    }
}

impl std::error::Error for ParseModeError {}

impl FromStr for TravelMode {
    type Err = ParseModeError;

    /// Parses a mode, accepting the common aliases (car/drive, walk, bike).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" | "car" | "drive" => Ok(TravelMode::Auto),
            "pedestrian" | "walk" => Ok(TravelMode::Pedestrian),
            "bicycle" | "bike" => Ok(TravelMode::Bicycle),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}

/// Which backend produced a route's distance/duration/geometry.
///
/// `GreatCircle` marks the straight-line estimate used when the network
/// provider is unavailable, so consumers can tell estimated geometry from
/// precise geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteProviderKind {
    Network,
    GreatCircle,
}

/// A timed, resolved route for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub route_id: RouteId,
    pub simulation_id: SimulationId,
    pub agent_id: AgentId,
    pub start_time: SimTime,
    pub end_time: SimTime,
    pub origin: Coordinate,
    pub destination: Coordinate,
    /// Symbolic destination place, when the trip targets a known POI.
    pub destination_place: Option<PoiId>,
    pub mode: TravelMode,
    pub distance_km: f64,
    pub duration_s: i64,
    /// Ordered path geometry including both endpoints.
    pub geometry: Vec<Coordinate>,
    pub provider: RouteProviderKind,
}

/// A materialized, interpolated position for fast playback.
///
/// Derived state: samples are regenerated from routes, never edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSample {
    pub simulation_id: SimulationId,
    pub agent_id: AgentId,
    pub timestamp: SimTime,
    pub position: Coordinate,
    pub is_traveling: bool,
    /// Route in flight at this instant, if any (non-owning reference).
    pub active_route: Option<RouteId>,
    /// Place the agent is at when stationary.
    pub place_id: Option<PoiId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_aliases() {
        assert_eq!("car".parse::<TravelMode>().unwrap(), TravelMode::Auto);
        assert_eq!("drive".parse::<TravelMode>().unwrap(), TravelMode::Auto);
        assert_eq!("walk".parse::<TravelMode>().unwrap(), TravelMode::Pedestrian);
        assert_eq!("Bike".parse::<TravelMode>().unwrap(), TravelMode::Bicycle);
        assert!("teleport".parse::<TravelMode>().is_err());
    }

    #[test]
    fn test_mode_default_speeds() {
        assert_eq!(TravelMode::Auto.default_speed_kmh(), 45.0);
        assert_eq!(TravelMode::Pedestrian.default_speed_kmh(), 5.0);
        assert_eq!(TravelMode::Bicycle.default_speed_kmh(), 16.0);
    }

    #[test]
    fn test_provider_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&RouteProviderKind::GreatCircle).unwrap(),
            r#""great_circle""#
        );
        assert_eq!(
            serde_json::to_string(&RouteProviderKind::Network).unwrap(),
            r#""network""#
        );
    }
}
