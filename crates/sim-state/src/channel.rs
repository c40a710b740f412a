//! Channel Rows
//!
//! Communication media and the append-only usage log recorded against them.

use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, ChannelId, PoiId, SimulationId, UsageId};
use crate::time::SimTime;

/// Structural pattern of a channel: direct message, broadcast feed, or
/// organized event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelTopology {
    Dm,
    Feed,
    Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    #[default]
    Active,
    Inactive,
}

/// Targeting, cost, and friction parameters of a channel.
///
/// Validated once at channel creation; usage-time code may assume the
/// invariants hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Probability that an exposed agent adopts the carried knowledge, in [0,1].
    pub adoption_probability: f64,
    /// Minimum prior affinity (knowledge strength) an agent needs to be
    /// targeted at all, in [0,1]. Zero targets everyone.
    pub min_affinity: f64,
    /// Cost to the actor of one usage event, in arbitrary non-negative units.
    pub cost_per_use: f64,
    /// Friction discount applied to adoption probability, in [0,1];
    /// 0 means frictionless.
    pub friction: f64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            adoption_probability: 0.25,
            min_affinity: 0.0,
            cost_per_use: 0.0,
            friction: 0.0,
        }
    }
}

/// A communication medium agents post to, message over, or organize through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub channel_id: ChannelId,
    pub simulation_id: SimulationId,
    pub name: String,
    pub topology: ChannelTopology,
    pub status: ChannelStatus,
    pub config: ChannelConfig,
    /// Baseline credibility of content carried by this channel, in [0,1].
    pub credibility: f64,
    /// Delay before a usage event's effects become observable, in seconds.
    pub latency_s: i64,
    /// Maximum agents reached per usage event.
    pub reach_cap: u32,
    /// Maximum agents reached across all usage events in one tick.
    pub tick_capacity: u32,
}

/// What a usage event did on its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageKind {
    Post,
    DirectMessage,
    OrganizeEvent,
}

/// One append-only entry in a channel's usage log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelUsage {
    pub usage_id: UsageId,
    pub simulation_id: SimulationId,
    pub channel_id: ChannelId,
    pub actor: AgentId,
    pub kind: UsageKind,
    pub timestamp: SimTime,
    /// DM recipient; required for `DirectMessage`, ignored otherwise.
    pub recipient: Option<AgentId>,
    /// Place the content refers to (the event venue for `OrganizeEvent`).
    pub place_ref: Option<PoiId>,
    /// Knowledge payload: the external entity the content is about.
    pub entity_ref: Option<String>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topology_serialization() {
        assert_eq!(serde_json::to_string(&ChannelTopology::Dm).unwrap(), r#""dm""#);
        assert_eq!(serde_json::to_string(&ChannelTopology::Feed).unwrap(), r#""feed""#);
        assert_eq!(serde_json::to_string(&ChannelTopology::Event).unwrap(), r#""event""#);
    }

    #[test]
    fn test_default_config_in_bounds() {
        let cfg = ChannelConfig::default();
        assert!((0.0..=1.0).contains(&cfg.adoption_probability));
        assert!((0.0..=1.0).contains(&cfg.min_affinity));
        assert!(cfg.cost_per_use >= 0.0);
        assert!((0.0..=1.0).contains(&cfg.friction));
    }
}
