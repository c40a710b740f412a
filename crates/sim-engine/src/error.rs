//! Engine Error Taxonomy
//!
//! One error type covers the engine boundary. A single agent's failure
//! degrades only that agent's tick; only `ReplayInconsistency` is fatal for
//! a whole simulation.

use sim_state::{AgentId, ChannelId, RouteId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Origin/destination could not be geocoded or no path exists.
    /// The caller decides whether to retry with the fallback estimator.
    #[error("route resolution failed: {0}")]
    RouteResolution(String),

    /// Agent has neither route history nor a seed location.
    /// Fatal for that agent's tick; surfaced so the oracle seeds a location.
    #[error("no route history or seed location for agent '{0}'")]
    MobilityState(AgentId),

    /// A new route overlaps an existing route in the agent's timeline.
    #[error("route '{route_id}' overlaps an existing route for agent '{agent_id}'")]
    RouteOverlap { agent_id: AgentId, route_id: RouteId },

    /// Usage event against a channel in status `inactive`.
    #[error("channel '{0}' is inactive")]
    ChannelInactive(ChannelId),

    /// Malformed targeting/cost/friction configuration, rejected at creation.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Second conversation attempt on an ordered pair with one already active.
    #[error("conversation already active from '{initiator}' to '{recipient}'")]
    ConcurrentConversation { initiator: AgentId, recipient: AgentId },

    /// Persisted state violated an invariant on load. The simulation cannot
    /// resume.
    #[error("replay inconsistency: {0}")]
    ReplayInconsistency(String),

    /// Unknown entity reference (simulation, agent, channel, conversation).
    #[error("unknown {kind}: '{id}'")]
    UnknownReference { kind: &'static str, id: String },

    /// Illegal state-machine transition.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let e = EngineError::MobilityState(AgentId::new("voter_1"));
        assert!(e.to_string().contains("voter_1"));

        let e = EngineError::ConcurrentConversation {
            initiator: AgentId::new("a"),
            recipient: AgentId::new("b"),
        };
        assert!(e.to_string().contains("'a'"));
        assert!(e.to_string().contains("'b'"));
    }
}
