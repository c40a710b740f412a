//! Identifier Types
//!
//! Newtype ids for every persisted entity. Agent ids are externally supplied
//! stable keys (voter-derived); the rest are generated here.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier of a simulation run; scopes every other entity.
    SimulationId
);
string_id!(
    /// Stable agent key, supplied by the external reference data.
    AgentId
);
string_id!(
    /// Point-of-interest id from the external catalog.
    PoiId
);
string_id!(
    /// Communication channel id.
    ChannelId
);
string_id!(
    /// Conversation id.
    ConversationId
);
string_id!(
    /// Commitment id.
    CommitmentId
);
string_id!(
    /// Route id.
    RouteId
);
string_id!(
    /// Channel usage event id.
    UsageId
);
string_id!(
    /// Innovation idea id.
    IdeaId
);
string_id!(
    /// Prototype id.
    PrototypeId
);

/// Generates a unique conversation id.
pub fn generate_conversation_id() -> ConversationId {
    ConversationId(format!("conv_{}", Uuid::new_v4().simple()))
}

/// Generates a unique commitment id.
pub fn generate_commitment_id() -> CommitmentId {
    CommitmentId(format!("cmt_{}", Uuid::new_v4().simple()))
}

/// Generates a unique route id.
pub fn generate_route_id() -> RouteId {
    RouteId(format!("route_{}", Uuid::new_v4().simple()))
}

/// Generates a unique channel usage id.
pub fn generate_usage_id() -> UsageId {
    UsageId(format!("use_{}", Uuid::new_v4().simple()))
}

/// Generates a unique innovation idea id.
pub fn generate_idea_id() -> IdeaId {
    IdeaId(format!("idea_{}", Uuid::new_v4().simple()))
}

/// Generates a unique prototype id.
pub fn generate_prototype_id() -> PrototypeId {
    PrototypeId(format!("proto_{}", Uuid::new_v4().simple()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        let id = AgentId::new("voter_0001");
        assert_eq!(id.to_string(), "voter_0001");
        assert_eq!(id.as_str(), "voter_0001");
    }

    #[test]
    fn test_generated_ids_unique() {
        let a = generate_conversation_id();
        let b = generate_conversation_id();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("conv_"));
    }

    #[test]
    fn test_id_serde_transparent_enough() {
        let id = PoiId::new("poi_42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""poi_42""#);
    }
}
