//! Persisted simulation state types.
//!
//! This crate contains pure data structures with no engine logic: it is the
//! durable contract for checkpointing and replay, and a dependency for all
//! other crates in the workspace. Every row is scoped by `SimulationId` and
//! cascade-deleted with its simulation.

pub mod channel;
pub mod geo;
pub mod ids;
pub mod innovation;
pub mod knowledge;
pub mod mobility;
pub mod simulation;
pub mod social;
pub mod time;

// Re-export time types
pub use time::{ParseGranularityError, ParseTimeError, SimTime, TickGranularity};

// Re-export geo types
pub use geo::{Coordinate, EARTH_RADIUS_KM};

// Re-export ids
pub use ids::{
    generate_commitment_id, generate_conversation_id, generate_idea_id, generate_prototype_id,
    generate_route_id, generate_usage_id, AgentId, ChannelId, CommitmentId, ConversationId,
    IdeaId, PoiId, PrototypeId, RouteId, SimulationId, UsageId,
};

// Re-export mobility rows
pub use mobility::{
    LocationSample, ParseModeError, Route, RouteProviderKind, TravelMode,
};

// Re-export social rows
pub use social::{
    Commitment, CommitmentStatus, Conversation, ConversationStatus, ConversationTurn, TurnKind,
};

// Re-export channel rows
pub use channel::{
    Channel, ChannelConfig, ChannelStatus, ChannelTopology, ChannelUsage, UsageKind,
};

// Re-export knowledge and opinion rows
pub use knowledge::{
    DiscoverySource, EntityKind, KnowledgeEntity, KnowledgeRole, OpinionPerson, OpinionPlace,
    PoiVisibility,
};

// Re-export innovation rows
pub use innovation::{IdeaStatus, InnovationIdea, Prototype, PrototypeStatus};

// Re-export simulation rows
pub use simulation::{AgentProfile, Simulation, SimulationStatus};
