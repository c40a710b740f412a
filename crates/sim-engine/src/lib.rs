//! Engine logic: routing, mobility, visibility, diffusion, commitments,
//! the tick runner, and replay.

pub mod commitment;
pub mod config;
pub mod conversation;
pub mod diffusion;
pub mod error;
pub mod innovation;
pub mod ledger;
pub mod mobility;
pub mod opinion;
pub mod replay;
pub mod routing;
pub mod store;
pub mod tick;
pub mod visibility;

pub use commitment::{CommitmentResolution, CommitmentTracker};
pub use config::{ConfigError, EngineConfig};
pub use conversation::{ConversationOutcome, ConversationRegistry};
pub use diffusion::{DiffusionEngine, DiffusionOutcome};
pub use error::{EngineError, EngineResult};
pub use innovation::InnovationBoard;
pub use ledger::{ActionKind, ActionLedger, ActionRecord};
pub use mobility::MobilityTracker;
pub use opinion::OpinionStore;
pub use replay::{load_snapshot, snapshot_context, SimulationSnapshot};
pub use routing::{RouteProvider, RouteRequest, RouteResolver};
pub use store::{SimulationContext, SimulationStore};
pub use tick::{AgentIntent, DecisionOracle, ScriptedOracle, SimClock, TickRunner};
pub use visibility::{PoiRef, VisibilityLedger};
