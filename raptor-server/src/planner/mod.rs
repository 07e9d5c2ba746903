//! Least-cost transit search.
//!
//! [`RaptorWorker`] answers "what is the cheapest way from these access
//! stops to these egress stops, leaving at this time?" over a
//! [`CompiledSchedule`](crate::schedule::CompiledSchedule), pricing
//! transfers with a [`TransferCostModel`].

mod config;
mod initial_stop;
mod itinerary;
mod path;
mod transfer_cost;
mod worker;


pub use config::{ConfigError, ModeToModePenalty, RaptorConfig};
pub use initial_stop::InitialStop;
pub use itinerary::{FeederLeg, Itinerary, Leg, NonTransitLeg, Place, TransitLeg};
pub use path::{PathArena, PathElement, PathIdx, PathKind};
pub use transfer_cost::{DefaultTransferCost, TransferContext, TransferCostModel};
pub use worker::{
    ExtraRoundsPolicy, JourneyRequest, RaptorWorker, SearchError, StopConnection,
    StopConnections,
};
