//! Domain types for transit routing.
//!
//! Identifiers, times, coordinates and modes shared by the schedule, the
//! planner and the stop resolver. All types enforce their invariants at
//! construction time, so code that receives them can trust their validity.

mod coord;
mod error;
mod ids;
mod mode;
mod time;

pub use coord::Coord;
pub use error::DomainError;
pub use ids::{LineId, RouteId, StopId};
pub use mode::Mode;
pub use time::{ScheduleTime, TimeError};
