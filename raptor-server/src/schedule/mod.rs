//! Transit schedule: raw input form and the compiled search form.
//!
//! A [`RawSchedule`] is parsed from JSON and compiled once into a
//! [`CompiledSchedule`], which is then shared read-only by every search.

mod compiled;
mod raw;
mod spatial;
mod transfers;

pub use compiled::{
    CompiledSchedule, DepartureIdx, Line, LineIdx, Route, RouteIdx, RouteStop, RouteStopIdx,
    ScheduleError, Stop, StopIdx, Transfer,
};
pub use raw::{RawLine, RawRoute, RawRouteStop, RawSchedule, RawScheduleBuilder, RawStop, RawWalk};
pub use spatial::StopIndex;
