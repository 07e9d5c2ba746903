//! The characteristics contract for feeder legs.

use crate::domain::{Coord, Mode, ScheduleTime};
use crate::resolver::Direction;
use crate::schedule::StopIdx;

use super::router::FeederRouter;

/// Distance and time components of one feeder leg.
///
/// `access_time` and `egress_time` are the fixed terminal times at either
/// end (parking, unlocking a bike); `travel_time` is the time in motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteCharacteristics {
    /// Metres travelled.
    pub distance: f64,
    /// Seconds.
    pub access_time: f64,
    /// Seconds.
    pub egress_time: f64,
    /// Seconds.
    pub travel_time: f64,
}

impl RouteCharacteristics {
    /// Sum of all time components, in seconds.
    pub fn total_time(&self) -> f64 {
        self.access_time + self.travel_time + self.egress_time
    }
}

/// A feeder leg to characterise.
#[derive(Debug, Clone, Copy)]
pub struct FeederQuery<'a> {
    pub mode: &'a Mode,
    /// The stop served by the feeder leg.
    pub stop: StopIdx,
    /// Where the feeder leg meets the stop; the stop's own coordinate
    /// unless an attachment point overrides it.
    pub stop_point: Coord,
    /// The origin (access) or destination (egress) of the journey.
    pub point: Coord,
    pub direction: Direction,
    pub departure: ScheduleTime,
}

/// Source of feeder leg characteristics.
///
/// Implementations are shared between search threads.
pub trait AccessEgressProvider: Send + Sync {
    /// Characteristics of the feeder leg, or `None` if `query.point` cannot
    /// be connected to the stop with `query.mode`.
    fn characteristics(&self, query: &FeederQuery<'_>) -> Option<RouteCharacteristics>;
}

/// Provider that routes every request on demand.
#[derive(Debug, Clone)]
pub struct LiveRouting<R> {
    router: R,
}

impl<R: FeederRouter> LiveRouting<R> {
    /// Wrap a router.
    pub fn new(router: R) -> Self {
        Self { router }
    }

    /// The wrapped router.
    pub fn router(&self) -> &R {
        &self.router
    }
}

impl<R: FeederRouter> AccessEgressProvider for LiveRouting<R> {
    fn characteristics(&self, query: &FeederQuery<'_>) -> Option<RouteCharacteristics> {
        self.router.route(query)
    }
}
