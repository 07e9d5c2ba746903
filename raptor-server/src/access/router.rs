//! Feeder routing on the road network.
//!
//! Real road routing is an external service; [`FeederRouter`] is the seam
//! it plugs into. [`BeelineRouter`] ships as a network-free approximation.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::domain::Mode;

use super::characteristics::{FeederQuery, RouteCharacteristics};

/// Routes feeder legs between a stop and an arbitrary point.
pub trait FeederRouter: Send + Sync {
    /// Characteristics of the leg, or `None` if the mode is unknown or the
    /// point is unreachable.
    fn route(&self, query: &FeederQuery<'_>) -> Option<RouteCharacteristics>;

    /// Fixed `(access, egress)` times of a mode, in seconds.
    fn terminal_times(&self, _mode: &Mode) -> (f64, f64) {
        (0.0, 0.0)
    }
}

impl<R: FeederRouter + ?Sized> FeederRouter for Arc<R> {
    fn route(&self, query: &FeederQuery<'_>) -> Option<RouteCharacteristics> {
        (**self).route(query)
    }

    fn terminal_times(&self, mode: &Mode) -> (f64, f64) {
        (**self).terminal_times(mode)
    }
}

/// Per-mode parameters of the beeline approximation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeederProfile {
    pub mode: Mode,
    /// Metres per second.
    pub speed: f64,
    /// Network distance over beeline distance.
    #[serde(default = "default_detour")]
    pub detour_factor: f64,
    /// Seconds.
    #[serde(default)]
    pub access_time: f64,
    /// Seconds.
    #[serde(default)]
    pub egress_time: f64,
}

fn default_detour() -> f64 {
    1.0
}

/// Router estimating legs from the straight-line distance.
///
/// # Example
///
/// ```
/// use raptor_server::access::{BeelineRouter, FeederProfile, FeederQuery, FeederRouter};
/// use raptor_server::domain::{Coord, Mode, ScheduleTime};
/// use raptor_server::resolver::Direction;
/// use raptor_server::schedule::StopIdx;
///
/// let car = Mode::parse("car_feeder").unwrap();
/// let router = BeelineRouter::new([FeederProfile {
///     mode: car.clone(),
///     speed: 10.0,
///     detour_factor: 1.5,
///     access_time: 120.0,
///     egress_time: 60.0,
/// }]);
///
/// let leg = router
///     .route(&FeederQuery {
///         mode: &car,
///         stop: StopIdx(0),
///         stop_point: Coord::new(0.0, 0.0),
///         point: Coord::new(0.0, 2000.0),
///         direction: Direction::Egress,
///         departure: ScheduleTime::MIDNIGHT,
///     })
///     .unwrap();
/// assert_eq!(leg.distance, 3000.0);
/// assert_eq!(leg.travel_time, 300.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BeelineRouter {
    profiles: HashMap<Mode, FeederProfile>,
}

impl BeelineRouter {
    /// Create a router from profiles; later profiles replace earlier ones
    /// for the same mode.
    pub fn new(profiles: impl IntoIterator<Item = FeederProfile>) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.mode.clone(), p)).collect(),
        }
    }

    /// The profile of a mode.
    pub fn profile(&self, mode: &Mode) -> Option<&FeederProfile> {
        self.profiles.get(mode)
    }
}

impl FeederRouter for BeelineRouter {
    fn route(&self, query: &FeederQuery<'_>) -> Option<RouteCharacteristics> {
        let profile = self.profiles.get(query.mode)?;
        let distance = query.stop_point.distance(&query.point) * profile.detour_factor;
        Some(RouteCharacteristics {
            distance,
            access_time: profile.access_time,
            egress_time: profile.egress_time,
            travel_time: (distance / profile.speed).ceil(),
        })
    }

    fn terminal_times(&self, mode: &Mode) -> (f64, f64) {
        self.profiles
            .get(mode)
            .map_or((0.0, 0.0), |p| (p.access_time, p.egress_time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_deserializes_with_defaults() {
        let profile: FeederProfile =
            serde_json::from_str(r#"{"mode": "bike_feeder", "speed": 4.4}"#).unwrap();
        assert_eq!(profile.detour_factor, 1.0);
        assert_eq!(profile.access_time, 0.0);

        let router = BeelineRouter::new([profile]);
        let bike = Mode::parse("bike_feeder").unwrap();
        assert!(router.profile(&bike).is_some());
        assert_eq!(router.terminal_times(&bike), (0.0, 0.0));
        assert_eq!(router.terminal_times(&Mode::walk()), (0.0, 0.0));
    }
}
