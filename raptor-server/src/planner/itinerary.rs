//! Search results: itineraries and their legs.

use serde::Serialize;

use crate::domain::{Coord, LineId, Mode, RouteId, ScheduleTime, StopId};

/// One end of a non-transit leg.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Place {
    /// The journey's origin point.
    Origin,
    /// The journey's destination point.
    Destination,
    /// Some other point, such as a park-and-ride attachment.
    Point { x: f64, y: f64 },
    /// A stop facility.
    Stop { id: StopId },
}

impl Place {
    /// A point place.
    pub fn point(coord: Coord) -> Self {
        Self::Point {
            x: coord.x,
            y: coord.y,
        }
    }

    /// A stop place.
    pub fn stop(id: StopId) -> Self {
        Self::Stop { id }
    }
}

/// A non-transit sub-leg of an access or egress candidate.
///
/// Times are not fixed until the search places the leg in an itinerary.
#[derive(Debug, Clone, PartialEq)]
pub struct FeederLeg {
    pub from: Place,
    pub to: Place,
    pub mode: Mode,
    /// Seconds.
    pub travel_time: u32,
    /// Metres.
    pub distance: f64,
}

/// A ride on one run of a route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitLeg {
    pub line: LineId,
    pub route: RouteId,
    pub mode: Mode,
    pub board_stop: StopId,
    pub alight_stop: StopId,
    /// Vehicle departure at the boarding stop.
    pub departure: ScheduleTime,
    /// Vehicle arrival at the alighting stop.
    pub arrival: ScheduleTime,
}

/// A walk or feeder leg.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NonTransitLeg {
    pub from: Place,
    pub to: Place,
    pub mode: Mode,
    pub departure: ScheduleTime,
    /// Seconds.
    pub travel_time: u32,
    /// Metres.
    pub distance: f64,
}

impl NonTransitLeg {
    /// Place a feeder leg at a departure time.
    pub fn from_feeder(leg: &FeederLeg, departure: ScheduleTime) -> Self {
        Self {
            from: leg.from.clone(),
            to: leg.to.clone(),
            mode: leg.mode.clone(),
            departure,
            travel_time: leg.travel_time,
            distance: leg.distance,
        }
    }

    /// Arrival time of the leg.
    pub fn arrival(&self) -> ScheduleTime {
        ScheduleTime::from_seconds(self.departure.seconds().saturating_add(self.travel_time))
    }
}

/// A leg of an itinerary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Leg {
    Transit(TransitLeg),
    NonTransit(NonTransitLeg),
}

impl Leg {
    /// When the leg starts.
    pub fn departure(&self) -> ScheduleTime {
        match self {
            Leg::Transit(leg) => leg.departure,
            Leg::NonTransit(leg) => leg.departure,
        }
    }

    /// When the leg ends.
    pub fn arrival(&self) -> ScheduleTime {
        match self {
            Leg::Transit(leg) => leg.arrival,
            Leg::NonTransit(leg) => leg.arrival(),
        }
    }

    /// The mode tag of the leg.
    pub fn mode(&self) -> &Mode {
        match self {
            Leg::Transit(leg) => &leg.mode,
            Leg::NonTransit(leg) => &leg.mode,
        }
    }

    /// Returns the transit leg, if this is one.
    pub fn as_transit(&self) -> Option<&TransitLeg> {
        match self {
            Leg::Transit(leg) => Some(leg),
            Leg::NonTransit(_) => None,
        }
    }
}

/// A complete door-to-door itinerary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Itinerary {
    pub legs: Vec<Leg>,
    /// Total generalized cost, access and egress included.
    pub cost: f64,
    /// Number of vehicle changes.
    pub transfers: usize,
}

impl Itinerary {
    /// Departure of the first leg.
    pub fn departure(&self) -> Option<ScheduleTime> {
        self.legs.first().map(Leg::departure)
    }

    /// Arrival of the last leg.
    pub fn arrival(&self) -> Option<ScheduleTime> {
        self.legs.last().map(Leg::arrival)
    }

    /// The transit legs, in order.
    pub fn transit_legs(&self) -> impl Iterator<Item = &TransitLeg> {
        self.legs.iter().filter_map(Leg::as_transit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(departure: u32, travel_time: u32) -> Leg {
        Leg::NonTransit(NonTransitLeg {
            from: Place::Origin,
            to: Place::stop(StopId::parse("A").unwrap()),
            mode: Mode::access_walk(),
            departure: ScheduleTime::from_seconds(departure),
            travel_time,
            distance: 100.0,
        })
    }

    #[test]
    fn itinerary_times_span_legs() {
        let ride = Leg::Transit(TransitLeg {
            line: LineId::parse("L1").unwrap(),
            route: RouteId::parse("R1").unwrap(),
            mode: Mode::parse("rail").unwrap(),
            board_stop: StopId::parse("A").unwrap(),
            alight_stop: StopId::parse("B").unwrap(),
            departure: ScheduleTime::from_seconds(600),
            arrival: ScheduleTime::from_seconds(900),
        });
        let itinerary = Itinerary {
            legs: vec![walk(50, 120), ride],
            cost: 1.0,
            transfers: 0,
        };

        assert_eq!(itinerary.departure(), Some(ScheduleTime::from_seconds(50)));
        assert_eq!(itinerary.arrival(), Some(ScheduleTime::from_seconds(900)));
        assert_eq!(itinerary.transit_legs().count(), 1);
        assert_eq!(itinerary.legs[0].arrival().seconds(), 170);
    }

    #[test]
    fn legs_serialize_with_kind_tag() {
        let json = serde_json::to_value(walk(0, 60)).unwrap();
        assert_eq!(json["kind"], "non_transit");
        assert_eq!(json["from"]["kind"], "origin");
        assert_eq!(json["to"]["id"], "A");
        assert_eq!(json["departure"], "00:00:00");
    }
}
