//! Data transfer objects for the HTTP API.

use serde::{Deserialize, Serialize};

use crate::domain::{Coord, ScheduleTime, StopId};
use crate::planner::{Itinerary, Leg, StopConnections};
use crate::resolver::Person;
use crate::schedule::{CompiledSchedule, StopIdx};

/// A point in projected metres.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PointDto {
    pub x: f64,
    pub y: f64,
}

impl PointDto {
    pub fn to_coord(self) -> Option<Coord> {
        Coord::try_new(self.x, self.y).ok()
    }
}

/// Request to plan a journey.
#[derive(Debug, Deserialize)]
pub struct PlanJourneyRequest {
    pub from: PointDto,
    pub to: PointDto,

    /// Earliest departure; the current local time if absent
    #[serde(default)]
    pub departure: Option<ScheduleTime>,

    /// Traveller attributes for feeder mode filters
    #[serde(default)]
    pub person: Person,
}

/// A planned journey.
#[derive(Debug, Serialize)]
pub struct JourneyResult {
    /// Departure time of the first leg
    pub departure_time: String,

    /// Arrival time of the last leg
    pub arrival_time: String,

    /// Total duration in minutes, rounded up
    pub duration_mins: u32,

    /// Number of changes
    pub changes: usize,

    /// Generalized cost
    pub cost: f64,

    pub legs: Vec<Leg>,
}

/// Query for stops near a point.
#[derive(Debug, Deserialize)]
pub struct NearbyStopsRequest {
    pub x: f64,
    pub y: f64,

    /// Search radius in metres; the configured search radius if absent
    pub radius: Option<f64>,
}

/// One stop near the queried point.
#[derive(Debug, Serialize)]
pub struct NearbyStop {
    pub id: StopId,
    pub name: String,
    pub x: f64,
    pub y: f64,

    /// Beeline distance in metres
    pub distance: f64,
}

/// Response for a nearby stops query.
#[derive(Debug, Serialize)]
pub struct NearbyStopsResponse {
    /// Stops, nearest first
    pub stops: Vec<NearbyStop>,
}

/// Query for a connection tree.
#[derive(Debug, Deserialize)]
pub struct TreeRequest {
    /// "HH:MM:SS"; the current local time if absent
    pub departure: Option<ScheduleTime>,
}

/// Best arrival at one reached stop.
#[derive(Debug, Serialize)]
pub struct ConnectionResult {
    pub stop: StopId,
    pub arrival_time: ScheduleTime,
    pub cost: f64,
    pub transfers: usize,
}

/// Every stop reachable from one stop.
#[derive(Debug, Serialize)]
pub struct TreeResponse {
    pub from: StopId,
    pub departure: ScheduleTime,
    pub reached: Vec<ConnectionResult>,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

impl JourneyResult {
    /// Create from an itinerary.
    ///
    /// Returns `None` for an itinerary with no legs.
    pub fn from_itinerary(itinerary: &Itinerary) -> Option<Self> {
        let departure = itinerary.departure()?;
        let arrival = itinerary.arrival()?;
        let seconds = arrival.seconds_since(departure).unwrap_or(0);
        Some(Self {
            departure_time: departure.to_string(),
            arrival_time: arrival.to_string(),
            duration_mins: seconds.div_ceil(60),
            changes: itinerary.transfers,
            cost: itinerary.cost,
            legs: itinerary.legs.clone(),
        })
    }
}

impl TreeResponse {
    pub fn from_tree(
        schedule: &CompiledSchedule,
        from: StopId,
        departure: ScheduleTime,
        tree: &StopConnections,
    ) -> Self {
        let reached = tree
            .iter()
            .map(|(&stop, connection)| ConnectionResult {
                stop: schedule.stop(stop).id.clone(),
                arrival_time: connection.arrival_time,
                cost: connection.cost,
                transfers: connection.transfers,
            })
            .collect();
        Self {
            from,
            departure,
            reached,
        }
    }
}

impl NearbyStop {
    pub fn from_stop(schedule: &CompiledSchedule, stop: StopIdx, distance: f64) -> Self {
        let facility = schedule.stop(stop);
        Self {
            id: facility.id.clone(),
            name: facility.name.clone(),
            x: facility.coord.x,
            y: facility.coord.y,
            distance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LineId, Mode, RouteId};
    use crate::planner::{NonTransitLeg, Place, TransitLeg};

    fn itinerary() -> Itinerary {
        let stop = |s: &str| StopId::parse(s).unwrap();
        Itinerary {
            legs: vec![
                Leg::NonTransit(NonTransitLeg {
                    from: Place::Origin,
                    to: Place::stop(stop("A")),
                    mode: Mode::access_walk(),
                    departure: ScheduleTime::from_seconds(100),
                    travel_time: 70,
                    distance: 50.0,
                }),
                Leg::Transit(TransitLeg {
                    line: LineId::parse("L1").unwrap(),
                    route: RouteId::parse("R1").unwrap(),
                    mode: Mode::parse("bus").unwrap(),
                    board_stop: stop("A"),
                    alight_stop: stop("B"),
                    departure: ScheduleTime::from_seconds(300),
                    arrival: ScheduleTime::from_seconds(1000),
                }),
            ],
            cost: 1.5,
            transfers: 0,
        }
    }

    #[test]
    fn journey_result_from_itinerary() {
        let result = JourneyResult::from_itinerary(&itinerary()).unwrap();
        assert_eq!(result.departure_time, "00:01:40");
        assert_eq!(result.arrival_time, "00:16:40");
        assert_eq!(result.duration_mins, 15);
        assert_eq!(result.changes, 0);
        assert_eq!(result.legs.len(), 2);
    }

    #[test]
    fn duration_rounds_up() {
        let mut itinerary = itinerary();
        if let Leg::Transit(leg) = &mut itinerary.legs[1] {
            leg.arrival = ScheduleTime::from_seconds(1001);
        }
        let result = JourneyResult::from_itinerary(&itinerary).unwrap();
        assert_eq!(result.duration_mins, 16);
    }

    #[test]
    fn empty_itinerary_has_no_result() {
        let empty = Itinerary {
            legs: Vec::new(),
            cost: 0.0,
            transfers: 0,
        };
        assert!(JourneyResult::from_itinerary(&empty).is_none());
    }

    #[test]
    fn legs_serialize_with_kind_tag() {
        let result = JourneyResult::from_itinerary(&itinerary()).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["legs"][0]["kind"], "non_transit");
        assert_eq!(json["legs"][1]["kind"], "transit");
        assert_eq!(json["legs"][1]["departure"], "00:05:00");
    }

    #[test]
    fn plan_request_defaults() {
        let req: PlanJourneyRequest =
            serde_json::from_str(r#"{"from": {"x": 1, "y": 2}, "to": {"x": 3, "y": 4}}"#).unwrap();
        assert!(req.departure.is_none());
        assert_eq!(req.person, Person::default());

        let req: PlanJourneyRequest = serde_json::from_str(
            r#"{"from": {"x": 1, "y": 2}, "to": {"x": 3, "y": 4},
                "departure": "08:00:00", "person": {"has_bike": "yes"}}"#,
        )
        .unwrap();
        assert_eq!(req.departure, Some(ScheduleTime::from_seconds(8 * 3600)));
        assert_eq!(req.person, Person::with_attributes([("has_bike", "yes")]));
    }
}
