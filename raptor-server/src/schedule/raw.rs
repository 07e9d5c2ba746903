//! Raw schedule as loaded from JSON.
//!
//! This is the input form: nested lines, routes and stop-visits with
//! optional offsets. [`CompiledSchedule`](super::CompiledSchedule) validates
//! and flattens it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Coord, LineId, Mode, RouteId, ScheduleTime, StopId};
use crate::walkable::WalkableConnections;

/// A complete raw schedule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSchedule {
    pub stops: Vec<RawStop>,
    pub lines: Vec<RawLine>,
    #[serde(default)]
    pub walks: Vec<RawWalk>,
}

/// A stop facility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawStop {
    pub id: StopId,
    #[serde(default)]
    pub name: String,
    pub x: f64,
    pub y: f64,
    /// Free-form attributes, matched by stop filters.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Alternative access points, keyed by name.
    #[serde(default)]
    pub attachments: BTreeMap<String, Coord>,
}

/// A transit line and its trip patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLine {
    pub id: LineId,
    pub routes: Vec<RawRoute>,
}

/// A trip pattern: ordered stop-visits plus the start times of its runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRoute {
    pub id: RouteId,
    pub mode: Mode,
    pub stops: Vec<RawRouteStop>,
    pub departures: Vec<ScheduleTime>,
}

/// One stop-visit of a pattern. Offsets are relative to the run's start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRouteStop {
    pub stop: StopId,
    #[serde(default)]
    pub arrival: Option<ScheduleTime>,
    #[serde(default)]
    pub departure: Option<ScheduleTime>,
}

/// An explicit walking time between two facilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawWalk {
    pub from: StopId,
    pub to: StopId,
    pub seconds: u32,
    /// One-way only when set.
    #[serde(default)]
    pub directed: bool,
}

impl RawSchedule {
    /// Parse a schedule from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// The explicit walking times of this schedule.
    pub fn walkable(&self) -> WalkableConnections {
        let mut walks = WalkableConnections::new();
        for walk in &self.walks {
            if walk.directed {
                walks.add_directed(walk.from.clone(), walk.to.clone(), walk.seconds);
            } else {
                walks.add(walk.from.clone(), walk.to.clone(), walk.seconds);
            }
        }
        walks
    }
}

/// Builder for small schedules, mostly used by tests and examples.
///
/// Invalid ids or modes are skipped; times are seconds.
///
/// # Example
///
/// ```
/// use raptor_server::schedule::RawScheduleBuilder;
///
/// let raw = RawScheduleBuilder::new()
///     .stop("A", 0.0, 0.0)
///     .stop("B", 1000.0, 0.0)
///     .route("L1", "R1", "bus", &[("A", 0, 0), ("B", 300, 300)], &[0, 600])
///     .build();
///
/// assert_eq!(raw.stops.len(), 2);
/// assert_eq!(raw.lines[0].routes[0].departures.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct RawScheduleBuilder {
    inner: RawSchedule,
}

impl RawScheduleBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stop facility.
    pub fn stop(self, id: &str, x: f64, y: f64) -> Self {
        self.stop_with(id, x, y, &[])
    }

    /// Add a stop facility with attributes.
    pub fn stop_with(mut self, id: &str, x: f64, y: f64, attributes: &[(&str, &str)]) -> Self {
        if let Ok(id) = StopId::parse(id) {
            self.inner.stops.push(RawStop {
                name: id.to_string(),
                id,
                x,
                y,
                attributes: attributes
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                attachments: BTreeMap::new(),
            });
        }
        self
    }

    /// Add an alternative access point to the most recently added stop.
    pub fn attachment(mut self, name: &str, x: f64, y: f64) -> Self {
        if let Some(stop) = self.inner.stops.last_mut() {
            stop.attachments.insert(name.to_string(), Coord::new(x, y));
        }
        self
    }

    /// Add a route with `(stop, arrival offset, departure offset)` visits.
    ///
    /// The line is created on first use.
    pub fn route(
        mut self,
        line: &str,
        route: &str,
        mode: &str,
        stops: &[(&str, u32, u32)],
        departures: &[u32],
    ) -> Self {
        let (Ok(line_id), Ok(route_id), Ok(mode)) =
            (LineId::parse(line), RouteId::parse(route), Mode::parse(mode))
        else {
            return self;
        };

        let stops = stops
            .iter()
            .filter_map(|(stop, arr, dep)| {
                Some(RawRouteStop {
                    stop: StopId::parse(stop).ok()?,
                    arrival: Some(ScheduleTime::from_seconds(*arr)),
                    departure: Some(ScheduleTime::from_seconds(*dep)),
                })
            })
            .collect();
        let raw_route = RawRoute {
            id: route_id,
            mode,
            stops,
            departures: departures
                .iter()
                .map(|d| ScheduleTime::from_seconds(*d))
                .collect(),
        };

        match self.inner.lines.iter_mut().find(|l| l.id == line_id) {
            Some(existing) => existing.routes.push(raw_route),
            None => self.inner.lines.push(RawLine {
                id: line_id,
                routes: vec![raw_route],
            }),
        }
        self
    }

    /// Add a symmetric walking time.
    pub fn walk(mut self, from: &str, to: &str, seconds: u32) -> Self {
        if let (Ok(from), Ok(to)) = (StopId::parse(from), StopId::parse(to)) {
            self.inner.walks.push(RawWalk {
                from,
                to,
                seconds,
                directed: false,
            });
        }
        self
    }

    /// Build the raw schedule.
    pub fn build(self) -> RawSchedule {
        self.inner
    }
}
