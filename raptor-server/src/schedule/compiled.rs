//! The compiled, read-only schedule searched by the planner.
//!
//! Everything lives in flat vectors addressed by small integer indices:
//! route-stops grouped contiguously per route, departures grouped per route,
//! transfers grouped per originating route-stop. A compiled schedule is
//! immutable and shared between any number of concurrent searches.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Range;

use tracing::{info, warn};

use crate::domain::{Coord, LineId, Mode, RouteId, StopId};
use crate::planner::RaptorConfig;
use crate::walkable::WalkableConnections;

use super::raw::{RawRoute, RawSchedule};
use super::spatial::StopIndex;
use super::transfers::attach_footpaths;

/// Index of a stop facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StopIdx(pub usize);

/// Index of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineIdx(pub usize);

/// Index of a route (trip pattern).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouteIdx(pub usize);

/// Index of a route-stop (one stop-visit of one route).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouteStopIdx(pub usize);

/// Index into the global departures array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DepartureIdx(pub usize);

/// Structural problems that make a schedule unsearchable.
///
/// The search relies on these invariants unconditionally (binary search
/// needs sorted departures), so compilation refuses to proceed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// Two stops share an id
    #[error("duplicate stop id {0}")]
    DuplicateStop(StopId),

    /// A stop coordinate is NaN or infinite
    #[error("stop {0} has a non-finite coordinate")]
    InvalidCoordinate(StopId),

    /// Two lines share an id
    #[error("duplicate line id {0}")]
    DuplicateLine(LineId),

    /// Two routes of one line share an id
    #[error("duplicate route id {route} on line {line}")]
    DuplicateRoute { line: LineId, route: RouteId },

    /// A stop-visit references a stop that does not exist
    #[error("route {route} on line {line} references unknown stop {stop}")]
    UnknownStop {
        line: LineId,
        route: RouteId,
        stop: StopId,
    },

    /// A route cannot be travelled with fewer than two stops
    #[error("route {route} on line {line} has fewer than two stops")]
    RouteTooShort { line: LineId, route: RouteId },

    /// A stop-visit has neither arrival nor departure offset
    #[error("stop-visit {position} of route {route} on line {line} has no offsets")]
    MissingOffset {
        line: LineId,
        route: RouteId,
        position: usize,
    },

    /// Offsets go backwards along a route
    #[error("offsets of route {route} on line {line} decrease at stop-visit {position}")]
    NonMonotonicOffsets {
        line: LineId,
        route: RouteId,
        position: usize,
    },

    /// Departures are unsorted or duplicated
    #[error("departures of route {route} on line {line} are not strictly increasing at position {position}")]
    UnsortedDepartures {
        line: LineId,
        route: RouteId,
        position: usize,
    },

    /// Departure plus offset does not fit the time range
    #[error("times of route {route} on line {line} overflow")]
    TimeOverflow { line: LineId, route: RouteId },

    /// An explicit walk references an unknown stop
    #[error("walk references unknown stop {0}")]
    UnknownWalkStop(StopId),
}

/// A stop facility.
#[derive(Debug, Clone)]
pub struct Stop {
    pub id: StopId,
    pub name: String,
    pub coord: Coord,
    pub attributes: BTreeMap<String, String>,
    pub attachments: BTreeMap<String, Coord>,
}

/// A transit line.
#[derive(Debug, Clone)]
pub struct Line {
    pub id: LineId,
}

/// A route (trip pattern) and the ranges it owns.
#[derive(Debug, Clone)]
pub struct Route {
    pub id: RouteId,
    pub line: LineIdx,
    pub mode: Mode,
    pub first_route_stop: usize,
    pub route_stop_count: usize,
    pub first_departure: usize,
    pub departure_count: usize,
}

/// One stop-visit of a route.
///
/// Offsets are normalised: a missing arrival takes the departure offset and
/// vice versa.
#[derive(Debug, Clone)]
pub struct RouteStop {
    pub route: RouteIdx,
    pub stop: StopIdx,
    pub arrival_offset: u32,
    pub departure_offset: u32,
    pub first_transfer: usize,
    pub transfer_count: usize,
}

/// A footpath from one route-stop to another.
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub to: RouteStopIdx,
    /// Walking time in seconds.
    pub time: u32,
    /// Generalized cost of the walk.
    pub cost: f64,
}

/// Immutable, flat schedule for searching.
#[derive(Debug, Clone)]
pub struct CompiledSchedule {
    pub(super) stops: Vec<Stop>,
    pub(super) lines: Vec<Line>,
    pub(super) routes: Vec<Route>,
    pub(super) route_stops: Vec<RouteStop>,
    pub(super) departures: Vec<u32>,
    pub(super) transfers: Vec<Transfer>,
    /// Route-stops per stop, flattened; `stop_route_stop_ranges[s]` slices it.
    pub(super) stop_route_stops: Vec<RouteStopIdx>,
    pub(super) stop_route_stop_ranges: Vec<Range<usize>>,
    pub(super) stop_ids: HashMap<StopId, StopIdx>,
    pub(super) spatial: StopIndex,
    pub(super) walks: WalkableConnections,
}

impl CompiledSchedule {
    /// Validate and flatten a raw schedule.
    ///
    /// Footpaths between nearby stops are generated here from the beeline
    /// settings in `config` and the schedule's explicit walking times.
    pub fn compile(raw: &RawSchedule, config: &RaptorConfig) -> Result<Self, ScheduleError> {
        let mut stops = Vec::with_capacity(raw.stops.len());
        let mut stop_ids = HashMap::with_capacity(raw.stops.len());
        for raw_stop in &raw.stops {
            let coord = Coord::try_new(raw_stop.x, raw_stop.y)
                .map_err(|_| ScheduleError::InvalidCoordinate(raw_stop.id.clone()))?;
            if stop_ids
                .insert(raw_stop.id.clone(), StopIdx(stops.len()))
                .is_some()
            {
                return Err(ScheduleError::DuplicateStop(raw_stop.id.clone()));
            }
            stops.push(Stop {
                id: raw_stop.id.clone(),
                name: raw_stop.name.clone(),
                coord,
                attributes: raw_stop.attributes.clone(),
                attachments: raw_stop.attachments.clone(),
            });
        }

        for walk in &raw.walks {
            for id in [&walk.from, &walk.to] {
                if !stop_ids.contains_key(id) {
                    return Err(ScheduleError::UnknownWalkStop(id.clone()));
                }
            }
        }

        let mut lines = Vec::with_capacity(raw.lines.len());
        let mut routes = Vec::new();
        let mut route_stops = Vec::new();
        let mut departures = Vec::new();
        let mut seen_lines = HashSet::new();

        for raw_line in &raw.lines {
            if !seen_lines.insert(&raw_line.id) {
                return Err(ScheduleError::DuplicateLine(raw_line.id.clone()));
            }
            let line_idx = LineIdx(lines.len());
            lines.push(Line {
                id: raw_line.id.clone(),
            });

            let mut seen_routes = HashSet::new();
            for raw_route in &raw_line.routes {
                if !seen_routes.insert(&raw_route.id) {
                    return Err(ScheduleError::DuplicateRoute {
                        line: raw_line.id.clone(),
                        route: raw_route.id.clone(),
                    });
                }

                let route_idx = RouteIdx(routes.len());
                let visits = compile_route_stops(&raw_line.id, raw_route, &stop_ids, route_idx)?;
                let starts = compile_departures(&raw_line.id, raw_route, &visits)?;
                if starts.is_empty() {
                    warn!(line = %raw_line.id, route = %raw_route.id, "route has no departures");
                }

                routes.push(Route {
                    id: raw_route.id.clone(),
                    line: line_idx,
                    mode: raw_route.mode.clone(),
                    first_route_stop: route_stops.len(),
                    route_stop_count: visits.len(),
                    first_departure: departures.len(),
                    departure_count: starts.len(),
                });
                route_stops.extend(visits);
                departures.extend(starts);
            }
        }

        let (stop_route_stops, stop_route_stop_ranges) = group_by_stop(stops.len(), &route_stops);
        let spatial = StopIndex::new(stops.iter().map(|s| s.coord));

        let mut schedule = Self {
            stops,
            lines,
            routes,
            route_stops,
            departures,
            transfers: Vec::new(),
            stop_route_stops,
            stop_route_stop_ranges,
            stop_ids,
            spatial,
            walks: raw
                .walkable()
                .with_minimal_transfer_time(config.minimal_transfer_time),
        };
        attach_footpaths(&mut schedule, config);

        info!(
            routes = schedule.routes.len(),
            departures = schedule.departures.len(),
            route_stops = schedule.route_stops.len(),
            stops = schedule.stops.len(),
            transfers = schedule.transfers.len(),
            walks = schedule.walks.entry_count(),
            "compiled schedule"
        );

        Ok(schedule)
    }

    /// All stop facilities, indexed by [`StopIdx`].
    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    /// A stop facility.
    pub fn stop(&self, stop: StopIdx) -> &Stop {
        &self.stops[stop.0]
    }

    /// Look up a stop by id.
    pub fn stop_index(&self, id: &StopId) -> Option<StopIdx> {
        self.stop_ids.get(id).copied()
    }

    /// A line.
    pub fn line(&self, line: LineIdx) -> &Line {
        &self.lines[line.0]
    }

    /// All routes, indexed by [`RouteIdx`].
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// A route.
    pub fn route(&self, route: RouteIdx) -> &Route {
        &self.routes[route.0]
    }

    /// Number of route-stops.
    pub fn route_stop_count(&self) -> usize {
        self.route_stops.len()
    }

    /// A route-stop.
    pub fn route_stop(&self, route_stop: RouteStopIdx) -> &RouteStop {
        &self.route_stops[route_stop.0]
    }

    /// Route-stop indices of a route, in visiting order.
    pub fn route_stops_of(&self, route: RouteIdx) -> Range<usize> {
        let r = &self.routes[route.0];
        r.first_route_stop..r.first_route_stop + r.route_stop_count
    }

    /// Route-stops at a facility, ascending.
    pub fn route_stops_at(&self, stop: StopIdx) -> &[RouteStopIdx] {
        &self.stop_route_stops[self.stop_route_stop_ranges[stop.0].clone()]
    }

    /// Outgoing footpaths of a route-stop.
    pub fn transfers_of(&self, route_stop: RouteStopIdx) -> &[Transfer] {
        let rs = &self.route_stops[route_stop.0];
        &self.transfers[rs.first_transfer..rs.first_transfer + rs.transfer_count]
    }

    /// Total number of footpath transfers.
    pub fn transfer_count(&self) -> usize {
        self.transfers.len()
    }

    /// Mode of the route a route-stop belongs to.
    pub fn mode_of(&self, route_stop: RouteStopIdx) -> &Mode {
        &self.routes[self.route_stops[route_stop.0].route.0].mode
    }

    /// Start time (seconds) of a departure.
    pub fn departure_time(&self, departure: DepartureIdx) -> u32 {
        self.departures[departure.0]
    }

    /// Earliest departure of the route that can be boarded at `route_stop`
    /// by someone ready at `time` (seconds), if any.
    ///
    /// # Example
    ///
    /// ```
    /// use raptor_server::planner::RaptorConfig;
    /// use raptor_server::schedule::{CompiledSchedule, RawScheduleBuilder, RouteStopIdx};
    ///
    /// let raw = RawScheduleBuilder::new()
    ///     .stop("A", 0.0, 0.0)
    ///     .stop("B", 5000.0, 0.0)
    ///     .route("L", "R", "bus", &[("A", 0, 0), ("B", 300, 300)], &[0, 600, 1200])
    ///     .build();
    /// let schedule = CompiledSchedule::compile(&raw, &RaptorConfig::default()).unwrap();
    ///
    /// let dep = schedule.next_departure(RouteStopIdx(0), 50).unwrap();
    /// assert_eq!(schedule.departure_time(dep), 600);
    /// assert!(schedule.next_departure(RouteStopIdx(0), 1201).is_none());
    /// ```
    pub fn next_departure(&self, route_stop: RouteStopIdx, time: u32) -> Option<DepartureIdx> {
        let rs = &self.route_stops[route_stop.0];
        let route = &self.routes[rs.route.0];
        let deps = &self.departures[route.first_departure..route.first_departure + route.departure_count];
        let pos = deps.partition_point(|&dep| dep + rs.departure_offset < time);
        (pos < deps.len()).then_some(DepartureIdx(route.first_departure + pos))
    }

    /// Returns true for the first stop-visit of its route.
    pub fn is_first_of_route(&self, route_stop: RouteStopIdx) -> bool {
        let rs = &self.route_stops[route_stop.0];
        self.routes[rs.route.0].first_route_stop == route_stop.0
    }

    /// Returns true for the last stop-visit of its route.
    pub fn is_last_of_route(&self, route_stop: RouteStopIdx) -> bool {
        let rs = &self.route_stops[route_stop.0];
        let route = &self.routes[rs.route.0];
        route.first_route_stop + route.route_stop_count - 1 == route_stop.0
    }

    /// The spatial index over stop facilities.
    pub fn spatial(&self) -> &StopIndex {
        &self.spatial
    }

    /// Explicit walking times, including minimal transfer times.
    pub fn walkable(&self) -> &WalkableConnections {
        &self.walks
    }
}

/// Validate one route's stop-visits and normalise their offsets.
fn compile_route_stops(
    line: &LineId,
    raw_route: &RawRoute,
    stop_ids: &HashMap<StopId, StopIdx>,
    route_idx: RouteIdx,
) -> Result<Vec<RouteStop>, ScheduleError> {
    if raw_route.stops.len() < 2 {
        return Err(ScheduleError::RouteTooShort {
            line: line.clone(),
            route: raw_route.id.clone(),
        });
    }

    let mut visits: Vec<RouteStop> = Vec::with_capacity(raw_route.stops.len());
    for (position, raw_rs) in raw_route.stops.iter().enumerate() {
        let stop = stop_ids
            .get(&raw_rs.stop)
            .copied()
            .ok_or_else(|| ScheduleError::UnknownStop {
                line: line.clone(),
                route: raw_route.id.clone(),
                stop: raw_rs.stop.clone(),
            })?;

        let (arrival, departure) = match (raw_rs.arrival, raw_rs.departure) {
            (Some(a), Some(d)) => (a.seconds(), d.seconds()),
            (Some(a), None) => (a.seconds(), a.seconds()),
            (None, Some(d)) => (d.seconds(), d.seconds()),
            (None, None) => {
                return Err(ScheduleError::MissingOffset {
                    line: line.clone(),
                    route: raw_route.id.clone(),
                    position,
                });
            }
        };

        let previous_departure = visits.last().map_or(0, |v| v.departure_offset);
        if arrival > departure || arrival < previous_departure {
            return Err(ScheduleError::NonMonotonicOffsets {
                line: line.clone(),
                route: raw_route.id.clone(),
                position,
            });
        }

        visits.push(RouteStop {
            route: route_idx,
            stop,
            arrival_offset: arrival,
            departure_offset: departure,
            first_transfer: 0,
            transfer_count: 0,
        });
    }
    Ok(visits)
}

/// Validate one route's departures: strictly increasing, no overflow.
fn compile_departures(
    line: &LineId,
    raw_route: &RawRoute,
    visits: &[RouteStop],
) -> Result<Vec<u32>, ScheduleError> {
    let max_offset = visits
        .iter()
        .map(|v| v.arrival_offset.max(v.departure_offset))
        .max()
        .unwrap_or(0);

    let mut starts = Vec::with_capacity(raw_route.departures.len());
    for (position, dep) in raw_route.departures.iter().enumerate() {
        let secs = dep.seconds();
        if starts.last().is_some_and(|&prev| secs <= prev) {
            return Err(ScheduleError::UnsortedDepartures {
                line: line.clone(),
                route: raw_route.id.clone(),
                position,
            });
        }
        if secs.checked_add(max_offset).is_none() {
            return Err(ScheduleError::TimeOverflow {
                line: line.clone(),
                route: raw_route.id.clone(),
            });
        }
        starts.push(secs);
    }
    Ok(starts)
}

/// Flatten route-stops per stop, keeping ascending route-stop order.
fn group_by_stop(
    stop_count: usize,
    route_stops: &[RouteStop],
) -> (Vec<RouteStopIdx>, Vec<Range<usize>>) {
    let mut counts = vec![0usize; stop_count];
    for rs in route_stops {
        counts[rs.stop.0] += 1;
    }

    let mut ranges = Vec::with_capacity(stop_count);
    let mut start = 0;
    for count in &counts {
        ranges.push(start..start + count);
        start += count;
    }

    let mut next: Vec<usize> = ranges.iter().map(|r| r.start).collect();
    let mut flat = vec![RouteStopIdx(0); route_stops.len()];
    for (i, rs) in route_stops.iter().enumerate() {
        flat[next[rs.stop.0]] = RouteStopIdx(i);
        next[rs.stop.0] += 1;
    }
    (flat, ranges)
}
