//! Round-based least-cost search (RAPTOR).
//!
//! Each round scans the routes touched by the previous round, riding every
//! boardable run to the later stops of its pattern, then relaxes footpath
//! transfers from the stop-visits reached by vehicle. Labels are kept per
//! route-stop; a label only replaces another if it is strictly cheaper, and
//! nothing more expensive than the best complete arrival found so far is
//! kept.

use std::collections::BTreeMap;

use fixedbitset::FixedBitSet;
use rand::Rng;
use tracing::{debug, trace};

use crate::domain::{Coord, Mode, ScheduleTime, StopId};
use crate::resolver::{Direction, Person, StopResolver};
use crate::schedule::{CompiledSchedule, DepartureIdx, RouteIdx, RouteStopIdx, StopIdx};

use super::config::RaptorConfig;
use super::initial_stop::{InitialStop, cheapest_per_stop};
use super::itinerary::{Itinerary, Leg, NonTransitLeg, Place, TransitLeg};
use super::path::{PathArena, PathElement, PathIdx, PathKind};
use super::transfer_cost::{TransferContext, TransferCostModel};

/// Error from a search request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SearchError {
    /// The stop id is not in the schedule
    #[error("unknown stop: {0}")]
    UnknownStop(StopId),
}

/// When to stop exploring once a destination has been reached.
///
/// Capping the extra rounds bounds query time. It can drop an itinerary that
/// arrives in a later round with more transfers but slightly lower cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraRoundsPolicy {
    /// Run until no label improves or the round limit is hit.
    Unbounded,
    /// Run at most this many rounds after the first round that reached a
    /// destination stop.
    AfterFirstArrival(usize),
}

impl ExtraRoundsPolicy {
    pub fn from_config(config: &RaptorConfig) -> Self {
        match config.extra_rounds_after_first_arrival {
            Some(extra) => Self::AfterFirstArrival(extra),
            None => Self::Unbounded,
        }
    }

    /// Returns true if the search should stop after `round`.
    pub fn should_stop(self, round: usize, first_arrival_round: Option<usize>) -> bool {
        match (self, first_arrival_round) {
            (Self::AfterFirstArrival(extra), Some(first)) => round >= first + extra,
            _ => false,
        }
    }
}

/// A door-to-door query.
#[derive(Debug, Clone)]
pub struct JourneyRequest {
    pub from: Coord,
    pub to: Coord,
    pub departure: ScheduleTime,
    pub person: Person,
}

/// Best arrival at one stop facility.
#[derive(Debug, Clone, PartialEq)]
pub struct StopConnection {
    pub arrival_time: ScheduleTime,
    pub cost: f64,
    pub transfers: usize,
}

/// Best arrivals per reached stop facility.
pub type StopConnections = BTreeMap<StopIdx, StopConnection>;

/// A run being ridden during a route scan.
#[derive(Debug, Clone, Copy)]
struct Boarding {
    /// Label the traveller boarded from.
    from: PathIdx,
    board: RouteStopIdx,
    departure: DepartureIdx,
    enter_time: u32,
}

/// Search worker.
///
/// Owns the per-query scratch arrays, sized once for the schedule and reset
/// between queries. Not shareable between threads; create one per thread.
pub struct RaptorWorker<'a> {
    schedule: &'a CompiledSchedule,
    config: &'a RaptorConfig,
    costs: &'a dyn TransferCostModel,
    arena: PathArena,
    best_per_route_stop: Vec<Option<PathIdx>>,
    egress_cost: Vec<f64>,
    destination: FixedBitSet,
    /// Route-stops improved by a transfer (or seeding), scanned next round.
    improved: FixedBitSet,
    /// Route-stops improved by a vehicle this round.
    reached: FixedBitSet,
    touched_routes: FixedBitSet,
    earliest_route_stop: Vec<Option<usize>>,
    best_arrival_cost: f64,
}

impl<'a> RaptorWorker<'a> {
    /// Create a worker for `schedule`.
    pub fn new(
        schedule: &'a CompiledSchedule,
        config: &'a RaptorConfig,
        costs: &'a dyn TransferCostModel,
    ) -> Self {
        let route_stops = schedule.route_stop_count();
        let routes = schedule.routes().len();
        Self {
            schedule,
            config,
            costs,
            arena: PathArena::with_capacity(route_stops),
            best_per_route_stop: vec![None; route_stops],
            egress_cost: vec![f64::INFINITY; route_stops],
            destination: FixedBitSet::with_capacity(route_stops),
            improved: FixedBitSet::with_capacity(route_stops),
            reached: FixedBitSet::with_capacity(route_stops),
            touched_routes: FixedBitSet::with_capacity(routes),
            earliest_route_stop: vec![None; routes],
            best_arrival_cost: f64::INFINITY,
        }
    }

    /// The schedule this worker searches.
    pub fn schedule(&self) -> &'a CompiledSchedule {
        self.schedule
    }

    #[cfg(test)]
    pub(super) fn best_arrival_cost(&self) -> f64 {
        self.best_arrival_cost
    }

    /// Least-cost itinerary from any access stop to any egress stop,
    /// leaving no earlier than `departure`.
    ///
    /// Returns `None` if no egress stop can be reached by transit.
    pub fn calc_least_cost_route(
        &mut self,
        departure: ScheduleTime,
        access: &[InitialStop],
        egress: &[InitialStop],
    ) -> Option<Itinerary> {
        self.reset();
        let egress = cheapest_per_stop(egress);
        for (_, candidate) in &egress {
            for &rs in self.schedule.route_stops_at(candidate.stop) {
                self.destination.insert(rs.0);
                self.egress_cost[rs.0] = candidate.cost;
            }
        }

        let rounds = self.run(departure.seconds(), access);

        let mut winner: Option<(f64, usize, PathIdx)> = None;
        for rs in self.destination.ones() {
            let Some(idx) = self.best_per_route_stop[rs] else {
                continue;
            };
            let label = self.arena.get(idx);
            if matches!(label.kind, PathKind::Access { .. }) {
                continue;
            }
            let total = label.cost() + self.egress_cost[rs];
            let better = match winner {
                None => true,
                Some((cost, transfers, _)) => {
                    total < cost || (total == cost && label.transfer_count < transfers)
                }
            };
            if better {
                winner = Some((total, label.transfer_count, idx));
            }
        }

        let Some((cost, transfers, last)) = winner else {
            debug!(rounds, labels = self.arena.len(), "no itinerary found");
            return None;
        };
        debug!(rounds, labels = self.arena.len(), cost, transfers, "itinerary found");

        let facility = self.stop_of(self.arena.get(last).to_route_stop);
        let exit = egress
            .iter()
            .find(|(_, candidate)| candidate.stop == facility)
            .map(|(_, candidate)| *candidate)?;

        Some(Itinerary {
            legs: self.legs(departure.seconds(), access, exit, last),
            cost,
            transfers,
        })
    }

    /// Best arrival at every stop facility reachable from `access`.
    ///
    /// Only facilities reached by transit count; access stops themselves
    /// appear only if a trip leads back to them.
    pub fn calc_tree(&mut self, departure: ScheduleTime, access: &[InitialStop]) -> StopConnections {
        self.reset();
        let rounds = self.run(departure.seconds(), access);

        let mut tree = StopConnections::new();
        for (rs, label) in self.best_per_route_stop.iter().enumerate() {
            let Some(idx) = label else {
                continue;
            };
            let label = self.arena.get(*idx);
            if matches!(label.kind, PathKind::Access { .. }) {
                continue;
            }
            let stop = self.stop_of(RouteStopIdx(rs));
            let connection = StopConnection {
                arrival_time: ScheduleTime::from_seconds(label.arrival_time),
                cost: label.cost(),
                transfers: label.transfer_count,
            };
            match tree.get(&stop) {
                Some(existing) if existing.cost <= connection.cost => {}
                _ => {
                    tree.insert(stop, connection);
                }
            }
        }

        debug!(rounds, stops = tree.len(), "tree complete");
        tree
    }

    /// Best arrival at every stop facility when starting at `stop`.
    pub fn tree_from_stop(
        &mut self,
        stop: &StopId,
        departure: ScheduleTime,
    ) -> Result<StopConnections, SearchError> {
        let idx = self
            .schedule
            .stop_index(stop)
            .ok_or_else(|| SearchError::UnknownStop(stop.clone()))?;
        Ok(self.calc_tree(departure, &[InitialStop::at(idx)]))
    }

    /// Resolve both ends of `request` to stops and search between them.
    pub fn plan<R: Rng + ?Sized>(
        &mut self,
        resolver: &StopResolver<'_>,
        request: &JourneyRequest,
        rng: &mut R,
    ) -> Option<Itinerary> {
        let access = resolver.find_stops(
            request.from,
            &request.person,
            request.departure,
            Direction::Access,
            rng,
        );
        let egress = resolver.find_stops(
            request.to,
            &request.person,
            request.departure,
            Direction::Egress,
            rng,
        );
        if access.is_empty() || egress.is_empty() {
            debug!(
                access = access.len(),
                egress = egress.len(),
                "no stops near origin or destination"
            );
            return None;
        }
        self.calc_least_cost_route(request.departure, &access, &egress)
    }

    fn reset(&mut self) {
        self.arena.clear();
        self.best_per_route_stop.fill(None);
        self.egress_cost.fill(f64::INFINITY);
        self.destination.clear();
        self.improved.clear();
        self.reached.clear();
        self.touched_routes.clear();
        self.earliest_route_stop.fill(None);
        self.best_arrival_cost = f64::INFINITY;
    }

    /// Seed the access labels and run the rounds. Returns the number of
    /// rounds run.
    ///
    /// Expects a reset worker with destinations already marked.
    fn run(&mut self, departure: u32, access: &[InitialStop]) -> usize {
        for (initial, candidate) in cheapest_per_stop(access) {
            let time = departure.saturating_add(candidate.time);
            for &rs in self.schedule.route_stops_at(candidate.stop) {
                let idx = self.arena.push(PathElement {
                    coming_from: None,
                    to_route_stop: rs,
                    kind: PathKind::Access { initial },
                    arrival_time: time,
                    travel_cost: candidate.cost,
                    transfer_cost: 0.0,
                    transfer_count: 0,
                    first_departure_time: None,
                });
                self.best_per_route_stop[rs.0] = Some(idx);
                self.mark_improved(rs);
            }
        }

        let policy = ExtraRoundsPolicy::from_config(self.config);
        let mut first_arrival_round = None;
        let mut rounds = 0;
        while rounds < self.config.max_rounds && self.improved.count_ones(..) > 0 {
            rounds += 1;
            self.scan_routes();
            if first_arrival_round.is_none() && self.best_arrival_cost.is_finite() {
                first_arrival_round = Some(rounds);
            }
            self.relax_transfers();

            trace!(
                round = rounds,
                reached = self.reached.count_ones(..),
                improved = self.improved.count_ones(..),
                bound = self.best_arrival_cost,
                "round complete"
            );
            if policy.should_stop(rounds, first_arrival_round) {
                break;
            }
        }
        rounds
    }

    fn stop_of(&self, rs: RouteStopIdx) -> StopIdx {
        self.schedule.route_stop(rs).stop
    }

    fn mark_improved(&mut self, rs: RouteStopIdx) {
        self.improved.insert(rs.0);
        let route = self.schedule.route_stop(rs).route.0;
        self.touched_routes.insert(route);
        let earliest = &mut self.earliest_route_stop[route];
        *earliest = Some(earliest.map_or(rs.0, |e| e.min(rs.0)));
    }

    /// Store `element` at `rs` if it is strictly cheaper than the current
    /// label and within the bound.
    fn offer(&mut self, rs: RouteStopIdx, element: PathElement) -> bool {
        let cost = element.cost();
        if cost > self.best_arrival_cost {
            return false;
        }
        if let Some(existing) = self.best_per_route_stop[rs.0] {
            if cost >= self.arena.get(existing).cost() {
                return false;
            }
        }
        let idx = self.arena.push(element);
        self.best_per_route_stop[rs.0] = Some(idx);
        if self.destination.contains(rs.0) {
            self.best_arrival_cost = self.best_arrival_cost.min(cost + self.egress_cost[rs.0]);
        }
        true
    }

    fn scan_routes(&mut self) {
        let routes: Vec<usize> = self.touched_routes.ones().collect();
        self.touched_routes.clear();
        self.improved.clear();
        self.reached.clear();

        for route in routes {
            let Some(start) = self.earliest_route_stop[route].take() else {
                continue;
            };
            let end = self.schedule.route_stops_of(RouteIdx(route)).end;
            let mut boarding: Option<Boarding> = None;

            for rs in (start..end).map(RouteStopIdx) {
                let Some(label_idx) = self.best_per_route_stop[rs.0] else {
                    if let Some(current) = boarding {
                        self.ride(current, rs);
                    }
                    continue;
                };
                let label = self.arena.get(label_idx);
                let (arrival, kind, coming_from, cost) =
                    (label.arrival_time, label.kind, label.coming_from, label.cost());

                match (self.schedule.next_departure(rs, arrival), boarding) {
                    (Some(departure), None) => {
                        boarding = Some(self.board(label_idx, rs, departure));
                    }
                    (Some(departure), Some(current)) if departure < current.departure => {
                        boarding = Some(self.board(label_idx, rs, departure));
                    }
                    (Some(departure), Some(current)) if departure == current.departure => {
                        let candidate = self.arrival(current, rs);
                        if cost < candidate.cost() {
                            boarding = Some(match (kind, coming_from) {
                                (
                                    PathKind::Vehicle {
                                        board,
                                        departure: ridden,
                                        enter_time,
                                    },
                                    Some(from),
                                ) if ridden == departure => Boarding {
                                    from,
                                    board,
                                    departure,
                                    enter_time,
                                },
                                _ => self.board(label_idx, rs, departure),
                            });
                        } else if self.offer(rs, candidate) {
                            self.reached.insert(rs.0);
                        }
                    }
                    (_, Some(current)) => self.ride(current, rs),
                    (None, None) => {}
                }
            }
        }
    }

    fn board(&self, from: PathIdx, rs: RouteStopIdx, departure: DepartureIdx) -> Boarding {
        let ready = self.arena.get(from).arrival_time;
        let vehicle =
            self.schedule.departure_time(departure) + self.schedule.route_stop(rs).arrival_offset;
        Boarding {
            from,
            board: rs,
            departure,
            enter_time: ready.max(vehicle),
        }
    }

    /// Propagate the current boarding to `rs`.
    fn ride(&mut self, boarding: Boarding, rs: RouteStopIdx) {
        let candidate = self.arrival(boarding, rs);
        if self.offer(rs, candidate) {
            self.reached.insert(rs.0);
        }
    }

    /// The label the current boarding gives at `rs`.
    fn arrival(&self, boarding: Boarding, rs: RouteStopIdx) -> PathElement {
        let schedule = self.schedule;
        let from = self.arena.get(boarding.from);
        let arrival =
            schedule.departure_time(boarding.departure) + schedule.route_stop(rs).arrival_offset;
        let waiting = boarding.enter_time.saturating_sub(from.arrival_time);
        let in_vehicle = arrival.saturating_sub(boarding.enter_time);
        let travel_cost = from.travel_cost
            + f64::from(waiting) * -self.config.marginal_utility_of_waiting_pt
            + f64::from(in_vehicle) * -self.config.marginal_utility_of_travel_time_pt;

        let first_departure = from.first_departure_time.unwrap_or(boarding.enter_time);
        let to_mode = schedule.mode_of(rs);
        let from_mode = match from.coming_from {
            Some(previous) if from.is_transfer() => {
                schedule.mode_of(self.arena.get(previous).to_route_stop)
            }
            _ => to_mode,
        };
        let increment = self.costs.transfer_cost(&TransferContext {
            path: self.arena.as_slice(),
            current: boarding.from,
            schedule,
            total_travel_time: arrival.saturating_sub(first_departure),
            transfer_count: from.transfer_count,
            existing_transfer_cost: from.transfer_cost,
            segment_end_time: arrival,
            from_mode,
            to_mode,
        });

        PathElement {
            coming_from: Some(boarding.from),
            to_route_stop: rs,
            kind: PathKind::Vehicle {
                board: boarding.board,
                departure: boarding.departure,
                enter_time: boarding.enter_time,
            },
            arrival_time: arrival,
            travel_cost,
            transfer_cost: from.transfer_cost + increment,
            transfer_count: from.transfer_count,
            first_departure_time: Some(first_departure),
        }
    }

    fn relax_transfers(&mut self) {
        let schedule = self.schedule;
        let sources: Vec<usize> = self.reached.ones().collect();

        for rs in sources.into_iter().map(RouteStopIdx) {
            let Some(from_idx) = self.best_per_route_stop[rs.0] else {
                continue;
            };
            let from = self.arena.get(from_idx).clone();
            if !from.is_vehicle() || from.cost() > self.best_arrival_cost {
                continue;
            }
            let from_mode = schedule.mode_of(rs);
            let first_departure = from.first_departure_time.unwrap_or(from.arrival_time);

            for transfer in schedule.transfers_of(rs) {
                let arrival = from.arrival_time.saturating_add(transfer.time);
                let count = from.transfer_count + 1;
                let increment = self.costs.transfer_cost(&TransferContext {
                    path: self.arena.as_slice(),
                    current: from_idx,
                    schedule,
                    total_travel_time: arrival.saturating_sub(first_departure),
                    transfer_count: count,
                    existing_transfer_cost: from.transfer_cost,
                    segment_end_time: arrival,
                    from_mode,
                    to_mode: schedule.mode_of(transfer.to),
                });
                let element = PathElement {
                    coming_from: Some(from_idx),
                    to_route_stop: transfer.to,
                    kind: PathKind::Transfer,
                    arrival_time: arrival,
                    travel_cost: from.travel_cost + transfer.cost,
                    transfer_cost: from.transfer_cost + increment,
                    transfer_count: count,
                    first_departure_time: from.first_departure_time,
                };
                if self.offer(transfer.to, element) {
                    self.mark_improved(transfer.to);
                }
            }
        }
    }

    /// Legs of the chain ending at `last`, with access and egress.
    fn legs(
        &self,
        departure: u32,
        access: &[InitialStop],
        egress: &InitialStop,
        last: PathIdx,
    ) -> Vec<Leg> {
        let schedule = self.schedule;
        let mut legs = Vec::new();

        for idx in self.arena.chain(last) {
            let element = self.arena.get(idx);
            match element.kind {
                PathKind::Access { initial } => {
                    let Some(candidate) = access.get(initial) else {
                        continue;
                    };
                    feeder_legs(
                        &mut legs,
                        candidate,
                        departure,
                        Place::Origin,
                        Place::stop(schedule.stop(candidate.stop).id.clone()),
                        Mode::access_walk(),
                    );
                }
                PathKind::Vehicle {
                    board, departure, ..
                } => {
                    let board_rs = schedule.route_stop(board);
                    let route = schedule.route(board_rs.route);
                    legs.push(Leg::Transit(TransitLeg {
                        line: schedule.line(route.line).id.clone(),
                        route: route.id.clone(),
                        mode: route.mode.clone(),
                        board_stop: schedule.stop(board_rs.stop).id.clone(),
                        alight_stop: schedule.stop(self.stop_of(element.to_route_stop)).id.clone(),
                        departure: ScheduleTime::from_seconds(
                            schedule.departure_time(departure) + board_rs.departure_offset,
                        ),
                        arrival: ScheduleTime::from_seconds(element.arrival_time),
                    }));
                }
                PathKind::Transfer => {
                    let Some(previous) = element.coming_from.map(|p| self.arena.get(p)) else {
                        continue;
                    };
                    let from = schedule.stop(self.stop_of(previous.to_route_stop));
                    let to = schedule.stop(self.stop_of(element.to_route_stop));
                    if from.id == to.id {
                        continue;
                    }
                    legs.push(Leg::NonTransit(NonTransitLeg {
                        from: Place::stop(from.id.clone()),
                        to: Place::stop(to.id.clone()),
                        mode: Mode::transit_walk(),
                        departure: ScheduleTime::from_seconds(previous.arrival_time),
                        travel_time: element.arrival_time.saturating_sub(previous.arrival_time),
                        distance: from.coord.distance(&to.coord) * self.config.beeline_distance_factor,
                    }));
                }
            }
        }

        feeder_legs(
            &mut legs,
            egress,
            self.arena.get(last).arrival_time,
            Place::stop(schedule.stop(egress.stop).id.clone()),
            Place::Destination,
            Mode::egress_walk(),
        );
        legs
    }
}

/// Append an access or egress candidate's legs starting at `start`: its
/// sub-legs if it has any, otherwise one walk between `from` and `to`.
fn feeder_legs(
    legs: &mut Vec<Leg>,
    candidate: &InitialStop,
    start: u32,
    from: Place,
    to: Place,
    walk_mode: Mode,
) {
    if candidate.legs.is_empty() {
        legs.push(Leg::NonTransit(NonTransitLeg {
            from,
            to,
            mode: walk_mode,
            departure: ScheduleTime::from_seconds(start),
            travel_time: candidate.time,
            distance: candidate.distance,
        }));
        return;
    }
    let mut time = start;
    for sub in &candidate.legs {
        let leg = NonTransitLeg::from_feeder(sub, ScheduleTime::from_seconds(time));
        time = time.saturating_add(sub.travel_time);
        legs.push(Leg::NonTransit(leg));
    }
}


#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::tests::{label, two_lines};
    use super::*;
    use crate::planner::DefaultTransferCost;

    proptest! {
        /// Offering labels never raises the best complete arrival, and
        /// nothing over it is stored
        #[test]
        fn bound_never_increases(
            offers in prop::collection::vec((0usize..5, 0.0f64..10.0), 1..40)
        ) {
            let config = RaptorConfig::default();
            let schedule = two_lines(&config);
            let model = DefaultTransferCost::new(&config);
            let mut worker = RaptorWorker::new(&schedule, &config, &model);
            for rs in [2, 4] {
                worker.destination.insert(rs);
                worker.egress_cost[rs] = 0.25;
            }

            let mut bound = f64::INFINITY;
            for (rs, cost) in offers {
                let stored = worker.offer(RouteStopIdx(rs), label(rs, cost));
                prop_assert!(worker.best_arrival_cost <= bound);
                prop_assert!(!stored || cost <= bound);
                bound = worker.best_arrival_cost;
            }
        }
    }
}
