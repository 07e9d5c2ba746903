//! Footpath generation between nearby stop facilities.
//!
//! Every facility is connected with every facility within the beeline
//! connection distance, itself included, since other routes may depart
//! from the same facility. Facility pairs are then expanded to route-stop
//! pairs.

use tracing::debug;

use crate::planner::RaptorConfig;

use super::compiled::{CompiledSchedule, RouteStopIdx, StopIdx, Transfer};

/// Walking time between two facilities (seconds).
///
/// An explicit walk entry for the pair wins; otherwise the beeline time,
/// never below `minimal_transfer_time`, rounded up to whole seconds. Within
/// one facility it is the facility's minimal transfer time, as the stop
/// resolver uses for bridge legs.
fn footpath_time(
    schedule: &CompiledSchedule,
    config: &RaptorConfig,
    from: StopIdx,
    to: StopIdx,
    distance: f64,
) -> u32 {
    let from_id = &schedule.stop(from).id;
    if from == to {
        return schedule.walkable().minimal_transfer_time(from_id);
    }
    let to_id = &schedule.stop(to).id;
    if let Some(seconds) = schedule.walkable().get(from_id, to_id) {
        return seconds;
    }
    let beeline = (distance / config.beeline_walk_speed).ceil();
    // Saturating float to int cast
    (beeline as u32).max(config.minimal_transfer_time)
}

/// Fill in `transfers` and the per-route-stop transfer ranges.
pub(super) fn attach_footpaths(schedule: &mut CompiledSchedule, config: &RaptorConfig) {
    let mut transfers = Vec::new();
    let mut ranges = Vec::with_capacity(schedule.route_stop_count());

    // Facility-level footpaths, computed once per facility
    let footpaths: Vec<Vec<(StopIdx, u32)>> = (0..schedule.stops().len())
        .map(|i| {
            let from = StopIdx(i);
            schedule
                .spatial()
                .within(schedule.stop(from).coord, config.beeline_walk_connection_distance)
                .into_iter()
                .map(|(to, distance)| (to, footpath_time(schedule, config, from, to, distance)))
                .collect()
        })
        .collect();

    for i in 0..schedule.route_stop_count() {
        let from_rs = RouteStopIdx(i);
        let first = transfers.len();
        // Nobody alights at the first stop of a route
        if !schedule.is_first_of_route(from_rs) {
            let from_stop = schedule.route_stop(from_rs).stop;
            for &(to_stop, time) in &footpaths[from_stop.0] {
                let cost = config.walk_cost(f64::from(time));
                for &to_rs in schedule.route_stops_at(to_stop) {
                    if to_rs == from_rs || schedule.is_last_of_route(to_rs) {
                        continue;
                    }
                    transfers.push(Transfer {
                        to: to_rs,
                        time,
                        cost,
                    });
                }
            }
        }
        ranges.push((first, transfers.len() - first));
    }

    for (rs, (first, count)) in schedule.route_stops.iter_mut().zip(ranges) {
        rs.first_transfer = first;
        rs.transfer_count = count;
    }
    debug!(transfers = transfers.len(), "generated footpaths");
    schedule.transfers = transfers;
}
