//! Access and egress candidates handed to the search.

use std::collections::HashMap;

use crate::domain::Mode;
use crate::schedule::StopIdx;

use super::itinerary::FeederLeg;

/// A stop facility reachable from the origin (access) or the destination
/// (egress), with the cost and time of getting there.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialStop {
    pub stop: StopIdx,
    /// Generalized cost of the access or egress leg.
    pub cost: f64,
    /// Seconds.
    pub time: u32,
    /// Metres.
    pub distance: f64,
    pub mode: Mode,
    /// Non-transit sub-legs; empty for a plain walk.
    pub legs: Vec<FeederLeg>,
}

impl InitialStop {
    /// A plain walking candidate.
    pub fn walk(stop: StopIdx, cost: f64, time: u32, distance: f64) -> Self {
        Self {
            stop,
            cost,
            time,
            distance,
            mode: Mode::walk(),
            legs: Vec::new(),
        }
    }

    /// A zero-cost candidate standing at the stop itself.
    pub fn at(stop: StopIdx) -> Self {
        Self::walk(stop, 0.0, 0, 0.0)
    }
}

/// Keep the cheapest candidate per facility, ties going to the earlier one.
///
/// Returns the candidates with their positions in `candidates`, in order of
/// first appearance of each facility.
pub(crate) fn cheapest_per_stop(candidates: &[InitialStop]) -> Vec<(usize, &InitialStop)> {
    let mut position: HashMap<StopIdx, usize> = HashMap::new();
    let mut best: Vec<(usize, &InitialStop)> = Vec::new();
    for (i, candidate) in candidates.iter().enumerate() {
        match position.get(&candidate.stop) {
            Some(&slot) if candidate.cost < best[slot].1.cost => best[slot] = (i, candidate),
            Some(_) => {}
            None => {
                position.insert(candidate.stop, best.len());
                best.push((i, candidate));
            }
        }
    }
    best
}
