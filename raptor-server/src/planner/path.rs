//! Labels of the round-based search.
//!
//! Labels live in a per-query arena and point back at their predecessor by
//! index. A label is only ever pushed after its predecessor, so chains are
//! acyclic and every back-reference points to a strictly smaller index.

use crate::schedule::{DepartureIdx, RouteStopIdx};

/// Index of a label in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathIdx(pub usize);

/// How a label's route-stop was reached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathKind {
    /// Seeded from an access candidate (index into the access list).
    Access { initial: usize },
    /// Rode one run of a route.
    Vehicle {
        board: RouteStopIdx,
        departure: DepartureIdx,
        /// When the traveller got on (seconds).
        enter_time: u32,
    },
    /// Walked a footpath.
    Transfer,
}

/// One search label: how a route-stop was reached and at what cost.
#[derive(Debug, Clone, PartialEq)]
pub struct PathElement {
    pub coming_from: Option<PathIdx>,
    pub to_route_stop: RouteStopIdx,
    pub kind: PathKind,
    /// Seconds.
    pub arrival_time: u32,
    /// Accumulated cost without transfer penalties.
    pub travel_cost: f64,
    /// Accumulated transfer penalties.
    pub transfer_cost: f64,
    pub transfer_count: usize,
    /// Vehicle departure of the first ride, once there is one.
    pub first_departure_time: Option<u32>,
}

impl PathElement {
    /// Total generalized cost of the label.
    pub fn cost(&self) -> f64 {
        self.travel_cost + self.transfer_cost
    }

    /// Returns true for walked footpath labels.
    pub fn is_transfer(&self) -> bool {
        matches!(self.kind, PathKind::Transfer)
    }

    /// Returns true for labels that rode a vehicle.
    pub fn is_vehicle(&self) -> bool {
        matches!(self.kind, PathKind::Vehicle { .. })
    }
}

/// Append-only label storage for one query.
#[derive(Debug, Default)]
pub struct PathArena {
    elements: Vec<PathElement>,
}

impl PathArena {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            elements: Vec::with_capacity(capacity),
        }
    }

    /// Append a label.
    pub fn push(&mut self, element: PathElement) -> PathIdx {
        debug_assert!(
            element
                .coming_from
                .is_none_or(|from| from.0 < self.elements.len()),
            "labels may only point backwards"
        );
        self.elements.push(element);
        PathIdx(self.elements.len() - 1)
    }

    pub fn get(&self, idx: PathIdx) -> &PathElement {
        &self.elements[idx.0]
    }

    pub fn as_slice(&self) -> &[PathElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    /// The chain ending at `last`, root first.
    pub fn chain(&self, last: PathIdx) -> Vec<PathIdx> {
        let mut chain = vec![last];
        let mut current = last;
        while let Some(previous) = self.get(current).coming_from {
            chain.push(previous);
            current = previous;
        }
        chain.reverse();
        chain
    }
}
