//! Explicit walking times between stop facilities.
//!
//! Footpaths between nearby facilities are normally derived from beeline
//! distance. Some pairs need a known walking time instead (long corridors,
//! stairs, a river in the way), and a facility paired with itself gives its
//! minimal transfer time. This module stores those overrides.

use std::collections::HashMap;

use crate::domain::StopId;

/// Minimal transfer time at a facility without an explicit entry (seconds).
///
/// Also the default of `RaptorConfig::minimal_transfer_time`; a compiled
/// schedule replaces it with the configured value.
pub const DEFAULT_MINIMAL_TRANSFER_SECS: u32 = 0;

/// A collection of walking times between stop facilities, in seconds.
///
/// `add` stores a connection in both directions; `add_directed` stores one
/// direction only, for pairs that are not symmetric.
#[derive(Debug, Clone)]
pub struct WalkableConnections {
    /// From facility, then to facility.
    connections: HashMap<StopId, HashMap<StopId, u32>>,
    minimal_transfer_time: u32,
}

impl Default for WalkableConnections {
    fn default() -> Self {
        Self {
            connections: HashMap::new(),
            minimal_transfer_time: DEFAULT_MINIMAL_TRANSFER_SECS,
        }
    }
}

impl WalkableConnections {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `seconds` as the minimal transfer time of facilities without an
    /// entry for themselves.
    pub fn with_minimal_transfer_time(mut self, seconds: u32) -> Self {
        self.minimal_transfer_time = seconds;
        self
    }

    /// Add a walking time between two facilities, in both directions.
    pub fn add(&mut self, from: StopId, to: StopId, seconds: u32) {
        self.add_directed(to.clone(), from.clone(), seconds);
        self.add_directed(from, to, seconds);
    }

    /// Add a walking time for one direction only.
    pub fn add_directed(&mut self, from: StopId, to: StopId, seconds: u32) {
        self.connections.entry(from).or_default().insert(to, seconds);
    }

    /// Get the walking time between two facilities, if one is known.
    pub fn get(&self, from: &StopId, to: &StopId) -> Option<u32> {
        self.connections.get(from)?.get(to).copied()
    }

    /// Minimal time to change vehicles within one facility.
    ///
    /// Uses the facility's entry with itself, or the collection's default
    /// when there is none.
    ///
    /// # Example
    ///
    /// ```
    /// use raptor_server::domain::StopId;
    /// use raptor_server::walkable::WalkableConnections;
    ///
    /// let hb = StopId::parse("HB").unwrap();
    /// let mut walks = WalkableConnections::new().with_minimal_transfer_time(30);
    /// assert_eq!(walks.minimal_transfer_time(&hb), 30);
    ///
    /// walks.add(hb.clone(), hb.clone(), 180);
    /// assert_eq!(walks.minimal_transfer_time(&hb), 180);
    /// ```
    pub fn minimal_transfer_time(&self, stop: &StopId) -> u32 {
        self.get(stop, stop).unwrap_or(self.minimal_transfer_time)
    }

    /// Number of stored directed entries.
    pub fn entry_count(&self) -> usize {
        self.connections.values().map(HashMap::len).sum()
    }
}
