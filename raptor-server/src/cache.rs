//! Memo cache for stop-to-all-stops connection trees.
//!
//! Batch jobs ask for the tree of the same stop and departure time many
//! times. Trees are computed by whichever worker misses first; if two
//! workers miss the same key at once, both compute and the last insert
//! wins. This is only sound because the search is deterministic: both
//! values are identical.

use std::sync::Arc;

use moka::sync::Cache as MokaCache;

use crate::domain::ScheduleTime;
use crate::planner::{InitialStop, RaptorWorker, StopConnections};
use crate::schedule::StopIdx;

/// Cache key: (start stop, departure time).
type TreeKey = (StopIdx, ScheduleTime);

/// Configuration for the cache.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached trees.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
        }
    }
}

/// Shared cache of connection trees.
#[derive(Clone)]
pub struct ConnectionCache {
    trees: MokaCache<TreeKey, Arc<StopConnections>>,
}

impl ConnectionCache {
    /// Create a new cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            trees: MokaCache::builder()
                .max_capacity(config.max_capacity)
                .build(),
        }
    }

    /// Get a cached tree.
    pub fn get(&self, stop: StopIdx, departure: ScheduleTime) -> Option<Arc<StopConnections>> {
        self.trees.get(&(stop, departure))
    }

    /// Insert a tree, replacing any previous one for the key.
    pub fn insert(&self, stop: StopIdx, departure: ScheduleTime, tree: Arc<StopConnections>) {
        self.trees.insert((stop, departure), tree);
    }

    /// The tree for `stop`, computed with `worker` on a miss.
    pub fn get_or_compute(
        &self,
        stop: StopIdx,
        departure: ScheduleTime,
        worker: &mut RaptorWorker<'_>,
    ) -> Arc<StopConnections> {
        if let Some(cached) = self.get(stop, departure) {
            return cached;
        }
        let tree = Arc::new(worker.calc_tree(departure, &[InitialStop::at(stop)]));
        self.insert(stop, departure, tree.clone());
        tree
    }

    /// Number of cached trees (for monitoring).
    ///
    /// Eventually consistent with recent inserts.
    pub fn entry_count(&self) -> u64 {
        self.trees.run_pending_tasks();
        self.trees.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{DefaultTransferCost, RaptorConfig};
    use crate::schedule::{CompiledSchedule, RawScheduleBuilder};

    fn schedule(config: &RaptorConfig) -> CompiledSchedule {
        let raw = RawScheduleBuilder::new()
            .stop("A", 0.0, 0.0)
            .stop("B", 5000.0, 0.0)
            .route("L1", "R1", "bus", &[("A", 0, 0), ("B", 300, 300)], &[0, 600])
            .build();
        CompiledSchedule::compile(&raw, config).unwrap()
    }

    #[test]
    fn default_config() {
        assert_eq!(CacheConfig::default().max_capacity, 10_000);
    }

    #[test]
    fn computes_once_per_key() {
        let config = RaptorConfig::default();
        let schedule = schedule(&config);
        let model = DefaultTransferCost::new(&config);
        let mut worker = RaptorWorker::new(&schedule, &config, &model);
        let cache = ConnectionCache::new(&CacheConfig::default());

        let first = cache.get_or_compute(StopIdx(0), ScheduleTime::from_seconds(0), &mut worker);
        let second = cache.get_or_compute(StopIdx(0), ScheduleTime::from_seconds(0), &mut worker);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first[&StopIdx(1)].arrival_time, ScheduleTime::from_seconds(300));

        // A different departure is a different tree
        let later = cache.get_or_compute(StopIdx(0), ScheduleTime::from_seconds(1), &mut worker);
        assert_eq!(later[&StopIdx(1)].arrival_time, ScheduleTime::from_seconds(900));
        assert_eq!(cache.entry_count(), 2);
        assert!(cache.get(StopIdx(1), ScheduleTime::from_seconds(0)).is_none());
    }

    #[test]
    fn last_insert_wins() {
        let cache = ConnectionCache::new(&CacheConfig::default());
        let departure = ScheduleTime::from_seconds(0);
        cache.insert(StopIdx(3), departure, Arc::new(StopConnections::new()));

        let replacement = Arc::new(StopConnections::new());
        cache.insert(StopIdx(3), departure, replacement.clone());

        let cached = cache.get(StopIdx(3), departure).unwrap();
        assert!(Arc::ptr_eq(&cached, &replacement));
    }
}
