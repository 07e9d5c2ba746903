//! Application state for the web layer.

use std::sync::Arc;

use crate::access::AccessEgressProvider;
use crate::batch::BatchRouter;
use crate::cache::{CacheConfig, ConnectionCache};
use crate::planner::{DefaultTransferCost, RaptorConfig};
use crate::schedule::CompiledSchedule;

/// Shared application state.
///
/// Cloning is cheap; every handler gets the same schedule.
#[derive(Clone)]
pub struct AppState {
    /// Router over the compiled schedule
    pub router: BatchRouter,

    /// Memoised connection trees
    pub trees: ConnectionCache,
}

impl AppState {
    /// Create a new app state with the default transfer cost model.
    pub fn new(
        schedule: CompiledSchedule,
        config: RaptorConfig,
        provider: Arc<dyn AccessEgressProvider>,
        cache: &CacheConfig,
    ) -> Self {
        let costs = DefaultTransferCost::new(&config);
        Self {
            router: BatchRouter::new(
                Arc::new(schedule),
                Arc::new(config),
                Arc::new(costs),
                provider,
            ),
            trees: ConnectionCache::new(cache),
        }
    }
}
