//! Many independent queries on a rayon pool.
//!
//! Each rayon job gets its own [`RaptorWorker`] and shares the compiled
//! schedule, configuration, cost model and feeder provider. Results come
//! back in input order, and random mode draws are seeded per item, so a
//! batch gives the same answers however the pool splits it. Single requests
//! are seeded from their own contents, so repeating one repeats the answer.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use tracing::info;

use crate::access::AccessEgressProvider;
use crate::cache::ConnectionCache;
use crate::domain::ScheduleTime;
use crate::planner::{
    Itinerary, JourneyRequest, RaptorConfig, RaptorWorker, StopConnections, TransferCostModel,
};
use crate::resolver::StopResolver;
use crate::schedule::{CompiledSchedule, StopIdx};

/// Runs query batches against one shared schedule.
#[derive(Clone)]
pub struct BatchRouter {
    schedule: Arc<CompiledSchedule>,
    config: Arc<RaptorConfig>,
    costs: Arc<dyn TransferCostModel>,
    provider: Arc<dyn AccessEgressProvider>,
    seed: u64,
}

impl BatchRouter {
    pub fn new(
        schedule: Arc<CompiledSchedule>,
        config: Arc<RaptorConfig>,
        costs: Arc<dyn TransferCostModel>,
        provider: Arc<dyn AccessEgressProvider>,
    ) -> Self {
        Self {
            schedule,
            config,
            costs,
            provider,
            seed: 0,
        }
    }

    /// Use `seed` as the base of the per-item random sources.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn schedule(&self) -> &CompiledSchedule {
        &self.schedule
    }

    pub fn config(&self) -> &RaptorConfig {
        &self.config
    }

    /// The random source used for item `index`.
    pub fn rng_for(&self, index: usize) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ index as u64)
    }

    /// The random source for a single request: the base seed mixed with a
    /// hash of the request's end points and departure.
    pub fn rng_for_request(&self, request: &JourneyRequest) -> StdRng {
        let mut hasher = DefaultHasher::new();
        for value in [request.from.x, request.from.y, request.to.x, request.to.y] {
            value.to_bits().hash(&mut hasher);
        }
        request.departure.seconds().hash(&mut hasher);
        StdRng::seed_from_u64(self.seed ^ hasher.finish())
    }

    /// Plan one request on the calling thread.
    pub fn plan(&self, request: &JourneyRequest) -> Option<Itinerary> {
        let resolver = self.resolver();
        self.worker()
            .plan(&resolver, request, &mut self.rng_for_request(request))
    }

    /// A worker over the shared schedule, for single queries.
    pub fn worker(&self) -> RaptorWorker<'_> {
        RaptorWorker::new(&self.schedule, &self.config, self.costs.as_ref())
    }

    /// A stop resolver over the shared schedule.
    pub fn resolver(&self) -> StopResolver<'_> {
        StopResolver::new(&self.schedule, &self.config, self.provider.as_ref())
    }

    /// Plan every request, in parallel.
    pub fn plan_all(&self, requests: &[JourneyRequest]) -> Vec<Option<Itinerary>> {
        let resolver = self.resolver();
        let results: Vec<Option<Itinerary>> = requests
            .par_iter()
            .enumerate()
            .map_init(
                || self.worker(),
                |worker, (index, request)| {
                    worker.plan(&resolver, request, &mut self.rng_for(index))
                },
            )
            .collect();

        info!(
            requests = requests.len(),
            found = results.iter().filter(|r| r.is_some()).count(),
            "batch planned"
        );
        results
    }

    /// Connection trees from every stop in `stops`, in parallel, memoised
    /// in `cache`.
    pub fn trees(
        &self,
        stops: &[StopIdx],
        departure: ScheduleTime,
        cache: &ConnectionCache,
    ) -> Vec<Arc<StopConnections>> {
        stops
            .par_iter()
            .map_init(
                || self.worker(),
                |worker, &stop| cache.get_or_compute(stop, departure, worker),
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;
    use crate::access::{BeelineRouter, FeederProfile, LiveRouting};
    use crate::cache::CacheConfig;
    use crate::domain::{Coord, Mode};
    use crate::planner::DefaultTransferCost;
    use crate::resolver::{IntermodalConfig, ModeParams, ModeSelection, Person};
    use crate::schedule::RawScheduleBuilder;

    fn router(config: RaptorConfig) -> BatchRouter {
        let raw = RawScheduleBuilder::new()
            .stop("A", 0.0, 0.0)
            .stop("B", 3000.0, 0.0)
            .stop("C", 6000.0, 0.0)
            .stop("D", 6000.0, 3000.0)
            .route(
                "L1",
                "R1",
                "rail",
                &[("A", 0, 0), ("B", 240, 240), ("C", 480, 480)],
                &[0, 300, 600, 900, 1200],
            )
            .route("L2", "R1", "bus", &[("C", 0, 0), ("D", 400, 400)], &[500, 1000, 1500])
            .build();
        let schedule = CompiledSchedule::compile(&raw, &config).unwrap();
        let costs = DefaultTransferCost::new(&config);
        let provider = LiveRouting::new(BeelineRouter::new([FeederProfile {
            mode: Mode::bike_feeder(),
            speed: 4.0,
            detour_factor: 1.2,
            access_time: 30.0,
            egress_time: 30.0,
        }]));
        BatchRouter::new(
            Arc::new(schedule),
            Arc::new(config),
            Arc::new(costs),
            Arc::new(provider),
        )
        .with_seed(42)
    }

    fn random_bike() -> RaptorConfig {
        RaptorConfig {
            intermodal: IntermodalConfig {
                enabled: true,
                selection: ModeSelection::RandomlySelectOneModePerRequest,
                modes: vec![ModeParams {
                    mode: Mode::bike_feeder(),
                    max_radius: 4000.0,
                    person_filter: None,
                    stop_filter: None,
                    attachment: None,
                    use_minimal_transfer_times: false,
                    marginal_utility_of_time: -6.0 / 3600.0,
                    marginal_utility_of_distance: 0.0,
                    constant: -0.5,
                }],
                profiles: Vec::new(),
            },
            ..RaptorConfig::default()
        }
    }

    fn requests() -> Vec<JourneyRequest> {
        (0..40)
            .map(|i| JourneyRequest {
                from: Coord::new(f64::from(i % 4) * 100.0, 50.0),
                to: Coord::new(6000.0 + f64::from(i % 3) * 50.0, 2900.0),
                departure: ScheduleTime::from_seconds(i * 10),
                person: Person::default(),
            })
            .collect()
    }

    #[test]
    fn batch_matches_sequential() {
        let router = router(random_bike());
        let requests = requests();

        let batch = router.plan_all(&requests);

        let resolver = router.resolver();
        let mut worker = router.worker();
        let sequential: Vec<Option<Itinerary>> = requests
            .iter()
            .enumerate()
            .map(|(i, request)| worker.plan(&resolver, request, &mut router.rng_for(i)))
            .collect();

        assert_eq!(batch.len(), requests.len());
        assert_eq!(batch, sequential);
        assert!(batch.iter().all(Option::is_some));
    }

    #[test]
    fn single_requests_are_repeatable() {
        let router = router(random_bike());

        for request in requests() {
            let first = router.plan(&request);
            assert!(first.is_some());
            assert_eq!(router.plan(&request), first);

            let resolver = router.resolver();
            let again = router.worker().plan(
                &resolver,
                &request,
                &mut router.rng_for_request(&request),
            );
            assert_eq!(again, first);
        }
    }

    #[test]
    fn request_seed_follows_contents() {
        let router = router(RaptorConfig::default());
        let requests = requests();
        let draw = |request: &JourneyRequest| router.rng_for_request(request).r#gen::<u64>();

        assert_eq!(draw(&requests[0]), draw(&requests[0].clone()));
        assert_ne!(draw(&requests[0]), draw(&requests[1]));
        let reseeded = router.clone().with_seed(7);
        assert_ne!(
            reseeded.rng_for_request(&requests[0]).r#gen::<u64>(),
            draw(&requests[0])
        );
    }

    #[test]
    fn trees_fill_the_cache() {
        let router = router(RaptorConfig::default());
        let cache = ConnectionCache::new(&CacheConfig::default());
        let stops = [StopIdx(0), StopIdx(1), StopIdx(0)];

        let trees = router.trees(&stops, ScheduleTime::from_seconds(0), &cache);

        assert_eq!(trees.len(), 3);
        assert_eq!(trees[0], trees[2]);
        assert!(trees[0].contains_key(&StopIdx(3)));
        assert!(!trees[1].contains_key(&StopIdx(0)));
        assert_eq!(cache.entry_count(), 2);
    }
}
