//! Intermodal stop resolution.
//!
//! Turns an origin or destination point into weighted candidate stops for
//! the search. Without intermodal modes every stop within walking range is
//! a candidate. With them, each configured feeder mode contributes the
//! stops it can serve, priced by the mode's own utilities.

mod params;

pub use params::{
    AttributeFilter, Direction, IntermodalConfig, ModeParams, ModeSelection, Person,
};

use rand::Rng;
use tracing::trace;

use crate::access::{AccessEgressProvider, FeederQuery, RouteCharacteristics};
use crate::domain::{Coord, Mode, ScheduleTime};
use crate::planner::{FeederLeg, InitialStop, Place, RaptorConfig};
use crate::schedule::{CompiledSchedule, StopIdx};

/// Finds access and egress stops around a point.
pub struct StopResolver<'a> {
    schedule: &'a CompiledSchedule,
    config: &'a RaptorConfig,
    provider: &'a dyn AccessEgressProvider,
}

impl<'a> StopResolver<'a> {
    pub fn new(
        schedule: &'a CompiledSchedule,
        config: &'a RaptorConfig,
        provider: &'a dyn AccessEgressProvider,
    ) -> Self {
        Self {
            schedule,
            config,
            provider,
        }
    }

    /// Candidate stops for reaching (access) or leaving (egress) `point`.
    ///
    /// An empty result means no stop is in range; it is not an error.
    pub fn find_stops<R: Rng + ?Sized>(
        &self,
        point: Coord,
        person: &Person,
        departure: ScheduleTime,
        direction: Direction,
        rng: &mut R,
    ) -> Vec<InitialStop> {
        let intermodal = &self.config.intermodal;
        let stops = if !intermodal.enabled {
            self.walk_stops(point)
        } else {
            let qualifying: Vec<&ModeParams> =
                intermodal.modes.iter().filter(|p| p.allows(person)).collect();
            let implicit_walk = !intermodal.modes.iter().any(|p| p.mode.is_walk());
            match intermodal.selection {
                ModeSelection::EvaluateAllModesPerStop => {
                    let mut stops: Vec<InitialStop> = qualifying
                        .iter()
                        .flat_map(|p| self.mode_stops(p, point, departure, direction))
                        .collect();
                    if implicit_walk {
                        stops.extend(self.walk_stops(point));
                    }
                    stops
                }
                ModeSelection::RandomlySelectOneModePerRequest => {
                    let options = qualifying.len() + usize::from(implicit_walk);
                    let mut stops = Vec::new();
                    let mut draws = 0;
                    while stops.is_empty() && draws < 2 * options {
                        let pick = rng.gen_range(0..options);
                        stops = match qualifying.get(pick) {
                            Some(params) => self.mode_stops(params, point, departure, direction),
                            None => self.walk_stops(point),
                        };
                        draws += 1;
                    }
                    stops
                }
            }
        };

        trace!(
            x = point.x,
            y = point.y,
            ?direction,
            candidates = stops.len(),
            "resolved stops"
        );
        stops
    }

    /// Stops within `radius` of `point`, sorted by distance. If fewer than
    /// two are found, the radius grows to the nearest stop's distance plus
    /// the extension radius.
    pub fn nearby(&self, point: Coord, radius: f64) -> Vec<(StopIdx, f64)> {
        let spatial = self.schedule.spatial();
        let found = spatial.within(point, radius);
        if found.len() >= 2 {
            return found;
        }
        match spatial.nearest(point) {
            Some((_, nearest)) => spatial.within(point, nearest + self.config.extension_radius),
            None => found,
        }
    }

    fn walk_stops(&self, point: Coord) -> Vec<InitialStop> {
        self.nearby(point, self.config.search_radius)
            .into_iter()
            .map(|(stop, beeline)| {
                let time = self.walk_time(beeline);
                InitialStop::walk(
                    stop,
                    self.config.walk_cost(f64::from(time)),
                    time,
                    beeline * self.config.beeline_distance_factor,
                )
            })
            .collect()
    }

    /// Whole seconds to walk a beeline distance.
    fn walk_time(&self, beeline: f64) -> u32 {
        (beeline / self.config.beeline_walk_speed).ceil() as u32
    }

    fn mode_stops(
        &self,
        params: &ModeParams,
        point: Coord,
        departure: ScheduleTime,
        direction: Direction,
    ) -> Vec<InitialStop> {
        let mut stops = Vec::new();
        for (stop, _) in self.nearby(point, params.max_radius) {
            let facility = self.schedule.stop(stop);
            if !params
                .stop_filter
                .as_ref()
                .is_none_or(|f| f.matches(&facility.attributes))
            {
                continue;
            }

            let attachment = params
                .attachment
                .as_ref()
                .and_then(|key| facility.attachments.get(key))
                .copied()
                .filter(|coord| *coord != facility.coord);
            let stop_point = attachment.unwrap_or(facility.coord);

            let characteristics = if params.mode.is_walk() {
                let beeline = point.distance(&stop_point);
                RouteCharacteristics {
                    distance: beeline * self.config.beeline_distance_factor,
                    access_time: 0.0,
                    egress_time: 0.0,
                    travel_time: f64::from(self.walk_time(beeline)),
                }
            } else {
                let query = FeederQuery {
                    mode: &params.mode,
                    stop,
                    stop_point,
                    point,
                    direction,
                    departure,
                };
                match self.provider.characteristics(&query) {
                    Some(found) => found,
                    None => continue,
                }
            };

            let total_time = characteristics.total_time();
            let leg_mode = match (params.mode.is_walk(), direction) {
                (true, Direction::Access) => Mode::access_walk(),
                (true, Direction::Egress) => Mode::egress_walk(),
                (false, _) => params.mode.clone(),
            };
            let stop_place = Place::stop(facility.id.clone());
            let near_end = match attachment {
                Some(coord) => Place::point(coord),
                None => stop_place.clone(),
            };
            let (from, to) = match direction {
                Direction::Access => (Place::Origin, near_end),
                Direction::Egress => (near_end, Place::Destination),
            };
            let mut legs = vec![FeederLeg {
                from,
                to,
                mode: leg_mode,
                travel_time: total_time.ceil() as u32,
                distance: characteristics.distance,
            }];

            if let Some(coord) = attachment {
                let bridge_time = if params.use_minimal_transfer_times {
                    self.schedule.walkable().minimal_transfer_time(&facility.id)
                } else {
                    0
                };
                match direction {
                    Direction::Access => legs.push(FeederLeg {
                        from: Place::point(coord),
                        to: stop_place,
                        mode: Mode::transit_walk(),
                        travel_time: bridge_time,
                        distance: 0.0,
                    }),
                    Direction::Egress => legs.insert(
                        0,
                        FeederLeg {
                            from: stop_place,
                            to: Place::point(coord),
                            mode: Mode::transit_walk(),
                            travel_time: bridge_time,
                            distance: 0.0,
                        },
                    ),
                }
            }

            stops.push(InitialStop {
                stop,
                cost: params.cost(total_time, characteristics.distance),
                time: legs.iter().map(|leg| leg.travel_time).sum(),
                distance: characteristics.distance,
                mode: params.mode.clone(),
                legs,
            });
        }
        stops
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::access::{BeelineRouter, FeederProfile, LiveRouting};
    use crate::domain::StopId;
    use crate::schedule::RawScheduleBuilder;

    fn schedule() -> CompiledSchedule {
        let raw = RawScheduleBuilder::new()
            .stop("A", 0.0, 0.0)
            .stop_with("B", 400.0, 0.0, &[("park_and_ride", "yes")])
            .attachment("car", 400.0, 100.0)
            .stop("C", 5000.0, 0.0)
            .stop_with("D", 3000.0, 0.0, &[("park_and_ride", "yes")])
            .route("L1", "R1", "bus", &[("A", 0, 0), ("C", 600, 600)], &[0])
            .walk("B", "B", 120)
            .build();
        CompiledSchedule::compile(&raw, &RaptorConfig::default()).unwrap()
    }

    fn provider() -> LiveRouting<BeelineRouter> {
        LiveRouting::new(BeelineRouter::new([FeederProfile {
            mode: Mode::car_feeder(),
            speed: 10.0,
            detour_factor: 1.0,
            access_time: 60.0,
            egress_time: 0.0,
        }]))
    }

    fn car(attachment: Option<&str>) -> ModeParams {
        ModeParams {
            mode: Mode::car_feeder(),
            max_radius: 4000.0,
            person_filter: Some(AttributeFilter {
                attribute: "car".to_string(),
                value: "yes".to_string(),
            }),
            stop_filter: Some(AttributeFilter {
                attribute: "park_and_ride".to_string(),
                value: "yes".to_string(),
            }),
            attachment: attachment.map(str::to_string),
            use_minimal_transfer_times: true,
            marginal_utility_of_time: -0.01,
            marginal_utility_of_distance: 0.0,
            constant: 0.0,
        }
    }

    fn intermodal(modes: Vec<ModeParams>, selection: ModeSelection) -> RaptorConfig {
        RaptorConfig {
            search_radius: 500.0,
            intermodal: IntermodalConfig {
                enabled: true,
                selection,
                modes,
                profiles: Vec::new(),
            },
            ..RaptorConfig::default()
        }
    }

    fn ids(schedule: &CompiledSchedule, stops: &[InitialStop]) -> Vec<String> {
        stops
            .iter()
            .map(|s| format!("{}:{}", schedule.stop(s.stop).id, s.mode))
            .collect()
    }

    #[test]
    fn walk_only_within_radius() {
        let schedule = schedule();
        let config = RaptorConfig {
            search_radius: 500.0,
            ..RaptorConfig::default()
        };
        let provider = provider();
        let resolver = StopResolver::new(&schedule, &config, &provider);
        let mut rng = StdRng::seed_from_u64(1);

        let stops = resolver.find_stops(
            Coord::new(100.0, 0.0),
            &Person::default(),
            ScheduleTime::from_seconds(0),
            Direction::Access,
            &mut rng,
        );

        assert_eq!(ids(&schedule, &stops), ["A:walk", "B:walk"]);
        let a = &stops[0];
        let expected_time = (100.0 / config.beeline_walk_speed).ceil() as u32;
        assert_eq!(a.time, expected_time);
        approx::assert_relative_eq!(a.distance, 130.0, epsilon = 1e-9);
        approx::assert_relative_eq!(a.cost, config.walk_cost(f64::from(expected_time)), epsilon = 1e-9);
        assert!(a.legs.is_empty());
    }

    #[test]
    fn radius_widens_when_too_few_stops() {
        let schedule = schedule();
        let config = RaptorConfig {
            search_radius: 500.0,
            extension_radius: 200.0,
            ..RaptorConfig::default()
        };
        let provider = provider();
        let resolver = StopResolver::new(&schedule, &config, &provider);

        // Only C within 500 m; nearest is C at 100 m, widened to 300 m
        let near_c = resolver.nearby(Coord::new(5100.0, 0.0), 500.0);
        assert_eq!(near_c.len(), 1);

        // Nothing within 500 m; D is nearest at 1000 m, widened to 1200 m
        let lonely = resolver.nearby(Coord::new(3000.0, 1000.0), 500.0);
        assert_eq!(lonely.len(), 1);
        assert_eq!(lonely[0].0, schedule.stop_index(&StopId::parse("D").unwrap()).unwrap());

        let between = resolver.nearby(Coord::new(4000.0, 0.0), 500.0);
        assert_eq!(between.len(), 2);
    }

    #[test]
    fn feeder_mode_with_attachment() {
        let schedule = schedule();
        let config = intermodal(vec![car(Some("car"))], ModeSelection::EvaluateAllModesPerStop);
        let provider = provider();
        let resolver = StopResolver::new(&schedule, &config, &provider);
        let driver = Person::with_attributes([("car", "yes")]);
        let mut rng = StdRng::seed_from_u64(1);

        let access = resolver.find_stops(
            Coord::new(0.0, 100.0),
            &driver,
            ScheduleTime::from_seconds(0),
            Direction::Access,
            &mut rng,
        );
        let cars: Vec<&InitialStop> = access.iter().filter(|s| s.mode == Mode::car_feeder()).collect();
        // B via its attachment and D; A and C lack the park-and-ride attribute
        assert_eq!(cars.len(), 2);
        let b = cars[0];
        assert_eq!(schedule.stop(b.stop).id.as_str(), "B");
        assert_eq!(b.legs.len(), 2);
        assert_eq!(b.legs[0].from, Place::Origin);
        assert_eq!(b.legs[0].to, Place::point(Coord::new(400.0, 100.0)));
        // 400 m at 10 m/s plus 60 s access time
        assert_eq!(b.legs[0].travel_time, 100);
        assert_eq!(b.legs[1].mode, Mode::transit_walk());
        assert_eq!(b.legs[1].travel_time, 120);
        assert_eq!(b.time, 220);
        approx::assert_relative_eq!(b.cost, 1.0, epsilon = 1e-9);

        // Walk candidates are added because no walk mode is configured
        assert!(access.iter().any(|s| s.mode == Mode::walk()));

        let egress = resolver.find_stops(
            Coord::new(0.0, 100.0),
            &driver,
            ScheduleTime::from_seconds(0),
            Direction::Egress,
            &mut rng,
        );
        let b = egress.iter().find(|s| s.mode == Mode::car_feeder()).unwrap();
        assert_eq!(b.legs[0].mode, Mode::transit_walk());
        assert_eq!(b.legs[1].to, Place::Destination);
    }

    #[test]
    fn person_filter_excludes_mode() {
        let schedule = schedule();
        let config = intermodal(vec![car(None)], ModeSelection::EvaluateAllModesPerStop);
        let provider = provider();
        let resolver = StopResolver::new(&schedule, &config, &provider);
        let mut rng = StdRng::seed_from_u64(1);

        let stops = resolver.find_stops(
            Coord::new(0.0, 100.0),
            &Person::default(),
            ScheduleTime::from_seconds(0),
            Direction::Access,
            &mut rng,
        );
        assert!(stops.iter().all(|s| s.mode == Mode::walk()));
        assert!(!stops.is_empty());
    }

    #[test]
    fn random_selection_is_seeded() {
        let schedule = schedule();
        let config = intermodal(vec![car(None)], ModeSelection::RandomlySelectOneModePerRequest);
        let provider = provider();
        let resolver = StopResolver::new(&schedule, &config, &provider);
        let driver = Person::with_attributes([("car", "yes")]);

        let run = |seed: u64| {
            let mut rng = StdRng::seed_from_u64(seed);
            resolver.find_stops(
                Coord::new(0.0, 100.0),
                &driver,
                ScheduleTime::from_seconds(0),
                Direction::Access,
                &mut rng,
            )
        };

        let mut modes = std::collections::HashSet::new();
        for seed in 0..32 {
            let first = run(seed);
            assert_eq!(first, run(seed));
            assert!(!first.is_empty());
            // One mode per request
            assert!(first.iter().all(|s| s.mode == first[0].mode));
            modes.insert(first[0].mode.clone());
        }
        assert_eq!(modes.len(), 2);
    }

    #[test]
    fn no_stops_is_empty() {
        let raw = RawScheduleBuilder::new().build();
        let schedule = CompiledSchedule::compile(&raw, &RaptorConfig::default()).unwrap();
        let config = RaptorConfig::default();
        let provider = provider();
        let resolver = StopResolver::new(&schedule, &config, &provider);
        let mut rng = StdRng::seed_from_u64(1);

        let stops = resolver.find_stops(
            Coord::new(0.0, 0.0),
            &Person::default(),
            ScheduleTime::from_seconds(0),
            Direction::Egress,
            &mut rng,
        );
        assert!(stops.is_empty());
    }
}
