//! Grid-based cache of feeder leg characteristics.
//!
//! Around every cached stop a square of `diameter` metres is cut into cells
//! of `cell_size` metres, numbered row-major from the top-left corner. For
//! each cell the car and bike legs between the stop and the cell centre are
//! routed once up front; lookups are then plain index arithmetic.
//!
//! Anything the grid cannot answer (a point outside the square, a stop that
//! was not cached, another mode) is routed live.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use rayon::prelude::*;
use serde::Deserialize;
use tracing::{info, trace, warn};

use crate::domain::{Coord, Mode, ScheduleTime, StopId};
use crate::resolver::{AttributeFilter, Direction};
use crate::schedule::{CompiledSchedule, StopIdx};

use super::characteristics::{AccessEgressProvider, FeederQuery, RouteCharacteristics};
use super::router::FeederRouter;

/// Values stored per cell.
const VALUES_PER_CELL: usize = 4;

/// Marks a cell the router could not reach.
const UNREACHABLE: u32 = u32::MAX;

/// Error reading or writing a grid cache file.
#[derive(Debug, thiserror::Error)]
pub enum CacheFileError {
    /// Underlying file error
    #[error("grid cache i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited text could not be read or written
    #[error("grid cache csv error: {0}")]
    Csv(#[from] csv::Error),

    /// A row does not match the grid layout
    #[error("malformed grid cache row {row}: {reason}")]
    Malformed { row: u64, reason: String },
}

/// Layout and modes of the grid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Edge length of a cell (metres).
    pub cell_size: u32,
    /// Edge length of the whole grid around a stop (metres).
    pub diameter: u32,
    /// Multiplier applied to routed car travel times.
    pub car_time_factor: f64,
    pub car_mode: Mode,
    pub bike_mode: Mode,
    /// Which stops get a grid; all stops when unset.
    pub stop_filter: Option<AttributeFilter>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_size: 200,
            diameter: 30_000,
            car_time_factor: 1.25,
            car_mode: Mode::car_feeder(),
            bike_mode: Mode::bike_feeder(),
            stop_filter: None,
        }
    }
}

impl GridConfig {
    /// Number of cells along one edge.
    pub fn row_size(&self) -> usize {
        if self.cell_size == 0 {
            return 0;
        }
        (self.diameter / self.cell_size) as usize
    }

    /// Number of cells in a grid.
    pub fn cell_count(&self) -> usize {
        self.row_size() * self.row_size()
    }

    /// Cell containing `point` in the grid centred on `centre`, if inside.
    ///
    /// # Example
    ///
    /// ```
    /// use raptor_server::access::GridConfig;
    /// use raptor_server::domain::Coord;
    ///
    /// let grid = GridConfig::default(); // 150 x 150 cells of 200 m
    /// let stop = Coord::new(0.0, 0.0);
    ///
    /// assert_eq!(grid.cell_number(stop, Coord::new(-15_000.0, 15_000.0)), Some(0));
    /// assert_eq!(grid.cell_number(stop, Coord::new(-14_700.0, 15_000.0)), Some(1));
    /// assert_eq!(grid.cell_number(stop, Coord::new(-15_000.0, 14_700.0)), Some(150));
    /// assert_eq!(grid.cell_number(stop, Coord::new(15_000.0, 0.0)), None);
    /// ```
    pub fn cell_number(&self, centre: Coord, point: Coord) -> Option<usize> {
        let half = f64::from(self.diameter) / 2.0;
        let cell = f64::from(self.cell_size);
        let top_left_x = centre.x - half;
        let top_left_y = centre.y + half;

        let row = ((top_left_y - point.y) / cell).floor();
        let col = ((point.x - top_left_x) / cell).floor();
        let rows = self.row_size() as f64;
        if !(0.0..rows).contains(&row) || !(0.0..rows).contains(&col) {
            return None;
        }
        Some(row as usize * self.row_size() + col as usize)
    }

    /// Centre of cell `index` in the grid centred on `centre`.
    pub fn cell_coordinate(&self, centre: Coord, index: usize) -> Coord {
        let half = f64::from(self.diameter) / 2.0;
        let cell = f64::from(self.cell_size);
        let row_size = self.row_size().max(1);
        let row = (index / row_size) as f64;
        let col = (index % row_size) as f64;
        Coord::new(
            centre.x - half + (col + 0.5) * cell,
            centre.y + half - (row + 0.5) * cell,
        )
    }
}

/// The precomputed grid of one stop.
#[derive(Debug, Clone)]
struct StopGrid {
    id: StopId,
    centre: Coord,
    /// `[car time, car distance, bike time, bike distance]` per cell.
    cells: Vec<[u32; VALUES_PER_CELL]>,
}

/// Grid cache with live-routing fallback.
#[derive(Debug)]
pub struct GridAccessEgressCache<R> {
    config: GridConfig,
    grids: BTreeMap<StopIdx, StopGrid>,
    router: R,
}

impl<R: FeederRouter> GridAccessEgressCache<R> {
    /// Route every cell of every selected stop, in parallel.
    pub fn precompute(schedule: &CompiledSchedule, config: GridConfig, router: R) -> Self {
        let selected: Vec<StopIdx> = (0..schedule.stops().len())
            .map(StopIdx)
            .filter(|&s| {
                config
                    .stop_filter
                    .as_ref()
                    .is_none_or(|f| f.matches(&schedule.stop(s).attributes))
            })
            .collect();
        info!(
            stops = selected.len(),
            cells = config.cell_count(),
            "precomputing access grid"
        );

        let grids = selected
            .par_iter()
            .map(|&s| {
                let stop = schedule.stop(s);
                let cells = route_cells(&config, &router, s, stop.coord);
                (
                    s,
                    StopGrid {
                        id: stop.id.clone(),
                        centre: stop.coord,
                        cells,
                    },
                )
            })
            .collect::<Vec<_>>()
            .into_iter()
            .collect();

        Self {
            config,
            grids,
            router,
        }
    }

    /// Load a cache file written by [`write`](Self::write).
    ///
    /// Rows for stops missing from `schedule` are skipped.
    pub fn read(
        path: &Path,
        schedule: &CompiledSchedule,
        config: GridConfig,
        router: R,
    ) -> Result<Self, CacheFileError> {
        let file = File::open(path)?;
        let input: Box<dyn Read> = if is_gzip(path) {
            Box::new(GzDecoder::new(BufReader::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .flexible(true)
            .from_reader(input);

        let expected = 1 + config.cell_count() * VALUES_PER_CELL;
        let mut grids = BTreeMap::new();
        let mut record = csv::StringRecord::new();
        let mut row = 0;
        while reader.read_record(&mut record)? {
            row += 1;
            if record.len() != expected {
                return Err(CacheFileError::Malformed {
                    row,
                    reason: format!("expected {expected} fields, found {}", record.len()),
                });
            }
            let id = StopId::parse(&record[0]).map_err(|e| CacheFileError::Malformed {
                row,
                reason: e.to_string(),
            })?;
            let Some(s) = schedule.stop_index(&id) else {
                warn!(stop = %id, "grid cache row for unknown stop");
                continue;
            };

            let mut cells = Vec::with_capacity(config.cell_count());
            let mut values = record.iter().skip(1).map(|v| {
                v.parse::<u32>().map_err(|e| CacheFileError::Malformed {
                    row,
                    reason: format!("{v:?}: {e}"),
                })
            });
            for _ in 0..config.cell_count() {
                let mut cell = [0; VALUES_PER_CELL];
                for slot in &mut cell {
                    // The field count was checked above
                    *slot = values.next().transpose()?.unwrap_or(UNREACHABLE);
                }
                cells.push(cell);
            }

            grids.insert(
                s,
                StopGrid {
                    id,
                    centre: schedule.stop(s).coord,
                    cells,
                },
            );
        }

        info!(stops = grids.len(), path = %path.display(), "loaded access grid");
        Ok(Self {
            config,
            grids,
            router,
        })
    }

    /// Write the cache as `stop_id;v0;v1;...` lines, gzip-compressed when
    /// `path` ends in `.gz`.
    pub fn write(&self, path: &Path) -> Result<(), CacheFileError> {
        let file = BufWriter::new(File::create(path)?);
        if is_gzip(path) {
            let encoder = self.write_rows(GzEncoder::new(file, Compression::default()))?;
            encoder.finish()?.flush()?;
        } else {
            self.write_rows(file)?.flush()?;
        }
        info!(stops = self.grids.len(), path = %path.display(), "wrote access grid");
        Ok(())
    }

    fn write_rows<W: Write>(&self, out: W) -> Result<W, CacheFileError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .from_writer(out);
        for grid in self.grids.values() {
            let values = grid.cells.iter().flatten().map(u32::to_string);
            writer.write_record(std::iter::once(grid.id.to_string()).chain(values))?;
        }
        writer.flush()?;
        writer.into_inner().map_err(|e| e.into_error().into())
    }

    /// The grid layout.
    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Number of cached stops.
    pub fn len(&self) -> usize {
        self.grids.len()
    }

    /// Returns true if no stop is cached.
    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }

    /// Look `query` up in the grid without falling back.
    fn lookup(&self, query: &FeederQuery<'_>) -> Option<RouteCharacteristics> {
        let (time_slot, distance_slot) = if *query.mode == self.config.car_mode {
            (0, 1)
        } else if *query.mode == self.config.bike_mode {
            (2, 3)
        } else {
            return None;
        };
        let grid = self.grids.get(&query.stop)?;
        let cell = self.config.cell_number(grid.centre, query.point)?;
        let values = grid.cells.get(cell)?;
        if values[time_slot] == UNREACHABLE {
            return None;
        }

        let (access_time, egress_time) = self.router.terminal_times(query.mode);
        Some(RouteCharacteristics {
            distance: f64::from(values[distance_slot]),
            access_time,
            egress_time,
            travel_time: f64::from(values[time_slot]),
        })
    }
}

impl<R: FeederRouter> AccessEgressProvider for GridAccessEgressCache<R> {
    fn characteristics(&self, query: &FeederQuery<'_>) -> Option<RouteCharacteristics> {
        self.lookup(query).or_else(|| {
            trace!(stop = query.stop.0, mode = %query.mode, "grid miss, routing live");
            self.router.route(query)
        })
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

/// Route car and bike legs from a stop to every cell of its grid.
fn route_cells<R: FeederRouter>(
    config: &GridConfig,
    router: &R,
    stop: StopIdx,
    centre: Coord,
) -> Vec<[u32; VALUES_PER_CELL]> {
    let route = |mode: &Mode, point: Coord, time_factor: f64| -> (u32, u32) {
        let query = FeederQuery {
            mode,
            stop,
            stop_point: centre,
            point,
            direction: Direction::Egress,
            departure: ScheduleTime::MIDNIGHT,
        };
        match router.route(&query) {
            Some(c) => (
                to_cell_value(c.travel_time * time_factor),
                to_cell_value(c.distance),
            ),
            None => (UNREACHABLE, UNREACHABLE),
        }
    };

    (0..config.cell_count())
        .map(|i| {
            let point = config.cell_coordinate(centre, i);
            let (car_time, car_distance) = route(&config.car_mode, point, config.car_time_factor);
            let (bike_time, bike_distance) = route(&config.bike_mode, point, 1.0);
            [car_time, car_distance, bike_time, bike_distance]
        })
        .collect()
}

fn to_cell_value(value: f64) -> u32 {
    // Saturating float to int cast; keep clear of the sentinel
    (value.round() as u32).min(UNREACHABLE - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{BeelineRouter, FeederProfile};
    use crate::planner::RaptorConfig;
    use crate::schedule::RawScheduleBuilder;
    use proptest::prelude::*;

    fn small_grid() -> GridConfig {
        GridConfig {
            cell_size: 100,
            diameter: 1000,
            ..GridConfig::default()
        }
    }

    fn router() -> BeelineRouter {
        BeelineRouter::new([
            FeederProfile {
                mode: Mode::car_feeder(),
                speed: 10.0,
                detour_factor: 1.0,
                access_time: 120.0,
                egress_time: 60.0,
            },
            FeederProfile {
                mode: Mode::bike_feeder(),
                speed: 5.0,
                detour_factor: 1.0,
                access_time: 30.0,
                egress_time: 0.0,
            },
        ])
    }

    fn schedule() -> CompiledSchedule {
        let raw = RawScheduleBuilder::new()
            .stop_with("A", 0.0, 0.0, &[("park_and_ride", "yes")])
            .stop("B", 5000.0, 0.0)
            .route("L", "R", "rail", &[("A", 0, 0), ("B", 300, 300)], &[0])
            .build();
        CompiledSchedule::compile(&raw, &RaptorConfig::default()).unwrap()
    }

    fn query<'a>(mode: &'a Mode, stop: StopIdx, point: Coord) -> FeederQuery<'a> {
        FeederQuery {
            mode,
            stop,
            stop_point: Coord::new(0.0, 0.0),
            point,
            direction: Direction::Access,
            departure: ScheduleTime::MIDNIGHT,
        }
    }

    #[test]
    fn cell_layout_is_row_major_from_top_left() {
        let grid = small_grid();
        let centre = Coord::new(1000.0, 1000.0);
        assert_eq!(grid.cell_count(), 100);

        assert_eq!(grid.cell_number(centre, Coord::new(501.0, 1499.0)), Some(0));
        assert_eq!(grid.cell_number(centre, Coord::new(1499.0, 501.0)), Some(99));
        assert_eq!(grid.cell_number(centre, Coord::new(650.0, 1350.0)), Some(11));
        // West of the grid must not wrap into the previous row
        assert_eq!(grid.cell_number(centre, Coord::new(499.0, 1350.0)), None);
        assert_eq!(grid.cell_number(centre, Coord::new(1000.0, 499.0)), None);
        assert_eq!(grid.cell_coordinate(centre, 11), Coord::new(650.0, 1350.0));
    }

    #[test]
    fn lookup_uses_precomputed_cells() {
        let schedule = schedule();
        let cache = GridAccessEgressCache::precompute(&schedule, small_grid(), router());
        assert_eq!(cache.len(), 2);

        let car = Mode::car_feeder();
        let found = cache
            .characteristics(&query(&car, StopIdx(0), Coord::new(290.0, 40.0)))
            .unwrap();
        // Routed to the cell centre (250, 50)
        let expected = Coord::new(0.0, 0.0).distance(&Coord::new(250.0, 50.0));
        assert_eq!(found.distance, expected.round());
        assert_eq!(found.travel_time, ((expected / 10.0).ceil() * 1.25).round());
        assert_eq!((found.access_time, found.egress_time), (120.0, 60.0));
    }

    #[test]
    fn falls_back_to_live_routing() {
        let schedule = schedule();
        let grid = GridConfig {
            stop_filter: Some(AttributeFilter {
                attribute: "park_and_ride".to_string(),
                value: "yes".to_string(),
            }),
            ..small_grid()
        };
        let cache = GridAccessEgressCache::precompute(&schedule, grid, router());
        // Only the park-and-ride stop gets a grid
        assert_eq!(cache.len(), 1);
        assert!(!cache.is_empty());

        let bike = Mode::bike_feeder();
        // Outside the grid: exact beeline instead of a cell centre
        let far = cache
            .characteristics(&query(&bike, StopIdx(0), Coord::new(3000.0, 0.0)))
            .unwrap();
        assert_eq!(far.distance, 3000.0);
        // Uncached stop
        let uncached = cache
            .characteristics(&query(&bike, StopIdx(1), Coord::new(10.0, 0.0)))
            .unwrap();
        assert_eq!(uncached.distance, 10.0);
        // Mode without a profile and without a grid slot
        let walk = Mode::walk();
        assert!(cache
            .characteristics(&query(&walk, StopIdx(0), Coord::new(10.0, 0.0)))
            .is_none());
    }

    #[test]
    fn file_round_trip() {
        let schedule = schedule();
        let cache = GridAccessEgressCache::precompute(&schedule, small_grid(), router());
        let dir = tempfile::tempdir().unwrap();

        for name in ["grid.csv", "grid.csv.gz"] {
            let path = dir.path().join(name);
            cache.write(&path).unwrap();
            let loaded =
                GridAccessEgressCache::read(&path, &schedule, small_grid(), router()).unwrap();

            assert_eq!(loaded.len(), cache.len());
            for (stop, grid) in &cache.grids {
                assert_eq!(loaded.grids[stop].cells, grid.cells);
                assert_eq!(loaded.grids[stop].id, grid.id);
            }
        }
    }

    #[test]
    fn plain_file_is_semicolon_delimited() {
        let schedule = schedule();
        let grid = GridConfig {
            cell_size: 500,
            diameter: 500,
            ..GridConfig::default()
        };
        let cache = GridAccessEgressCache::precompute(&schedule, grid, router());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.txt");
        cache.write(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].split(';').count(), 5);
        assert!(lines[0].starts_with("A;"));
    }

    #[test]
    fn malformed_rows_rejected() {
        let schedule = schedule();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.txt");

        std::fs::write(&path, "A;1;2;3\n").unwrap();
        let err = GridAccessEgressCache::read(&path, &schedule, small_grid(), router()).unwrap_err();
        assert!(matches!(err, CacheFileError::Malformed { row: 1, .. }));

        let grid = GridConfig {
            cell_size: 500,
            diameter: 500,
            ..GridConfig::default()
        };
        std::fs::write(&path, "A;1;2;x;4\n").unwrap();
        let err = GridAccessEgressCache::read(&path, &schedule, grid.clone(), router()).unwrap_err();
        assert!(matches!(err, CacheFileError::Malformed { row: 1, .. }));

        // Unknown stops are skipped
        std::fs::write(&path, "Z;1;2;3;4\nA;1;2;3;4\n").unwrap();
        let loaded = GridAccessEgressCache::read(&path, &schedule, grid, router()).unwrap();
        assert_eq!(loaded.len(), 1);
    }

    mod proptests {
        use super::*;

        proptest! {
            #[test]
            fn cell_coordinate_inverts_cell_number(
                index in 0usize..22_500,
                cx in -50_000.0f64..50_000.0,
                cy in -50_000.0f64..50_000.0,
            ) {
                let grid = GridConfig::default();
                let centre = Coord::new(cx, cy);
                let point = grid.cell_coordinate(centre, index);
                prop_assert_eq!(grid.cell_number(centre, point), Some(index));
            }

            #[test]
            fn points_inside_grid_have_a_cell(
                dx in -14_999.0f64..14_999.0,
                dy in -14_999.0f64..14_999.0,
            ) {
                let grid = GridConfig::default();
                let centre = Coord::new(2_600_000.0, 1_200_000.0);
                let point = Coord::new(centre.x + dx, centre.y + dy);
                let cell = grid.cell_number(centre, point);
                prop_assert!(cell.is_some_and(|c| c < grid.cell_count()));
            }
        }
    }
}
