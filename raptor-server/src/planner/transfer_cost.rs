//! Transfer penalties.
//!
//! A single transfer costs `base + per_hour * hours`, clamped to
//! `[min, max]`. Penalties are re-priced as the trip goes on (the per-hour
//! part grows with travel time), so the model returns the increment over
//! what the label already carries rather than an absolute value.
//!
//! With a mode-to-mode table, a trip splits into parts at mode changes that
//! carry a non-zero penalty. Such a change costs its fixed penalty; within
//! a part, transfers are priced with the part's own duration and count.

use std::collections::HashMap;

use crate::domain::Mode;
use crate::schedule::CompiledSchedule;

use super::config::RaptorConfig;
use super::path::{PathElement, PathIdx};

/// Trip state at the moment a transfer is priced.
#[derive(Debug, Clone, Copy)]
pub struct TransferContext<'a> {
    /// All labels of the current query.
    pub path: &'a [PathElement],
    /// The label being extended.
    pub current: PathIdx,
    pub schedule: &'a CompiledSchedule,
    /// Seconds since the first vehicle departure of the trip.
    pub total_travel_time: u32,
    /// Transfers made, including the one being priced.
    pub transfer_count: usize,
    /// Transfer cost already carried by the label.
    pub existing_transfer_cost: f64,
    /// Arrival time of the segment being priced (seconds).
    pub segment_end_time: u32,
    pub from_mode: &'a Mode,
    pub to_mode: &'a Mode,
}

/// Prices transfers.
///
/// Shared read-only between search threads.
pub trait TransferCostModel: Send + Sync {
    /// The transfer cost to add on top of `ctx.existing_transfer_cost`.
    fn transfer_cost(&self, ctx: &TransferContext<'_>) -> f64;
}

/// The clamped base-plus-per-hour model with optional mode-to-mode table.
#[derive(Debug, Clone)]
pub struct DefaultTransferCost {
    base: f64,
    per_hour: f64,
    min: f64,
    max: f64,
    mode_to_mode: HashMap<(Mode, Mode), f64>,
}

impl DefaultTransferCost {
    /// Build from a validated configuration.
    ///
    /// Swapped `min`/`max` bounds are tolerated by ordering them.
    pub fn new(config: &RaptorConfig) -> Self {
        let (lo, hi) = (config.transfer_penalty_min, config.transfer_penalty_max);
        Self {
            base: config.transfer_penalty_base,
            per_hour: config.transfer_penalty_per_hour,
            min: lo.min(hi),
            max: lo.max(hi),
            mode_to_mode: config
                .mode_to_mode_penalties
                .iter()
                .map(|p| ((p.from.clone(), p.to.clone()), p.penalty))
                .collect(),
        }
    }

    /// Cost of one transfer after `travel_time` seconds.
    ///
    /// # Examples
    ///
    /// ```
    /// use raptor_server::planner::{DefaultTransferCost, RaptorConfig};
    ///
    /// let model = DefaultTransferCost::new(&RaptorConfig {
    ///     transfer_penalty_base: 1.0,
    ///     transfer_penalty_per_hour: 2.0,
    ///     transfer_penalty_min: 0.0,
    ///     transfer_penalty_max: 4.0,
    ///     ..RaptorConfig::default()
    /// });
    ///
    /// assert!((model.single(1800.0) - 2.0).abs() < 1e-9);
    /// assert_eq!(model.single(36_000.0), 4.0);
    /// ```
    pub fn single(&self, travel_time: f64) -> f64 {
        (self.base + self.per_hour / 3600.0 * travel_time).clamp(self.min, self.max)
    }

    /// Fixed penalty for changing between two modes; zero if not listed.
    pub fn mode_to_mode(&self, from: &Mode, to: &Mode) -> f64 {
        self.mode_to_mode
            .get(&(from.clone(), to.clone()))
            .copied()
            .unwrap_or(0.0)
    }

    /// Walk back from `from` to the first label of its trip part.
    fn first_of_trip_part<'p>(
        &self,
        path: &'p [PathElement],
        schedule: &CompiledSchedule,
        from: PathIdx,
    ) -> &'p PathElement {
        let mut current = &path[from.0];
        while let Some(previous) = current.coming_from {
            let before = &path[previous.0];
            if current.is_transfer() {
                let penalty = self.mode_to_mode(
                    schedule.mode_of(before.to_route_stop),
                    schedule.mode_of(current.to_route_stop),
                );
                if penalty != 0.0 {
                    break;
                }
            }
            current = before;
        }
        current
    }
}

impl TransferCostModel for DefaultTransferCost {
    fn transfer_cost(&self, ctx: &TransferContext<'_>) -> f64 {
        let count = ctx.transfer_count as f64;
        if self.mode_to_mode.is_empty() {
            return self.single(f64::from(ctx.total_travel_time)) * count
                - ctx.existing_transfer_cost;
        }

        let first = self.first_of_trip_part(ctx.path, ctx.schedule, ctx.current);
        let base = first.transfer_cost;
        let (elapsed, count) = if first.coming_from.is_some() {
            (
                f64::from(ctx.segment_end_time.saturating_sub(first.arrival_time)),
                ctx.transfer_count.saturating_sub(first.transfer_count),
            )
        } else {
            (f64::from(ctx.total_travel_time), ctx.transfer_count)
        };

        let fixed = self.mode_to_mode(ctx.from_mode, ctx.to_mode);
        if fixed > 0.0 {
            if count > 0 {
                base + fixed - ctx.existing_transfer_cost
            } else {
                0.0
            }
        } else {
            base + self.single(elapsed) * count as f64 - ctx.existing_transfer_cost
        }
    }
}
