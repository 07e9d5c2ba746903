//! Search configuration for the transit planner.
//!
//! One `RaptorConfig` drives schedule compilation (footpath generation),
//! the search core (utilities, transfer penalties, round limits) and the
//! stop resolver (radii, walk speed, intermodal modes). It deserializes from
//! JSON with every field optional.

use std::collections::HashSet;

use serde::Deserialize;

use crate::domain::Mode;
use crate::resolver::IntermodalConfig;
use crate::walkable::DEFAULT_MINIMAL_TRANSFER_SECS;

/// Error from validating a configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// The same mode pair appears twice in the mode-to-mode penalty table
    #[error("mode-to-mode penalty for {from} -> {to} is defined more than once")]
    DuplicateModePair { from: Mode, to: Mode },

    /// A mode-to-mode penalty is negative, NaN or infinite
    #[error("mode-to-mode penalty for {from} -> {to} must be finite and non-negative, got {value}")]
    InvalidModePenalty { from: Mode, to: Mode, value: f64 },

    /// A scalar setting is out of range
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },

    /// The same intermodal mode is configured twice
    #[error("intermodal mode {0} is configured more than once")]
    DuplicateIntermodalMode(Mode),
}

/// A fixed transfer penalty for changing between two specific modes.
///
/// A penalty of zero marks the pair as "same trip part": transfers between
/// them are priced together with the surrounding segment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModeToModePenalty {
    pub from: Mode,
    pub to: Mode,
    pub penalty: f64,
}

/// Configuration parameters for routing.
///
/// Marginal utilities are per second and negative (time is a disutility);
/// costs are their negation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RaptorConfig {
    /// Marginal utility of in-vehicle time (utl/s).
    pub marginal_utility_of_travel_time_pt: f64,

    /// Marginal utility of waiting at a stop before boarding (utl/s).
    pub marginal_utility_of_waiting_pt: f64,

    /// Marginal utility of walking, for footpaths and access/egress (utl/s).
    pub marginal_utility_of_travel_time_walk: f64,

    /// Fixed part of the transfer penalty.
    pub transfer_penalty_base: f64,

    /// Transfer penalty per hour of trip travel time.
    pub transfer_penalty_per_hour: f64,

    /// Lower clamp of a single transfer penalty.
    pub transfer_penalty_min: f64,

    /// Upper clamp of a single transfer penalty. Unbounded by default.
    pub transfer_penalty_max: f64,

    /// Optional fixed penalties for specific mode changes.
    pub mode_to_mode_penalties: Vec<ModeToModePenalty>,

    /// Maximum number of rounds (bounds the number of transfers).
    pub max_rounds: usize,

    /// Rounds still explored after the first round that reaches a
    /// destination stop. `None` explores until no label improves.
    ///
    /// This caps tail latency. It can discard late-arriving but marginally
    /// cheaper alternatives; that is the accepted price of the cap.
    pub extra_rounds_after_first_arrival: Option<usize>,

    /// Facilities closer than this (metres) get footpath transfers.
    pub beeline_walk_connection_distance: f64,

    /// Walking speed along the beeline (m/s).
    pub beeline_walk_speed: f64,

    /// Ratio of real walking distance to beeline distance.
    pub beeline_distance_factor: f64,

    /// Lower bound for any footpath transfer time (seconds), and the time
    /// to change within a facility that has no explicit entry.
    pub minimal_transfer_time: u32,

    /// Radius for walk access/egress stop search (metres).
    pub search_radius: f64,

    /// Margin added to the nearest-stop distance when a radius search
    /// finds fewer than two stops (metres).
    pub extension_radius: f64,

    /// Feeder modes for access and egress.
    pub intermodal: IntermodalConfig,
}

impl RaptorConfig {
    /// Check the configuration for values the search cannot handle.
    ///
    /// Problems in the mode-to-mode table would make trip-part boundaries
    /// ambiguous during search, so they are rejected here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            (
                "marginal_utility_of_travel_time_pt",
                self.marginal_utility_of_travel_time_pt,
            ),
            (
                "marginal_utility_of_waiting_pt",
                self.marginal_utility_of_waiting_pt,
            ),
            (
                "marginal_utility_of_travel_time_walk",
                self.marginal_utility_of_travel_time_walk,
            ),
        ] {
            if !value.is_finite() || value > 0.0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be finite and not positive",
                });
            }
        }

        for (field, value) in [
            ("transfer_penalty_base", self.transfer_penalty_base),
            ("transfer_penalty_per_hour", self.transfer_penalty_per_hour),
            ("transfer_penalty_min", self.transfer_penalty_min),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be finite",
                });
            }
        }
        if self.transfer_penalty_max.is_nan() {
            return Err(ConfigError::InvalidValue {
                field: "transfer_penalty_max",
                reason: "must not be NaN",
            });
        }

        let mut pairs = HashSet::new();
        for entry in &self.mode_to_mode_penalties {
            if !entry.penalty.is_finite() || entry.penalty < 0.0 {
                return Err(ConfigError::InvalidModePenalty {
                    from: entry.from.clone(),
                    to: entry.to.clone(),
                    value: entry.penalty,
                });
            }
            if !pairs.insert((&entry.from, &entry.to)) {
                return Err(ConfigError::DuplicateModePair {
                    from: entry.from.clone(),
                    to: entry.to.clone(),
                });
            }
        }

        if !(self.beeline_walk_speed.is_finite() && self.beeline_walk_speed > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "beeline_walk_speed",
                reason: "must be positive",
            });
        }
        if !(self.beeline_distance_factor.is_finite() && self.beeline_distance_factor >= 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "beeline_distance_factor",
                reason: "must be at least 1",
            });
        }
        for (field, value) in [
            (
                "beeline_walk_connection_distance",
                self.beeline_walk_connection_distance,
            ),
            ("search_radius", self.search_radius),
            ("extension_radius", self.extension_radius),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be a non-negative distance",
                });
            }
        }

        self.intermodal.validate()
    }

    /// Cost of walking for `seconds`.
    pub fn walk_cost(&self, seconds: f64) -> f64 {
        seconds * -self.marginal_utility_of_travel_time_walk
    }

    /// Returns true if mode-to-mode penalties are in use.
    pub fn uses_mode_to_mode_penalties(&self) -> bool {
        !self.mode_to_mode_penalties.is_empty()
    }
}

impl Default for RaptorConfig {
    fn default() -> Self {
        Self {
            marginal_utility_of_travel_time_pt: -6.0 / 3600.0,
            marginal_utility_of_waiting_pt: -6.0 / 3600.0,
            marginal_utility_of_travel_time_walk: -12.0 / 3600.0,
            transfer_penalty_base: 1.0,
            transfer_penalty_per_hour: 0.0,
            transfer_penalty_min: 0.0,
            transfer_penalty_max: f64::INFINITY,
            mode_to_mode_penalties: Vec::new(),
            max_rounds: 99,
            extra_rounds_after_first_arrival: None,
            beeline_walk_connection_distance: 200.0,
            beeline_walk_speed: 3.0 / 3.6 / 1.3,
            beeline_distance_factor: 1.3,
            minimal_transfer_time: DEFAULT_MINIMAL_TRANSFER_SECS,
            search_radius: 1000.0,
            extension_radius: 200.0,
            intermodal: IntermodalConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(s: &str) -> Mode {
        Mode::parse(s).unwrap()
    }

    #[test]
    fn default_config() {
        let config = RaptorConfig::default();

        assert_eq!(config.max_rounds, 99);
        assert_eq!(config.extra_rounds_after_first_arrival, None);
        assert_eq!(config.transfer_penalty_max, f64::INFINITY);
        assert_eq!(config.minimal_transfer_time, 0);
        assert!(!config.uses_mode_to_mode_penalties());
        assert!(!config.intermodal.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn walk_cost_uses_walk_utility() {
        let config = RaptorConfig {
            marginal_utility_of_travel_time_walk: -0.01,
            ..RaptorConfig::default()
        };
        approx::assert_relative_eq!(config.walk_cost(120.0), 1.2);
    }

    #[test]
    fn deserialize_partial_json() {
        let config: RaptorConfig = serde_json::from_str(
            r#"{
                "max_rounds": 4,
                "transfer_penalty_max": 10.0,
                "mode_to_mode_penalties": [
                    {"from": "rail", "to": "bus", "penalty": 2.5}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.max_rounds, 4);
        assert_eq!(config.transfer_penalty_max, 10.0);
        assert_eq!(config.mode_to_mode_penalties.len(), 1);
        assert_eq!(config.search_radius, 1000.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn duplicate_mode_pair_rejected() {
        let entry = ModeToModePenalty {
            from: mode("rail"),
            to: mode("bus"),
            penalty: 1.0,
        };
        let config = RaptorConfig {
            mode_to_mode_penalties: vec![entry.clone(), entry],
            ..RaptorConfig::default()
        };

        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateModePair {
                from: mode("rail"),
                to: mode("bus"),
            })
        );
    }

    #[test]
    fn negative_or_nan_penalty_rejected() {
        for value in [-1.0, f64::NAN, f64::INFINITY] {
            let config = RaptorConfig {
                mode_to_mode_penalties: vec![ModeToModePenalty {
                    from: mode("rail"),
                    to: mode("bus"),
                    penalty: value,
                }],
                ..RaptorConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidModePenalty { .. })
            ));
        }
    }

    #[test]
    fn scalar_ranges_checked() {
        let config = RaptorConfig {
            beeline_walk_speed: 0.0,
            ..RaptorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "beeline_walk_speed",
                ..
            })
        ));

        let config = RaptorConfig {
            marginal_utility_of_waiting_pt: 0.5,
            ..RaptorConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RaptorConfig {
            search_radius: -1.0,
            ..RaptorConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
