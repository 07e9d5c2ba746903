//! Intermodal access/egress parameters.

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use crate::access::FeederProfile;
use crate::domain::Mode;
use crate::planner::ConfigError;

/// Which end of a journey a stop search is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// From the origin to the first boarding stop.
    Access,
    /// From the last alighting stop to the destination.
    Egress,
}

/// Matches one string attribute against a value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AttributeFilter {
    pub attribute: String,
    pub value: String,
}

impl AttributeFilter {
    /// Returns true if `attributes` holds the attribute with this value.
    pub fn matches(&self, attributes: &BTreeMap<String, String>) -> bool {
        attributes.get(&self.attribute) == Some(&self.value)
    }
}

/// The traveller, as far as mode eligibility is concerned.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Person {
    pub attributes: BTreeMap<String, String>,
}

impl Person {
    /// A person with the given attributes.
    pub fn with_attributes<'s>(attributes: impl IntoIterator<Item = (&'s str, &'s str)>) -> Self {
        Self {
            attributes: attributes
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// How feeder modes are combined for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeSelection {
    /// Offer every qualifying mode at every stop; the search picks.
    #[default]
    EvaluateAllModesPerStop,
    /// Draw one qualifying mode (or walking) per request and direction.
    RandomlySelectOneModePerRequest,
}

/// Parameters of one feeder mode.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModeParams {
    pub mode: Mode,
    /// Stops further away than this (metres) are not considered.
    pub max_radius: f64,
    /// Only travellers matching this filter may use the mode.
    #[serde(default)]
    pub person_filter: Option<AttributeFilter>,
    /// Only stops matching this filter are served by the mode.
    #[serde(default)]
    pub stop_filter: Option<AttributeFilter>,
    /// Stop attachment point to route to instead of the stop itself.
    #[serde(default)]
    pub attachment: Option<String>,
    /// Add the stop's minimal transfer time when coming from an attachment.
    #[serde(default)]
    pub use_minimal_transfer_times: bool,
    /// Utility per second of feeder travel (usually negative).
    #[serde(default)]
    pub marginal_utility_of_time: f64,
    /// Utility per metre of feeder travel (usually negative).
    #[serde(default)]
    pub marginal_utility_of_distance: f64,
    /// Fixed utility of using the mode once.
    #[serde(default)]
    pub constant: f64,
}

impl ModeParams {
    /// Returns true if `person` may use this mode.
    pub fn allows(&self, person: &Person) -> bool {
        self.person_filter
            .as_ref()
            .is_none_or(|f| f.matches(&person.attributes))
    }

    /// Generalized cost of a feeder leg.
    pub fn cost(&self, seconds: f64, metres: f64) -> f64 {
        -(self.constant
            + self.marginal_utility_of_time * seconds
            + self.marginal_utility_of_distance * metres)
    }
}

/// Feeder modes for access and egress.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct IntermodalConfig {
    /// Walk-only access and egress when false.
    pub enabled: bool,
    pub selection: ModeSelection,
    pub modes: Vec<ModeParams>,
    /// Beeline profiles for routing feeder modes without a road router.
    pub profiles: Vec<FeederProfile>,
}

impl IntermodalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for params in &self.modes {
            if !seen.insert(&params.mode) {
                return Err(ConfigError::DuplicateIntermodalMode(params.mode.clone()));
            }
            if !(params.max_radius.is_finite() && params.max_radius >= 0.0) {
                return Err(ConfigError::InvalidValue {
                    field: "intermodal.modes.max_radius",
                    reason: "must be a non-negative distance",
                });
            }
        }
        for profile in &self.profiles {
            if !(profile.speed.is_finite() && profile.speed > 0.0) {
                return Err(ConfigError::InvalidValue {
                    field: "intermodal.profiles.speed",
                    reason: "must be positive",
                });
            }
            if !(profile.detour_factor.is_finite() && profile.detour_factor >= 1.0) {
                return Err(ConfigError::InvalidValue {
                    field: "intermodal.profiles.detour_factor",
                    reason: "must be at least 1",
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bike(radius: f64) -> ModeParams {
        ModeParams {
            mode: Mode::bike_feeder(),
            max_radius: radius,
            person_filter: None,
            stop_filter: None,
            attachment: None,
            use_minimal_transfer_times: false,
            marginal_utility_of_time: -0.01,
            marginal_utility_of_distance: 0.0,
            constant: -1.0,
        }
    }

    #[test]
    fn person_filter() {
        let params = ModeParams {
            person_filter: Some(AttributeFilter {
                attribute: "has_bike".to_string(),
                value: "yes".to_string(),
            }),
            ..bike(3000.0)
        };
        assert!(params.allows(&Person::with_attributes([("has_bike", "yes")])));
        assert!(!params.allows(&Person::with_attributes([("has_bike", "no")])));
        assert!(!params.allows(&Person::default()));
        assert!(bike(3000.0).allows(&Person::default()));
    }

    #[test]
    fn cost_negates_utility() {
        approx::assert_relative_eq!(bike(3000.0).cost(300.0, 1000.0), 4.0, epsilon = 1e-9);
    }

    #[test]
    fn deserialize_config() {
        let config: IntermodalConfig = serde_json::from_str(
            r#"{
                "enabled": true,
                "selection": "randomly_select_one_mode_per_request",
                "modes": [{
                    "mode": "car_feeder",
                    "max_radius": 10000,
                    "person_filter": {"attribute": "car_available", "value": "always"},
                    "attachment": "car",
                    "use_minimal_transfer_times": true,
                    "marginal_utility_of_time": -0.002
                }],
                "profiles": [{"mode": "car_feeder", "speed": 12.0, "access_time": 300}]
            }"#,
        )
        .unwrap();

        assert!(config.enabled);
        assert_eq!(config.selection, ModeSelection::RandomlySelectOneModePerRequest);
        assert_eq!(config.modes[0].attachment.as_deref(), Some("car"));
        assert_eq!(config.profiles[0].detour_factor, 1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn duplicate_modes_rejected() {
        let config = IntermodalConfig {
            modes: vec![bike(1000.0), bike(2000.0)],
            ..IntermodalConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateIntermodalMode(Mode::bike_feeder()))
        );
    }

    #[test]
    fn bad_profiles_rejected() {
        let profile = FeederProfile {
            mode: Mode::bike_feeder(),
            speed: 0.0,
            detour_factor: 1.0,
            access_time: 0.0,
            egress_time: 0.0,
        };
        let config = IntermodalConfig {
            profiles: vec![profile.clone()],
            ..IntermodalConfig::default()
        };
        assert!(config.validate().is_err());

        let config = IntermodalConfig {
            profiles: vec![FeederProfile {
                speed: 4.0,
                detour_factor: 0.5,
                ..profile
            }],
            ..IntermodalConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
