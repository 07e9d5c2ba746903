//! Transport modes.
//!
//! Modes are open-ended names ("rail", "bus", "bike_feeder") taken from the
//! schedule and configuration. A few walk modes are fixed because the
//! planner tags non-transit legs with them.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::DomainError;

/// Name of a transport mode.
///
/// # Examples
///
/// ```
/// use raptor_server::domain::Mode;
///
/// let rail = Mode::parse("rail").unwrap();
/// assert_eq!(rail.as_str(), "rail");
/// assert!(!rail.is_walk());
/// assert!(Mode::walk().is_walk());
/// assert!(Mode::parse("").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Mode(String);

const WALK: &str = "walk";
const ACCESS_WALK: &str = "access_walk";
const EGRESS_WALK: &str = "egress_walk";
const TRANSIT_WALK: &str = "transit_walk";
const CAR_FEEDER: &str = "car_feeder";
const BIKE_FEEDER: &str = "bike_feeder";

impl Mode {
    /// Parse a mode name.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        Self::try_from(s.to_string())
    }

    /// Plain walking, always available to the resolver.
    pub fn walk() -> Self {
        Self(WALK.to_string())
    }

    /// Walk from the origin to the first boarding stop.
    pub fn access_walk() -> Self {
        Self(ACCESS_WALK.to_string())
    }

    /// Walk from the last alighting stop to the destination.
    pub fn egress_walk() -> Self {
        Self(EGRESS_WALK.to_string())
    }

    /// Walk between two stops during a transfer.
    pub fn transit_walk() -> Self {
        Self(TRANSIT_WALK.to_string())
    }

    /// Default car feeder mode of the grid cache.
    pub fn car_feeder() -> Self {
        Self(CAR_FEEDER.to_string())
    }

    /// Default bike feeder mode of the grid cache.
    pub fn bike_feeder() -> Self {
        Self(BIKE_FEEDER.to_string())
    }

    /// Returns true for any of the walking modes.
    pub fn is_walk(&self) -> bool {
        matches!(
            self.0.as_str(),
            WALK | ACCESS_WALK | EGRESS_WALK | TRANSIT_WALK
        )
    }

    /// Returns the mode name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Mode {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s.trim().is_empty() {
            return Err(DomainError::EmptyMode);
        }
        Ok(Self(s))
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> String {
        mode.0
    }
}

impl fmt::Debug for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mode({})", self.0)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_modes() {
        assert!(Mode::access_walk().is_walk());
        assert!(Mode::egress_walk().is_walk());
        assert!(Mode::transit_walk().is_walk());
        assert!(!Mode::parse("bike_feeder").unwrap().is_walk());
    }

    #[test]
    fn serde_roundtrip_rejects_blank() {
        let mode: Mode = serde_json::from_str("\"bus\"").unwrap();
        assert_eq!(mode, Mode::parse("bus").unwrap());
        assert!(serde_json::from_str::<Mode>("\" \"").is_err());
    }
}
