//! Planar coordinates.
//!
//! Coordinates are projected, in metres. Distances are plain Euclidean.

use serde::{Deserialize, Serialize};

use super::DomainError;

/// A point in a projected coordinate system (metres).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    /// Create a coordinate.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Create a coordinate, rejecting NaN and infinite components.
    pub fn try_new(x: f64, y: f64) -> Result<Self, DomainError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(DomainError::NonFiniteCoordinate(x, y));
        }
        Ok(Self { x, y })
    }

    /// Euclidean distance to another coordinate.
    ///
    /// # Examples
    ///
    /// ```
    /// use raptor_server::domain::Coord;
    ///
    /// let a = Coord::new(0.0, 0.0);
    /// let b = Coord::new(3.0, 4.0);
    /// assert_eq!(a.distance(&b), 5.0);
    /// ```
    pub fn distance(&self, other: &Coord) -> f64 {
        self.distance_2(other).sqrt()
    }

    /// Squared Euclidean distance.
    pub fn distance_2(&self, other: &Coord) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// The coordinate as an `[x, y]` array.
    pub fn to_array(self) -> [f64; 2] {
        [self.x, self.y]
    }
}
