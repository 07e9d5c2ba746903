//! Feeder leg characteristics for access and egress.
//!
//! The stop resolver asks an [`AccessEgressProvider`] how far and how long
//! a bike or car leg between a point and a stop is. [`LiveRouting`] asks a
//! [`FeederRouter`] every time; [`GridAccessEgressCache`] answers from a
//! precomputed grid and routes live only on a miss.

mod characteristics;
mod grid_cache;
mod router;

pub use characteristics::{AccessEgressProvider, FeederQuery, LiveRouting, RouteCharacteristics};
pub use grid_cache::{CacheFileError, GridAccessEgressCache, GridConfig};
pub use router::{BeelineRouter, FeederProfile, FeederRouter};
