//! Intermodal least-cost journey planner.
//!
//! Compiles a transit schedule into flat arrays and answers door-to-door
//! queries with a round-based (RAPTOR) search under a generalized cost
//! model, with walk, bike and car feeders to and from the transit network.

pub mod access;
pub mod batch;
pub mod cache;
pub mod domain;
pub mod load;
pub mod planner;
pub mod resolver;
pub mod schedule;
pub mod walkable;
pub mod web;
