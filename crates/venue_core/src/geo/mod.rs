//! Geospatial discovery: distance, nearby ranking and geocoding seams.
//!
//! # Invariants
//! - Everything here is side-effect free; the caller owns the candidate set
//!   and the current map center.
//! - Venues without usable coordinates never appear in nearby results.

pub mod distance;
pub mod geocode;
pub mod proximity;
