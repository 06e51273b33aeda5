//! Venue domain model.
//!
//! # Responsibility
//! - Define the listed business entity with its location and counters.
//! - Validate coordinates before they reach storage or ranking.
//!
//! # Invariants
//! - `location` is either fully present or absent; there is no half-set pair.
//! - Counters are never negative.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a listed venue.
pub type VenueId = Uuid;

/// WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite and inside latitude `[-90, 90]` / longitude `[-180, 180]`.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl From<(f64, f64)> for GeoPoint {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self::new(lat, lng)
    }
}

/// A listed business with aggregate engagement counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub id: VenueId,
    pub name: String,
    /// `None` for venues submitted without a map pin.
    pub location: Option<GeoPoint>,
    /// Unpublished venues are hidden from discovery listings.
    pub published: bool,
    pub view_count: i64,
    /// Number of admitted comments.
    pub comment_count: i64,
}

impl Venue {
    /// Creates a published venue with zeroed counters and a fresh id.
    pub fn new(name: impl Into<String>, location: Option<GeoPoint>) -> Self {
        Self::with_id(Uuid::new_v4(), name, location)
    }

    /// Creates a published venue with a caller-provided id.
    ///
    /// Used by import paths where the catalog already assigned the id.
    pub fn with_id(id: VenueId, name: impl Into<String>, location: Option<GeoPoint>) -> Self {
        Self {
            id,
            name: name.into(),
            location,
            published: true,
            view_count: 0,
            comment_count: 0,
        }
    }

    /// Location usable for distance ranking, if any.
    pub fn ranked_location(&self) -> Option<GeoPoint> {
        self.location.filter(GeoPoint::is_valid)
    }

    pub fn validate(&self) -> Result<(), VenueValidationError> {
        if self.name.trim().is_empty() {
            return Err(VenueValidationError::EmptyName);
        }
        if let Some(point) = self.location {
            if !point.is_valid() {
                return Err(VenueValidationError::InvalidLocation {
                    lat: point.lat,
                    lng: point.lng,
                });
            }
        }
        if self.view_count < 0 || self.comment_count < 0 {
            return Err(VenueValidationError::NegativeCounter);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VenueValidationError {
    EmptyName,
    InvalidLocation { lat: f64, lng: f64 },
    NegativeCounter,
}

impl Display for VenueValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "venue name cannot be empty"),
            Self::InvalidLocation { lat, lng } => {
                write!(f, "venue location ({lat}, {lng}) is out of range")
            }
            Self::NegativeCounter => write!(f, "venue counters cannot be negative"),
        }
    }
}

impl Error for VenueValidationError {}

#[cfg(test)]
mod tests {
    use super::{GeoPoint, Venue, VenueValidationError};

    #[test]
    fn non_finite_location_is_not_ranked() {
        let venue = Venue::new("Cafe", Some(GeoPoint::new(f64::NAN, 10.0)));
        assert!(venue.ranked_location().is_none());
        assert!(matches!(
            venue.validate(),
            Err(VenueValidationError::InvalidLocation { .. })
        ));
    }

    #[test]
    fn venue_without_location_is_valid() {
        let venue = Venue::new("Bakery", None);
        assert!(venue.validate().is_ok());
        assert!(venue.ranked_location().is_none());
    }
}
