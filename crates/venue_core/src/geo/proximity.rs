//! Nearby venue ranking.
//!
//! # Responsibility
//! - Filter caller-held candidates to a radius around a center point.
//! - Rank by true distance and derive display distances.
//! - Re-evaluate the same candidates when the map center moves.
//!
//! # Invariants
//! - Venues without usable coordinates are excluded, never ranked as 0 or ∞.
//! - Ranking uses the unclamped distance; only the display value is clamped.
//! - Ties keep candidate input order.
//! - A failed recenter leaves the current center untouched.

use crate::config::{CoreConfig, DEFAULT_DISPLAY_CLAMP_KM, DEFAULT_NEARBY_RADIUS_KM};
use crate::geo::distance::distance_km;
use crate::geo::geocode::{GeocodeMiss, Geocoder};
use crate::model::venue::{GeoPoint, Venue};
use log::{debug, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Radius and display settings for one nearby query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyOptions {
    pub radius_km: f64,
    pub display_clamp_km: f64,
}

impl Default for NearbyOptions {
    fn default() -> Self {
        Self {
            radius_km: DEFAULT_NEARBY_RADIUS_KM,
            display_clamp_km: DEFAULT_DISPLAY_CLAMP_KM,
        }
    }
}

impl From<&CoreConfig> for NearbyOptions {
    fn from(config: &CoreConfig) -> Self {
        Self {
            radius_km: config.nearby_radius_km,
            display_clamp_km: config.display_clamp_km,
        }
    }
}

/// One ranked venue.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyVenue {
    pub venue: Venue,
    /// Unclamped great-circle distance used for ranking.
    pub distance_km: f64,
    /// Distance shown to users; `0.0` below the clamp threshold.
    pub display_distance_km: f64,
}

impl NearbyVenue {
    pub fn distance_label(&self) -> String {
        format_distance_label(self.display_distance_km)
    }
}

/// Renders a display distance, e.g. `0Km` or `12.3Km`.
pub fn format_distance_label(display_km: f64) -> String {
    if display_km == 0.0 {
        "0Km".to_string()
    } else {
        format!("{display_km:.1}Km")
    }
}

/// Ranks `candidates` within `radius_km` of `center` using the default clamp.
pub fn find_nearby(center: GeoPoint, radius_km: f64, candidates: &[Venue]) -> Vec<NearbyVenue> {
    let options = NearbyOptions {
        radius_km,
        ..NearbyOptions::default()
    };
    find_nearby_with(center, &options, candidates)
}

/// Ranks `candidates` around `center`.
///
/// Returns an empty list when nothing is in range or `center` is unusable.
pub fn find_nearby_with(
    center: GeoPoint,
    options: &NearbyOptions,
    candidates: &[Venue],
) -> Vec<NearbyVenue> {
    if !center.is_valid() {
        warn!(
            "event=nearby_search module=geo status=skip reason=invalid_center lat={} lng={}",
            center.lat, center.lng
        );
        return Vec::new();
    }

    let mut ranked: Vec<NearbyVenue> = candidates
        .iter()
        .filter_map(|venue| {
            let location = venue.ranked_location()?;
            let distance = distance_km(center, location);
            (distance <= options.radius_km).then(|| NearbyVenue {
                venue: venue.clone(),
                distance_km: distance,
                display_distance_km: if distance < options.display_clamp_km {
                    0.0
                } else {
                    distance
                },
            })
        })
        .collect();

    // `sort_by` is stable, so equal distances keep input order.
    ranked.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

    debug!(
        "event=nearby_search module=geo status=ok candidates={} matched={} radius_km={}",
        candidates.len(),
        ranked.len(),
        options.radius_km
    );
    ranked
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecenterError {
    GeocodeMiss(GeocodeMiss),
    InvalidCoordinate { lat: f64, lng: f64 },
}

impl Display for RecenterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GeocodeMiss(miss) => write!(f, "{miss}"),
            Self::InvalidCoordinate { lat, lng } => {
                write!(f, "coordinate ({lat}, {lng}) is out of range")
            }
        }
    }
}

impl Error for RecenterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::GeocodeMiss(miss) => Some(miss),
            Self::InvalidCoordinate { .. } => None,
        }
    }
}

impl From<GeocodeMiss> for RecenterError {
    fn from(value: GeocodeMiss) -> Self {
        Self::GeocodeMiss(value)
    }
}

/// Map session over a fixed candidate set with a movable center.
#[derive(Debug, Clone)]
pub struct NearbySearch {
    candidates: Vec<Venue>,
    center: GeoPoint,
    options: NearbyOptions,
}

impl NearbySearch {
    pub fn new(candidates: Vec<Venue>, center: GeoPoint, options: NearbyOptions) -> Self {
        Self {
            candidates,
            center,
            options,
        }
    }

    pub fn center(&self) -> GeoPoint {
        self.center
    }

    pub fn candidates(&self) -> &[Venue] {
        &self.candidates
    }

    /// Ranked venues around the current center.
    pub fn results(&self) -> Vec<NearbyVenue> {
        find_nearby_with(self.center, &self.options, &self.candidates)
    }

    /// Moves the center (map drag or click) and re-ranks.
    pub fn recenter(&mut self, point: GeoPoint) -> Result<Vec<NearbyVenue>, RecenterError> {
        if !point.is_valid() {
            return Err(RecenterError::InvalidCoordinate {
                lat: point.lat,
                lng: point.lng,
            });
        }
        self.center = point;
        Ok(self.results())
    }

    /// Moves the center to a geocoded address and re-ranks.
    ///
    /// On a miss the center stays where it was.
    pub fn recenter_to_address(
        &mut self,
        geocoder: &impl Geocoder,
        text: &str,
    ) -> Result<Vec<NearbyVenue>, RecenterError> {
        let point = geocoder.address_to_coord(text).map_err(|miss| {
            debug!("event=nearby_recenter module=geo status=miss");
            miss
        })?;
        self.recenter(point)
    }

    /// Address label for the current center, `""` when unknown.
    pub fn center_label(&self, geocoder: &impl Geocoder) -> String {
        geocoder.coord_to_address(self.center)
    }
}
