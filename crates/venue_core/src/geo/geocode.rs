//! Address ↔ coordinate resolution seam.
//!
//! # Responsibility
//! - Define the `Geocoder` contract consumed by nearby search recentering.
//! - Provide an in-memory gazetteer implementation for offline use and tests.
//!
//! # Invariants
//! - A failed forward lookup is a `GeocodeMiss`, never a panic.
//! - Reverse lookup misses are an empty string.

use crate::config::ConfigError;
use crate::geo::distance::distance_km;
use crate::model::venue::GeoPoint;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Reverse lookups farther than this from every known place return `""`.
const REVERSE_MATCH_RADIUS_KM: f64 = 1.0;
/// Shorter queries only match a place exactly.
const MIN_PARTIAL_QUERY_CHARS: usize = 3;

/// Forward geocoding found no coordinate for the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocodeMiss {
    pub query: String,
}

impl Display for GeocodeMiss {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "no coordinate found for address `{}`", self.query)
    }
}

impl Error for GeocodeMiss {}

/// External geocoding collaborator.
pub trait Geocoder {
    fn address_to_coord(&self, text: &str) -> Result<GeoPoint, GeocodeMiss>;
    /// Human-readable address for `point`, or `""` when unknown.
    fn coord_to_address(&self, point: GeoPoint) -> String;
}

impl<G: Geocoder + ?Sized> Geocoder for &G {
    fn address_to_coord(&self, text: &str) -> Result<GeoPoint, GeocodeMiss> {
        (**self).address_to_coord(text)
    }

    fn coord_to_address(&self, point: GeoPoint) -> String {
        (**self).coord_to_address(point)
    }
}

/// Normalizes free-form address input for matching.
pub fn normalize_address(text: &str) -> String {
    WHITESPACE_RE
        .replace_all(text.trim(), " ")
        .to_lowercase()
}

#[derive(Debug, Clone, PartialEq)]
struct Place {
    label: String,
    key: String,
    point: GeoPoint,
}

/// Fixed list of named places, matched by normalized address text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GazetteerGeocoder {
    places: Vec<Place>,
}

/// One entry of a places JSON file: `[{"label": "...", "lat": 0.0, "lng": 0.0}]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlaceSeed {
    pub label: String,
    pub lat: f64,
    pub lng: f64,
}

impl GazetteerGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a place; later registrations with the same key win.
    pub fn with_place(mut self, label: impl Into<String>, point: GeoPoint) -> Self {
        let label = label.into();
        let key = normalize_address(&label);
        self.places.retain(|place| place.key != key);
        self.places.push(Place { label, key, point });
        self
    }

    /// Builds a gazetteer from seed entries, rejecting blank labels and
    /// out-of-range coordinates.
    pub fn from_seeds(seeds: Vec<PlaceSeed>) -> Result<Self, ConfigError> {
        seeds.into_iter().try_fold(Self::new(), |gazetteer, seed| {
            let point = GeoPoint::new(seed.lat, seed.lng);
            if normalize_address(&seed.label).is_empty() {
                return Err(ConfigError::Invalid("place label cannot be empty"));
            }
            if !point.is_valid() {
                return Err(ConfigError::Invalid("place coordinates out of range"));
            }
            Ok(gazetteer.with_place(seed.label, point))
        })
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let seeds: Vec<PlaceSeed> = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        Self::from_seeds(seeds)
    }

    /// Reads a places JSON file.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.display().to_string(),
            source: err,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }
}

/// Whether `key` appears in `place_key` as a run of whole words.
fn matches_whole_words(place_key: &str, key: &str) -> bool {
    key.chars().count() >= MIN_PARTIAL_QUERY_CHARS
        && format!(" {place_key} ").contains(&format!(" {key} "))
}

impl Geocoder for GazetteerGeocoder {
    fn address_to_coord(&self, text: &str) -> Result<GeoPoint, GeocodeMiss> {
        let key = normalize_address(text);
        if key.is_empty() {
            return Err(GeocodeMiss {
                query: text.to_string(),
            });
        }

        self.places
            .iter()
            .find(|place| place.key == key)
            .or_else(|| {
                self.places
                    .iter()
                    .find(|place| matches_whole_words(&place.key, &key))
            })
            .map(|place| place.point)
            .ok_or_else(|| GeocodeMiss {
                query: text.to_string(),
            })
    }

    fn coord_to_address(&self, point: GeoPoint) -> String {
        if !point.is_valid() {
            return String::new();
        }

        self.places
            .iter()
            .map(|place| (place, distance_km(point, place.point)))
            .filter(|(_, d)| *d <= REVERSE_MATCH_RADIUS_KM)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(place, _)| place.label.clone())
            .unwrap_or_default()
    }
}
