//! Nearby discovery over catalog candidates.
//!
//! Loads published, pinned venues from the store and hands them to the
//! proximity ranking; geocoding stays with the caller-supplied `Geocoder`.

use crate::config::{CoreConfig, DEFAULT_STORE_RETRY_ATTEMPTS};
use crate::error::ErrorKind;
use crate::geo::geocode::{GeocodeMiss, Geocoder};
use crate::geo::proximity::{NearbyOptions, NearbySearch, NearbyVenue, RecenterError};
use crate::model::venue::{GeoPoint, Venue};
use crate::repo::catalog_store::RepoError;
use crate::repo::venue_repo::{VenueFilter, VenueRepository};
use crate::service::retry::with_store_retry;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum DiscoveryError {
    Recenter(RecenterError),
    Repo(RepoError),
}

impl DiscoveryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Recenter(RecenterError::GeocodeMiss(_)) => ErrorKind::GeocodeMiss,
            Self::Recenter(RecenterError::InvalidCoordinate { .. }) => ErrorKind::InvalidInput,
            Self::Repo(err) if err.is_unavailable() => ErrorKind::StoreUnavailable,
            Self::Repo(_) => ErrorKind::Internal,
        }
    }
}

impl Display for DiscoveryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Recenter(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DiscoveryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Recenter(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RecenterError> for DiscoveryError {
    fn from(value: RecenterError) -> Self {
        Self::Recenter(value)
    }
}

impl From<GeocodeMiss> for DiscoveryError {
    fn from(value: GeocodeMiss) -> Self {
        Self::Recenter(RecenterError::GeocodeMiss(value))
    }
}

impl From<RepoError> for DiscoveryError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

pub struct DiscoveryService<R: VenueRepository> {
    repo: R,
    options: NearbyOptions,
    store_retries: u32,
}

impl<R: VenueRepository> DiscoveryService<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            options: NearbyOptions::default(),
            store_retries: DEFAULT_STORE_RETRY_ATTEMPTS,
        }
    }

    pub fn with_config(repo: R, config: &CoreConfig) -> Self {
        Self {
            repo,
            options: NearbyOptions::from(config),
            store_retries: config.store_retry_attempts,
        }
    }

    /// Published venues with coordinates, in catalog order.
    pub fn load_candidates(&self) -> Result<Vec<Venue>, DiscoveryError> {
        let filter = VenueFilter::discoverable();
        Ok(with_store_retry("list_venues", self.store_retries, || {
            self.repo.list_venues(&filter)
        })?)
    }

    /// Ranked venues around `center` within the configured radius.
    pub fn find_nearby(&self, center: GeoPoint) -> Result<Vec<NearbyVenue>, DiscoveryError> {
        Ok(self.open_search(center)?.results())
    }

    /// Starts a recenterable session over a fresh candidate load.
    pub fn open_search(&self, center: GeoPoint) -> Result<NearbySearch, DiscoveryError> {
        if !center.is_valid() {
            return Err(RecenterError::InvalidCoordinate {
                lat: center.lat,
                lng: center.lng,
            }
            .into());
        }
        Ok(NearbySearch::new(self.load_candidates()?, center, self.options))
    }

    /// Geocodes `address` and ranks venues around it.
    pub fn find_nearby_address(
        &self,
        geocoder: &impl Geocoder,
        address: &str,
    ) -> Result<(GeoPoint, Vec<NearbyVenue>), DiscoveryError> {
        let center = geocoder.address_to_coord(address)?;
        Ok((center, self.find_nearby(center)?))
    }
}
