//! Engagement and discovery core for the local venue directory.
//! This crate is the single source of truth for counter and identity invariants.

pub mod config;
pub mod db;
pub mod error;
pub mod geo;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use error::ErrorKind;
pub use geo::distance::{distance_km, EARTH_RADIUS_KM};
pub use geo::geocode::{GazetteerGeocoder, GeocodeMiss, Geocoder, PlaceSeed};
pub use geo::proximity::{
    find_nearby, find_nearby_with, format_distance_label, NearbyOptions, NearbySearch,
    NearbyVenue, RecenterError,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::comment::{CommentId, CommentRecord, CommentStatus};
pub use model::identity::{IdentityKind, VisitorIdentity};
pub use model::venue::{GeoPoint, Venue, VenueId, VenueValidationError};
pub use model::view_log::ViewLogEntry;
pub use repo::catalog_store::{RepoError, RepoResult, SqliteCatalogStore};
pub use repo::comment_repo::{
    CommentRepository, ModerationOutcome, VenueCommentCount, WithdrawOutcome,
};
pub use repo::venue_repo::{VenueFilter, VenueRepository};
pub use repo::view_log_repo::{ViewLogRepository, ViewRecordOutcome};
pub use service::comment_service::{
    CommentModerationQueue, CommentPage, CommentServiceError, WithdrawReceipt,
};
pub use service::discovery_service::{DiscoveryError, DiscoveryService};
pub use service::identity_service::{
    AnonymousIdStore, AuthSession, FileAnonymousIdStore, IdentityError, IdentityResolver,
    MemoryAnonymousIdStore, StaticAuthSession,
};
pub use service::rate_limiter::SubmissionRateLimiter;
pub use service::view_service::{ViewDeduplicationService, ViewRegistration, ViewServiceError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
