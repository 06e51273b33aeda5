//! FFI use-case API for the venue detail and map screens.
//!
//! # Responsibility
//! - Expose discovery, view counting and comment moderation to Dart via FRB.
//! - Flatten core errors into envelopes with a stable `error_code`.
//!
//! # Invariants
//! - Exported functions never panic across the FFI boundary.
//! - Every call opens its own connection and releases it on return.
//! - `error_code` values are `ErrorKind::code()` strings.

use log::warn;
use once_cell::sync::Lazy;
use rusqlite::Connection;
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use uuid::Uuid;
use venue_core::db::open_db;
use venue_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    CommentModerationQueue, CommentRecord, CoreConfig, DiscoveryService, ErrorKind,
    FileAnonymousIdStore, GazetteerGeocoder, GeoPoint, Geocoder, IdentityKind, IdentityResolver,
    ModerationOutcome, NearbyVenue, SqliteCatalogStore, StaticAuthSession, SubmissionRateLimiter, ViewDeduplicationService,
    VisitorIdentity,
};

const CATALOG_DB_FILE_NAME: &str = "venue_catalog.sqlite3";
const ANONYMOUS_ID_FILE_NAME: &str = "visitor_identity.json";

static CATALOG_DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static CLIENT_STATE_DIR: OnceLock<PathBuf> = OnceLock::new();
static CORE_CONFIG: OnceLock<CoreConfig> = OnceLock::new();
static GEOCODER: OnceLock<GazetteerGeocoder> = OnceLock::new();
static SUBMISSION_LIMITER: Lazy<Mutex<SubmissionRateLimiter>> =
    Lazy::new(|| Mutex::new(SubmissionRateLimiter::from_config(core_config())));

/// Health-check API for FRB smoke integration.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes core logging once per process.
///
/// # FFI contract
/// - Idempotent for the same `level + log_dir`.
/// - Returns empty string on success and an error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Pins the catalog database, client state directory, optional JSON config
/// and optional places JSON (address search) for this process.
///
/// # FFI contract
/// - First successful call wins; later calls with other values are rejected.
/// - Returns empty string on success and an error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn configure_catalog(
    db_path: String,
    client_state_dir: String,
    config_path: Option<String>,
    places_path: Option<String>,
) -> String {
    let config = match non_empty(config_path.as_deref()) {
        Some(path) => match CoreConfig::load_from_path(path) {
            Ok(config) => config,
            Err(err) => return format!("configure_catalog failed: {err}"),
        },
        None => CoreConfig::default(),
    };
    let geocoder = match non_empty(places_path.as_deref()) {
        Some(path) => match GazetteerGeocoder::load_from_path(path) {
            Ok(geocoder) => geocoder,
            Err(err) => return format!("configure_catalog failed: places: {err}"),
        },
        None => GazetteerGeocoder::new(),
    };

    let db_path = PathBuf::from(db_path.trim());
    let state_dir = PathBuf::from(client_state_dir.trim());
    if db_path.as_os_str().is_empty() || state_dir.as_os_str().is_empty() {
        return "configure_catalog failed: paths cannot be empty".to_string();
    }

    let pinned_db = CATALOG_DB_PATH.get_or_init(|| db_path.clone());
    let pinned_dir = CLIENT_STATE_DIR.get_or_init(|| state_dir.clone());
    let pinned_config = CORE_CONFIG.get_or_init(|| config.clone());
    let pinned_geocoder = GEOCODER.get_or_init(|| geocoder.clone());
    if *pinned_db != db_path
        || *pinned_dir != state_dir
        || *pinned_config != config
        || *pinned_geocoder != geocoder
    {
        return "configure_catalog failed: catalog already configured with different settings"
            .to_string();
    }
    String::new()
}

/// Flat view of a ranked venue for the map list.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyItem {
    pub venue_id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    /// Unclamped ranking distance.
    pub distance_km: f64,
    /// Display label, `0Km` for very close venues.
    pub distance_label: String,
    pub view_count: i64,
    pub comment_count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NearbyResponse {
    pub ok: bool,
    /// Center the items were ranked around; set on success.
    pub center_lat: Option<f64>,
    pub center_lng: Option<f64>,
    pub items: Vec<NearbyItem>,
    pub error_code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityResponse {
    pub ok: bool,
    /// `anonymous|authenticated`.
    pub kind: String,
    pub visitor_id: String,
    pub error_code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewResponse {
    pub ok: bool,
    pub counted: bool,
    pub new_total: Option<i64>,
    pub error_code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentItem {
    pub comment_id: String,
    pub venue_id: String,
    pub author_id: String,
    pub body: String,
    pub created_at: i64,
    pub admitted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentActionResponse {
    pub ok: bool,
    pub comment: Option<CommentItem>,
    /// Venue counter after the action, when it is known.
    pub comment_count: Option<i64>,
    pub error_code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationResponse {
    pub ok: bool,
    pub changed_ids: Vec<String>,
    pub error_code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentListResponse {
    pub ok: bool,
    pub items: Vec<CommentItem>,
    pub page: u32,
    pub has_more: bool,
    pub error_code: Option<String>,
    pub message: String,
}

/// Resolves the visitor identity for the current session.
///
/// `signed_in_user_id` is the id reported by the auth provider, if any.
#[flutter_rust_bridge::frb(sync)]
pub fn resolve_identity(signed_in_user_id: Option<String>) -> IdentityResponse {
    let result = with_catalog(|store, config| {
        let resolver = IdentityResolver::new(
            FileAnonymousIdStore::new(client_state_dir().join(ANONYMOUS_ID_FILE_NAME)),
            StaticAuthSession(signed_in_user_id),
            store,
        )
        .with_store_retries(config.store_retry_attempts);
        resolver
            .resolve()
            .map_err(|err| FfiFailure::new(err.kind(), err))
    });

    match result {
        Ok(identity) => IdentityResponse {
            ok: true,
            kind: identity.kind.as_str().to_string(),
            visitor_id: identity.id,
            error_code: None,
            message: String::new(),
        },
        Err(failure) => IdentityResponse {
            ok: false,
            kind: String::new(),
            visitor_id: String::new(),
            error_code: Some(failure.code.to_string()),
            message: failure.message,
        },
    }
}

/// Ranks published venues around a map center.
///
/// `radius_km` overrides the configured radius when set.
#[flutter_rust_bridge::frb(sync)]
pub fn find_nearby(lat: f64, lng: f64, radius_km: Option<f64>) -> NearbyResponse {
    let center = GeoPoint::new(lat, lng);
    let result = with_catalog(|store, config| {
        discovery(store, config, radius_km)
            .find_nearby(center)
            .map(|ranked| (center, ranked))
            .map_err(|err| FfiFailure::new(err.kind(), err))
    });
    to_nearby_response(result)
}

/// Ranks published venues around a searched address.
///
/// An unknown address fails with `geocode_miss`; the caller keeps its
/// current map center.
#[flutter_rust_bridge::frb(sync)]
pub fn find_nearby_address(address: String, radius_km: Option<f64>) -> NearbyResponse {
    to_nearby_response(find_nearby_address_with(
        pinned_geocoder(),
        &address,
        radius_km,
    ))
}

/// Address label for a map center, empty when no known place is close.
#[flutter_rust_bridge::frb(sync)]
pub fn center_label(lat: f64, lng: f64) -> String {
    pinned_geocoder().coord_to_address(GeoPoint::new(lat, lng))
}

/// Counts a venue detail view at most once per visitor per dedup window.
///
/// `visitor_kind` is `anonymous` or `authenticated`, as returned by
/// `resolve_identity`.
#[flutter_rust_bridge::frb(sync)]
pub fn register_view(visitor_kind: String, visitor_id: String, venue_id: String) -> ViewResponse {
    let result = parse_identity(&visitor_kind, &visitor_id).and_then(|identity| {
        let venue_id = parse_id(&venue_id, "venue_id")?;
        with_catalog(|store, config| {
            ViewDeduplicationService::with_config(store, config)
                .register_view(&identity, venue_id)
                .map_err(|err| FfiFailure::new(err.kind(), err))
        })
    });

    match result {
        Ok(registration) => ViewResponse {
            ok: true,
            counted: registration.counted,
            new_total: registration.new_total,
            error_code: None,
            message: String::new(),
        },
        Err(failure) => ViewResponse {
            ok: false,
            counted: false,
            new_total: None,
            error_code: Some(failure.code.to_string()),
            message: failure.message,
        },
    }
}

/// Submits a pending comment; requires a signed-in author.
#[flutter_rust_bridge::frb(sync)]
pub fn submit_comment(
    signed_in_user_id: Option<String>,
    venue_id: String,
    body: String,
) -> CommentActionResponse {
    let identity = match signed_in_user_id {
        Some(user_id) if !user_id.trim().is_empty() => VisitorIdentity::authenticated(user_id),
        _ => VisitorIdentity::anonymous(String::new()),
    };

    let result = parse_id(&venue_id, "venue_id").and_then(|venue_id| {
        with_catalog(|store, config| {
            let mut limiter = SUBMISSION_LIMITER
                .lock()
                .map_err(|_| FfiFailure::new(ErrorKind::Internal, "submission limiter poisoned"))?;
            CommentModerationQueue::with_config(store, config)
                .submit(&mut limiter, &identity, venue_id, &body)
                .map_err(|err| FfiFailure::new(err.kind(), err))
        })
    });

    match result {
        Ok(comment) => CommentActionResponse::success(
            "Comment submitted for review.",
            Some(to_comment_item(comment)),
            None,
        ),
        Err(failure) => CommentActionResponse::failure(failure),
    }
}

/// Moderator approval of a batch of comments.
#[flutter_rust_bridge::frb(sync)]
pub fn approve_comments(comment_ids: Vec<String>) -> ModerationResponse {
    moderate(comment_ids, |queue, ids| queue.approve(ids))
}

/// Moderator rejection of a batch of comments.
#[flutter_rust_bridge::frb(sync)]
pub fn reject_comments(comment_ids: Vec<String>) -> ModerationResponse {
    moderate(comment_ids, |queue, ids| queue.reject(ids))
}

/// Author withdrawal of their own comment.
#[flutter_rust_bridge::frb(sync)]
pub fn withdraw_comment(comment_id: String, requester_id: String) -> CommentActionResponse {
    let result = parse_id(&comment_id, "comment_id").and_then(|comment_id| {
        with_catalog(|store, config| {
            CommentModerationQueue::with_config(store, config)
                .withdraw(comment_id, requester_id.trim())
                .map_err(|err| FfiFailure::new(err.kind(), err))
        })
    });

    match result {
        Ok(receipt) => CommentActionResponse::success(
            "Comment withdrawn.",
            None,
            Some(receipt.comment_count),
        ),
        Err(failure) => CommentActionResponse::failure(failure),
    }
}

/// Public admitted comments of one venue, newest first, 0-based page.
#[flutter_rust_bridge::frb(sync)]
pub fn list_venue_comments(venue_id: String, page: u32) -> CommentListResponse {
    let result = parse_id(&venue_id, "venue_id").and_then(|venue_id| {
        with_catalog(|store, config| {
            CommentModerationQueue::with_config(store, config)
                .list_public(venue_id, page)
                .map_err(|err| FfiFailure::new(err.kind(), err))
        })
    });

    match result {
        Ok(listing) => CommentListResponse {
            ok: true,
            has_more: listing.has_more(),
            items: listing.items.into_iter().map(to_comment_item).collect(),
            page,
            error_code: None,
            message: String::new(),
        },
        Err(failure) => CommentListResponse {
            ok: false,
            items: Vec::new(),
            page,
            has_more: false,
            error_code: Some(failure.code.to_string()),
            message: failure.message,
        },
    }
}

impl CommentActionResponse {
    fn success(
        message: impl Into<String>,
        comment: Option<CommentItem>,
        comment_count: Option<i64>,
    ) -> Self {
        Self {
            ok: true,
            comment,
            comment_count,
            error_code: None,
            message: message.into(),
        }
    }

    fn failure(failure: FfiFailure) -> Self {
        Self {
            ok: false,
            comment: None,
            comment_count: None,
            error_code: Some(failure.code.to_string()),
            message: failure.message,
        }
    }
}

#[derive(Debug)]
struct FfiFailure {
    code: &'static str,
    message: String,
}

impl FfiFailure {
    fn new(kind: ErrorKind, err: impl Display) -> Self {
        Self {
            code: kind.code(),
            message: err.to_string(),
        }
    }
}

fn discovery<'conn>(
    store: SqliteCatalogStore<'conn>,
    config: &CoreConfig,
    radius_km: Option<f64>,
) -> DiscoveryService<SqliteCatalogStore<'conn>> {
    let mut config = config.clone();
    if let Some(radius) = radius_km.filter(|r| r.is_finite() && *r > 0.0) {
        config.nearby_radius_km = radius;
    }
    DiscoveryService::with_config(store, &config)
}

fn find_nearby_address_with(
    geocoder: &impl Geocoder,
    address: &str,
    radius_km: Option<f64>,
) -> Result<(GeoPoint, Vec<NearbyVenue>), FfiFailure> {
    with_catalog(|store, config| {
        discovery(store, config, radius_km)
            .find_nearby_address(geocoder, address)
            .map_err(|err| FfiFailure::new(err.kind(), err))
    })
}

fn to_nearby_response(result: Result<(GeoPoint, Vec<NearbyVenue>), FfiFailure>) -> NearbyResponse {
    match result {
        Ok((center, ranked)) => {
            let items: Vec<NearbyItem> = ranked
                .into_iter()
                .filter_map(|nearby| {
                    let label = nearby.distance_label();
                    let point = nearby.venue.location?;
                    Some(NearbyItem {
                        venue_id: nearby.venue.id.to_string(),
                        name: nearby.venue.name,
                        lat: point.lat,
                        lng: point.lng,
                        distance_km: nearby.distance_km,
                        distance_label: label,
                        view_count: nearby.venue.view_count,
                        comment_count: nearby.venue.comment_count,
                    })
                })
                .collect();
            let message = if items.is_empty() {
                "No venues nearby.".to_string()
            } else {
                format!("Found {} venue(s).", items.len())
            };
            NearbyResponse {
                ok: true,
                center_lat: Some(center.lat),
                center_lng: Some(center.lng),
                items,
                error_code: None,
                message,
            }
        }
        Err(failure) => NearbyResponse {
            ok: false,
            center_lat: None,
            center_lng: None,
            items: Vec::new(),
            error_code: Some(failure.code.to_string()),
            message: failure.message,
        },
    }
}

fn moderate(
    comment_ids: Vec<String>,
    action: impl FnOnce(
        &CommentModerationQueue<SqliteCatalogStore<'_>>,
        &[Uuid],
    ) -> Result<ModerationOutcome, venue_core::CommentServiceError>,
) -> ModerationResponse {
    let result = comment_ids
        .iter()
        .map(|id| parse_id(id, "comment_id"))
        .collect::<Result<Vec<_>, _>>()
        .and_then(|ids| {
            with_catalog(|store, config| {
                let queue = CommentModerationQueue::with_config(store, config);
                action(&queue, &ids).map_err(|err| FfiFailure::new(err.kind(), err))
            })
        });

    match result {
        Ok(outcome) => ModerationResponse {
            ok: true,
            message: format!("{} comment(s) updated.", outcome.changed.len()),
            changed_ids: outcome.changed.iter().map(Uuid::to_string).collect(),
            error_code: None,
        },
        Err(failure) => ModerationResponse {
            ok: false,
            changed_ids: Vec::new(),
            error_code: Some(failure.code.to_string()),
            message: failure.message,
        },
    }
}

fn parse_id(value: &str, field: &str) -> Result<Uuid, FfiFailure> {
    Uuid::parse_str(value.trim()).map_err(|_| {
        FfiFailure::new(
            ErrorKind::InvalidInput,
            format!("{field} `{value}` is not a valid id"),
        )
    })
}

fn parse_identity(kind: &str, id: &str) -> Result<VisitorIdentity, FfiFailure> {
    let kind = match kind.trim() {
        "anonymous" => IdentityKind::Anonymous,
        "authenticated" => IdentityKind::Authenticated,
        other => {
            return Err(FfiFailure::new(
                ErrorKind::InvalidInput,
                format!("unknown visitor kind `{other}`"),
            ));
        }
    };
    Ok(VisitorIdentity {
        kind,
        id: id.trim().to_string(),
    })
}

fn to_comment_item(comment: CommentRecord) -> CommentItem {
    CommentItem {
        admitted: comment.is_admitted(),
        comment_id: comment.id.to_string(),
        venue_id: comment.venue_id.to_string(),
        author_id: comment.author_id,
        body: comment.body,
        created_at: comment.created_at,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|trimmed| !trimmed.is_empty())
}

fn pinned_geocoder() -> &'static GazetteerGeocoder {
    GEOCODER.get_or_init(|| {
        let Some(path) = env_path("VENUE_PLACES_PATH") else {
            return GazetteerGeocoder::new();
        };
        GazetteerGeocoder::load_from_path(&path).unwrap_or_else(|err| {
            warn!("event=ffi_places_load module=ffi status=error error={err}");
            GazetteerGeocoder::new()
        })
    })
}

fn core_config() -> &'static CoreConfig {
    CORE_CONFIG.get_or_init(CoreConfig::default)
}

fn resolve_catalog_db_path() -> PathBuf {
    CATALOG_DB_PATH
        .get_or_init(|| {
            env_path("VENUE_DB_PATH")
                .unwrap_or_else(|| std::env::temp_dir().join(CATALOG_DB_FILE_NAME))
        })
        .clone()
}

fn client_state_dir() -> PathBuf {
    CLIENT_STATE_DIR
        .get_or_init(|| {
            env_path("VENUE_CLIENT_DIR")
                .unwrap_or_else(|| std::env::temp_dir().join("venue_client"))
        })
        .clone()
}

fn env_path(name: &str) -> Option<PathBuf> {
    let raw = std::env::var(name).ok()?;
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
}

fn with_catalog<T>(
    f: impl FnOnce(SqliteCatalogStore<'_>, &CoreConfig) -> Result<T, FfiFailure>,
) -> Result<T, FfiFailure> {
    let conn: Connection = open_db(resolve_catalog_db_path()).map_err(|err| {
        warn!("event=ffi_catalog_open module=ffi status=error error={err}");
        let kind = if err.is_unavailable() {
            ErrorKind::StoreUnavailable
        } else {
            ErrorKind::Internal
        };
        FfiFailure::new(kind, format!("catalog open failed: {err}"))
    })?;
    let store = SqliteCatalogStore::try_new(&conn)
        .map_err(|err| FfiFailure::new(ErrorKind::Internal, format!("catalog init failed: {err}")))?;
    f(store, core_config())
}
