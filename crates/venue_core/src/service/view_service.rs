//! At-most-once view counting per visitor and venue.
//!
//! # Responsibility
//! - Decide whether a venue view counts inside the rolling dedup window.
//! - Delegate the check + increment + log upsert to one store transaction.
//!
//! # Invariants
//! - Repeated calls for one pair inside the window never increment twice,
//!   whatever order they arrive in.
//! - A call after the window elapses counts again.
//! - The counter is incremented in place, never read-modified-written.

use crate::config::{CoreConfig, DEFAULT_STORE_RETRY_ATTEMPTS, DEFAULT_VIEW_DEDUP_WINDOW_MS};
use crate::error::ErrorKind;
use crate::model::identity::VisitorIdentity;
use crate::model::venue::VenueId;
use crate::model::view_log::ViewLogEntry;
use crate::repo::catalog_store::RepoError;
use crate::repo::view_log_repo::{ViewLogRepository, ViewRecordOutcome};
use crate::service::now_epoch_ms;
use crate::service::retry::with_store_retry;
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Outcome of `register_view`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewRegistration {
    pub counted: bool,
    /// Stored `view_count` after the increment; `None` when not counted.
    pub new_total: Option<i64>,
}

#[derive(Debug)]
pub enum ViewServiceError {
    EmptyIdentity,
    VenueNotFound(VenueId),
    Repo(RepoError),
}

impl ViewServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyIdentity => ErrorKind::InvalidInput,
            Self::VenueNotFound(_) => ErrorKind::NotFound,
            Self::Repo(err) if err.is_unavailable() => ErrorKind::StoreUnavailable,
            Self::Repo(_) => ErrorKind::Internal,
        }
    }
}

impl Display for ViewServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyIdentity => write!(f, "visitor identity id cannot be empty"),
            Self::VenueNotFound(id) => write!(f, "venue not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ViewServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ViewServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::VenueNotFound(id) => Self::VenueNotFound(id),
            other => Self::Repo(other),
        }
    }
}

pub struct ViewDeduplicationService<R: ViewLogRepository> {
    repo: R,
    window_ms: i64,
    store_retries: u32,
}

impl<R: ViewLogRepository> ViewDeduplicationService<R> {
    /// Uses the default 24h window.
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            window_ms: DEFAULT_VIEW_DEDUP_WINDOW_MS,
            store_retries: DEFAULT_STORE_RETRY_ATTEMPTS,
        }
    }

    pub fn with_config(repo: R, config: &CoreConfig) -> Self {
        Self {
            repo,
            window_ms: config.view_dedup_window_ms,
            store_retries: config.store_retry_attempts,
        }
    }

    /// Registers a view at the current wall-clock time.
    pub fn register_view(
        &self,
        identity: &VisitorIdentity,
        venue_id: VenueId,
    ) -> Result<ViewRegistration, ViewServiceError> {
        self.register_view_at(identity, venue_id, now_epoch_ms())
    }

    pub fn register_view_at(
        &self,
        identity: &VisitorIdentity,
        venue_id: VenueId,
        now_ms: i64,
    ) -> Result<ViewRegistration, ViewServiceError> {
        if identity.id.trim().is_empty() {
            return Err(ViewServiceError::EmptyIdentity);
        }

        let outcome = with_store_retry("register_view", self.store_retries, || {
            self.repo
                .record_view_once(&identity.id, venue_id, now_ms, self.window_ms)
        })
        .map_err(|err| {
            warn!(
                "event=view_register module=service status=error identity={} venue_id={venue_id} error={err}",
                identity.log_tag()
            );
            ViewServiceError::from(err)
        })?;

        match outcome {
            ViewRecordOutcome::Counted { new_total } => {
                info!(
                    "event=view_register module=service status=ok counted=true identity={} venue_id={venue_id} total={new_total}",
                    identity.log_tag()
                );
                Ok(ViewRegistration {
                    counted: true,
                    new_total: Some(new_total),
                })
            }
            ViewRecordOutcome::AlreadyCounted => {
                debug!(
                    "event=view_register module=service status=skip counted=false identity={} venue_id={venue_id}",
                    identity.log_tag()
                );
                Ok(ViewRegistration {
                    counted: false,
                    new_total: None,
                })
            }
        }
    }

    /// Last recorded view of `venue_id` by `identity`, if any.
    pub fn last_view(
        &self,
        identity: &VisitorIdentity,
        venue_id: VenueId,
    ) -> Result<Option<ViewLogEntry>, ViewServiceError> {
        Ok(self.repo.get_view_log(&identity.id, venue_id)?)
    }
}
