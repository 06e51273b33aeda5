//! Comment submission, moderation and public listing.
//!
//! # Responsibility
//! - Gate submissions on sign-in, the client throttle, body rules and bans.
//! - Route approve/reject/withdraw through transactional store transitions.
//! - Serve the public admitted-comment listing independently of the queue.
//!
//! # Invariants
//! - Submission never touches `comment_count`; new rows are pending.
//! - Re-approving admitted comments and re-withdrawing removed comments
//!   leave every counter untouched.
//! - The public listing is newest first with a fixed page size.

use crate::config::{
    CoreConfig, DEFAULT_COMMENT_MAX_CHARS, DEFAULT_COMMENT_PAGE_SIZE,
    DEFAULT_STORE_RETRY_ATTEMPTS,
};
use crate::error::ErrorKind;
use crate::model::comment::{CommentId, CommentRecord};
use crate::model::identity::VisitorIdentity;
use crate::model::venue::VenueId;
use crate::repo::catalog_store::RepoError;
use crate::repo::comment_repo::{CommentRepository, ModerationOutcome, WithdrawOutcome};
use crate::service::now_epoch_ms;
use crate::service::rate_limiter::SubmissionRateLimiter;
use crate::service::retry::with_store_retry;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

// Control characters other than tab/newline/carriage return.
static CONTROL_CHARS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").expect("valid control char regex")
});
static BLANK_LINES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("valid blank line regex"));

#[derive(Debug)]
pub enum CommentServiceError {
    RateLimited { retry_after_ms: i64 },
    Unauthenticated,
    Banned,
    EmptyBody,
    BodyTooLong { max_chars: usize },
    VenueNotFound(VenueId),
    CommentNotFound(CommentId),
    NotAuthor(CommentId),
    Repo(RepoError),
}

impl CommentServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::Banned => ErrorKind::Banned,
            Self::EmptyBody | Self::BodyTooLong { .. } => ErrorKind::InvalidInput,
            Self::VenueNotFound(_) | Self::CommentNotFound(_) => ErrorKind::NotFound,
            Self::NotAuthor(_) => ErrorKind::NotAuthor,
            Self::Repo(err) if err.is_unavailable() => ErrorKind::StoreUnavailable,
            Self::Repo(_) => ErrorKind::Internal,
        }
    }
}

impl Display for CommentServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimited { retry_after_ms } => {
                write!(f, "too many submissions; retry in {retry_after_ms}ms")
            }
            Self::Unauthenticated => write!(f, "sign in to comment"),
            Self::Banned => write!(f, "author is banned from commenting"),
            Self::EmptyBody => write!(f, "comment body cannot be empty"),
            Self::BodyTooLong { max_chars } => {
                write!(f, "comment body exceeds {max_chars} characters")
            }
            Self::VenueNotFound(id) => write!(f, "venue not found: {id}"),
            Self::CommentNotFound(id) => write!(f, "comment not found: {id}"),
            Self::NotAuthor(id) => write!(f, "only the author can withdraw comment {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CommentServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CommentServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::VenueNotFound(id) => Self::VenueNotFound(id),
            RepoError::CommentNotFound(id) => Self::CommentNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// One page of the public comment listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentPage {
    pub items: Vec<CommentRecord>,
    /// 0-based page index.
    pub page: u32,
    pub page_size: u32,
    pub total_admitted: i64,
}

impl CommentPage {
    pub fn has_more(&self) -> bool {
        (i64::from(self.page) + 1) * i64::from(self.page_size) < self.total_admitted
    }
}

/// Result of a successful withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawReceipt {
    pub venue_id: VenueId,
    pub was_admitted: bool,
    pub comment_count: i64,
}

pub struct CommentModerationQueue<R: CommentRepository> {
    repo: R,
    page_size: u32,
    max_chars: usize,
    store_retries: u32,
}

impl<R: CommentRepository> CommentModerationQueue<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            page_size: DEFAULT_COMMENT_PAGE_SIZE,
            max_chars: DEFAULT_COMMENT_MAX_CHARS,
            store_retries: DEFAULT_STORE_RETRY_ATTEMPTS,
        }
    }

    pub fn with_config(repo: R, config: &CoreConfig) -> Self {
        Self {
            repo,
            page_size: config.comment_page_size,
            max_chars: config.comment_max_chars,
            store_retries: config.store_retry_attempts,
        }
    }

    /// Submits a comment at the current wall-clock time.
    pub fn submit(
        &self,
        limiter: &mut SubmissionRateLimiter,
        identity: &VisitorIdentity,
        venue_id: VenueId,
        body: &str,
    ) -> Result<CommentRecord, CommentServiceError> {
        self.submit_at(limiter, identity, venue_id, body, now_epoch_ms())
    }

    /// Stores a new pending comment.
    ///
    /// The throttle only records submissions that were actually stored.
    pub fn submit_at(
        &self,
        limiter: &mut SubmissionRateLimiter,
        identity: &VisitorIdentity,
        venue_id: VenueId,
        body: &str,
        now_ms: i64,
    ) -> Result<CommentRecord, CommentServiceError> {
        if !identity.is_authenticated() {
            return Err(CommentServiceError::Unauthenticated);
        }
        if !limiter.allow(now_ms) {
            let retry_after_ms = limiter.retry_after_ms(now_ms);
            info!(
                "event=comment_submit module=service status=skip reason=rate_limited retry_after_ms={retry_after_ms}"
            );
            return Err(CommentServiceError::RateLimited { retry_after_ms });
        }

        let body = normalize_comment_body(body);
        if body.is_empty() {
            return Err(CommentServiceError::EmptyBody);
        }
        if body.chars().count() > self.max_chars {
            return Err(CommentServiceError::BodyTooLong {
                max_chars: self.max_chars,
            });
        }

        let banned = with_store_retry("is_author_banned", self.store_retries, || {
            self.repo.is_author_banned(&identity.id)
        })?;
        if banned {
            warn!(
                "event=comment_submit module=service status=skip reason=banned identity={}",
                identity.log_tag()
            );
            return Err(CommentServiceError::Banned);
        }

        let comment = CommentRecord::pending(venue_id, identity.id.as_str(), body, now_ms);
        with_store_retry("insert_comment", self.store_retries, || {
            self.repo.insert_comment(&comment)
        })?;
        limiter.record(now_ms);

        info!(
            "event=comment_submit module=service status=ok comment_id={} venue_id={venue_id}",
            comment.id
        );
        Ok(comment)
    }

    /// Admits pending (or previously rejected) comments and raises each
    /// touched venue's counter by its number of newly admitted comments.
    pub fn approve(&self, ids: &[CommentId]) -> Result<ModerationOutcome, CommentServiceError> {
        let outcome = with_store_retry("admit_comments", self.store_retries, || {
            self.repo.admit_comments(ids)
        })?;
        info!(
            "event=comment_approve module=service status=ok requested={} changed={} venues={}",
            ids.len(),
            outcome.changed.len(),
            outcome.venues.len()
        );
        Ok(outcome)
    }

    /// Rejects comments; admitted ones also leave their venue's counter.
    pub fn reject(&self, ids: &[CommentId]) -> Result<ModerationOutcome, CommentServiceError> {
        let outcome = with_store_retry("reject_comments", self.store_retries, || {
            self.repo.reject_comments(ids)
        })?;
        info!(
            "event=comment_reject module=service status=ok requested={} changed={} venues={}",
            ids.len(),
            outcome.changed.len(),
            outcome.venues.len()
        );
        Ok(outcome)
    }

    /// Removes the requester's own comment.
    pub fn withdraw(
        &self,
        comment_id: CommentId,
        requester_id: &str,
    ) -> Result<WithdrawReceipt, CommentServiceError> {
        let outcome = with_store_retry("withdraw_comment", self.store_retries, || {
            self.repo.withdraw_comment(comment_id, requester_id)
        })?;
        match outcome {
            WithdrawOutcome::Withdrawn {
                venue_id,
                was_admitted,
                comment_count,
            } => {
                info!(
                    "event=comment_withdraw module=service status=ok comment_id={comment_id} was_admitted={was_admitted}"
                );
                Ok(WithdrawReceipt {
                    venue_id,
                    was_admitted,
                    comment_count,
                })
            }
            WithdrawOutcome::NotAuthor => Err(CommentServiceError::NotAuthor(comment_id)),
        }
    }

    /// Admitted comments of one venue, newest first.
    pub fn list_public(
        &self,
        venue_id: VenueId,
        page: u32,
    ) -> Result<CommentPage, CommentServiceError> {
        let items = with_store_retry("list_comments", self.store_retries, || {
            self.repo.list_comments(venue_id, true, page, self.page_size)
        })?;
        let total_admitted = self.repo.count_admitted_comments(venue_id)?;
        Ok(CommentPage {
            items,
            page,
            page_size: self.page_size,
            total_admitted,
        })
    }

    /// Moderation queue, oldest first.
    pub fn list_pending(&self, page: u32) -> Result<Vec<CommentRecord>, CommentServiceError> {
        Ok(with_store_retry(
            "list_pending_comments",
            self.store_retries,
            || self.repo.list_pending_comments(page, self.page_size),
        )?)
    }

    pub fn ban_author(&self, user_id: &str) -> Result<(), CommentServiceError> {
        self.repo.ban_author(user_id, now_epoch_ms())?;
        info!("event=author_ban module=service status=ok");
        Ok(())
    }

    pub fn unban_author(&self, user_id: &str) -> Result<(), CommentServiceError> {
        self.repo.unban_author(user_id)?;
        Ok(())
    }
}

/// Trims, strips control characters and caps runs of blank lines.
pub fn normalize_comment_body(body: &str) -> String {
    let without_controls = CONTROL_CHARS_RE.replace_all(body, "");
    let unified = without_controls.replace("\r\n", "\n");
    BLANK_LINES_RE
        .replace_all(&unified, "\n\n")
        .trim()
        .to_string()
}
