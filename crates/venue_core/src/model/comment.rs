//! Comment records and moderation status.
//!
//! # Invariants
//! - New comments always start as `CommentStatus::Pending`.
//! - Only `CommentStatus::Admitted` comments are publicly visible and counted
//!   in `Venue::comment_count`.

use crate::model::venue::VenueId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a comment.
pub type CommentId = Uuid;

/// Moderation state of one comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentStatus {
    /// Waiting in the moderation queue.
    Pending,
    /// Approved by a moderator and publicly listed.
    Admitted,
    /// Declined by a moderator; retained but never listed.
    Rejected,
}

impl CommentStatus {
    pub fn as_db(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Admitted => "admitted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse_db(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "admitted" => Some(Self::Admitted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: CommentId,
    pub venue_id: VenueId,
    pub author_id: String,
    pub body: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub status: CommentStatus,
}

impl CommentRecord {
    /// Builds a fresh pending comment.
    pub fn pending(
        venue_id: VenueId,
        author_id: impl Into<String>,
        body: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            venue_id,
            author_id: author_id.into(),
            body: body.into(),
            created_at,
            status: CommentStatus::Pending,
        }
    }

    pub fn is_admitted(&self) -> bool {
        self.status == CommentStatus::Admitted
    }
}
