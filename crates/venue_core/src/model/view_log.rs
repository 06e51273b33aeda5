//! View log entries backing the view dedup window.

use crate::model::venue::VenueId;
use serde::{Deserialize, Serialize};

/// Last time one visitor viewed one venue. Unique per `(visitor_id, venue_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewLogEntry {
    pub visitor_id: String,
    pub venue_id: VenueId,
    /// Unix epoch milliseconds.
    pub last_viewed_at: i64,
}

impl ViewLogEntry {
    pub fn new(visitor_id: impl Into<String>, venue_id: VenueId, last_viewed_at: i64) -> Self {
        Self {
            visitor_id: visitor_id.into(),
            venue_id,
            last_viewed_at,
        }
    }

    /// Whether this entry still suppresses a new count at `now_ms`.
    pub fn is_within_window(&self, now_ms: i64, window_ms: i64) -> bool {
        self.last_viewed_at > now_ms.saturating_sub(window_ms)
    }
}
