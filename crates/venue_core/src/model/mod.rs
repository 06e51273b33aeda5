//! Domain records for the engagement and discovery core.
//!
//! # Invariants
//! - Venues are identified by a stable `VenueId` and never deleted here.
//! - Aggregate counters (`view_count`, `comment_count`) are only changed by
//!   the view and moderation services.
//! - All timestamps are Unix epoch milliseconds.

pub mod comment;
pub mod identity;
pub mod venue;
pub mod view_log;
