//! Engagement and discovery use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into the operations the UI layer invokes.
//! - Classify failures into `ErrorKind` and apply the store retry policy.
//!
//! # Invariants
//! - Services never bypass repository transactions for counter writes.
//! - Services stay storage-agnostic; they only see repository traits.

use std::time::{SystemTime, UNIX_EPOCH};

pub mod comment_service;
pub mod discovery_service;
pub mod identity_service;
pub mod rate_limiter;
pub mod retry;
pub mod view_service;

/// Wall-clock time as Unix epoch milliseconds; `0` if the clock is before 1970.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
