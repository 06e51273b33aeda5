//! Catalog store contracts and their SQLite implementation.
//!
//! # Responsibility
//! - Define the data access operations the engagement core consumes.
//! - Keep SQL and transaction boundaries out of the service layer.
//!
//! # Invariants
//! - Writes validate domain records before touching storage.
//! - Missing rows surface as semantic `*NotFound` errors, not as empty
//!   successes, on every mutating path.

pub mod catalog_store;
pub mod comment_repo;
pub mod venue_repo;
pub mod view_log_repo;
