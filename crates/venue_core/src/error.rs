//! Caller-facing error classification.
//!
//! Every service error maps onto one `ErrorKind`; the UI layer owns the
//! user-facing wording and only switches on the stable `code()`.

use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Address lookup found nothing; the map center is unchanged.
    GeocodeMiss,
    RateLimited,
    /// The action needs a signed-in identity.
    Unauthenticated,
    Banned,
    NotFound,
    /// Requester is not the author of the comment.
    NotAuthor,
    /// The catalog store stayed unavailable after one retry.
    StoreUnavailable,
    InvalidInput,
    Internal,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::GeocodeMiss => "geocode_miss",
            Self::RateLimited => "rate_limited",
            Self::Unauthenticated => "unauthenticated",
            Self::Banned => "banned",
            Self::NotFound => "not_found",
            Self::NotAuthor => "not_author",
            Self::StoreUnavailable => "store_unavailable",
            Self::InvalidInput => "invalid_input",
            Self::Internal => "internal",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
