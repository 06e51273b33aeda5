//! Tunables for discovery, view dedup, submission throttling and comments.
//!
//! # Invariants
//! - Every field has a default, so partial JSON files are accepted.
//! - A loaded config is validated before it is handed to services.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

pub const DEFAULT_NEARBY_RADIUS_KM: f64 = 30.0;
pub const DEFAULT_DISPLAY_CLAMP_KM: f64 = 0.05;
pub const DEFAULT_VIEW_DEDUP_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;
pub const DEFAULT_SUBMISSION_LIMIT: usize = 10;
pub const DEFAULT_SUBMISSION_WINDOW_MS: i64 = 60_000;
pub const DEFAULT_COMMENT_PAGE_SIZE: u32 = 5;
pub const DEFAULT_COMMENT_MAX_CHARS: usize = 2_000;
pub const DEFAULT_STORE_RETRY_ATTEMPTS: u32 = 1;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    pub nearby_radius_km: f64,
    /// Distances below this render as `0Km`; ranking is unaffected.
    pub display_clamp_km: f64,
    pub view_dedup_window_ms: i64,
    pub submission_limit: usize,
    pub submission_window_ms: i64,
    pub comment_page_size: u32,
    pub comment_max_chars: usize,
    /// Extra attempts after a `StoreUnavailable` failure.
    pub store_retry_attempts: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            nearby_radius_km: DEFAULT_NEARBY_RADIUS_KM,
            display_clamp_km: DEFAULT_DISPLAY_CLAMP_KM,
            view_dedup_window_ms: DEFAULT_VIEW_DEDUP_WINDOW_MS,
            submission_limit: DEFAULT_SUBMISSION_LIMIT,
            submission_window_ms: DEFAULT_SUBMISSION_WINDOW_MS,
            comment_page_size: DEFAULT_COMMENT_PAGE_SIZE,
            comment_max_chars: DEFAULT_COMMENT_MAX_CHARS,
            store_retry_attempts: DEFAULT_STORE_RETRY_ATTEMPTS,
        }
    }
}

impl CoreConfig {
    /// Reads a JSON config file and validates it.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.display().to_string(),
            source: err,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.nearby_radius_km.is_finite() && self.nearby_radius_km > 0.0) {
            return Err(ConfigError::Invalid("nearby_radius_km must be > 0"));
        }
        if !(self.display_clamp_km.is_finite() && self.display_clamp_km >= 0.0) {
            return Err(ConfigError::Invalid("display_clamp_km must be >= 0"));
        }
        if self.view_dedup_window_ms <= 0 {
            return Err(ConfigError::Invalid("view_dedup_window_ms must be > 0"));
        }
        if self.submission_limit == 0 {
            return Err(ConfigError::Invalid("submission_limit must be > 0"));
        }
        if self.submission_window_ms <= 0 {
            return Err(ConfigError::Invalid("submission_window_ms must be > 0"));
        }
        if self.comment_page_size == 0 {
            return Err(ConfigError::Invalid("comment_page_size must be > 0"));
        }
        if self.comment_max_chars == 0 {
            return Err(ConfigError::Invalid("comment_max_chars must be > 0"));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: String,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "failed to read config `{path}`: {source}"),
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}
