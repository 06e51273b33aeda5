//! Client-local sliding-window throttle for comment submission.
//!
//! This is a UX guard only; a client that resets its state bypasses it.
//!
//! # Invariants
//! - At most `limit` retained timestamps, all inside the trailing window.
//! - `allow` prunes before counting; pruned entries are gone for good.

use crate::config::{CoreConfig, DEFAULT_SUBMISSION_LIMIT, DEFAULT_SUBMISSION_WINDOW_MS};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct SubmissionRateLimiter {
    limit: usize,
    window_ms: i64,
    /// Oldest first.
    events: VecDeque<i64>,
}

impl Default for SubmissionRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_SUBMISSION_LIMIT, DEFAULT_SUBMISSION_WINDOW_MS)
    }
}

impl SubmissionRateLimiter {
    pub fn new(limit: usize, window_ms: i64) -> Self {
        let limit = limit.max(1);
        Self {
            limit,
            window_ms,
            events: VecDeque::with_capacity(limit),
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(config.submission_limit, config.submission_window_ms)
    }

    /// Whether one more submission fits the window at `now_ms`.
    pub fn allow(&mut self, now_ms: i64) -> bool {
        self.prune(now_ms);
        self.events.len() < self.limit
    }

    /// Records a submission at `now_ms`.
    ///
    /// The ring never grows past `limit`; the oldest entry is dropped first.
    pub fn record(&mut self, now_ms: i64) {
        self.prune(now_ms);
        if self.events.len() == self.limit {
            self.events.pop_front();
        }
        self.events.push_back(now_ms);
    }

    /// Milliseconds until `allow` can return true again; 0 when it already does.
    pub fn retry_after_ms(&mut self, now_ms: i64) -> i64 {
        if self.allow(now_ms) {
            return 0;
        }
        self.events
            .front()
            .map_or(0, |oldest| (oldest + self.window_ms - now_ms).max(0))
    }

    pub fn retained(&self) -> usize {
        self.events.len()
    }

    fn prune(&mut self, now_ms: i64) {
        while let Some(&oldest) = self.events.front() {
            if now_ms - oldest < self.window_ms {
                break;
            }
            self.events.pop_front();
        }
    }
}
