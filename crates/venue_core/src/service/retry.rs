//! Single-retry policy for transient catalog store failures.

use crate::repo::catalog_store::RepoResult;
use log::warn;
use std::time::Duration;

const RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Runs `run`, re-running it up to `retries` times while it fails with
/// `RepoError::StoreUnavailable`. Other errors are returned immediately.
pub fn with_store_retry<T>(
    operation: &'static str,
    retries: u32,
    mut run: impl FnMut() -> RepoResult<T>,
) -> RepoResult<T> {
    let mut attempt = 0;
    loop {
        match run() {
            Err(err) if err.is_unavailable() && attempt < retries => {
                attempt += 1;
                warn!(
                    "event=store_retry module=service status=retry operation={operation} attempt={attempt} error={err}"
                );
                std::thread::sleep(RETRY_BACKOFF);
            }
            other => return other,
        }
    }
}
