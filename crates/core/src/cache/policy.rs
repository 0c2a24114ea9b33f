//! Expiry, size and timeout limits shared by the strategy engine and the
//! lifecycle manager.

use std::time::Duration;

use chrono::TimeDelta;

/// Entries older than this are not served as fresh (24 hours).
pub const MAX_AGE_SECS: i64 = 24 * 60 * 60;

/// Entry-count ceiling per store.
pub const MAX_ENTRIES: usize = 100;

/// Network attempts that take longer than this count as failures.
pub const NETWORK_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub max_age: TimeDelta,
    pub max_entries: usize,
    pub network_timeout: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            max_age: TimeDelta::seconds(MAX_AGE_SECS),
            max_entries: MAX_ENTRIES,
            network_timeout: Duration::from_millis(NETWORK_TIMEOUT_MS),
        }
    }
}
