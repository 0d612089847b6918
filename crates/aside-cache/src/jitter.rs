//! TTL jitter against synchronized expiry.

use std::time::Duration;

use rand::Rng;

/// Jitter is drawn in whole seconds from `[0, MAX_JITTER_SECS)`.
pub const MAX_JITTER_SECS: u64 = 5;

/// Add a fresh random jitter to `ttl`, saturating at `Duration::MAX`.
///
/// Used once per cache instance at construction and once per renewal; each
/// call draws independently.
pub fn jittered(ttl: Duration) -> Duration {
    ttl.saturating_add(Duration::from_secs(
        rand::thread_rng().gen_range(0..MAX_JITTER_SECS),
    ))
}

/// Whole seconds for `EX`, rounded up and never zero.
pub(crate) fn expiry_secs(ttl: Duration) -> u64 {
    let secs = ttl
        .as_secs()
        .saturating_add(u64::from(ttl.subsec_nanos() > 0));
    secs.max(1)
}
