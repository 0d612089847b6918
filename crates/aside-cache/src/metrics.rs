//! Cache traffic counters.
//!
//! Recorded through the `metrics` facade; installing an exporter is left to
//! the embedding application.

use metrics::counter;

use crate::error::ErrorKind;

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "aside_cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "aside_cache_misses_total";
    pub const CACHE_GUARD_REJECTIONS_TOTAL: &str = "aside_cache_guard_rejections_total";
    pub const CACHE_FALLBACK_LOADS_TOTAL: &str = "aside_cache_fallback_loads_total";
    pub const CACHE_COALESCED_WAITS_TOTAL: &str = "aside_cache_coalesced_waits_total";
    pub const CACHE_ERRORS_TOTAL: &str = "aside_cache_errors_total";
}

pub fn record_cache_hit(prefix: &str) {
    counter!(names::CACHE_HITS_TOTAL, "prefix" => prefix.to_string()).increment(1);
}

pub fn record_cache_miss(prefix: &str) {
    counter!(names::CACHE_MISSES_TOTAL, "prefix" => prefix.to_string()).increment(1);
}

/// Record a key rejected by the membership guard.
pub fn record_guard_rejection(prefix: &str) {
    counter!(names::CACHE_GUARD_REJECTIONS_TOTAL, "prefix" => prefix.to_string()).increment(1);
}

/// Record one execution of a fallback loader.
pub fn record_fallback_load(prefix: &str) {
    counter!(names::CACHE_FALLBACK_LOADS_TOTAL, "prefix" => prefix.to_string()).increment(1);
}

/// Record a caller that joined a load started by another caller.
pub fn record_coalesced_wait(prefix: &str) {
    counter!(names::CACHE_COALESCED_WAITS_TOTAL, "prefix" => prefix.to_string()).increment(1);
}

pub fn record_error(prefix: &str, kind: ErrorKind) {
    counter!(
        names::CACHE_ERRORS_TOTAL,
        "prefix" => prefix.to_string(),
        "kind" => kind.as_str()
    )
    .increment(1);
}
