//! Membership guard against cache penetration.
//!
//! The guard answers "could this key exist?" with no false negatives. Keys
//! that were never admitted are rejected before the store or the fallback is
//! touched. Membership is monotonic: nothing is ever removed, so a key stays
//! admitted after its cache entry is invalidated or expires.
//!
//! ## Implementations
//!
//! - [`RedisBloomFilter`]: RedisBloom `BF.*` commands on a shared instance
//! - [`MemoryFilter`]: exact per-process set, for single-instance use and tests

mod memory;
mod redis;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::FilterSettings;
use crate::context::CallContext;
use crate::error::CacheResult;
use crate::future::CacheFuture;

pub use self::memory::MemoryFilter;
pub use self::redis::RedisBloomFilter;

/// Probabilistic set engine behind a [`MembershipGuard`].
#[async_trait]
pub trait MembershipFilter: Send + Sync {
    /// Create the filter sized for `capacity` keys at `error_rate`.
    /// Reserving an existing filter succeeds without changing it.
    async fn reserve(&self, error_rate: f64, capacity: u64) -> CacheResult<()>;

    async fn add(&self, key: &str) -> CacheResult<()>;

    async fn add_many(&self, keys: &[String]) -> CacheResult<()>;

    /// `false` only if `key` was never added.
    async fn exists(&self, key: &str) -> CacheResult<bool>;
}

/// Shared handle to a filter engine.
pub type DynFilter = Arc<dyn MembershipFilter>;

/// Cache-facing handle to a membership filter.
///
/// Cheap to clone; clones share the same filter. Every call is bounded by the
/// caller's [`CallContext`].
#[derive(Clone)]
pub struct MembershipGuard {
    name: Arc<str>,
    error_rate: f64,
    capacity: u64,
    filter: DynFilter,
}

impl std::fmt::Debug for MembershipGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipGuard")
            .field("name", &self.name)
            .field("error_rate", &self.error_rate)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl MembershipGuard {
    pub fn new(name: impl Into<Arc<str>>, filter: DynFilter) -> Self {
        let defaults = FilterSettings::default();
        Self {
            name: name.into(),
            error_rate: defaults.error_rate,
            capacity: defaults.capacity,
            filter,
        }
    }

    /// Guard sized from configuration.
    pub fn from_settings(filter: DynFilter, settings: &FilterSettings) -> Self {
        Self {
            name: settings.name.as_str().into(),
            error_rate: settings.error_rate,
            capacity: settings.capacity,
            filter,
        }
    }

    /// Guard over a RedisBloom filter stored under `settings.name`.
    pub fn redis(pool: deadpool_redis::Pool, settings: &FilterSettings) -> Self {
        let filter = Arc::new(RedisBloomFilter::new(settings.name.clone(), pool));
        Self::from_settings(filter, settings)
    }

    /// Guard over a fresh in-process set.
    pub fn in_memory(name: impl Into<Arc<str>>) -> Self {
        Self::new(name, Arc::new(MemoryFilter::new()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn error_rate(&self) -> f64 {
        self.error_rate
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Reserve the underlying filter with the configured rate and capacity.
    pub async fn reserve(&self, ctx: &CallContext) -> CacheResult<()> {
        ctx.run(
            "membership reserve",
            self.filter.reserve(self.error_rate, self.capacity),
        )
        .await?;
        tracing::info!(
            filter = %self.name,
            error_rate = self.error_rate,
            capacity = self.capacity,
            "membership filter reserved"
        );
        Ok(())
    }

    pub async fn add(&self, ctx: &CallContext, key: &str) -> CacheResult<()> {
        ctx.run("membership add", self.filter.add(key)).await
    }

    pub async fn add_many(&self, ctx: &CallContext, keys: &[String]) -> CacheResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        ctx.run("membership add_many", self.filter.add_many(keys))
            .await
    }

    pub async fn exists(&self, ctx: &CallContext, key: &str) -> CacheResult<bool> {
        ctx.run("membership exists", self.filter.exists(key)).await
    }

    /// Admit `key` in the background.
    ///
    /// For population that is a side effect of serving a response rather than
    /// a precondition for it; the returned handle reports the outcome.
    pub fn add_detached(&self, ctx: &CallContext, key: impl Into<String>) -> CacheFuture<()> {
        let guard = self.clone();
        let ctx = ctx.clone();
        let key = key.into();
        CacheFuture::spawn(async move {
            let result = guard.add(&ctx, &key).await;
            if let Err(e) = &result {
                tracing::warn!(filter = %guard.name, key = %key, error = %e, "background membership add failed");
            }
            result
        })
    }

    /// Admit many keys in the background.
    pub fn add_many_detached(&self, ctx: &CallContext, keys: Vec<String>) -> CacheFuture<()> {
        let guard = self.clone();
        let ctx = ctx.clone();
        CacheFuture::spawn(async move {
            let result = guard.add_many(&ctx, &keys).await;
            if let Err(e) = &result {
                tracing::warn!(filter = %guard.name, count = keys.len(), error = %e, "background membership add failed");
            }
            result
        })
    }
}
