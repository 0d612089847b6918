//! The typed cache contract shared by scalar and structured caches.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};

use crate::context::CallContext;
use crate::error::CacheResult;
use crate::guard::MembershipGuard;

/// Positional arguments forwarded from `get` to the fallback.
pub type FallbackArgs = Vec<serde_json::Value>;

/// Loader invoked on a cache miss to fetch the authoritative value.
///
/// Its errors reach the caller unchanged. The context it receives belongs to
/// the coalesced load, not to any single caller.
pub type Fallback<T> =
    Arc<dyn Fn(CallContext, FallbackArgs) -> BoxFuture<'static, CacheResult<T>> + Send + Sync>;

/// Build a [`Fallback`] from an async closure.
///
/// ```
/// use aside_cache::{fallback_fn, CacheError, Fallback};
///
/// let load: Fallback<i64> = fallback_fn(|_ctx, args| async move {
///     args.first()
///         .and_then(|v| v.as_i64())
///         .ok_or_else(|| CacheError::upstream("missing id argument"))
/// });
/// ```
pub fn fallback_fn<T, F, Fut>(f: F) -> Fallback<T>
where
    F: Fn(CallContext, FallbackArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CacheResult<T>> + Send + 'static,
{
    Arc::new(move |ctx, args| f(ctx, args).boxed())
}

/// Cache-aside operations over one key namespace.
///
/// Physical store keys are `prefix ++ key`; caches with different prefixes
/// never collide on a shared store.
#[async_trait]
pub trait Cacher<T>: Send + Sync
where
    T: Send + 'static,
{
    /// Admit `key` to the guard and store `value` with the cache TTL.
    ///
    /// The two steps are not transactional: the key may be admitted while the
    /// store write fails.
    async fn put(&self, ctx: &CallContext, key: &str, value: T) -> CacheResult<()>;

    /// Read `key`, loading it through the fallback on a store miss.
    ///
    /// Keys the guard has never seen fail with NotFound without touching the
    /// store or the fallback. Concurrent misses on one key share one fallback
    /// execution, whose result is written back before it is returned.
    async fn get(&self, ctx: &CallContext, key: &str, args: FallbackArgs) -> CacheResult<T>;

    /// Reset the expiry of `key` to `ttl` plus a fresh jitter.
    async fn renew(&self, ctx: &CallContext, key: &str, ttl: Duration) -> CacheResult<()>;

    /// Remove `key` from the store and return its last value.
    ///
    /// The key stays admitted in the guard.
    async fn invalidate(&self, ctx: &CallContext, key: &str) -> CacheResult<T>;

    fn fallback(&self) -> &Fallback<T>;

    /// Effective TTL used by `put`, construction-time jitter included.
    fn ttl(&self) -> Duration;

    fn prefix(&self) -> &str;

    fn guard(&self) -> &MembershipGuard;

    /// Physical store key for a logical key.
    fn physical_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix(), key)
    }
}
