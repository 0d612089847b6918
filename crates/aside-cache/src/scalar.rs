//! Cache for values the store holds natively.
//!
//! ## Read path
//!
//! ```text
//! get(key) → guard EXISTS ──absent──→ NotFound
//!                 │ present
//!                 ↓
//!             store GET ──hit──→ value
//!                 │ miss
//!                 ↓
//!         coalesced fallback → guard ADD + SET EX → value
//! ```
//!
//! ## Coalesced loads
//!
//! The fallback and its write-back run once per key, detached from whichever
//! caller started them: a caller whose context expires stops waiting, but the
//! load carries on for everyone else. The load is bounded only by the cache's
//! own load timeout, set from [`CacheSettings`] by
//! [`ScalarCache::from_settings`].
//!
//! ## TTL jitter
//!
//! The TTL handed to the constructor receives one random jitter, fixed for the
//! life of the instance and used by every `put`. `renew` draws a fresh jitter
//! on each call and adds it to the TTL passed by the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::FutureExt;

use crate::cacher::{Cacher, Fallback, FallbackArgs};
use crate::coalesce::Coalescer;
use crate::config::CacheSettings;
use crate::context::CallContext;
use crate::error::{CacheError, CacheResult};
use crate::guard::MembershipGuard;
use crate::jitter::jittered;
use crate::metrics;
use crate::store::DynStore;

/// A value stored as its plain string form.
pub trait Scalar: PartialOrd + Clone + Send + Sync + 'static {
    fn encode(&self) -> String;

    /// `None` if `raw` is not a valid encoding of `Self`.
    fn decode(raw: &str) -> Option<Self>;
}

macro_rules! impl_scalar_via_str {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Scalar for $ty {
                fn encode(&self) -> String {
                    self.to_string()
                }

                fn decode(raw: &str) -> Option<Self> {
                    raw.parse().ok()
                }
            }
        )*
    };
}

impl_scalar_via_str!(
    String, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
);

impl Scalar for bool {
    fn encode(&self) -> String {
        let raw = if *self { "1" } else { "0" };
        raw.to_string()
    }

    fn decode(raw: &str) -> Option<Self> {
        match raw {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        }
    }
}

struct ScalarInner<T> {
    prefix: String,
    store: DynStore,
    ttl: Duration,
    fallback: Fallback<T>,
    guard: MembershipGuard,
    load_timeout: Option<Duration>,
    flights: Coalescer<T>,
}

/// Cache-aside layer for [`Scalar`] values.
///
/// Cheap to clone; clones share the store, guard and in-flight loads.
pub struct ScalarCache<T> {
    inner: Arc<ScalarInner<T>>,
}

impl<T> Clone for ScalarCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Scalar> ScalarCache<T> {
    /// Create a cache over `store`, namespaced by `prefix`.
    ///
    /// `ttl` receives a random jitter of up to five seconds once, here.
    /// Coalesced loads are not time-bounded.
    pub fn new(
        store: DynStore,
        ttl: Duration,
        prefix: impl Into<String>,
        fallback: Fallback<T>,
        guard: MembershipGuard,
    ) -> Self {
        Self::build(store, ttl, prefix.into(), fallback, guard, None)
    }

    /// Create a cache from configuration: `key_prefix` and `default_ttl_secs`
    /// name and age the entries, `operation_timeout_ms` bounds each coalesced
    /// load.
    pub fn from_settings(
        store: DynStore,
        settings: &CacheSettings,
        fallback: Fallback<T>,
        guard: MembershipGuard,
    ) -> Self {
        Self::build(
            store,
            settings.default_ttl(),
            settings.key_prefix.clone(),
            fallback,
            guard,
            Some(settings.operation_timeout()),
        )
    }

    fn build(
        store: DynStore,
        ttl: Duration,
        prefix: String,
        fallback: Fallback<T>,
        guard: MembershipGuard,
        load_timeout: Option<Duration>,
    ) -> Self {
        Self {
            inner: Arc::new(ScalarInner {
                prefix,
                store,
                ttl: jittered(ttl),
                fallback,
                guard,
                load_timeout,
                flights: Coalescer::new(),
            }),
        }
    }

    /// Upper bound on a coalesced fallback load, if any.
    pub fn load_timeout(&self) -> Option<Duration> {
        self.inner.load_timeout
    }

    /// Number of keys with a fallback load in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.flights.in_flight()
    }

    async fn lookup(&self, ctx: &CallContext, key: &str, args: FallbackArgs) -> CacheResult<T> {
        let inner = &self.inner;
        let physical = inner.physical_key(key);

        if !inner.guard.exists(ctx, &physical).await? {
            tracing::debug!(key = %physical, "rejected by membership guard");
            metrics::record_guard_rejection(&inner.prefix);
            return Err(CacheError::not_found(physical));
        }

        if let Some(raw) = ctx.run("cache GET", inner.store.get(&physical)).await? {
            tracing::debug!(key = %physical, "cache hit");
            metrics::record_cache_hit(&inner.prefix);
            return decode(&physical, &raw);
        }

        tracing::debug!(key = %physical, "cache miss");
        metrics::record_cache_miss(&inner.prefix);

        let loader = Arc::clone(inner);
        let owned_key = key.to_string();
        let (result, leader) = inner
            .flights
            .run(ctx, key, move || {
                async move {
                    let load_ctx = loader.load_context();
                    loader.load(&load_ctx, &owned_key, args).await
                }
                .boxed()
            })
            .await;
        if !leader {
            metrics::record_coalesced_wait(&inner.prefix);
        }
        result
    }
}

impl<T: Scalar> ScalarInner<T> {
    fn physical_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Context for a coalesced load. Independent of every caller's deadline
    /// and cancellation.
    fn load_context(&self) -> CallContext {
        match self.load_timeout {
            Some(timeout) => CallContext::with_timeout(timeout),
            None => CallContext::background(),
        }
    }

    async fn write(&self, ctx: &CallContext, key: &str, value: &T) -> CacheResult<()> {
        let physical = self.physical_key(key);
        self.guard
            .add(ctx, &physical)
            .await
            .map_err(|e| e.into_store_failure(format!("failed to admit {physical}")))?;
        ctx.run(
            "cache SET",
            self.store.set_ex(&physical, &value.encode(), self.ttl),
        )
        .await
    }

    /// Run the fallback and write its value back. Executed once per flight.
    async fn load(&self, ctx: &CallContext, key: &str, args: FallbackArgs) -> CacheResult<T> {
        metrics::record_fallback_load(&self.prefix);
        let value = ctx
            .run("fallback load", (self.fallback)(ctx.clone(), args))
            .await?;
        if let Err(e) = self.write(ctx, key, &value).await {
            tracing::warn!(key = %key, prefix = %self.prefix, error = %e, "write-back after fallback failed");
            return Err(e);
        }
        Ok(value)
    }
}

fn decode<T: Scalar>(physical: &str, raw: &str) -> CacheResult<T> {
    T::decode(raw).ok_or_else(|| {
        CacheError::store(format!(
            "value under {physical} is not a valid {}",
            std::any::type_name::<T>()
        ))
    })
}

fn observe<T>(prefix: &str, result: CacheResult<T>) -> CacheResult<T> {
    if let Err(e) = &result {
        metrics::record_error(prefix, e.kind());
    }
    result
}

#[async_trait]
impl<T: Scalar> Cacher<T> for ScalarCache<T> {
    async fn put(&self, ctx: &CallContext, key: &str, value: T) -> CacheResult<()> {
        observe(&self.inner.prefix, self.inner.write(ctx, key, &value).await)
    }

    async fn get(&self, ctx: &CallContext, key: &str, args: FallbackArgs) -> CacheResult<T> {
        observe(&self.inner.prefix, self.lookup(ctx, key, args).await)
    }

    async fn renew(&self, ctx: &CallContext, key: &str, ttl: Duration) -> CacheResult<()> {
        let physical = self.inner.physical_key(key);
        let renewed = ctx
            .run("cache EXPIRE", self.inner.store.expire(&physical, jittered(ttl)))
            .await;
        let result = match renewed {
            Ok(true) => Ok(()),
            Ok(false) => Err(CacheError::not_found(physical)),
            Err(e) => Err(e),
        };
        observe(&self.inner.prefix, result)
    }

    async fn invalidate(&self, ctx: &CallContext, key: &str) -> CacheResult<T> {
        let physical = self.inner.physical_key(key);
        let removed = ctx
            .run("cache GETDEL", self.inner.store.get_del(&physical))
            .await;
        let result = match removed {
            Ok(Some(raw)) => decode(&physical, &raw),
            Ok(None) => Err(CacheError::not_found(physical)),
            Err(e) => Err(e),
        };
        observe(&self.inner.prefix, result)
    }

    fn fallback(&self) -> &Fallback<T> {
        &self.inner.fallback
    }

    fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    fn prefix(&self) -> &str {
        &self.inner.prefix
    }

    fn guard(&self) -> &MembershipGuard {
        &self.inner.guard
    }
}
