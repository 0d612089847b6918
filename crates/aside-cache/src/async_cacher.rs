//! Non-blocking decorator over any [`Cacher`].
//!
//! Each `*_async` call spawns one task running the wrapped operation and
//! returns a [`CacheFuture`] for its outcome. The task runs to completion
//! whether or not the outcome is ever read.

use std::sync::Arc;
use std::time::Duration;

use crate::cacher::{Cacher, FallbackArgs};
use crate::context::CallContext;
use crate::future::CacheFuture;

pub struct AsyncCacher<T> {
    base: Arc<dyn Cacher<T>>,
}

impl<T> Clone for AsyncCacher<T> {
    fn clone(&self) -> Self {
        Self {
            base: Arc::clone(&self.base),
        }
    }
}

impl<T: Send + 'static> AsyncCacher<T> {
    pub fn new(base: Arc<dyn Cacher<T>>) -> Self {
        Self { base }
    }

    /// The wrapped cacher.
    pub fn base(&self) -> &Arc<dyn Cacher<T>> {
        &self.base
    }

    pub fn put_async(
        &self,
        ctx: &CallContext,
        key: impl Into<String>,
        value: T,
    ) -> CacheFuture<()> {
        let base = Arc::clone(&self.base);
        let ctx = ctx.clone();
        let key = key.into();
        CacheFuture::spawn(async move { base.put(&ctx, &key, value).await })
    }

    pub fn get_async(
        &self,
        ctx: &CallContext,
        key: impl Into<String>,
        args: FallbackArgs,
    ) -> CacheFuture<T> {
        let base = Arc::clone(&self.base);
        let ctx = ctx.clone();
        let key = key.into();
        CacheFuture::spawn(async move { base.get(&ctx, &key, args).await })
    }

    pub fn renew_async(
        &self,
        ctx: &CallContext,
        key: impl Into<String>,
        ttl: Duration,
    ) -> CacheFuture<()> {
        let base = Arc::clone(&self.base);
        let ctx = ctx.clone();
        let key = key.into();
        CacheFuture::spawn(async move { base.renew(&ctx, &key, ttl).await })
    }

    pub fn invalidate_async(&self, ctx: &CallContext, key: impl Into<String>) -> CacheFuture<T> {
        let base = Arc::clone(&self.base);
        let ctx = ctx.clone();
        let key = key.into();
        CacheFuture::spawn(async move { base.invalidate(&ctx, &key).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cacher::fallback_fn;
    use crate::guard::MembershipGuard;
    use crate::scalar::ScalarCache;
    use crate::store::MemoryStore;

    fn counter_cache() -> AsyncCacher<u64> {
        let cache = ScalarCache::new(
            Arc::new(MemoryStore::new()),
            Duration::from_secs(30),
            "count:",
            fallback_fn(|_ctx, _args| async { Ok(100u64) }),
            MembershipGuard::in_memory("t"),
        );
        AsyncCacher::new(Arc::new(cache))
    }

    #[tokio::test]
    async fn test_async_operations_resolve() {
        let cacher = counter_cache();
        let ctx = CallContext::background();

        cacher.put_async(&ctx, "a", 7).err(&ctx).await.unwrap();
        assert_eq!(cacher.get_async(&ctx, "a", vec![]).value(&ctx).await.unwrap(), 7);
        cacher
            .renew_async(&ctx, "a", Duration::from_secs(60))
            .err(&ctx)
            .await
            .unwrap();
        assert_eq!(cacher.invalidate_async(&ctx, "a").value(&ctx).await.unwrap(), 7);

        // Still admitted, so the next read reloads through the fallback.
        assert_eq!(cacher.get_async(&ctx, "a", vec![]).value(&ctx).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_async_errors_are_delivered() {
        let cacher = counter_cache();
        let ctx = CallContext::background();

        let err = cacher
            .get_async(&ctx, "unknown", vec![])
            .value(&ctx)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = cacher
            .invalidate_async(&ctx, "unknown")
            .value(&ctx)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unread_future_still_runs() {
        let cacher = counter_cache();
        let ctx = CallContext::background();

        drop(cacher.put_async(&ctx, "b", 3));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(cacher.base().get(&ctx, "b", vec![]).await.unwrap(), 3);
    }
}
