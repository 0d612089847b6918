//! Single-shot handles for cache work running in the background.
//!
//! A [`CacheFuture`] is fed by exactly one producer through a `tokio` oneshot
//! channel. The channel buffers the one result, so the producer never waits
//! for the reader; if the reader gives up (deadline, cancellation, drop) the
//! result is discarded.

use std::future::Future;

use tokio::sync::oneshot;

use crate::context::CallContext;
use crate::error::{CacheError, CacheResult};

/// Receiving half: the outcome of one background cache operation.
///
/// Reading consumes the handle, so an outcome is observed at most once.
#[must_use = "a CacheFuture does nothing unless its outcome is read"]
#[derive(Debug)]
pub struct CacheFuture<T> {
    rx: oneshot::Receiver<CacheResult<T>>,
}

/// Sending half, resolved exactly once by the producer.
#[derive(Debug)]
pub struct Resolver<T> {
    tx: oneshot::Sender<CacheResult<T>>,
}

impl<T> Resolver<T> {
    /// Deliver the outcome. Returns `false` if the reader already went away.
    pub fn resolve(self, result: CacheResult<T>) -> bool {
        self.tx.send(result).is_ok()
    }
}

impl<T> CacheFuture<T> {
    /// Create an unresolved future and its resolver.
    pub fn pending() -> (Resolver<T>, Self) {
        let (tx, rx) = oneshot::channel();
        (Resolver { tx }, Self { rx })
    }

    /// A future that is already resolved with `result`.
    pub fn ready(result: CacheResult<T>) -> Self {
        let (resolver, future) = Self::pending();
        resolver.resolve(result);
        future
    }

    /// Wait for the outcome, bounded by `ctx`.
    ///
    /// A finished `ctx` yields Timeout immediately, even if the outcome is
    /// already buffered.
    pub async fn value(self, ctx: &CallContext) -> CacheResult<T> {
        let rx = self.rx;
        ctx.run("waiting for cache result", async move {
            rx.await.map_err(|_| {
                CacheError::store("background cache task ended without a result")
            })?
        })
        .await
    }
}

impl<T: Send + 'static> CacheFuture<T> {
    /// Run `work` as a detached task and return the handle to its outcome.
    pub fn spawn<F>(work: F) -> Self
    where
        F: Future<Output = CacheResult<T>> + Send + 'static,
    {
        let (resolver, future) = Self::pending();
        tokio::spawn(async move {
            if !resolver.resolve(work.await) {
                tracing::trace!("cache result discarded, reader gone");
            }
        });
        future
    }
}

impl CacheFuture<()> {
    /// Wait for an operation that has no success payload.
    pub async fn err(self, ctx: &CallContext) -> CacheResult<()> {
        self.value(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::time::Duration;

    #[tokio::test]
    async fn test_spawned_value_is_delivered() {
        let fut = CacheFuture::spawn(async { Ok::<_, CacheError>(42u32) });
        assert_eq!(fut.value(&CallContext::background()).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_spawned_error_is_delivered() {
        let fut: CacheFuture<u32> =
            CacheFuture::spawn(async { Err(CacheError::not_found("k")) });
        let err = fut.value(&CallContext::background()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_expired_context_returns_timeout_without_blocking() {
        let (_resolver, fut) = CacheFuture::<u32>::pending();
        let ctx = CallContext::with_timeout(Duration::ZERO);
        let err = fut.value(&ctx).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_discards_late_result() {
        let (resolver, fut) = CacheFuture::<u32>::pending();
        let ctx = CallContext::with_timeout(Duration::from_millis(10));
        assert!(fut.value(&ctx).await.unwrap_err().is_timeout());
        // Producer never blocks; the late value is simply dropped.
        assert!(!resolver.resolve(Ok(1)));
    }

    #[tokio::test]
    async fn test_producer_never_blocks_without_reader() {
        let (resolver, fut) = CacheFuture::<()>::pending();
        assert!(resolver.resolve(Ok(())));
        assert!(fut.err(&CallContext::background()).await.is_ok());
    }

    #[tokio::test]
    async fn test_dropped_resolver_is_an_error() {
        let (resolver, fut) = CacheFuture::<u32>::pending();
        drop(resolver);
        let err = fut.value(&CallContext::background()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Store);
    }

    #[tokio::test]
    async fn test_ready_future() {
        let fut = CacheFuture::ready(Ok("hit".to_string()));
        assert_eq!(fut.value(&CallContext::background()).await.unwrap(), "hit");
    }
}
