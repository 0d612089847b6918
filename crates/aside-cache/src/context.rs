//! Per-operation deadline and cancellation.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::CacheSettings;
use crate::error::{CacheError, CacheResult};

/// Deadline and cancellation handle passed to every cache operation.
///
/// Cloning is cheap; clones share the same cancellation token. Expiry or
/// cancellation while an operation is suspended surfaces as a Timeout error.
#[derive(Debug, Clone)]
pub struct CallContext {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl Default for CallContext {
    fn default() -> Self {
        Self::background()
    }
}

impl CallContext {
    /// A context that never expires unless cancelled.
    pub fn background() -> Self {
        Self {
            deadline: None,
            token: CancellationToken::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            token: CancellationToken::new(),
        }
    }

    /// Context bounded by the configured per-operation timeout.
    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::with_timeout(settings.operation_timeout())
    }

    /// Derive a child that expires at the earlier of the parent's deadline and
    /// `now + timeout`. Cancelling the parent cancels the child, not vice versa.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) if parent < candidate => parent,
            _ => candidate,
        };
        Self {
            deadline: Some(deadline),
            token: self.token.child_token(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context and every child derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once the context is cancelled or its deadline has passed.
    pub fn is_done(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves when the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {}
                    _ = self.token.cancelled() => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Race `fut` against this context.
    ///
    /// An already-finished context returns Timeout without polling `fut`.
    pub async fn run<T, F>(&self, operation: &str, fut: F) -> CacheResult<T>
    where
        F: Future<Output = CacheResult<T>>,
    {
        if self.is_done() {
            return Err(CacheError::timeout(operation));
        }
        tokio::select! {
            biased;
            _ = self.done() => Err(CacheError::timeout(operation)),
            result = fut => result,
        }
    }
}
