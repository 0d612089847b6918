//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use aside_cache::{CacheError, Fallback, fallback_fn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct User {
    #[serde(rename = "ID")]
    pub id: u64,
    pub name: String,
}

pub fn tester() -> User {
    User {
        id: 1,
        name: "Tester".into(),
    }
}

/// Counts fallback invocations.
#[derive(Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn calls(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Fallback that returns `value` after `delay`, counting calls.
pub fn counting<T>(counter: &CallCounter, value: T, delay: Duration) -> Fallback<T>
where
    T: Clone + Send + Sync + 'static,
{
    let counter = counter.clone();
    fallback_fn(move |_ctx, _args| {
        let counter = counter.clone();
        let value = value.clone();
        async move {
            counter.hit();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(value)
        }
    })
}

/// Fallback that fails with an upstream error after `delay`, counting calls.
pub fn failing<T: Send + 'static>(
    counter: &CallCounter,
    message: &'static str,
    delay: Duration,
) -> Fallback<T> {
    let counter = counter.clone();
    fallback_fn(move |_ctx, _args| {
        let counter = counter.clone();
        async move {
            counter.hit();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Err(CacheError::upstream(message))
        }
    })
}
