//! Backing key-value store.
//!
//! The cache only needs four commands from its store: `SET key value EX ttl`,
//! `GET`, `GETDEL` and `EXPIRE`. A miss is reported as `Ok(None)` (or
//! `Ok(false)` for `EXPIRE`); the cache maps it to a NotFound error.
//!
//! ## Implementations
//!
//! - [`RedisStore`]: shared store reached through a `deadpool-redis` pool
//! - [`MemoryStore`]: per-process `DashMap`, for single-instance use and tests

mod memory;
pub(crate) mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheResult;

pub use self::memory::{MemoryStore, StoreStats};
pub use self::redis::{RedisStore, connect_redis};

/// Key-value store holding serialized cache entries.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Write `value` under `key`, expiring after `ttl`.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Read `key`; `None` on a miss.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Atomically read and remove `key`; `None` on a miss.
    async fn get_del(&self, key: &str) -> CacheResult<Option<String>>;

    /// Reset the expiry of `key`; `false` if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool>;
}

/// Shared handle to a store.
pub type DynStore = Arc<dyn KvStore>;
