//! Redis-backed store.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool, PoolError};
use redis::{AsyncCommands, RedisError};

use super::KvStore;
use crate::config::RedisSettings;
use crate::error::{CacheError, CacheResult};
use crate::jitter::expiry_secs;

/// Store backed by a shared Redis instance.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    async fn conn(&self) -> CacheResult<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| pool_error(e, CacheError::store))
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        conn.set_ex::<_, _, ()>(key, value, expiry_secs(ttl))
            .await
            .map_err(|e| redis_error(e, "SET", CacheError::store))?;
        tracing::debug!(key = %key, ttl_secs = expiry_secs(ttl), "cache set");
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn().await?;
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| redis_error(e, "GET", CacheError::store))
    }

    async fn get_del(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn().await?;
        conn.get_del::<_, Option<String>>(key)
            .await
            .map_err(|e| redis_error(e, "GETDEL", CacheError::store))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        let secs = i64::try_from(expiry_secs(ttl)).unwrap_or(i64::MAX);
        conn.expire::<_, bool>(key, secs)
            .await
            .map_err(|e| redis_error(e, "EXPIRE", CacheError::store))
    }
}

/// Classify a Redis command failure: timeouts keep their kind, everything else
/// is built by `other` (Store or Filter).
pub(crate) fn redis_error(
    err: RedisError,
    command: &str,
    other: fn(String) -> CacheError,
) -> CacheError {
    if err.is_timeout() {
        return CacheError::timeout(format!("redis {command}")).with_cause(err);
    }
    tracing::warn!(command, error = %err, "redis command failed");
    other(format!("redis {command} failed")).with_cause(err)
}

/// Classify a pool checkout failure.
pub(crate) fn pool_error(err: PoolError, other: fn(String) -> CacheError) -> CacheError {
    match err {
        PoolError::Timeout(kind) => {
            CacheError::timeout(format!("redis connection checkout ({kind:?})"))
        }
        PoolError::Backend(e) => redis_error(e, "CONNECT", other),
        e => {
            tracing::warn!(error = %e, "failed to get Redis connection");
            other(format!("redis pool unavailable: {e}"))
        }
    }
}

/// Build a connection pool and verify one connection can be opened.
pub async fn connect_redis(settings: &RedisSettings) -> CacheResult<Pool> {
    tracing::info!(url = %settings.url, "Connecting to Redis");

    let mut redis_config = deadpool_redis::Config::from_url(&settings.url);
    let mut pool_config = deadpool_redis::PoolConfig::new(settings.pool_size);
    pool_config.timeouts.wait = Some(settings.timeout());
    pool_config.timeouts.create = Some(settings.timeout());
    pool_config.timeouts.recycle = Some(settings.timeout());
    redis_config.pool = Some(pool_config);

    let pool = redis_config
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .map_err(|e| CacheError::store(format!("failed to create Redis pool: {e}")))?;

    // Test connection
    pool.get()
        .await
        .map_err(|e| pool_error(e, CacheError::store))?;
    tracing::info!(pool_size = settings.pool_size, "Connected to Redis");
    Ok(pool)
}
