//! RedisBloom-backed membership filter.

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool};

use super::MembershipFilter;
use crate::error::{CacheError, CacheResult};
use crate::store::redis::{pool_error, redis_error};

/// Bloom filter stored in Redis under `name`, driven by RedisBloom commands.
#[derive(Clone)]
pub struct RedisBloomFilter {
    name: String,
    pool: Pool,
}

impl RedisBloomFilter {
    pub fn new(name: impl Into<String>, pool: Pool) -> Self {
        Self {
            name: name.into(),
            pool,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn conn(&self) -> CacheResult<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| pool_error(e, CacheError::filter))
    }
}

#[async_trait]
impl MembershipFilter for RedisBloomFilter {
    async fn reserve(&self, error_rate: f64, capacity: u64) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let reply: redis::RedisResult<()> = redis::cmd("BF.RESERVE")
            .arg(&self.name)
            .arg(error_rate)
            .arg(capacity)
            .query_async(&mut conn)
            .await;
        match reply {
            Ok(()) => Ok(()),
            // Already reserved by an earlier process
            Err(e) if e.to_string().contains("item exists") => {
                tracing::debug!(filter = %self.name, "bloom filter already reserved");
                Ok(())
            }
            Err(e) => Err(redis_error(e, "BF.RESERVE", CacheError::filter)),
        }
    }

    async fn add(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let _newly_added: bool = redis::cmd("BF.ADD")
            .arg(&self.name)
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error(e, "BF.ADD", CacheError::filter))?;
        Ok(())
    }

    async fn add_many(&self, keys: &[String]) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let _newly_added: Vec<bool> = redis::cmd("BF.MADD")
            .arg(&self.name)
            .arg(keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error(e, "BF.MADD", CacheError::filter))?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        redis::cmd("BF.EXISTS")
            .arg(&self.name)
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error(e, "BF.EXISTS", CacheError::filter))
    }
}
