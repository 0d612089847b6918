//! In-process membership filter.

use async_trait::async_trait;
use dashmap::DashSet;

use super::MembershipFilter;
use crate::error::CacheResult;

/// Exact set of admitted keys. Never reports a false positive, which still
/// satisfies the filter contract.
#[derive(Debug, Default)]
pub struct MemoryFilter {
    keys: DashSet<String>,
}

impl MemoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[async_trait]
impl MembershipFilter for MemoryFilter {
    async fn reserve(&self, _error_rate: f64, _capacity: u64) -> CacheResult<()> {
        Ok(())
    }

    async fn add(&self, key: &str) -> CacheResult<()> {
        self.keys.insert(key.to_string());
        Ok(())
    }

    async fn add_many(&self, keys: &[String]) -> CacheResult<()> {
        for key in keys {
            self.keys.insert(key.clone());
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.keys.contains(key))
    }
}
