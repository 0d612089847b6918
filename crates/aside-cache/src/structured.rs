//! Cache for structured values, stored as JSON.
//!
//! Storage, guard admission, coalescing and jitter are all delegated to an
//! inner [`ScalarCache<String>`]; this layer only adds the serde boundary. The
//! inner cache shares the guard and the prefix, so both address the same
//! physical keys.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::FutureExt;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cacher::{Cacher, Fallback, FallbackArgs};
use crate::config::CacheSettings;
use crate::context::CallContext;
use crate::error::CacheResult;
use crate::guard::MembershipGuard;
use crate::scalar::ScalarCache;
use crate::store::DynStore;

/// Cache-aside layer for any serde-serializable value.
pub struct StructuredCache<T> {
    fallback: Fallback<T>,
    raw: ScalarCache<String>,
}

impl<T> Clone for StructuredCache<T> {
    fn clone(&self) -> Self {
        Self {
            fallback: Arc::clone(&self.fallback),
            raw: self.raw.clone(),
        }
    }
}

impl<T> StructuredCache<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create a cache over `store`, namespaced by `prefix`.
    ///
    /// The fallback's result is serialized before it is written back; a value
    /// that fails to serialize is reported as a Serialization error.
    pub fn new(
        store: DynStore,
        ttl: Duration,
        prefix: impl Into<String>,
        fallback: Fallback<T>,
        guard: MembershipGuard,
    ) -> Self {
        let encoded = encode_fallback(&fallback);
        Self {
            fallback,
            raw: ScalarCache::new(store, ttl, prefix, encoded, guard),
        }
    }

    /// Create a cache from the `[cache]` configuration section.
    ///
    /// See [`ScalarCache::from_settings`].
    pub fn from_settings(
        store: DynStore,
        settings: &CacheSettings,
        fallback: Fallback<T>,
        guard: MembershipGuard,
    ) -> Self {
        let encoded = encode_fallback(&fallback);
        Self {
            fallback,
            raw: ScalarCache::from_settings(store, settings, encoded, guard),
        }
    }

    /// The inner cache holding the serialized payloads.
    pub fn raw(&self) -> &ScalarCache<String> {
        &self.raw
    }
}

fn encode_fallback<T>(fallback: &Fallback<T>) -> Fallback<String>
where
    T: Serialize + Send + 'static,
{
    let typed = Arc::clone(fallback);
    Arc::new(move |ctx, args| {
        let typed = Arc::clone(&typed);
        async move {
            let value = typed(ctx, args).await?;
            Ok(serde_json::to_string(&value)?)
        }
        .boxed()
    })
}

#[async_trait]
impl<T> Cacher<T> for StructuredCache<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn put(&self, ctx: &CallContext, key: &str, value: T) -> CacheResult<()> {
        let payload = serde_json::to_string(&value)?;
        self.raw.put(ctx, key, payload).await
    }

    async fn get(&self, ctx: &CallContext, key: &str, args: FallbackArgs) -> CacheResult<T> {
        let payload = self.raw.get(ctx, key, args).await?;
        Ok(serde_json::from_str(&payload)?)
    }

    async fn renew(&self, ctx: &CallContext, key: &str, ttl: Duration) -> CacheResult<()> {
        self.raw.renew(ctx, key, ttl).await
    }

    async fn invalidate(&self, ctx: &CallContext, key: &str) -> CacheResult<T> {
        let payload = self.raw.invalidate(ctx, key).await?;
        Ok(serde_json::from_str(&payload)?)
    }

    fn fallback(&self) -> &Fallback<T> {
        &self.fallback
    }

    fn ttl(&self) -> Duration {
        self.raw.ttl()
    }

    fn prefix(&self) -> &str {
        self.raw.prefix()
    }

    fn guard(&self) -> &MembershipGuard {
        self.raw.guard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cacher::fallback_fn;
    use crate::error::{CacheError, ErrorKind};
    use crate::jitter::MAX_JITTER_SECS;
    use crate::store::{KvStore, MemoryStore};
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        id: u64,
        name: String,
        tags: Vec<String>,
    }

    fn profiles(store: &MemoryStore, guard: &MembershipGuard) -> StructuredCache<Profile> {
        StructuredCache::new(
            Arc::new(store.clone()),
            Duration::from_secs(60),
            "profile:",
            fallback_fn(|_ctx, args| async move {
                let id = args
                    .first()
                    .and_then(|v| v.as_u64())
                    .ok_or_else(|| CacheError::upstream("missing id"))?;
                Ok(Profile {
                    id,
                    name: format!("user-{id}"),
                    tags: vec!["loaded".into()],
                })
            }),
            guard.clone(),
        )
    }

    #[tokio::test]
    async fn test_round_trip_preserves_fields() {
        let store = MemoryStore::new();
        let guard = MembershipGuard::in_memory("t");
        let cache = profiles(&store, &guard);
        let ctx = CallContext::background();
        let profile = Profile {
            id: 9,
            name: "Ada".into(),
            tags: vec!["admin".into(), "ops".into()],
        };

        cache.put(&ctx, "9", profile.clone()).await.unwrap();
        assert_eq!(cache.get(&ctx, "9", vec![]).await.unwrap(), profile);
        assert_eq!(cache.invalidate(&ctx, "9").await.unwrap(), profile);
    }

    #[tokio::test]
    async fn test_fallback_receives_positional_args() {
        let store = MemoryStore::new();
        let guard = MembershipGuard::in_memory("t");
        let cache = profiles(&store, &guard);
        let ctx = CallContext::background();
        guard.add(&ctx, "profile:3").await.unwrap();

        let loaded = cache
            .get(&ctx, "3", vec![serde_json::json!(3)])
            .await
            .unwrap();
        assert_eq!(loaded.name, "user-3");

        let stored = store.get("profile:3").await.unwrap().unwrap();
        assert_eq!(serde_json::from_str::<Profile>(&stored).unwrap(), loaded);
    }

    #[tokio::test]
    async fn test_fallback_error_passes_through() {
        let store = MemoryStore::new();
        let guard = MembershipGuard::in_memory("t");
        let cache = profiles(&store, &guard);
        let ctx = CallContext::background();
        guard.add(&ctx, "profile:3").await.unwrap();

        let err = cache.get(&ctx, "3", vec![]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert_eq!(err.message(), "missing id");
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_serialization_error() {
        let store = MemoryStore::new();
        let guard = MembershipGuard::in_memory("t");
        let cache = profiles(&store, &guard);
        let ctx = CallContext::background();

        guard.add(&ctx, "profile:1").await.unwrap();
        store
            .set_ex("profile:1", "{not json", Duration::from_secs(60))
            .await
            .unwrap();

        let err = cache.get(&ctx, "1", vec![]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }

    #[tokio::test]
    async fn test_unserializable_value_is_serialization_error() {
        // JSON object keys must be strings
        let cache: StructuredCache<BTreeMap<Vec<u8>, u8>> = StructuredCache::new(
            Arc::new(MemoryStore::new()),
            Duration::from_secs(60),
            "m:",
            fallback_fn(|_ctx, _args| async { Ok(BTreeMap::new()) }),
            MembershipGuard::in_memory("t"),
        );
        let value = BTreeMap::from([(vec![1u8], 1u8)]);
        let err = cache
            .put(&CallContext::background(), "k", value)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }

    #[tokio::test]
    async fn test_from_settings_namespaces_payloads() {
        let store = MemoryStore::new();
        let settings = CacheSettings {
            default_ttl_secs: 120,
            key_prefix: "acct:".into(),
            operation_timeout_ms: 500,
        };
        let cache: StructuredCache<Profile> = StructuredCache::from_settings(
            Arc::new(store.clone()),
            &settings,
            fallback_fn(|_ctx, _args| async { Err(CacheError::upstream("unused")) }),
            MembershipGuard::in_memory("t"),
        );
        let ctx = CallContext::background();
        let profile = Profile {
            id: 5,
            name: "Lin".into(),
            tags: vec![],
        };

        cache.put(&ctx, "5", profile.clone()).await.unwrap();
        assert!(store.ttl_of("acct:5").unwrap() <= Duration::from_secs(120 + MAX_JITTER_SECS));
        assert_eq!(cache.get(&ctx, "5", vec![]).await.unwrap(), profile);
        assert_eq!(cache.raw().load_timeout(), Some(Duration::from_millis(500)));
    }

    #[tokio::test]
    async fn test_shares_prefix_and_guard_with_inner_cache() {
        let store = MemoryStore::new();
        let guard = MembershipGuard::in_memory("shared");
        let cache = profiles(&store, &guard);

        assert_eq!(cache.prefix(), cache.raw().prefix());
        assert_eq!(cache.guard().name(), "shared");
        assert_eq!(cache.ttl(), cache.raw().ttl());
        assert!(cache.ttl() < Duration::from_secs(60 + MAX_JITTER_SECS));
    }
}
