//! Integration tests against a real Redis Stack (Redis + RedisBloom).
//!
//! Tests use testcontainers to spin up one shared container; run with
//! `cargo test -- --ignored` on a machine with Docker.

mod common;

use std::sync::Arc;
use std::time::Duration;

use aside_cache::config::{FilterSettings, RedisSettings};
use aside_cache::{
    CallContext, Cacher, ErrorKind, KvStore, MembershipGuard, RedisStore, ScalarCache,
    StructuredCache, connect_redis,
};
use common::{CallCounter, User, counting, tester};
use deadpool_redis::Pool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::{REDIS_PORT, RedisStack};
use tokio::sync::OnceCell;

static SHARED_REDIS: OnceCell<(ContainerAsync<RedisStack>, String)> = OnceCell::const_new();

async fn redis_url() -> String {
    let (_, url) = SHARED_REDIS
        .get_or_init(|| async {
            let container = RedisStack::default()
                .start()
                .await
                .expect("start redis-stack container");
            let port = container
                .get_host_port_ipv4(REDIS_PORT)
                .await
                .expect("get port");
            (container, format!("redis://127.0.0.1:{port}"))
        })
        .await;
    url.clone()
}

async fn pool() -> Pool {
    let settings = RedisSettings {
        url: redis_url().await,
        pool_size: 4,
        timeout_ms: 5000,
    };
    connect_redis(&settings).await.expect("connect to redis")
}

fn filter_settings(name: &str) -> FilterSettings {
    FilterSettings {
        name: name.to_string(),
        error_rate: 0.05,
        capacity: 1_000_000,
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_store_commands() {
    let store = RedisStore::new(pool().await);

    store
        .set_ex("it:store:a", "1", Duration::from_secs(30))
        .await
        .unwrap();
    assert_eq!(store.get("it:store:a").await.unwrap().as_deref(), Some("1"));
    assert!(store.expire("it:store:a", Duration::from_secs(90)).await.unwrap());
    assert_eq!(
        store.get_del("it:store:a").await.unwrap().as_deref(),
        Some("1")
    );
    assert_eq!(store.get("it:store:a").await.unwrap(), None);
    assert!(!store.expire("it:store:a", Duration::from_secs(5)).await.unwrap());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_bloom_reserve_is_idempotent() {
    let guard = MembershipGuard::redis(pool().await, &filter_settings("it:bloom:reserve"));
    let ctx = CallContext::background();

    guard.reserve(&ctx).await.unwrap();
    guard.reserve(&ctx).await.unwrap();

    guard.add(&ctx, "k1").await.unwrap();
    guard
        .add_many(&ctx, &["k2".to_string(), "k3".to_string()])
        .await
        .unwrap();
    for key in ["k1", "k2", "k3"] {
        assert!(guard.exists(&ctx, key).await.unwrap());
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_user_scenario_over_redis() {
    let pool = pool().await;
    let guard = MembershipGuard::redis(pool.clone(), &filter_settings("it:bloom:users"));
    let ctx = CallContext::background();
    guard.reserve(&ctx).await.unwrap();
    guard.add(&ctx, "test:user_1").await.unwrap();

    let counter = CallCounter::default();
    let cache: StructuredCache<User> = StructuredCache::new(
        Arc::new(RedisStore::new(pool.clone())),
        Duration::from_secs(60),
        "test:",
        counting(&counter, tester(), Duration::ZERO),
        guard,
    );

    assert_eq!(cache.get(&ctx, "user_1", vec![]).await.unwrap(), tester());
    assert_eq!(counter.calls(), 1);
    assert_eq!(cache.get(&ctx, "user_1", vec![]).await.unwrap(), tester());
    assert_eq!(counter.calls(), 1);

    assert_eq!(cache.invalidate(&ctx, "user_1").await.unwrap(), tester());
    let store = RedisStore::new(pool);
    assert_eq!(store.get("test:user_1").await.unwrap(), None);

    let err = cache.get(&ctx, "user_404", vec![]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(counter.calls(), 1);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_renew_extends_expiry() {
    let pool = pool().await;
    let guard = MembershipGuard::redis(pool.clone(), &filter_settings("it:bloom:renew"));
    let ctx = CallContext::background();
    guard.reserve(&ctx).await.unwrap();

    let counter = CallCounter::default();
    let cache = ScalarCache::new(
        Arc::new(RedisStore::new(pool.clone())),
        Duration::from_secs(5),
        "renew:",
        counting(&counter, 0i64, Duration::ZERO),
        guard,
    );

    cache.put(&ctx, "a", 11).await.unwrap();
    cache.renew(&ctx, "a", Duration::from_secs(600)).await.unwrap();

    let mut conn = pool.get().await.unwrap();
    let remaining: i64 = redis::cmd("TTL")
        .arg("renew:a")
        .query_async(&mut conn)
        .await
        .unwrap();
    assert!((600..605).contains(&remaining));

    let err = cache
        .renew(&ctx, "missing", Duration::from_secs(10))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
