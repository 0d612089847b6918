//! Typed cache-aside layer in front of a slow authoritative source.
//!
//! ## Protections
//!
//! - **Penetration**: a monotonic membership guard (RedisBloom) rejects keys
//!   that were never admitted before the store or the source is touched
//! - **Breakdown**: concurrent misses on one key share one fallback load
//! - **Avalanche**: TTLs carry a random jitter so bulk writes do not expire
//!   together
//!
//! ## Layout
//!
//! ```text
//! AsyncCacher<T> ──→ dyn Cacher<T>
//!                      ├── ScalarCache<T: Scalar> ──→ KvStore + MembershipGuard
//!                      └── StructuredCache<T: serde> ──→ ScalarCache<String>
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use aside_cache::{
//!     CallContext, Cacher, MembershipGuard, RedisStore, StructuredCache, config, connect_redis,
//!     fallback_fn,
//! };
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = config::loader::load_config(None)?;
//! let pool = connect_redis(&cfg.redis).await?;
//! let guard = MembershipGuard::redis(pool.clone(), &cfg.filter);
//! let ctx = CallContext::from_settings(&cfg.cache);
//! guard.reserve(&ctx).await?;
//!
//! let users: StructuredCache<User> = StructuredCache::new(
//!     Arc::new(RedisStore::new(pool)),
//!     Duration::from_secs(60),
//!     "user:",
//!     fallback_fn(|_ctx, _args| async move {
//!         Ok(User { id: 1, name: "Tester".into() })
//!     }),
//!     guard,
//! );
//! let user = users.get(&ctx, "1", vec![]).await?;
//! # let _ = user;
//! # Ok(())
//! # }
//! ```

pub mod async_cacher;
pub mod cacher;
pub mod config;
pub mod context;
pub mod error;
pub mod future;
pub mod guard;
pub mod jitter;
pub mod metrics;
pub mod observability;
pub mod scalar;
pub mod store;
pub mod structured;

mod coalesce;

pub use async_cacher::AsyncCacher;
pub use cacher::{Cacher, Fallback, FallbackArgs, fallback_fn};
pub use config::{AsideConfig, CacheSettings, FilterSettings, LogSettings, RedisSettings};
pub use context::CallContext;
pub use error::{CacheError, CacheResult, ConfigError, ErrorClass, ErrorKind};
pub use future::{CacheFuture, Resolver};
pub use guard::{DynFilter, MembershipFilter, MembershipGuard, MemoryFilter, RedisBloomFilter};
pub use observability::{apply_logging_level, init_tracing, init_tracing_with};
pub use scalar::{Scalar, ScalarCache};
pub use store::{DynStore, KvStore, MemoryStore, RedisStore, StoreStats, connect_redis};
pub use structured::StructuredCache;
