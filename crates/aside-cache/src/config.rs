//! Configuration for the Redis connection, the membership filter and cache
//! defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AsideConfig {
    #[serde(default)]
    pub redis: RedisSettings,
    #[serde(default)]
    pub filter: FilterSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub log: LogSettings,
}

impl AsideConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.redis.validate()?;
        self.filter.validate()?;
        self.cache.validate()
    }
}

/// Redis connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Pool wait/create/recycle timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

impl RedisSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::Invalid("redis.url must not be empty".into()));
        }
        if self.pool_size == 0 {
            return Err(ConfigError::Invalid("redis.pool_size must be > 0".into()));
        }
        Ok(())
    }
}

/// Bloom filter reservation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSettings {
    /// Redis key of the bloom filter
    #[serde(default = "default_filter_name")]
    pub name: String,

    /// Target false-positive rate
    #[serde(default = "default_filter_error_rate")]
    pub error_rate: f64,

    /// Expected number of distinct keys
    #[serde(default = "default_filter_capacity")]
    pub capacity: u64,
}

fn default_filter_name() -> String {
    "aside:bloom".to_string()
}

fn default_filter_error_rate() -> f64 {
    0.05
}

fn default_filter_capacity() -> u64 {
    1_000_000
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            name: default_filter_name(),
            error_rate: default_filter_error_rate(),
            capacity: default_filter_capacity(),
        }
    }
}

impl FilterSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Invalid("filter.name must not be empty".into()));
        }
        if !(self.error_rate > 0.0 && self.error_rate < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "filter.error_rate must be in (0, 1), got {}",
                self.error_rate
            )));
        }
        if self.capacity == 0 {
            return Err(ConfigError::Invalid("filter.capacity must be > 0".into()));
        }
        Ok(())
    }
}

/// Cache defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Base TTL in seconds, before jitter
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Namespace prepended to every logical key
    #[serde(default)]
    pub key_prefix: String,

    /// Deadline for a single cache operation in milliseconds
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
}

fn default_ttl_secs() -> u64 {
    60
}

fn default_operation_timeout_ms() -> u64 {
    1000
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl_secs(),
            key_prefix: String::new(),
            operation_timeout_ms: default_operation_timeout_ms(),
        }
    }
}

impl CacheSettings {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "cache.default_ttl_secs must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Tracing subscriber settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    /// Filter directive, e.g. "info" or "aside_cache=debug"
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_true")]
    pub ansi: bool,

    #[serde(default = "default_true")]
    pub with_target: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            ansi: default_true(),
            with_target: default_true(),
        }
    }
}

pub mod loader {
    use super::AsideConfig;
    use crate::error::ConfigError;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Load configuration from an optional TOML file plus environment overrides.
    ///
    /// Without an explicit path, `aside.toml` in the working directory is used
    /// when present. Environment variables such as `ASIDE__REDIS__URL` win over
    /// file values.
    pub fn load_config(path: Option<&str>) -> Result<AsideConfig, ConfigError> {
        let mut builder = Config::builder();
        let file = path
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("aside.toml"));
        if file.exists() {
            builder = builder.add_source(File::from(file));
        }
        builder = builder.add_source(
            Environment::with_prefix("ASIDE")
                .try_parsing(true)
                .separator("__"),
        );
        let merged: AsideConfig = builder.build()?.try_deserialize()?;
        merged.validate()?;
        tracing::debug!(redis_url = %merged.redis.url, filter = %merged.filter.name, "configuration loaded");
        Ok(merged)
    }
}
