//! Error types for cache operations.
//!
//! Every failure surfaced by a [`Cacher`](crate::Cacher), the membership guard
//! or a [`CacheFuture`](crate::CacheFuture) is a [`CacheError`]. The error is
//! cheap to clone so that one coalesced outcome can be delivered to every
//! waiter of the same key.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Shared, type-erased underlying cause.
pub type BoxedCause = Arc<dyn StdError + Send + Sync + 'static>;

/// Which side of the application boundary an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller can correct the request (unknown key, undecodable payload).
    Input,
    /// Operational failure of the store, the guard or the deadline.
    Internal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Input => write!(f, "input"),
            ErrorClass::Internal => write!(f, "internal"),
        }
    }
}

/// Closed set of cache error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The guard rejected the key, or the store has no entry for it.
    NotFound,
    /// A context deadline expired or the context was cancelled.
    Timeout,
    /// Backing store failure other than a miss or a timeout.
    Store,
    /// Membership filter failure other than a timeout.
    Filter,
    /// Encoding or decoding a structured value failed.
    Serialization,
    /// The authoritative source behind a fallback failed.
    Upstream,
}

impl ErrorKind {
    /// Stable numeric code, grouped by class.
    pub fn code(self) -> u32 {
        match self {
            ErrorKind::NotFound => 10001,
            ErrorKind::Serialization => 10002,
            ErrorKind::Store => 20001,
            ErrorKind::Filter => 20002,
            ErrorKind::Upstream => 20003,
            ErrorKind::Timeout => 20004,
        }
    }

    pub fn class(self) -> ErrorClass {
        match self {
            ErrorKind::NotFound | ErrorKind::Serialization => ErrorClass::Input,
            ErrorKind::Timeout | ErrorKind::Store | ErrorKind::Filter | ErrorKind::Upstream => {
                ErrorClass::Internal
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Store => "store",
            ErrorKind::Filter => "filter",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Upstream => "upstream",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cache error: kind, human message and optional underlying cause.
#[derive(Debug, Clone, Error)]
#[error("[{code}] {kind}: {message}", code = .kind.code())]
pub struct CacheError {
    kind: ErrorKind,
    message: String,
    #[source]
    cause: Option<BoxedCause>,
}

impl CacheError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// Attach an underlying cause, replacing any previous one.
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Create a NotFound error for a physical key.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, format!("key not found: {}", key.into()))
    }

    /// Create a Timeout error
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("{} timed out", operation.into()),
        )
    }

    /// Create a Store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Store, message)
    }

    /// Create a Filter error
    pub fn filter(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Filter, message)
    }

    /// Create a Serialization error from a serde_json failure.
    pub fn serialization(err: serde_json::Error) -> Self {
        Self::new(ErrorKind::Serialization, "failed to (de)serialize value").with_cause(err)
    }

    /// Create an Upstream error, used by fallbacks to report source failures.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Upstream, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> u32 {
        self.kind.code()
    }

    pub fn class(&self) -> ErrorClass {
        self.kind.class()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }

    /// Message followed by the full cause chain.
    pub fn detail(&self) -> String {
        let mut detail = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            detail.push_str(" (root: ");
            detail.push_str(&cause.to_string());
            detail.push(')');
            source = cause.source();
        }
        detail
    }

    /// Emit this error as a structured tracing event.
    ///
    /// Input-class errors are logged at debug level, internal ones at warn.
    pub fn record(&self) {
        match self.class() {
            ErrorClass::Input => tracing::debug!(
                code = self.code(),
                kind = %self.kind,
                class = %self.class(),
                detail = %self.detail(),
                "cache error"
            ),
            ErrorClass::Internal => tracing::warn!(
                code = self.code(),
                kind = %self.kind,
                class = %self.class(),
                detail = %self.detail(),
                "cache error"
            ),
        }
    }

    /// Re-kind a filter error raised while writing through the cache.
    ///
    /// Timeouts keep their kind; anything else becomes a Store error with the
    /// original error as its cause.
    pub(crate) fn into_store_failure(self, message: impl Into<String>) -> Self {
        if self.is_timeout() {
            return self;
        }
        CacheError::store(message).with_cause(self)
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::serialization(err)
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config build error: {0}")]
    Build(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
