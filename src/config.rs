//! Store configuration types.

use std::path::PathBuf;
use std::time::Duration;

/// Process-wide key prefix used when a store config does not set one.
pub const DEFAULT_PREFIX: &str = "tagcache";

/// Declarative store configuration.
///
/// Constructed once, immutable thereafter; drives the adapter factory's
/// selection decision. The backend is kept as the declarative string from
/// configuration and resolved (and validated) by the factory.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Backend family: `memory`, `filesystem`, or `redis`
    pub backend: String,

    /// Request a tag-capable adapter
    pub tag_aware: bool,

    /// Name of a pre-registered Redis connection (Redis backend only)
    pub connection: Option<String>,

    /// Key prefix; falls back to [`DEFAULT_PREFIX`] if absent
    pub prefix: Option<String>,

    /// Default TTL applied to items stored without an explicit expiry
    pub default_ttl: Option<Duration>,

    /// Cache root directory (filesystem backend only)
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Create a configuration for an arbitrary backend name.
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            tag_aware: false,
            connection: None,
            prefix: None,
            default_ttl: None,
            path: None,
        }
    }

    /// Create an in-memory store configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagcache::StoreConfig;
    ///
    /// let config = StoreConfig::memory().with_tag_aware(true);
    /// assert_eq!(config.backend, "memory");
    /// ```
    pub fn memory() -> Self {
        Self::new("memory")
    }

    /// Create a filesystem store configuration rooted at `path`.
    pub fn filesystem(path: impl Into<PathBuf>) -> Self {
        Self::new("filesystem").with_path(path)
    }

    /// Create a Redis store configuration using the named connection.
    pub fn redis(connection: impl Into<String>) -> Self {
        Self::new("redis").with_connection(connection)
    }

    /// Request a tag-capable adapter.
    pub fn with_tag_aware(mut self, tag_aware: bool) -> Self {
        self.tag_aware = tag_aware;
        self
    }

    /// Set the named Redis connection.
    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = Some(connection.into());
        self
    }

    /// Set the key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set the default TTL for items stored without an explicit expiry.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Set the filesystem cache root.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Resolved key prefix: the explicit value, else the process-wide default.
    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or(DEFAULT_PREFIX)
    }
}
