//! Adapter factory.
//!
//! Resolves a declarative [`StoreConfig`] to a concrete adapter. Backend
//! kinds are an exhaustive enum, so an unsupported kind is rejected with a
//! [`CacheError::Config`] before any adapter is constructed. When tag
//! awareness is requested, a backend with a cheaper native tag index
//! (filesystem, Redis) is substituted transparently; otherwise the plain
//! adapter is wrapped in the generic tag-index decorator. The substitution is
//! observable only through [`AdapterHandle::kind`].

use crate::adapter::filesystem::{FilesystemAdapter, FilesystemTagAwareAdapter};
use crate::adapter::memory::MemoryAdapter;
use crate::adapter::tag_index::TagIndexAdapter;
use crate::adapter::{Adapter, TagAwareAdapter};
use crate::config::StoreConfig;
use crate::error::{CacheError, CacheResult};
use crate::repository::Repository;
use crate::store::{PlainStore, Store, TaggedStore};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

#[cfg(feature = "redis")]
use crate::adapter::redis_adapter::{RedisAdapter, RedisTagAwareAdapter};
#[cfg(feature = "redis")]
use crate::connection::ConnectionRegistry;
#[cfg(feature = "redis")]
use crate::lock::RedisLockProvider;

/// Backend family named by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// In-memory map
    Memory,
    /// File-backed storage
    Filesystem,
    /// Redis connection
    Redis,
}

impl FromStr for BackendKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" | "array" => Ok(BackendKind::Memory),
            "filesystem" | "file" => Ok(BackendKind::Filesystem),
            "redis" => Ok(BackendKind::Redis),
            other => Err(CacheError::Config(format!(
                "`{other}` is not a supported cache backend"
            ))),
        }
    }
}

/// Concrete adapter implementation selected by the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    /// Plain in-memory adapter (tag support, if any, via the decorator)
    Memory,
    /// Plain filesystem adapter
    Filesystem,
    /// Filesystem adapter with a native tag index
    FilesystemTagAware,
    /// Plain Redis adapter
    Redis,
    /// Redis adapter with a native tag index
    RedisTagAware,
}

pub(crate) enum AdapterInner {
    Plain(Arc<dyn Adapter>),
    TagAware(Arc<dyn TagAwareAdapter>),
}

/// A constructed adapter plus metadata on what was actually instantiated.
pub struct AdapterHandle {
    kind: AdapterKind,
    decorated: bool,
    pub(crate) inner: AdapterInner,
}

impl AdapterHandle {
    /// The concrete adapter that ended up in use.
    pub fn kind(&self) -> AdapterKind {
        self.kind
    }

    /// Whether tag support comes from the generic decorator rather than a
    /// natively tag-aware adapter.
    pub fn is_decorated(&self) -> bool {
        self.decorated
    }

    /// Whether this adapter supports tag operations.
    pub fn is_tag_aware(&self) -> bool {
        matches!(self.inner, AdapterInner::TagAware(_))
    }
}

/// Builds adapters, stores, and repositories from declarative configuration.
#[derive(Default, Clone)]
pub struct AdapterFactory {
    #[cfg(feature = "redis")]
    connections: ConnectionRegistry,
}

impl AdapterFactory {
    /// Create a factory with no registered connections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a factory resolving Redis connections from `connections`.
    #[cfg(feature = "redis")]
    pub fn with_connections(connections: ConnectionRegistry) -> Self {
        Self { connections }
    }

    /// Select and construct the adapter for `config`.
    ///
    /// Fails with [`CacheError::Config`] at construction time for unknown
    /// backends or unresolvable parameters; selection itself performs no I/O
    /// and is deterministic for a given configuration.
    pub fn create_adapter(&self, config: &StoreConfig) -> CacheResult<AdapterHandle> {
        let backend = BackendKind::from_str(&config.backend)?;

        // Native tag-aware counterparts are substituted up front: cheaper
        // than decorating, invisible except through the handle's kind.
        let kind = match (backend, config.tag_aware) {
            (BackendKind::Memory, _) => AdapterKind::Memory,
            (BackendKind::Filesystem, false) => AdapterKind::Filesystem,
            (BackendKind::Filesystem, true) => AdapterKind::FilesystemTagAware,
            (BackendKind::Redis, false) => AdapterKind::Redis,
            (BackendKind::Redis, true) => AdapterKind::RedisTagAware,
        };

        debug!(?kind, tag_aware = config.tag_aware, "selected cache adapter");

        match kind {
            AdapterKind::Memory => {
                let mut adapter = MemoryAdapter::new();
                if let Some(ttl) = config.default_ttl {
                    adapter = adapter.with_default_ttl(ttl);
                }

                // No native tag support: decorate with the generic index.
                if config.tag_aware {
                    Ok(AdapterHandle {
                        kind,
                        decorated: true,
                        inner: AdapterInner::TagAware(Arc::new(TagIndexAdapter::new(adapter))),
                    })
                } else {
                    Ok(AdapterHandle {
                        kind,
                        decorated: false,
                        inner: AdapterInner::Plain(Arc::new(adapter)),
                    })
                }
            }
            AdapterKind::Filesystem => {
                let adapter =
                    FilesystemAdapter::new(self.cache_path(config)?, config.prefix(), config.default_ttl)?;
                Ok(AdapterHandle {
                    kind,
                    decorated: false,
                    inner: AdapterInner::Plain(Arc::new(adapter)),
                })
            }
            AdapterKind::FilesystemTagAware => {
                let adapter = FilesystemTagAwareAdapter::new(
                    self.cache_path(config)?,
                    config.prefix(),
                    config.default_ttl,
                )?;
                Ok(AdapterHandle {
                    kind,
                    decorated: false,
                    inner: AdapterInner::TagAware(Arc::new(adapter)),
                })
            }
            AdapterKind::Redis => {
                #[cfg(feature = "redis")]
                {
                    let connection = self.connections.connection(config.connection.as_deref())?;
                    let adapter =
                        RedisAdapter::new(connection, config.prefix(), config.default_ttl);
                    Ok(AdapterHandle {
                        kind,
                        decorated: false,
                        inner: AdapterInner::Plain(Arc::new(adapter)),
                    })
                }
                #[cfg(not(feature = "redis"))]
                {
                    Err(CacheError::Config(
                        "redis backend requires the `redis` feature".into(),
                    ))
                }
            }
            AdapterKind::RedisTagAware => {
                #[cfg(feature = "redis")]
                {
                    let connection = self.connections.connection(config.connection.as_deref())?;
                    let adapter =
                        RedisTagAwareAdapter::new(connection, config.prefix(), config.default_ttl);
                    Ok(AdapterHandle {
                        kind,
                        decorated: false,
                        inner: AdapterInner::TagAware(Arc::new(adapter)),
                    })
                }
                #[cfg(not(feature = "redis"))]
                {
                    Err(CacheError::Config(
                        "redis backend requires the `redis` feature".into(),
                    ))
                }
            }
        }
    }

    /// Build a store for `config`: tagged when the constructed adapter is
    /// tag-capable, plain otherwise.
    pub fn store_from_config(&self, config: &StoreConfig) -> CacheResult<Store> {
        let handle = self.create_adapter(config)?;
        let kind = handle.kind();
        let decorated = handle.is_decorated();

        Ok(match handle.inner {
            AdapterInner::Plain(adapter) => Store::Plain(PlainStore::new(adapter, kind)),
            AdapterInner::TagAware(adapter) => {
                Store::Tagged(TaggedStore::with_decoration(adapter, kind, decorated))
            }
        })
    }

    /// Build a typed repository for `config`.
    pub fn repository_from_config(&self, config: &StoreConfig) -> CacheResult<Repository> {
        Ok(Repository::new(self.store_from_config(config)?))
    }

    /// Build a lock provider sharing the configured store's connection and
    /// prefix. Redis-backed stores only.
    #[cfg(feature = "redis")]
    pub fn lock_provider(&self, config: &StoreConfig) -> CacheResult<RedisLockProvider> {
        if BackendKind::from_str(&config.backend)? != BackendKind::Redis {
            return Err(CacheError::Config(format!(
                "`{}` stores do not provide locks",
                config.backend
            )));
        }

        let connection = self.connections.connection(config.connection.as_deref())?;
        Ok(RedisLockProvider::new(connection, config.prefix()))
    }

    fn cache_path(&self, config: &StoreConfig) -> CacheResult<std::path::PathBuf> {
        config.path.clone().ok_or_else(|| {
            CacheError::Config("filesystem backend requires a `path` in the store config".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_backend_fails_before_io() {
        let factory = AdapterFactory::new();
        let err = factory
            .create_adapter(&StoreConfig::new("bogus"))
            .err()
            .unwrap();

        assert!(matches!(err, CacheError::Config(message) if message.contains("bogus")));
    }

    #[test]
    fn test_memory_plain() {
        let factory = AdapterFactory::new();
        let handle = factory.create_adapter(&StoreConfig::memory()).unwrap();

        assert_eq!(handle.kind(), AdapterKind::Memory);
        assert!(!handle.is_tag_aware());
        assert!(!handle.is_decorated());
    }

    #[test]
    fn test_memory_tag_aware_is_decorated() {
        let factory = AdapterFactory::new();
        let handle = factory
            .create_adapter(&StoreConfig::memory().with_tag_aware(true))
            .unwrap();

        assert_eq!(handle.kind(), AdapterKind::Memory);
        assert!(handle.is_tag_aware());
        assert!(handle.is_decorated());
    }

    #[test]
    fn test_filesystem_substitutes_native_tag_aware_kind() {
        let dir = tempfile::tempdir().unwrap();
        let factory = AdapterFactory::new();

        let handle = factory
            .create_adapter(&StoreConfig::filesystem(dir.path()).with_tag_aware(true))
            .unwrap();

        // Substituted, not decorated.
        assert_eq!(handle.kind(), AdapterKind::FilesystemTagAware);
        assert!(handle.is_tag_aware());
        assert!(!handle.is_decorated());
    }

    #[test]
    fn test_filesystem_requires_path() {
        let factory = AdapterFactory::new();
        let err = factory
            .create_adapter(&StoreConfig::new("filesystem"))
            .err()
            .unwrap();

        assert!(matches!(err, CacheError::Config(message) if message.contains("path")));
    }

    #[cfg(feature = "redis")]
    #[test]
    fn test_redis_without_registered_connection_is_a_config_error() {
        let factory = AdapterFactory::new();
        let err = factory
            .create_adapter(&StoreConfig::redis("cache").with_tag_aware(true))
            .err()
            .unwrap();

        assert!(matches!(err, CacheError::Config(_)));
    }

    #[cfg(feature = "redis")]
    #[test]
    fn test_lock_provider_rejects_non_redis_backends() {
        let factory = AdapterFactory::new();
        let err = factory.lock_provider(&StoreConfig::memory()).err().unwrap();

        assert!(matches!(err, CacheError::Config(message) if message.contains("memory")));
    }

    #[tokio::test]
    async fn test_store_from_config_memory_tagged() {
        let factory = AdapterFactory::new();
        let store = factory
            .store_from_config(&StoreConfig::memory().with_tag_aware(true))
            .unwrap();

        assert!(store.is_tag_aware());
        assert_eq!(store.kind(), AdapterKind::Memory);

        store.put("a", "1", None).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_store_from_config_plain_has_no_tags() {
        let factory = AdapterFactory::new();
        let store = factory.store_from_config(&StoreConfig::memory()).unwrap();

        assert!(!store.is_tag_aware());
        assert!(store.tags(["t"]).is_err());
    }
}
