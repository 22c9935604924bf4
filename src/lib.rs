//! Tagged cache stores over pluggable adapters.
//!
//! Bridges a store/view/repository cache surface onto interchangeable
//! backend adapters (in-memory, filesystem, Redis) with tag-based
//! invalidation and, for Redis, a distributed lock facade.
//!
//! Tags here are invalidation labels, not namespaces: a value written
//! through a tagged view is readable by any untagged `get`, and flushing a
//! tag removes every item carrying it, without hierarchy.
//!
//! # Features
//!
//! - `redis` - Enable Redis adapters and the lock facade (enabled by default)
//!
//! # Examples
//!
//! ## Tag-based invalidation
//!
//! ```
//! use tagcache::{AdapterFactory, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tagcache::CacheError> {
//!     let factory = AdapterFactory::new();
//!     let store = factory.store_from_config(&StoreConfig::memory().with_tag_aware(true))?;
//!
//!     store.tags(["users"])?.put("user:1", "alice", None).await?;
//!
//!     // Untagged reads see tagged writes.
//!     assert_eq!(store.get("user:1").await?.as_deref(), Some("alice"));
//!
//!     // Invalidate every entry tagged `users`.
//!     store.invalidate_tags(&["users"]).await?;
//!     assert_eq!(store.get("user:1").await?, None);
//!     Ok(())
//! }
//! ```
//!
//! ## Redis store with locks
//!
//! ```no_run
//! use tagcache::{AdapterFactory, ConnectionRegistry, StoreConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), tagcache::CacheError> {
//! let mut connections = ConnectionRegistry::new();
//! connections.register("default", "redis://localhost:6379").await?;
//!
//! let factory = AdapterFactory::with_connections(connections);
//! let config = StoreConfig::redis("default").with_tag_aware(true);
//! let store = factory.store_from_config(&config)?;
//!
//! let locks = factory.lock_provider(&config)?;
//! let lock = locks.lock("reindex", 30, None);
//! if lock.acquire().await? {
//!     // ... critical section ...
//!     lock.release().await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod factory;
pub mod key;
pub mod repository;
pub mod store;
pub mod tagged;

#[cfg(feature = "redis")]
pub mod connection;

#[cfg(feature = "redis")]
pub mod lock;

pub use adapter::{Adapter, CacheItem, TagAwareAdapter};
pub use config::{DEFAULT_PREFIX, StoreConfig};
pub use error::{CacheError, CacheResult};
pub use factory::{AdapterFactory, AdapterHandle, AdapterKind, BackendKind};
pub use repository::Repository;
pub use store::{PlainStore, Store, TaggedStore};
pub use tagged::{TagSet, TaggedView};

#[cfg(feature = "redis")]
pub use connection::ConnectionRegistry;

#[cfg(feature = "redis")]
pub use lock::{RedisLock, RedisLockProvider};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::adapter::{Adapter, CacheItem, TagAwareAdapter};
    pub use crate::config::StoreConfig;
    pub use crate::error::{CacheError, CacheResult};
    pub use crate::factory::{AdapterFactory, AdapterKind};
    pub use crate::repository::Repository;
    pub use crate::store::{PlainStore, Store, TaggedStore};
    pub use crate::tagged::{TagSet, TaggedView};

    #[cfg(feature = "redis")]
    pub use crate::connection::ConnectionRegistry;

    #[cfg(feature = "redis")]
    pub use crate::lock::{RedisLock, RedisLockProvider};
}
