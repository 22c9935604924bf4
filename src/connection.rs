//! Named Redis connection registry.
//!
//! Stores reference physical connections by name; the registry resolves a
//! `connection` option from store configuration to a live
//! [`ConnectionManager`]. One connection may back several adapters with
//! distinct key prefixes.

use crate::error::{CacheError, CacheResult};
use redis::{Client, aio::ConnectionManager};
use std::collections::HashMap;
use tracing::debug;

/// Name used when a store config does not pick a connection.
pub const DEFAULT_CONNECTION: &str = "default";

/// Registry of named Redis connections.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    connections: HashMap<String, ConnectionManager>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a connection to `url` and register it under `name`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tagcache::ConnectionRegistry;
    ///
    /// # async fn example() -> Result<(), tagcache::CacheError> {
    /// let mut registry = ConnectionRegistry::new();
    /// registry.register("default", "redis://localhost:6379").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn register(&mut self, name: impl Into<String>, url: &str) -> CacheResult<()> {
        let client = Client::open(url).map_err(|e| CacheError::Config(e.to_string()))?;
        let connection = ConnectionManager::new(client).await?;
        self.add(name, connection);
        Ok(())
    }

    /// Register an already-established connection under `name`.
    pub fn add(&mut self, name: impl Into<String>, connection: ConnectionManager) {
        let name = name.into();
        debug!(connection = %name, "registered redis connection");
        self.connections.insert(name, connection);
    }

    /// Resolve a connection by name, defaulting to [`DEFAULT_CONNECTION`].
    pub fn connection(&self, name: Option<&str>) -> CacheResult<ConnectionManager> {
        let name = name.unwrap_or(DEFAULT_CONNECTION);
        self.connections.get(name).cloned().ok_or_else(|| {
            CacheError::Config(format!("no redis connection registered as `{name}`"))
        })
    }

    /// Names of all registered connections.
    pub fn names(&self) -> Vec<&str> {
        self.connections.keys().map(|name| name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_connection_is_a_config_error() {
        let registry = ConnectionRegistry::new();

        let err = registry.connection(Some("cache")).err().unwrap();
        assert!(matches!(err, CacheError::Config(message) if message.contains("cache")));
    }

    #[test]
    fn test_default_name_used_when_unset() {
        let registry = ConnectionRegistry::new();

        let err = registry.connection(None).err().unwrap();
        assert!(matches!(err, CacheError::Config(message) if message.contains("default")));
    }
}
