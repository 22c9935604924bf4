//! Typed repository over a store.
//!
//! Thin serde layer for framework glue: values go through `serde_json` on
//! the way in and out, everything else delegates to the underlying
//! [`Store`].

use crate::error::{CacheError, CacheResult};
use crate::store::Store;
use crate::tagged::TaggedView;
use serde::{Serialize, de::DeserializeOwned};

/// Typed cache repository.
#[derive(Clone)]
pub struct Repository {
    store: Store,
}

impl Repository {
    /// Wrap a store in a typed repository.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Get a typed value from the cache.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        match self.store.get(key).await? {
            Some(json) => {
                let value = serde_json::from_str(&json)
                    .map_err(|e| CacheError::Deserialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Set a typed value with an optional relative TTL in seconds.
    pub async fn put<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: Option<i64>,
    ) -> CacheResult<bool> {
        let json =
            serde_json::to_string(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.store.put(key, &json, ttl_seconds).await
    }

    /// Set a typed value without expiry.
    pub async fn forever<T: Serialize>(&self, key: &str, value: &T) -> CacheResult<bool> {
        self.put(key, value, None).await
    }

    /// Delete a key.
    pub async fn forget(&self, key: &str) -> CacheResult<bool> {
        self.store.forget(key).await
    }

    /// Clear the backing store.
    pub async fn flush(&self) -> CacheResult<bool> {
        self.store.flush().await
    }

    /// A tag-scoped view over the underlying store.
    pub fn tags<I, S>(&self, names: I) -> CacheResult<TaggedView>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.store.tags(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::factory::AdapterFactory;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct User {
        name: String,
        active: bool,
    }

    fn repository() -> Repository {
        AdapterFactory::new()
            .repository_from_config(&StoreConfig::memory().with_tag_aware(true))
            .unwrap()
    }

    #[tokio::test]
    async fn test_typed_round_trip() {
        let repo = repository();
        let user = User {
            name: "alice".into(),
            active: true,
        };

        repo.put("user:1", &user, Some(60)).await.unwrap();

        let fetched: User = repo.get("user:1").await.unwrap().unwrap();
        assert_eq!(fetched, user);
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let repo = repository();
        let fetched: Option<User> = repo.get("nope").await.unwrap();
        assert!(fetched.is_none());
    }

    #[tokio::test]
    async fn test_type_mismatch_is_a_deserialization_error() {
        let repo = repository();
        repo.store().put("raw", "not json", None).await.unwrap();

        let result: CacheResult<Option<User>> = repo.get("raw").await;
        assert!(matches!(result, Err(CacheError::Deserialization(_))));
    }

    #[tokio::test]
    async fn test_tagged_writes_through_repository() {
        let repo = repository();

        let view = repo.tags(["users"]).unwrap();
        view.put("u1", "\"alice\"", None).await.unwrap();

        let fetched: Option<String> = repo.get("u1").await.unwrap();
        assert_eq!(fetched.as_deref(), Some("alice"));

        view.flush().await.unwrap();
        let fetched: Option<String> = repo.get("u1").await.unwrap();
        assert!(fetched.is_none());
    }
}
