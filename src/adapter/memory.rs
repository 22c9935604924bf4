//! In-memory adapter.
//!
//! Plain key-value storage behind a [`tokio::sync::RwLock`]; expiry is
//! evaluated lazily at read time. Tag capability for this backend comes from
//! the generic tag-index decorator, wired in by the factory.

use crate::adapter::{Adapter, CacheItem};
use crate::error::CacheResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// In-memory cache adapter.
pub struct MemoryAdapter {
    data: Arc<RwLock<HashMap<String, CacheItem>>>,
    default_ttl: Option<Duration>,
}

impl MemoryAdapter {
    /// Create a new in-memory adapter.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            default_ttl: None,
        }
    }

    /// Set the default TTL for items stored without an explicit expiry.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryAdapter {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            default_ttl: self.default_ttl,
        }
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    async fn get_item(&self, key: &str) -> CacheResult<Option<CacheItem>> {
        let data = self.data.read().await;
        Ok(data.get(key).filter(|item| item.is_hit()).cloned())
    }

    async fn save(&self, item: CacheItem) -> CacheResult<()> {
        let item = item.apply_default_ttl(self.default_ttl);
        self.data.write().await.insert(item.key.clone(), item);
        Ok(())
    }

    async fn delete_item(&self, key: &str) -> CacheResult<()> {
        self.data.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        self.data.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::now_millis;

    #[tokio::test]
    async fn test_save_and_get() {
        let adapter = MemoryAdapter::new();

        adapter.save(CacheItem::new("a", "1")).await.unwrap();

        let item = adapter.get_item("a").await.unwrap().unwrap();
        assert_eq!(item.value, "1");
    }

    #[tokio::test]
    async fn test_expired_item_is_a_miss() {
        let adapter = MemoryAdapter::new();

        let expired = CacheItem::new("a", "1").with_expiry(Some(now_millis() - 1_000));
        adapter.save(expired).await.unwrap();

        assert!(adapter.get_item("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let adapter = MemoryAdapter::new();

        adapter.save(CacheItem::new("a", "1")).await.unwrap();
        adapter.delete_item("a").await.unwrap();
        adapter.delete_item("a").await.unwrap();

        assert!(adapter.get_item("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear() {
        let adapter = MemoryAdapter::new();

        adapter.save(CacheItem::new("a", "1")).await.unwrap();
        adapter.save(CacheItem::new("b", "2")).await.unwrap();
        adapter.clear().await.unwrap();

        assert!(adapter.get_item("a").await.unwrap().is_none());
        assert!(adapter.get_item("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_items_input_order() {
        let adapter = MemoryAdapter::new();

        adapter.save(CacheItem::new("a", "1")).await.unwrap();
        adapter.save(CacheItem::new("c", "3")).await.unwrap();

        let items = adapter.get_items(&["a", "b", "c"]).await.unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().map(|i| i.value.as_str()), Some("1"));
        assert!(items[1].is_none());
        assert_eq!(items[2].as_ref().map(|i| i.value.as_str()), Some("3"));
    }

    #[tokio::test]
    async fn test_default_ttl_applied_on_save() {
        let adapter = MemoryAdapter::new().with_default_ttl(Duration::from_secs(60));

        adapter.save(CacheItem::new("a", "1")).await.unwrap();

        let item = adapter.get_item("a").await.unwrap().unwrap();
        assert!(item.expires_at.is_some());
    }
}
