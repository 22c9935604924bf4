//! Generic tag-index decorator.
//!
//! Wraps a plain [`Adapter`] that has no native tag support and tracks
//! tag-to-key membership out of band, in-process. Invalidating a set of tags
//! deletes the union of their member keys from the wrapped adapter.
//!
//! Backends with a cheaper native tag index (filesystem, Redis) are
//! substituted by the factory instead of being decorated.

use crate::adapter::{Adapter, CacheItem, TagAwareAdapter};
use crate::error::CacheResult;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Tag-indexing decorator over a plain adapter.
pub struct TagIndexAdapter<A: Adapter> {
    inner: A,

    /// Tag to keys mapping
    tags: Arc<RwLock<HashMap<String, HashSet<String>>>>,

    /// Key to tags mapping
    key_tags: Arc<RwLock<HashMap<String, HashSet<String>>>>,
}

impl<A: Adapter> TagIndexAdapter<A> {
    /// Decorate a plain adapter with an out-of-band tag index.
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            tags: Arc::new(RwLock::new(HashMap::new())),
            key_tags: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Drop a key from every tag membership set it appears in.
    async fn forget_memberships(&self, key: &str) {
        let mut tags_map = self.tags.write().await;
        let mut key_tags_map = self.key_tags.write().await;

        if let Some(tag_set) = key_tags_map.remove(key) {
            for tag in tag_set {
                if let Some(keys) = tags_map.get_mut(&tag) {
                    keys.remove(key);
                    if keys.is_empty() {
                        tags_map.remove(&tag);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl<A: Adapter> Adapter for TagIndexAdapter<A> {
    async fn get_item(&self, key: &str) -> CacheResult<Option<CacheItem>> {
        self.inner.get_item(key).await
    }

    async fn get_items(&self, keys: &[&str]) -> CacheResult<Vec<Option<CacheItem>>> {
        self.inner.get_items(keys).await
    }

    async fn save(&self, item: CacheItem) -> CacheResult<()> {
        let key = item.key.clone();
        let new_tags: HashSet<String> = item.tags.iter().cloned().collect();

        self.inner.save(item).await?;

        // Rewriting a key replaces its memberships; stale entries would make
        // later invalidations over-delete.
        self.forget_memberships(&key).await;

        if new_tags.is_empty() {
            return Ok(());
        }

        let mut tags_map = self.tags.write().await;
        let mut key_tags_map = self.key_tags.write().await;

        for tag in &new_tags {
            tags_map.entry(tag.clone()).or_default().insert(key.clone());
        }
        key_tags_map.insert(key, new_tags);

        Ok(())
    }

    async fn delete_item(&self, key: &str) -> CacheResult<()> {
        self.inner.delete_item(key).await?;
        self.forget_memberships(key).await;
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        self.inner.clear().await?;

        // The index must not outlive the data it points at.
        self.tags.write().await.clear();
        self.key_tags.write().await.clear();
        Ok(())
    }
}

#[async_trait]
impl<A: Adapter> TagAwareAdapter for TagIndexAdapter<A> {
    async fn invalidate_tags(&self, tags: &[&str]) -> CacheResult<()> {
        let keys: HashSet<String> = {
            let mut tags_map = self.tags.write().await;
            tags.iter()
                .filter_map(|tag| tags_map.remove(*tag))
                .flatten()
                .collect()
        };

        debug!(tags = tags.len(), keys = keys.len(), "invalidating tags");

        for key in &keys {
            self.inner.delete_item(key).await?;
        }

        let mut tags_map = self.tags.write().await;
        let mut key_tags_map = self.key_tags.write().await;

        for key in keys {
            if let Some(tag_set) = key_tags_map.remove(&key) {
                for tag in tag_set {
                    if let Some(members) = tags_map.get_mut(&tag) {
                        members.remove(&key);
                        if members.is_empty() {
                            tags_map.remove(&tag);
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::memory::MemoryAdapter;

    fn tagged(key: &str, value: &str, tags: &[&str]) -> CacheItem {
        CacheItem::new(key, value).with_tags(tags.iter().map(|t| t.to_string()).collect())
    }

    #[tokio::test]
    async fn test_invalidate_single_tag() {
        let adapter = TagIndexAdapter::new(MemoryAdapter::new());

        adapter.save(tagged("a", "1", &["users"])).await.unwrap();
        adapter.save(tagged("b", "2", &["posts"])).await.unwrap();

        adapter.invalidate_tags(&["users"]).await.unwrap();

        assert!(adapter.get_item("a").await.unwrap().is_none());
        assert!(adapter.get_item("b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalidate_union_of_tags() {
        let adapter = TagIndexAdapter::new(MemoryAdapter::new());

        adapter.save(tagged("a", "1", &["t1"])).await.unwrap();
        adapter.save(tagged("b", "2", &["t1", "t2"])).await.unwrap();
        adapter.save(tagged("c", "3", &["t3"])).await.unwrap();

        // An item tagged with any of the flushed tags is removed.
        adapter.invalidate_tags(&["t1"]).await.unwrap();

        assert!(adapter.get_item("a").await.unwrap().is_none());
        assert!(adapter.get_item("b").await.unwrap().is_none());
        assert!(adapter.get_item("c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rewrite_replaces_memberships() {
        let adapter = TagIndexAdapter::new(MemoryAdapter::new());

        adapter.save(tagged("a", "1", &["old"])).await.unwrap();
        adapter.save(tagged("a", "2", &["new"])).await.unwrap();

        adapter.invalidate_tags(&["old"]).await.unwrap();
        assert!(adapter.get_item("a").await.unwrap().is_some());

        adapter.invalidate_tags(&["new"]).await.unwrap();
        assert!(adapter.get_item("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_untagged_save_survives_invalidation() {
        let adapter = TagIndexAdapter::new(MemoryAdapter::new());

        adapter.save(CacheItem::new("a", "1")).await.unwrap();
        adapter.save(tagged("b", "2", &["t"])).await.unwrap();

        adapter.invalidate_tags(&["t"]).await.unwrap();

        assert!(adapter.get_item("a").await.unwrap().is_some());
        assert!(adapter.get_item("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_drops_index() {
        let adapter = TagIndexAdapter::new(MemoryAdapter::new());

        adapter.save(tagged("a", "1", &["t"])).await.unwrap();
        adapter.clear().await.unwrap();

        assert!(adapter.tags.read().await.is_empty());
        assert!(adapter.key_tags.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_unknown_tag_is_a_no_op() {
        let adapter = TagIndexAdapter::new(MemoryAdapter::new());

        adapter.save(tagged("a", "1", &["t"])).await.unwrap();
        adapter.invalidate_tags(&["other"]).await.unwrap();

        assert!(adapter.get_item("a").await.unwrap().is_some());
    }
}
