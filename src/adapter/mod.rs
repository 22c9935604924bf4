//! Adapter capability traits and the cache item model.
//!
//! Every storage backend satisfies [`Adapter`]; backends that can index items
//! by tag and bulk-invalidate additionally satisfy [`TagAwareAdapter`]. Stores
//! never talk to a backend except through these traits.

use crate::error::CacheResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub mod memory;
pub mod tag_index;

pub mod filesystem;

#[cfg(feature = "redis")]
pub mod redis_adapter;

/// Current time as unix epoch milliseconds.
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// A single cache entry as materialized by an adapter.
///
/// Created by a store at write time, read-only once persisted. An item whose
/// expiry is in the past is never returned as a hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheItem {
    /// Adapter-level (already encoded) key
    pub key: String,

    /// Stored value
    pub value: String,

    /// Absolute expiry as unix epoch milliseconds; `None` means no expiry
    pub expires_at: Option<i64>,

    /// Adapter-level (already encoded) tag names attached at write time
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CacheItem {
    /// Create an item with no expiry and no tags.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            expires_at: None,
            tags: Vec::new(),
        }
    }

    /// Set the absolute expiry.
    pub fn with_expiry(mut self, expires_at: Option<i64>) -> Self {
        self.expires_at = expires_at;
        self
    }

    /// Attach tag names.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Whether the item is still live at `now` (unix millis).
    pub fn is_hit_at(&self, now: i64) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }

    /// Whether the item is still live.
    pub fn is_hit(&self) -> bool {
        self.is_hit_at(now_millis())
    }

    /// Apply an adapter-level default TTL to an item stored without an
    /// explicit expiry.
    pub(crate) fn apply_default_ttl(mut self, default_ttl: Option<Duration>) -> Self {
        if self.expires_at.is_none() {
            if let Some(ttl) = default_ttl {
                self.expires_at = Some(now_millis() + ttl.as_millis() as i64);
            }
        }
        self
    }
}

/// Uniform storage capability each backend satisfies.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Get a live item, or `None` if absent or expired.
    async fn get_item(&self, key: &str) -> CacheResult<Option<CacheItem>>;

    /// Get multiple items.
    ///
    /// Results are returned in input key order; `None` marks a miss.
    async fn get_items(&self, keys: &[&str]) -> CacheResult<Vec<Option<CacheItem>>> {
        use futures::future::try_join_all;

        let futures = keys.iter().map(|key| self.get_item(key));
        try_join_all(futures).await
    }

    /// Persist an item, overwriting any previous entry for its key.
    async fn save(&self, item: CacheItem) -> CacheResult<()>;

    /// Delete an item. Deleting an absent key is not an error.
    async fn delete_item(&self, key: &str) -> CacheResult<()>;

    /// Remove every item from the backend.
    async fn clear(&self) -> CacheResult<()>;
}

/// A backend capable of natively indexing items by tag.
#[async_trait]
pub trait TagAwareAdapter: Adapter {
    /// Remove every item tagged with any of the given tag names.
    async fn invalidate_tags(&self, tags: &[&str]) -> CacheResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_without_expiry_is_hit() {
        let item = CacheItem::new("k", "v");
        assert!(item.is_hit());
    }

    #[test]
    fn test_item_expiry_boundary() {
        let item = CacheItem::new("k", "v").with_expiry(Some(1_000));
        assert!(item.is_hit_at(999));
        assert!(!item.is_hit_at(1_000));
        assert!(!item.is_hit_at(1_001));
    }

    #[test]
    fn test_default_ttl_only_applies_without_expiry() {
        let item = CacheItem::new("k", "v").apply_default_ttl(Some(Duration::from_secs(60)));
        assert!(item.expires_at.is_some());

        let item = CacheItem::new("k", "v")
            .with_expiry(Some(123))
            .apply_default_ttl(Some(Duration::from_secs(60)));
        assert_eq!(item.expires_at, Some(123));
    }
}
