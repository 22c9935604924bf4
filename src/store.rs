//! Cache stores.
//!
//! [`PlainStore`] exposes key-value operations over any adapter.
//! [`TaggedStore`] layers tag semantics on a tag-aware adapter: writes issued
//! through a [`TaggedView`](crate::tagged::TaggedView) carry the view's tag
//! set, and tag invalidation removes every item carrying any flushed tag.
//! Tags are invalidation labels only; reads never filter by tag.
//!
//! The active tag scope is threaded explicitly into the scoped write paths
//! (`*_scoped` methods taking `Option<&TagSet>`) instead of living as mutable
//! store state, so concurrent callers sharing one store cannot cross-tag each
//! other's writes.

use crate::adapter::{Adapter, CacheItem, TagAwareAdapter, now_millis};
use crate::error::{CacheError, CacheResult};
use crate::factory::AdapterKind;
use crate::key;
use crate::tagged::{TagSet, TaggedView};
use std::sync::Arc;

/// Absolute expiry for a relative TTL in seconds.
///
/// `None` and `0` mean no expiry; a negative TTL yields an expiry in the
/// past, so the write succeeds but the item is immediately unretrievable.
fn expiry_from_ttl(ttl_seconds: Option<i64>) -> Option<i64> {
    match ttl_seconds {
        None | Some(0) => None,
        Some(seconds) => Some(now_millis() + seconds * 1_000),
    }
}

/// Key-value operations shared by both store flavors.
///
/// All keys pass through the codec exactly once, here.
#[derive(Clone)]
struct KeyValueOps {
    adapter: Arc<dyn Adapter>,
}

impl KeyValueOps {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let item = self.adapter.get_item(&key::encode(key)).await?;
        Ok(item.map(|item| item.value))
    }

    async fn get_many(&self, keys: &[&str]) -> CacheResult<Vec<Option<String>>> {
        let encoded: Vec<String> = keys.iter().map(|k| key::encode(k)).collect();
        let refs: Vec<&str> = encoded.iter().map(|k| k.as_str()).collect();

        let items = self.adapter.get_items(&refs).await?;
        Ok(items
            .into_iter()
            .map(|item| item.map(|item| item.value))
            .collect())
    }

    async fn put(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: Option<i64>,
        tags: Vec<String>,
    ) -> CacheResult<bool> {
        let item = CacheItem::new(key::encode(key), value)
            .with_expiry(expiry_from_ttl(ttl_seconds))
            .with_tags(tags);

        self.adapter.save(item).await?;
        Ok(true)
    }

    async fn forget(&self, key: &str) -> CacheResult<bool> {
        self.adapter.delete_item(&key::encode(key)).await?;
        Ok(true)
    }

    async fn clear(&self) -> CacheResult<bool> {
        self.adapter.clear().await?;
        Ok(true)
    }
}

/// Cache store without tag support.
#[derive(Clone)]
pub struct PlainStore {
    ops: KeyValueOps,
    kind: AdapterKind,
}

impl PlainStore {
    /// Create a plain store over an adapter.
    pub fn new(adapter: Arc<dyn Adapter>, kind: AdapterKind) -> Self {
        Self {
            ops: KeyValueOps { adapter },
            kind,
        }
    }

    /// The concrete adapter backing this store.
    pub fn kind(&self) -> AdapterKind {
        self.kind
    }

    /// Get a value, or `None` if absent or expired.
    pub async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.ops.get(key).await
    }

    /// Get multiple values in input key order.
    pub async fn get_many(&self, keys: &[&str]) -> CacheResult<Vec<Option<String>>> {
        self.ops.get_many(keys).await
    }

    /// Store a value with an optional relative TTL in seconds.
    pub async fn put(&self, key: &str, value: &str, ttl_seconds: Option<i64>) -> CacheResult<bool> {
        self.ops.put(key, value, ttl_seconds, Vec::new()).await
    }

    /// Store multiple values; best-effort, not atomic across keys.
    pub async fn put_many(
        &self,
        values: &[(&str, &str)],
        ttl_seconds: Option<i64>,
    ) -> CacheResult<bool> {
        for (key, value) in values {
            self.ops.put(key, value, ttl_seconds, Vec::new()).await?;
        }
        Ok(true)
    }

    /// Add `delta` to an integer value (absent counts as 0); the result is
    /// stored without expiry.
    pub async fn increment(&self, key: &str, delta: i64) -> CacheResult<i64> {
        let current: i64 = self
            .ops
            .get(key)
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        let value = current + delta;
        self.ops
            .put(key, &value.to_string(), None, Vec::new())
            .await?;
        Ok(value)
    }

    /// Subtract `delta` from an integer value.
    pub async fn decrement(&self, key: &str, delta: i64) -> CacheResult<i64> {
        self.increment(key, -delta).await
    }

    /// Store a value without expiry.
    pub async fn forever(&self, key: &str, value: &str) -> CacheResult<bool> {
        self.put(key, value, None).await
    }

    /// Delete a value. Absent keys are not an error.
    pub async fn forget(&self, key: &str) -> CacheResult<bool> {
        self.ops.forget(key).await
    }

    /// Remove every item from the backing store.
    pub async fn flush(&self) -> CacheResult<bool> {
        self.ops.clear().await
    }
}

/// Cache store with tag support.
#[derive(Clone)]
pub struct TaggedStore {
    adapter: Arc<dyn TagAwareAdapter>,
    ops: KeyValueOps,
    kind: AdapterKind,
    decorated: bool,
}

impl TaggedStore {
    /// Create a tagged store over a tag-aware adapter.
    pub fn new(adapter: Arc<dyn TagAwareAdapter>, kind: AdapterKind) -> Self {
        Self::with_decoration(adapter, kind, false)
    }

    pub(crate) fn with_decoration(
        adapter: Arc<dyn TagAwareAdapter>,
        kind: AdapterKind,
        decorated: bool,
    ) -> Self {
        let ops = KeyValueOps {
            adapter: adapter.clone(),
        };
        Self {
            adapter,
            ops,
            kind,
            decorated,
        }
    }

    /// The concrete adapter backing this store.
    pub fn kind(&self) -> AdapterKind {
        self.kind
    }

    /// Whether tag support comes from the generic tag-index decorator rather
    /// than a natively tag-aware adapter.
    pub fn is_decorated(&self) -> bool {
        self.decorated
    }

    /// Get a value, or `None` if absent or expired.
    ///
    /// Reads never filter by tag: a value written through any tagged view is
    /// visible to untagged reads.
    pub async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.ops.get(key).await
    }

    /// Get multiple values in input key order.
    pub async fn get_many(&self, keys: &[&str]) -> CacheResult<Vec<Option<String>>> {
        self.ops.get_many(keys).await
    }

    /// Store a value with no tags attached.
    pub async fn put(&self, key: &str, value: &str, ttl_seconds: Option<i64>) -> CacheResult<bool> {
        self.put_scoped(key, value, ttl_seconds, None).await
    }

    pub(crate) async fn put_scoped(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: Option<i64>,
        scope: Option<&TagSet>,
    ) -> CacheResult<bool> {
        self.ops
            .put(key, value, ttl_seconds, Self::scope_tags(scope))
            .await
    }

    /// Store multiple values; best-effort, not atomic across keys.
    pub async fn put_many(
        &self,
        values: &[(&str, &str)],
        ttl_seconds: Option<i64>,
    ) -> CacheResult<bool> {
        self.put_many_scoped(values, ttl_seconds, None).await
    }

    pub(crate) async fn put_many_scoped(
        &self,
        values: &[(&str, &str)],
        ttl_seconds: Option<i64>,
        scope: Option<&TagSet>,
    ) -> CacheResult<bool> {
        for (key, value) in values {
            self.put_scoped(key, value, ttl_seconds, scope).await?;
        }
        Ok(true)
    }

    /// Add `delta` to an integer value (absent counts as 0); the result is
    /// stored without expiry, dropping any expiry the item had before.
    pub async fn increment(&self, key: &str, delta: i64) -> CacheResult<i64> {
        self.increment_scoped(key, delta, None).await
    }

    pub(crate) async fn increment_scoped(
        &self,
        key: &str,
        delta: i64,
        scope: Option<&TagSet>,
    ) -> CacheResult<i64> {
        let current: i64 = self
            .ops
            .get(key)
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        let value = current + delta;
        self.put_scoped(key, &value.to_string(), None, scope).await?;
        Ok(value)
    }

    /// Subtract `delta` from an integer value.
    pub async fn decrement(&self, key: &str, delta: i64) -> CacheResult<i64> {
        self.increment_scoped(key, -delta, None).await
    }

    /// Store a value without expiry and no tags.
    pub async fn forever(&self, key: &str, value: &str) -> CacheResult<bool> {
        self.put(key, value, None).await
    }

    /// Delete a value. Absent keys are not an error.
    pub async fn forget(&self, key: &str) -> CacheResult<bool> {
        self.ops.forget(key).await
    }

    /// Remove every item from the backing store.
    ///
    /// Tag-scoped flushing goes through [`TaggedView::flush`], which
    /// invalidates exactly the view's tags instead.
    pub async fn flush(&self) -> CacheResult<bool> {
        self.ops.clear().await
    }

    /// Invalidate the given tag names directly, independent of any view.
    pub async fn invalidate_tags(&self, names: &[&str]) -> CacheResult<()> {
        let encoded: Vec<String> = names.iter().map(|name| key::encode(name)).collect();
        let refs: Vec<&str> = encoded.iter().map(|name| name.as_str()).collect();
        self.adapter.invalidate_tags(&refs).await
    }

    /// A view scoping subsequent operations to the given tag names
    /// (deduplicated, order-preserving).
    pub fn tags<I, S>(&self, names: I) -> CacheResult<TaggedView>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(TaggedView::new(self.clone(), TagSet::new(names)?))
    }

    fn scope_tags(scope: Option<&TagSet>) -> Vec<String> {
        scope
            .map(|tags| tags.names().iter().map(|name| key::encode(name)).collect())
            .unwrap_or_default()
    }
}

/// A store as selected by configuration: plain or tag-aware.
#[derive(Clone)]
pub enum Store {
    /// Store over a plain adapter
    Plain(PlainStore),
    /// Store over a tag-aware adapter
    Tagged(TaggedStore),
}

impl Store {
    /// The concrete adapter backing this store.
    pub fn kind(&self) -> AdapterKind {
        match self {
            Store::Plain(store) => store.kind(),
            Store::Tagged(store) => store.kind(),
        }
    }

    /// Whether this store supports tag operations.
    pub fn is_tag_aware(&self) -> bool {
        matches!(self, Store::Tagged(_))
    }

    /// Get a value, or `None` if absent or expired.
    pub async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        match self {
            Store::Plain(store) => store.get(key).await,
            Store::Tagged(store) => store.get(key).await,
        }
    }

    /// Get multiple values in input key order.
    pub async fn get_many(&self, keys: &[&str]) -> CacheResult<Vec<Option<String>>> {
        match self {
            Store::Plain(store) => store.get_many(keys).await,
            Store::Tagged(store) => store.get_many(keys).await,
        }
    }

    /// Store a value with an optional relative TTL in seconds.
    pub async fn put(&self, key: &str, value: &str, ttl_seconds: Option<i64>) -> CacheResult<bool> {
        match self {
            Store::Plain(store) => store.put(key, value, ttl_seconds).await,
            Store::Tagged(store) => store.put(key, value, ttl_seconds).await,
        }
    }

    /// Store multiple values; best-effort, not atomic across keys.
    pub async fn put_many(
        &self,
        values: &[(&str, &str)],
        ttl_seconds: Option<i64>,
    ) -> CacheResult<bool> {
        match self {
            Store::Plain(store) => store.put_many(values, ttl_seconds).await,
            Store::Tagged(store) => store.put_many(values, ttl_seconds).await,
        }
    }

    /// Add `delta` to an integer value.
    pub async fn increment(&self, key: &str, delta: i64) -> CacheResult<i64> {
        match self {
            Store::Plain(store) => store.increment(key, delta).await,
            Store::Tagged(store) => store.increment(key, delta).await,
        }
    }

    /// Subtract `delta` from an integer value.
    pub async fn decrement(&self, key: &str, delta: i64) -> CacheResult<i64> {
        match self {
            Store::Plain(store) => store.decrement(key, delta).await,
            Store::Tagged(store) => store.decrement(key, delta).await,
        }
    }

    /// Store a value without expiry.
    pub async fn forever(&self, key: &str, value: &str) -> CacheResult<bool> {
        match self {
            Store::Plain(store) => store.forever(key, value).await,
            Store::Tagged(store) => store.forever(key, value).await,
        }
    }

    /// Delete a value.
    pub async fn forget(&self, key: &str) -> CacheResult<bool> {
        match self {
            Store::Plain(store) => store.forget(key).await,
            Store::Tagged(store) => store.forget(key).await,
        }
    }

    /// Remove every item from the backing store.
    pub async fn flush(&self) -> CacheResult<bool> {
        match self {
            Store::Plain(store) => store.flush().await,
            Store::Tagged(store) => store.flush().await,
        }
    }

    /// Invalidate the given tag names.
    pub async fn invalidate_tags(&self, names: &[&str]) -> CacheResult<()> {
        match self {
            Store::Plain(_) => Err(CacheError::Config(
                "store was built without tag support; set `tag_aware` in the store config".into(),
            )),
            Store::Tagged(store) => store.invalidate_tags(names).await,
        }
    }

    /// A tag-scoped view over this store.
    pub fn tags<I, S>(&self, names: I) -> CacheResult<TaggedView>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self {
            Store::Plain(_) => Err(CacheError::Config(
                "store was built without tag support; set `tag_aware` in the store config".into(),
            )),
            Store::Tagged(store) => store.tags(names),
        }
    }
}
