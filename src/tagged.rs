//! Tag sets and tag-scoped views.

use crate::error::{CacheError, CacheResult};
use crate::store::TaggedStore;

/// An ordered, deduplicated set of tag names scoping a sequence of cache
/// operations.
///
/// A tag's resolved identifier is its raw name. There is no per-tag version
/// counter, so invalidation is immediate and destructive rather than a
/// version-stamp orphaning scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSet {
    names: Vec<String>,
}

impl TagSet {
    /// Build a tag set from names, deduplicating while preserving order.
    ///
    /// Tag names must be non-empty.
    pub fn new<I, S>(names: I) -> CacheResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut deduped: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if name.is_empty() {
                return Err(CacheError::Config("tag names must be non-empty".into()));
            }
            if !deduped.contains(&name) {
                deduped.push(name);
            }
        }
        Ok(Self { names: deduped })
    }

    /// Tag names as provided, pre-encoding.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Whether the set holds no tags.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// A stable identifier for this set, for version-stamped key strategies.
    pub fn namespace(&self) -> String {
        self.names.join("|")
    }

    /// Invalidate every tag in this set on `store`; with zero tags this
    /// clears the whole backing store.
    pub async fn reset(&self, store: &TaggedStore) -> CacheResult<bool> {
        if self.names.is_empty() {
            return store.flush().await;
        }

        let refs: Vec<&str> = self.names.iter().map(|name| name.as_str()).collect();
        store.invalidate_tags(&refs).await?;
        Ok(true)
    }

    /// Invalidate a single tag name on `store`.
    pub async fn reset_tag(&self, store: &TaggedStore, name: &str) -> CacheResult<()> {
        store.invalidate_tags(&[name]).await
    }

    /// Alias for [`TagSet::reset_tag`].
    pub async fn flush_tag(&self, store: &TaggedStore, name: &str) -> CacheResult<()> {
        self.reset_tag(store, name).await
    }
}

/// A handle bound to one store and one tag set.
///
/// Writes through the view carry the set's tags; reads delegate to the store
/// unchanged, because tags never filter visibility. Flushing the view always
/// resolves to the tag set, never to a full store clear.
#[derive(Clone)]
pub struct TaggedView {
    store: TaggedStore,
    tags: TagSet,
}

impl TaggedView {
    pub(crate) fn new(store: TaggedStore, tags: TagSet) -> Self {
        Self { store, tags }
    }

    /// The tag set scoping this view.
    pub fn tag_set(&self) -> &TagSet {
        &self.tags
    }

    /// Get a value, or `None` if absent or expired.
    pub async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.store.get(key).await
    }

    /// Get multiple values in input key order.
    pub async fn get_many(&self, keys: &[&str]) -> CacheResult<Vec<Option<String>>> {
        self.store.get_many(keys).await
    }

    /// Store a value tagged with this view's tag set.
    pub async fn put(&self, key: &str, value: &str, ttl_seconds: Option<i64>) -> CacheResult<bool> {
        self.store
            .put_scoped(key, value, ttl_seconds, Some(&self.tags))
            .await
    }

    /// Store multiple tagged values; best-effort, not atomic across keys.
    pub async fn put_many(
        &self,
        values: &[(&str, &str)],
        ttl_seconds: Option<i64>,
    ) -> CacheResult<bool> {
        self.store
            .put_many_scoped(values, ttl_seconds, Some(&self.tags))
            .await
    }

    /// Store a value without expiry, tagged with this view's tag set.
    pub async fn forever(&self, key: &str, value: &str) -> CacheResult<bool> {
        self.put(key, value, None).await
    }

    /// Add `delta` to an integer value; the rewritten item carries this
    /// view's tags and no expiry.
    pub async fn increment(&self, key: &str, delta: i64) -> CacheResult<i64> {
        self.store
            .increment_scoped(key, delta, Some(&self.tags))
            .await
    }

    /// Subtract `delta` from an integer value. Same write path semantics as
    /// [`TaggedView::increment`].
    pub async fn decrement(&self, key: &str, delta: i64) -> CacheResult<i64> {
        self.store
            .increment_scoped(key, -delta, Some(&self.tags))
            .await
    }

    /// Delete a value.
    pub async fn forget(&self, key: &str) -> CacheResult<bool> {
        self.store.forget(key).await
    }

    /// Invalidate exactly this view's tags.
    ///
    /// Never clears the whole store, regardless of the store-level flush's
    /// conditional behavior.
    pub async fn flush(&self) -> CacheResult<bool> {
        self.tags.reset(&self.store).await
    }
}
