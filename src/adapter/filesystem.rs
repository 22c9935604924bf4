//! Filesystem adapters.
//!
//! Items are persisted as a single serde_json index file under the configured
//! cache root, one file per prefix so several adapters can share a directory.
//! [`FilesystemTagAwareAdapter`] reads tag metadata straight off the persisted
//! items, so its tag index survives restarts; the factory substitutes it for
//! the plain adapter whenever tag awareness is requested.

use crate::adapter::{Adapter, CacheItem, TagAwareAdapter};
use crate::error::{CacheError, CacheResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Shared persistence internals for both filesystem adapters.
struct FileIndex {
    file: PathBuf,
    default_ttl: Option<Duration>,

    /// Serializes load-modify-store cycles within this process.
    guard: Mutex<()>,
}

impl FileIndex {
    fn new(path: &Path, prefix: &str, default_ttl: Option<Duration>) -> CacheResult<Self> {
        std::fs::create_dir_all(path)?;

        Ok(Self {
            file: path.join(format!("{prefix}.cache.json")),
            default_ttl,
            guard: Mutex::new(()),
        })
    }

    async fn load(&self) -> CacheResult<HashMap<String, CacheItem>> {
        match tokio::fs::read(&self.file).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| CacheError::Deserialization(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist atomically: write a sibling temp file, then rename over the
    /// index, so a crash mid-write never leaves partial JSON behind.
    async fn store(&self, entries: &HashMap<String, CacheItem>) -> CacheResult<()> {
        let bytes =
            serde_json::to_vec(entries).map_err(|e| CacheError::Serialization(e.to_string()))?;
        let tmp = self.file.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.file).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<CacheItem>> {
        let _guard = self.guard.lock().await;
        let entries = self.load().await?;
        Ok(entries.get(key).filter(|item| item.is_hit()).cloned())
    }

    async fn get_many(&self, keys: &[&str]) -> CacheResult<Vec<Option<CacheItem>>> {
        let _guard = self.guard.lock().await;
        let entries = self.load().await?;
        Ok(keys
            .iter()
            .map(|key| entries.get(*key).filter(|item| item.is_hit()).cloned())
            .collect())
    }

    /// Load the index, apply `mutate`, and persist the result.
    async fn update<F>(&self, mutate: F) -> CacheResult<()>
    where
        F: FnOnce(&mut HashMap<String, CacheItem>),
    {
        let _guard = self.guard.lock().await;
        let mut entries = self.load().await?;
        mutate(&mut entries);
        self.store(&entries).await
    }

    /// Replace the index with an empty one without loading it first, so an
    /// unreadable index can still be cleared.
    async fn clear(&self) -> CacheResult<()> {
        let _guard = self.guard.lock().await;
        self.store(&HashMap::new()).await
    }
}

/// Plain filesystem cache adapter.
pub struct FilesystemAdapter {
    index: Arc<FileIndex>,
}

impl FilesystemAdapter {
    /// Create a filesystem adapter rooted at `path`.
    pub fn new(
        path: impl AsRef<Path>,
        prefix: &str,
        default_ttl: Option<Duration>,
    ) -> CacheResult<Self> {
        Ok(Self {
            index: Arc::new(FileIndex::new(path.as_ref(), prefix, default_ttl)?),
        })
    }
}

#[async_trait]
impl Adapter for FilesystemAdapter {
    async fn get_item(&self, key: &str) -> CacheResult<Option<CacheItem>> {
        self.index.get(key).await
    }

    async fn get_items(&self, keys: &[&str]) -> CacheResult<Vec<Option<CacheItem>>> {
        self.index.get_many(keys).await
    }

    async fn save(&self, item: CacheItem) -> CacheResult<()> {
        let item = item.apply_default_ttl(self.index.default_ttl);
        self.index
            .update(|entries| {
                entries.insert(item.key.clone(), item);
            })
            .await
    }

    async fn delete_item(&self, key: &str) -> CacheResult<()> {
        self.index
            .update(|entries| {
                entries.remove(key);
            })
            .await
    }

    async fn clear(&self) -> CacheResult<()> {
        self.index.clear().await
    }
}

/// Filesystem adapter with a native tag index.
///
/// Tag membership lives on the persisted items themselves, so invalidation
/// works across process restarts without an out-of-band index.
pub struct FilesystemTagAwareAdapter {
    index: Arc<FileIndex>,
}

impl FilesystemTagAwareAdapter {
    /// Create a tag-aware filesystem adapter rooted at `path`.
    pub fn new(
        path: impl AsRef<Path>,
        prefix: &str,
        default_ttl: Option<Duration>,
    ) -> CacheResult<Self> {
        Ok(Self {
            index: Arc::new(FileIndex::new(path.as_ref(), prefix, default_ttl)?),
        })
    }
}

#[async_trait]
impl Adapter for FilesystemTagAwareAdapter {
    async fn get_item(&self, key: &str) -> CacheResult<Option<CacheItem>> {
        self.index.get(key).await
    }

    async fn get_items(&self, keys: &[&str]) -> CacheResult<Vec<Option<CacheItem>>> {
        self.index.get_many(keys).await
    }

    async fn save(&self, item: CacheItem) -> CacheResult<()> {
        let item = item.apply_default_ttl(self.index.default_ttl);
        self.index
            .update(|entries| {
                entries.insert(item.key.clone(), item);
            })
            .await
    }

    async fn delete_item(&self, key: &str) -> CacheResult<()> {
        self.index
            .update(|entries| {
                entries.remove(key);
            })
            .await
    }

    async fn clear(&self) -> CacheResult<()> {
        self.index.clear().await
    }
}

#[async_trait]
impl TagAwareAdapter for FilesystemTagAwareAdapter {
    async fn invalidate_tags(&self, tags: &[&str]) -> CacheResult<()> {
        self.index
            .update(|entries| {
                entries.retain(|_, item| !tags.iter().any(|tag| item.tags.iter().any(|t| t == tag)));
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::now_millis;

    fn tagged(key: &str, value: &str, tags: &[&str]) -> CacheItem {
        CacheItem::new(key, value).with_tags(tags.iter().map(|t| t.to_string()).collect())
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = FilesystemAdapter::new(dir.path(), "test", None).unwrap();

        adapter.save(CacheItem::new("a", "1")).await.unwrap();

        let item = adapter.get_item("a").await.unwrap().unwrap();
        assert_eq!(item.value, "1");
    }

    #[tokio::test]
    async fn test_persists_across_adapter_instances() {
        let dir = tempfile::tempdir().unwrap();

        let adapter = FilesystemAdapter::new(dir.path(), "test", None).unwrap();
        adapter.save(CacheItem::new("a", "1")).await.unwrap();
        drop(adapter);

        let adapter = FilesystemAdapter::new(dir.path(), "test", None).unwrap();
        let item = adapter.get_item("a").await.unwrap().unwrap();
        assert_eq!(item.value, "1");
    }

    #[tokio::test]
    async fn test_prefixes_are_isolated() {
        let dir = tempfile::tempdir().unwrap();

        let one = FilesystemAdapter::new(dir.path(), "one", None).unwrap();
        let two = FilesystemAdapter::new(dir.path(), "two", None).unwrap();

        one.save(CacheItem::new("a", "1")).await.unwrap();

        assert!(two.get_item("a").await.unwrap().is_none());
        assert!(one.get_item("a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expired_item_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = FilesystemAdapter::new(dir.path(), "test", None).unwrap();

        let expired = CacheItem::new("a", "1").with_expiry(Some(now_millis() - 1_000));
        adapter.save(expired).await.unwrap();

        assert!(adapter.get_item("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_recovers_a_corrupted_index() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = FilesystemAdapter::new(dir.path(), "test", None).unwrap();

        adapter.save(CacheItem::new("a", "1")).await.unwrap();
        std::fs::write(dir.path().join("test.cache.json"), b"{\"a\":{\"key").unwrap();

        // Reads and writes surface the corruption.
        assert!(adapter.get_item("a").await.is_err());
        assert!(adapter.save(CacheItem::new("b", "2")).await.is_err());

        // Clearing does not need the old index and starts the store over.
        adapter.clear().await.unwrap();
        adapter.save(CacheItem::new("b", "2")).await.unwrap();
        assert_eq!(adapter.get_item("b").await.unwrap().unwrap().value, "2");
    }

    #[tokio::test]
    async fn test_no_partial_index_is_left_beside_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = FilesystemAdapter::new(dir.path(), "test", None).unwrap();

        adapter.save(CacheItem::new("a", "1")).await.unwrap();

        // The temp file from the write-then-rename cycle must not linger.
        assert!(!dir.path().join("test.cache.json.tmp").exists());
        assert!(dir.path().join("test.cache.json").exists());
    }

    #[tokio::test]
    async fn test_tag_invalidation_survives_restart() {
        let dir = tempfile::tempdir().unwrap();

        let adapter = FilesystemTagAwareAdapter::new(dir.path(), "test", None).unwrap();
        adapter.save(tagged("a", "1", &["users"])).await.unwrap();
        adapter.save(tagged("b", "2", &["posts"])).await.unwrap();
        drop(adapter);

        let adapter = FilesystemTagAwareAdapter::new(dir.path(), "test", None).unwrap();
        adapter.invalidate_tags(&["users"]).await.unwrap();

        assert!(adapter.get_item("a").await.unwrap().is_none());
        assert!(adapter.get_item("b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_union_invalidation() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = FilesystemTagAwareAdapter::new(dir.path(), "test", None).unwrap();

        adapter.save(tagged("a", "1", &["t1"])).await.unwrap();
        adapter.save(tagged("b", "2", &["t1", "t2"])).await.unwrap();

        adapter.invalidate_tags(&["t1"]).await.unwrap();

        assert!(adapter.get_item("a").await.unwrap().is_none());
        assert!(adapter.get_item("b").await.unwrap().is_none());
    }
}
