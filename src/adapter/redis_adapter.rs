//! Redis adapters.
//!
//! The plain adapter stores raw values with native `PX` expiry. The tag-aware
//! adapter additionally keeps one Redis SET per tag holding the member keys,
//! so bulk invalidation is a server-side set lookup instead of an in-process
//! index. Both share a [`ConnectionManager`] resolved by name through the
//! connection registry; the connection is never assumed to be exclusively
//! owned, key prefixes keep adapters apart.

use crate::adapter::{Adapter, CacheItem, TagAwareAdapter, now_millis};
use crate::error::{CacheError, CacheResult};
use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use std::time::Duration;

/// Milliseconds until the item's absolute expiry, or `None` for no expiry.
///
/// `Some(0)` means the item is already expired.
fn remaining_ms(item: &CacheItem, default_ttl: Option<Duration>) -> Option<u64> {
    match item.expires_at {
        Some(at) => Some((at - now_millis()).max(0) as u64),
        None => default_ttl.map(|ttl| ttl.as_millis() as u64),
    }
}

/// Match pattern covering every key this adapter owns, item and tag keys
/// alike.
fn scoped_pattern(prefix: &str) -> String {
    format!("{prefix}:*")
}

/// How a tag membership set's expiry follows the member being added.
///
/// Entries for keys that age out via `PX` are never `SREM`ed, so the set
/// itself must expire with its longest-lived member or it grows without
/// bound under churn.
#[derive(Debug, PartialEq, Eq)]
enum TagSetExpiry {
    /// A forever member keeps the set alive until invalidation.
    Persist,
    /// First member: the set takes the member's TTL.
    Take(u64),
    /// Existing set: extend only, never shorten.
    ExtendTo(u64),
}

fn tag_set_expiry(set_existed: bool, remaining: Option<u64>) -> TagSetExpiry {
    match remaining {
        None => TagSetExpiry::Persist,
        Some(ms) if set_existed => TagSetExpiry::ExtendTo(ms),
        Some(ms) => TagSetExpiry::Take(ms),
    }
}

/// Delete all keys matching `pattern` with a cursor walk.
///
/// The connection may be shared with other adapters under other prefixes, so
/// clearing must never reach for `FLUSHDB`.
async fn delete_matching(conn: &mut ConnectionManager, pattern: &str) -> CacheResult<()> {
    let mut cursor: u64 = 0;
    loop {
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(100)
            .query_async(conn)
            .await?;

        if !keys.is_empty() {
            let _: () = conn.del(&keys).await?;
        }

        cursor = next;
        if cursor == 0 {
            return Ok(());
        }
    }
}

/// Plain Redis cache adapter.
#[derive(Clone)]
pub struct RedisAdapter {
    connection: ConnectionManager,
    prefix: String,
    default_ttl: Option<Duration>,
}

impl RedisAdapter {
    /// Create a Redis adapter over an already-resolved connection.
    pub fn new(
        connection: ConnectionManager,
        prefix: impl Into<String>,
        default_ttl: Option<Duration>,
    ) -> Self {
        Self {
            connection,
            prefix: prefix.into(),
            default_ttl,
        }
    }

    fn item_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

#[async_trait]
impl Adapter for RedisAdapter {
    async fn get_item(&self, key: &str) -> CacheResult<Option<CacheItem>> {
        let full = self.item_key(key);
        let mut conn = self.connection.clone();

        let value: Option<String> = conn.get(&full).await?;
        Ok(value.map(|value| CacheItem::new(key, value)))
    }

    async fn get_items(&self, keys: &[&str]) -> CacheResult<Vec<Option<CacheItem>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let full: Vec<String> = keys.iter().map(|key| self.item_key(key)).collect();
        let mut conn = self.connection.clone();

        let values: Vec<Option<String>> = conn.mget(&full).await?;
        Ok(keys
            .iter()
            .zip(values)
            .map(|(key, value)| value.map(|value| CacheItem::new(*key, value)))
            .collect())
    }

    async fn save(&self, item: CacheItem) -> CacheResult<()> {
        let full = self.item_key(&item.key);
        let mut conn = self.connection.clone();

        match remaining_ms(&item, self.default_ttl) {
            // Already expired: an absent key is the equivalent state.
            Some(0) => {
                let _: () = conn.del(&full).await?;
            }
            Some(ms) => {
                let _: () = redis::cmd("SET")
                    .arg(&full)
                    .arg(&item.value)
                    .arg("PX")
                    .arg(ms)
                    .query_async(&mut conn)
                    .await?;
            }
            None => {
                let _: () = conn.set(&full, &item.value).await?;
            }
        }

        Ok(())
    }

    async fn delete_item(&self, key: &str) -> CacheResult<()> {
        let full = self.item_key(key);
        let mut conn = self.connection.clone();
        let _: () = conn.del(&full).await?;
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        delete_matching(&mut conn, &scoped_pattern(&self.prefix)).await
    }
}

/// Redis adapter with a native tag index.
///
/// Item payloads are serialized [`CacheItem`]s; each tag owns a Redis SET of
/// member keys under `{prefix}:tag:{name}`.
#[derive(Clone)]
pub struct RedisTagAwareAdapter {
    connection: ConnectionManager,
    prefix: String,
    default_ttl: Option<Duration>,
}

impl RedisTagAwareAdapter {
    /// Create a tag-aware Redis adapter over an already-resolved connection.
    pub fn new(
        connection: ConnectionManager,
        prefix: impl Into<String>,
        default_ttl: Option<Duration>,
    ) -> Self {
        Self {
            connection,
            prefix: prefix.into(),
            default_ttl,
        }
    }

    fn item_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    fn tag_key(&self, tag: &str) -> String {
        format!("{}:tag:{}", self.prefix, tag)
    }

    fn parse(payload: &str) -> CacheResult<CacheItem> {
        serde_json::from_str(payload).map_err(|e| CacheError::Deserialization(e.to_string()))
    }

    async fn join_tag_set(
        &self,
        conn: &mut ConnectionManager,
        tag: &str,
        full: &str,
        remaining: Option<u64>,
    ) -> CacheResult<()> {
        let tag_key = self.tag_key(tag);

        let existed: bool = conn.exists(&tag_key).await?;
        let _: () = conn.sadd(&tag_key, full).await?;

        match tag_set_expiry(existed, remaining) {
            TagSetExpiry::Persist => {
                let _: () = conn.persist(&tag_key).await?;
            }
            TagSetExpiry::Take(ms) => {
                let _: () = conn.pexpire(&tag_key, ms as i64).await?;
            }
            TagSetExpiry::ExtendTo(ms) => {
                // GT (Redis 7) never shortens, so the set keeps covering its
                // longest-lived member.
                let _: () = redis::cmd("PEXPIRE")
                    .arg(&tag_key)
                    .arg(ms)
                    .arg("GT")
                    .query_async(conn)
                    .await?;
            }
        }

        Ok(())
    }

    /// Remove `full` from the membership sets of the item's previous tags.
    async fn forget_memberships(
        &self,
        conn: &mut ConnectionManager,
        full: &str,
    ) -> CacheResult<()> {
        let old: Option<String> = conn.get(full).await?;
        if let Some(payload) = old {
            if let Ok(previous) = Self::parse(&payload) {
                for tag in &previous.tags {
                    let _: () = conn.srem(self.tag_key(tag), full).await?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Adapter for RedisTagAwareAdapter {
    async fn get_item(&self, key: &str) -> CacheResult<Option<CacheItem>> {
        let full = self.item_key(key);
        let mut conn = self.connection.clone();

        let payload: Option<String> = conn.get(&full).await?;
        match payload {
            Some(payload) => {
                let item = Self::parse(&payload)?;
                Ok(item.is_hit().then_some(item))
            }
            None => Ok(None),
        }
    }

    async fn get_items(&self, keys: &[&str]) -> CacheResult<Vec<Option<CacheItem>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let full: Vec<String> = keys.iter().map(|key| self.item_key(key)).collect();
        let mut conn = self.connection.clone();

        let payloads: Vec<Option<String>> = conn.mget(&full).await?;
        payloads
            .into_iter()
            .map(|payload| match payload {
                Some(payload) => {
                    let item = Self::parse(&payload)?;
                    Ok(item.is_hit().then_some(item))
                }
                None => Ok(None),
            })
            .collect()
    }

    async fn save(&self, item: CacheItem) -> CacheResult<()> {
        let full = self.item_key(&item.key);
        let mut conn = self.connection.clone();

        self.forget_memberships(&mut conn, &full).await?;

        let remaining = remaining_ms(&item, self.default_ttl);
        if remaining == Some(0) {
            let _: () = conn.del(&full).await?;
            return Ok(());
        }

        let payload =
            serde_json::to_string(&item).map_err(|e| CacheError::Serialization(e.to_string()))?;

        match remaining {
            Some(ms) => {
                let _: () = redis::cmd("SET")
                    .arg(&full)
                    .arg(&payload)
                    .arg("PX")
                    .arg(ms)
                    .query_async(&mut conn)
                    .await?;
            }
            None => {
                let _: () = conn.set(&full, &payload).await?;
            }
        }

        for tag in &item.tags {
            self.join_tag_set(&mut conn, tag, &full, remaining).await?;
        }

        Ok(())
    }

    async fn delete_item(&self, key: &str) -> CacheResult<()> {
        let full = self.item_key(key);
        let mut conn = self.connection.clone();

        self.forget_memberships(&mut conn, &full).await?;
        let _: () = conn.del(&full).await?;
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        delete_matching(&mut conn, &scoped_pattern(&self.prefix)).await
    }
}

#[async_trait]
impl TagAwareAdapter for RedisTagAwareAdapter {
    async fn invalidate_tags(&self, tags: &[&str]) -> CacheResult<()> {
        let mut conn = self.connection.clone();

        for tag in tags {
            let tag_key = self.tag_key(tag);
            let members: Vec<String> = conn.smembers(&tag_key).await?;

            for member in &members {
                let _: () = conn.del(member).await?;
            }
            let _: () = conn.del(&tag_key).await?;
        }

        Ok(())
    }
}
