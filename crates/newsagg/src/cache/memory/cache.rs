//! In-memory cache implementation with LRU eviction.
//!
//! Behaves like the Redis backend as far as the coordinator can tell:
//! - expired entries read as absent and are dropped on access
//! - `delete_pattern` accepts the same glob syntax and returns a count
//!
//! Keys are indexed by family (`entity_type:identity`), so sweeping a
//! pattern like `article:last:*` only visits keys of that family. Patterns
//! whose first two components contain a wildcard (`user:*`) fall back to a
//! full scan.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;

use newsagg_core::cache::{
    key_family, pattern_family, pattern_matches, validate_pattern, Cache, Result,
};

/// A single cache entry with optional expiration.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.map(|d| Instant::now() + d);
        Self { value, expires_at }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }
}

#[derive(Debug)]
struct Inner {
    entries: LruCache<String, CacheEntry>,
    /// family -> keys currently stored under it
    families: HashMap<String, HashSet<String>>,
}

impl Inner {
    fn track(&mut self, key: &str) {
        if let Some(family) = key_family(key) {
            self.families
                .entry(family.to_string())
                .or_default()
                .insert(key.to_string());
        }
    }

    fn untrack(&mut self, key: &str) {
        let Some(family) = key_family(key) else {
            return;
        };
        if let Some(keys) = self.families.get_mut(family) {
            keys.remove(key);
            if keys.is_empty() {
                self.families.remove(family);
            }
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        self.untrack(key);
        self.entries.pop(key).is_some()
    }
}

/// In-memory cache implementation with LRU eviction.
///
/// Thread-safe cache using `Arc<RwLock<_>>` for concurrent access. TTLs are
/// enforced lazily: an expired entry is removed the next time it is read or
/// swept, and is never returned.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryCache {
    /// Creates a new in-memory cache holding at most `max_entries` keys.
    ///
    /// A capacity of zero is treated as one.
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(RwLock::new(Inner {
                entries: LruCache::new(capacity),
                families: HashMap::new(),
            })),
        }
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut inner = self.inner.write().await;

        match inner.entries.get(key) {
            Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
            Some(_) => {}
            None => return Ok(None),
        }

        inner.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let mut inner = self.inner.write().await;
        let entry = CacheEntry::new(value.to_vec(), ttl);

        // `push` hands back the evicted LRU entry, or the old value of `key`.
        if let Some((evicted, _)) = inner.entries.push(key.to_string(), entry) {
            if evicted != key {
                inner.untrack(&evicted);
            }
        }
        inner.track(key);

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.remove(key);
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<usize> {
        validate_pattern(pattern)?;
        let mut inner = self.inner.write().await;

        let candidates: Vec<String> = match pattern_family(pattern) {
            Some(family) => inner
                .families
                .get(family)
                .map(|keys| keys.iter().cloned().collect())
                .unwrap_or_default(),
            // O(n), only for patterns that span several families
            None => inner.entries.iter().map(|(key, _)| key.clone()).collect(),
        };

        let mut deleted = 0;
        for key in candidates.iter().filter(|k| pattern_matches(pattern, k)) {
            if inner.remove(key) {
                deleted += 1;
            }
        }

        tracing::trace!(pattern, deleted, "Swept in-memory cache");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsagg_core::cache::CacheError;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MemoryCache::new(100);
        cache.set("article:a1", b"Old", None).await.unwrap();

        let result = cache.get("article:a1").await.unwrap();
        assert_eq!(result, Some(b"Old".to_vec()));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let cache = MemoryCache::new(100);
        assert_eq!(cache.get("article:missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overwrite() {
        let cache = MemoryCache::new(100);
        cache.set("article:a1", b"Old", None).await.unwrap();
        cache.set("article:a1", b"New", None).await.unwrap();

        assert_eq!(cache.get("article:a1").await.unwrap(), Some(b"New".to_vec()));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = MemoryCache::new(100);
        cache.set("user:u1", b"Ada", None).await.unwrap();
        cache.delete("user:u1").await.unwrap();

        assert!(cache.get("user:u1").await.unwrap().is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_ok() {
        let cache = MemoryCache::new(100);
        assert!(cache.delete("user:nobody").await.is_ok());
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let cache = MemoryCache::new(100);
        cache
            .set("article:a1", b"Old", Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(cache.get("article:a1").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(cache.get("article:a1").await.unwrap().is_none());
        assert!(cache.is_empty().await, "expired entry is dropped on read");
    }

    #[tokio::test]
    async fn test_no_ttl_does_not_expire() {
        let cache = MemoryCache::new(100);
        cache.set("tags:all", b"[]", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get("tags:all").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_pattern_within_family() {
        let cache = MemoryCache::new(100);
        cache.set("article:last:1:10", b"p1", None).await.unwrap();
        cache.set("article:last:2:10", b"p2", None).await.unwrap();
        cache.set("article:last", b"base", None).await.unwrap();
        cache.set("article:all:1:10", b"admin", None).await.unwrap();
        cache.set("article:a1", b"Old", None).await.unwrap();

        let deleted = cache.delete_pattern("article:last:*").await.unwrap();

        assert_eq!(deleted, 2);
        assert!(cache.get("article:last:1:10").await.unwrap().is_none());
        assert!(cache.get("article:last:2:10").await.unwrap().is_none());
        assert!(cache.get("article:last").await.unwrap().is_some());
        assert!(cache.get("article:all:1:10").await.unwrap().is_some());
        assert!(cache.get("article:a1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_pattern_across_families() {
        let cache = MemoryCache::new(100);
        cache.set("user:u1", b"a", None).await.unwrap();
        cache.set("user:u1:preferences", b"b", None).await.unwrap();
        cache.set("user:u2", b"c", None).await.unwrap();
        cache.set("article:a1", b"d", None).await.unwrap();

        let deleted = cache.delete_pattern("user:*").await.unwrap();

        assert_eq!(deleted, 3);
        assert_eq!(cache.len().await, 1);
        assert!(cache.get("article:a1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_pattern_no_match() {
        let cache = MemoryCache::new(100);
        cache.set("comment:c1", b"hi", None).await.unwrap();
        assert_eq!(cache.delete_pattern("article-comments:a1:*").await.unwrap(), 0);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_pattern_does_not_match_escaped_wildcard() {
        let cache = MemoryCache::new(100);
        // an identity containing '*' is stored percent-encoded
        cache.set("article:a%2A:1:10", b"x", None).await.unwrap();
        cache.set("article:a:1:10", b"y", None).await.unwrap();

        assert_eq!(cache.delete_pattern("article:a:*").await.unwrap(), 1);
        assert!(cache.get("article:a%2A:1:10").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = MemoryCache::new(2);
        cache.set("article:a1", b"1", None).await.unwrap();
        cache.set("article:a2", b"2", None).await.unwrap();

        // touch a1 so that a2 becomes least recently used
        cache.get("article:a1").await.unwrap();
        cache.set("article:a3", b"3", None).await.unwrap();

        assert!(cache.get("article:a1").await.unwrap().is_some());
        assert!(cache.get("article:a2").await.unwrap().is_none());
        assert!(cache.get("article:a3").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_evicted_keys_leave_the_family_index() {
        let cache = MemoryCache::new(1);
        cache.set("article:last:1:10", b"p1", None).await.unwrap();
        cache.set("article:last:2:10", b"p2", None).await.unwrap();

        let inner = cache.inner.read().await;
        let family = inner.families.get("article:last").unwrap();
        assert_eq!(family.len(), 1);
        assert!(family.contains("article:last:2:10"));
    }

    #[tokio::test]
    async fn test_zero_capacity_is_clamped() {
        let cache = MemoryCache::new(0);
        cache.set("article:a1", b"1", None).await.unwrap();
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_pattern_rejects_redis_only_globs() {
        let cache = MemoryCache::new(100);
        cache.set("user:u1", b"Ada", None).await.unwrap();

        assert_eq!(
            cache.delete_pattern("user:u?").await,
            Err(CacheError::InvalidPattern("user:u?".to_string()))
        );
        assert!(cache.delete_pattern("user:[u]1").await.is_err());
        assert!(cache.get("user:u1").await.unwrap().is_some());
    }
}
