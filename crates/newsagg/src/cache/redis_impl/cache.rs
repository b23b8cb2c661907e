//! Redis cache implementation.
//!
//! # Sweeps are not atomic
//!
//! `delete_pattern` collects matching keys with `SCAN MATCH` and deletes
//! them in batches. Keys written while the scan runs may survive the sweep.
//! The coordinator tolerates this: such a key was populated from a store
//! read that raced the invalidation, and it expires with its TTL.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::AsyncCommands;

use newsagg_core::cache::{validate_pattern, Cache, CacheError, Result};

use super::error::map_redis_error;

/// Keys deleted per `DEL` command during a sweep.
const DELETE_BATCH: usize = 500;

/// Upper bound on establishing the first connection. The connection
/// manager retries with backoff, which would otherwise stall startup
/// against an unreachable server.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Redis cache backend using connection manager for pooling.
#[derive(Clone)]
pub struct RedisCache {
    conn: redis::aio::ConnectionManager,
}

impl RedisCache {
    /// Creates a new Redis cache connection.
    ///
    /// # Arguments
    ///
    /// * `url` - Redis connection URL (e.g., "redis://localhost:6379")
    ///
    /// # Errors
    ///
    /// Returns `CacheError::ConnectionFailed` if the connection cannot be
    /// established within [`DEFAULT_CONNECT_TIMEOUT`].
    pub async fn new(url: &str) -> Result<Self> {
        Self::connect(url, DEFAULT_CONNECT_TIMEOUT).await
    }

    /// Like [`RedisCache::new`] with an explicit connect timeout.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let conn = tokio::time::timeout(timeout, redis::aio::ConnectionManager::new(client))
            .await
            .map_err(|_| {
                CacheError::ConnectionFailed(format!("timed out after {timeout:?} connecting"))
            })?
            .map_err(map_redis_error)?;
        tracing::debug!(url, "Connected to Redis cache");
        Ok(Self { conn })
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn
            .scan_match::<_, String>(pattern)
            .await
            .map_err(map_redis_error)?
            .collect()
            .await;
        Ok(keys)
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let result: Option<Vec<u8>> = conn.get(key).await.map_err(map_redis_error)?;
        Ok(result)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.clone();

        match ttl {
            Some(duration) => {
                // EX has second granularity; never round down to "no expiry".
                let seconds = duration.as_secs().max(1);
                conn.set_ex::<_, _, ()>(key, value, seconds)
                    .await
                    .map_err(map_redis_error)?;
            }
            None => {
                conn.set::<_, _, ()>(key, value)
                    .await
                    .map_err(map_redis_error)?;
            }
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(map_redis_error)?;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<usize> {
        validate_pattern(pattern)?;
        let keys = self.scan(pattern).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.clone();
        let mut deleted = 0;
        for batch in keys.chunks(DELETE_BATCH) {
            let removed: usize = conn.del(batch).await.map_err(map_redis_error)?;
            deleted += removed;
        }

        tracing::trace!(pattern, deleted, "Swept Redis cache");
        Ok(deleted)
    }
}
