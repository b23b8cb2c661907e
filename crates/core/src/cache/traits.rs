use std::time::Duration;

use async_trait::async_trait;

use super::Result;

/// Key-value cache backend.
///
/// Mirrors the wire contract of the backing store: `GET`, `SET` with an
/// optional `EX`, `DEL`, and a `SCAN MATCH` + `DEL` sweep. Implementations
/// must provide atomic single-key operations.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Gets a value from the cache by key. Expired entries read as `None`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Sets a value in the cache with an optional TTL.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

    /// Deletes a value from the cache by key.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Deletes all values matching a glob pattern (e.g. `"article:last:*"`)
    /// and returns how many were removed.
    async fn delete_pattern(&self, pattern: &str) -> Result<usize>;
}
