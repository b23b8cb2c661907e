//! Read-through / write-invalidate coordination over a [`Cache`].
//!
//! [`CacheCoordinator`] is the single place that talks to the cache on
//! behalf of the repositories. It is parameterized per call by an
//! [`EntityDescriptor`]; it holds no per-entity state.
//!
//! # Failure semantics
//!
//! Cache errors and undecodable entries are logged and treated as misses.
//! Populate and invalidate failures are logged and swallowed. Store errors
//! returned by a loader always propagate.
//!
//! # Populate/invalidate race
//!
//! A read-through that loaded a value just before a concurrent write
//! committed could otherwise write that stale value back after the
//! writer's invalidation. The coordinator keeps an invalidation epoch per
//! entity type, bumped before every invalidation of that type. Patterns
//! whose entity type is not literal (`*`, `art*`) bump a global epoch that
//! every type observes. A populate captures the [`Epoch`] of its key's type
//! before loading and writes only if it is unchanged; if it changed while
//! the write was in flight, the written key is deleted again. The guard is
//! process-local; across processes staleness is bounded by the TTL.

mod aggregate;
mod entity;
mod warmer;

pub use aggregate::AggregateCache;
pub use entity::EntityCache;
pub use warmer::{CacheWarmer, WarmBatch, WarmerConfig};

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};

use newsagg_core::cache::{
    deserialize_value, key_entity_type, pattern_entity_type, serialize_value, validate_pattern,
    Cache, CacheError, CacheKey, EntityDescriptor, InvalidationScope, KeyParams, Lookup,
};
use newsagg_core::storage::Result;

/// Invalidation epoch observed for one entity type. A populate carrying a
/// stale `Epoch` is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch {
    global: u64,
    scoped: u64,
}

#[derive(Default)]
struct Epochs {
    global: AtomicU64,
    by_type: Mutex<HashMap<String, u64>>,
}

impl Epochs {
    fn current(&self, entity_type: &str) -> Epoch {
        let scoped = self
            .by_type
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity_type)
            .copied()
            .unwrap_or(0);
        Epoch {
            global: self.global.load(Ordering::SeqCst),
            scoped,
        }
    }

    fn bump(&self, entity_type: Option<&str>) {
        match entity_type {
            Some(entity_type) => {
                let mut by_type = self.by_type.lock().unwrap_or_else(PoisonError::into_inner);
                *by_type.entry(entity_type.to_string()).or_default() += 1;
            }
            None => {
                self.global.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

/// Shared handle over a cache backend. Clones share the backend and the
/// invalidation epochs.
#[derive(Clone)]
pub struct CacheCoordinator {
    cache: Arc<dyn Cache>,
    epochs: Arc<Epochs>,
}

impl CacheCoordinator {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self {
            cache,
            epochs: Arc::new(Epochs::default()),
        }
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    /// Current invalidation epoch of `entity_type`.
    pub fn epoch(&self, entity_type: &str) -> Epoch {
        self.epochs.current(entity_type)
    }

    /// Current invalidation epoch of the entity type `key` belongs to.
    pub fn epoch_for(&self, key: &CacheKey) -> Epoch {
        self.epoch(key_entity_type(key.as_str()))
    }

    /// Reads and decodes a cached value. Any failure reads as a miss.
    pub async fn read<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        match self.cache.get(key.as_str()).await {
            Ok(Some(bytes)) => match deserialize_value(&bytes) {
                Ok(value) => {
                    tracing::trace!(%key, "Cache hit");
                    Some(value)
                }
                Err(err) => {
                    tracing::warn!(%key, error = %err, "Cache entry deserialization failed");
                    None
                }
            },
            Ok(None) => {
                tracing::trace!(%key, "Cache miss");
                None
            }
            Err(err) => {
                tracing::warn!(%key, error = %err, "Cache read failed, falling back to store");
                None
            }
        }
    }

    /// Serializes and writes a value unconditionally. Returns whether the
    /// value reached the cache.
    pub async fn populate<T: Serialize + ?Sized>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> bool {
        match serialize_value(value) {
            Ok(bytes) => self.write(key, &bytes, ttl).await,
            Err(err) => {
                tracing::warn!(%key, error = %err, "Failed to serialize value for cache");
                false
            }
        }
    }

    /// Writes pre-serialized bytes unless an invalidation of the key's
    /// entity type ran after `epoch` was captured for that type.
    pub async fn populate_since(
        &self,
        key: &CacheKey,
        bytes: &[u8],
        ttl: Duration,
        epoch: Epoch,
    ) -> bool {
        if self.epoch_for(key) != epoch {
            tracing::debug!(%key, "Skipping populate, invalidated while loading");
            return false;
        }
        if !self.write(key, bytes, ttl).await {
            return false;
        }
        if self.epoch_for(key) != epoch {
            // The invalidation may have run before the SET landed.
            self.delete(key).await;
            tracing::debug!(%key, "Populate raced an invalidation, entry removed");
            return false;
        }
        true
    }

    /// Returns the cached value for `key`, or loads it, caches it for `ttl`
    /// and returns it. A loader returning `None` is not cached.
    pub async fn load_through<T, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        load: F,
    ) -> Result<Lookup<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        if let Some(value) = self.read(key).await {
            return Ok(Lookup::cached(value));
        }

        let epoch = self.epoch_for(key);
        let Some(value) = load().await? else {
            tracing::trace!(%key, "Not found in store, nothing cached");
            return Ok(Lookup::NotFound);
        };

        match serialize_value(&value) {
            Ok(bytes) => {
                self.populate_since(key, &bytes, ttl, epoch).await;
            }
            Err(err) => {
                tracing::warn!(%key, error = %err, "Failed to serialize value for cache");
            }
        }

        Ok(Lookup::loaded(value))
    }

    /// Read-through for the key `descriptor` derives from `identity` and
    /// `params`, cached with the descriptor's TTL.
    pub async fn get_or_load<T, F, Fut>(
        &self,
        descriptor: &EntityDescriptor,
        identity: &str,
        params: &KeyParams,
        load: F,
    ) -> Result<Lookup<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let key = descriptor.key(identity, params);
        self.load_through(&key, descriptor.ttl, load).await
    }

    /// Explicit populate, e.g. for warming. `ttl` defaults to the
    /// descriptor's.
    pub async fn put<T: Serialize + ?Sized>(
        &self,
        descriptor: &EntityDescriptor,
        identity: &str,
        params: &KeyParams,
        value: &T,
        ttl: Option<Duration>,
    ) -> bool {
        let key = descriptor.key(identity, params);
        self.populate(&key, value, ttl.unwrap_or(descriptor.ttl))
            .await
    }

    /// Drops cached state of `identity`. Without `params` this deletes the
    /// base key and sweeps everything below it; with `params` only the
    /// exact key goes.
    pub async fn invalidate(
        &self,
        descriptor: &EntityDescriptor,
        identity: &str,
        params: Option<&KeyParams>,
    ) {
        self.invalidate_scopes(descriptor.invalidation_scopes(identity, params))
            .await;
    }

    /// Applies one invalidation scope. Failures are logged.
    pub async fn invalidate_scope(&self, scope: &InvalidationScope) {
        let entity_type = match scope {
            InvalidationScope::Exact(key) => Some(key_entity_type(key.as_str())),
            InvalidationScope::Prefix(pattern) => pattern_entity_type(pattern),
        };
        self.epochs.bump(entity_type);
        match scope {
            InvalidationScope::Exact(key) => self.delete(key).await,
            InvalidationScope::Prefix(pattern) => {
                match self.cache.delete_pattern(pattern).await {
                    Ok(deleted) => tracing::debug!(%pattern, deleted, "Swept cache"),
                    Err(err) => {
                        tracing::warn!(%pattern, error = %err, "Failed to sweep cache")
                    }
                }
            }
        }
    }

    pub async fn invalidate_scopes(&self, scopes: impl IntoIterator<Item = InvalidationScope>) {
        for scope in scopes {
            self.invalidate_scope(&scope).await;
        }
    }

    /// Administrative sweep that reports failures instead of logging them.
    /// Only `*` is accepted as glob syntax.
    pub async fn sweep(&self, pattern: &str) -> std::result::Result<usize, CacheError> {
        validate_pattern(pattern)?;
        self.epochs.bump(pattern_entity_type(pattern));
        self.cache.delete_pattern(pattern).await
    }

    async fn write(&self, key: &CacheKey, bytes: &[u8], ttl: Duration) -> bool {
        match self.cache.set(key.as_str(), bytes, Some(ttl)).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(%key, error = %err, "Failed to write cache entry");
                false
            }
        }
    }

    async fn delete(&self, key: &CacheKey) {
        if let Err(err) = self.cache.delete(key.as_str()).await {
            tracing::warn!(%key, error = %err, "Failed to invalidate cache entry");
        }
    }
}
