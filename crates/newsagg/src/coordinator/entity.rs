//! Read-through cache of single documents addressed by id.

use std::sync::Arc;
use std::time::Duration;

use newsagg_core::cache::{CacheKey, EntityDescriptor, KeyParams, Lookup};
use newsagg_core::storage::{Document, DocumentStore, Result};

use super::CacheCoordinator;

/// Binds a descriptor to the store its documents come from.
pub struct EntityCache<E: Document> {
    coordinator: CacheCoordinator,
    store: Arc<dyn DocumentStore<E>>,
    descriptor: EntityDescriptor,
}

impl<E: Document> Clone for EntityCache<E> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            store: Arc::clone(&self.store),
            descriptor: self.descriptor,
        }
    }
}

impl<E: Document> EntityCache<E> {
    pub fn new(
        coordinator: CacheCoordinator,
        store: Arc<dyn DocumentStore<E>>,
        descriptor: EntityDescriptor,
    ) -> Self {
        Self {
            coordinator,
            store,
            descriptor,
        }
    }

    pub fn coordinator(&self) -> &CacheCoordinator {
        &self.coordinator
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore<E>> {
        &self.store
    }

    pub fn key(&self, id: &str) -> CacheKey {
        self.descriptor.base_key(id)
    }

    /// Cached document, else the store's, populated on the way out.
    pub async fn get_or_load(&self, id: &str) -> Result<Lookup<E>> {
        let lookup = self
            .coordinator
            .get_or_load(&self.descriptor, id, &KeyParams::new(), || {
                self.store.find_one(id)
            })
            .await?;
        if lookup.is_found() {
            tracing::trace!(kind = E::KIND, id, source = ?lookup.source(), "Loaded document");
        }
        Ok(lookup)
    }

    /// Drops the document and everything cached below it.
    pub async fn invalidate(&self, id: &str) {
        self.coordinator
            .invalidate(&self.descriptor, id, None)
            .await;
    }

    /// Caches a document under its own id. Documents without an id are
    /// skipped.
    pub async fn put(&self, document: &E, ttl: Option<Duration>) -> bool {
        let Some(id) = document.id() else {
            tracing::warn!(kind = E::KIND, "Refusing to cache a document without id");
            return false;
        };
        self.coordinator
            .put(&self.descriptor, id, &KeyParams::new(), document, ttl)
            .await
    }
}
