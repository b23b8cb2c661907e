//! Read-through cache of computed values: counts, rollups and
//! vocabularies keyed by the full query shape that produced them.
//!
//! Aggregates are not invalidated by entity writes. They expire with their
//! TTL, or are swept explicitly by an administrator.

use std::future::Future;

use serde::{de::DeserializeOwned, Serialize};

use newsagg_core::cache::{EntityDescriptor, InvalidationScope, KeyParams, Lookup};
use newsagg_core::storage::Result;

use super::CacheCoordinator;

#[derive(Clone)]
pub struct AggregateCache {
    coordinator: CacheCoordinator,
}

impl AggregateCache {
    pub fn new(coordinator: CacheCoordinator) -> Self {
        Self { coordinator }
    }

    /// Cached value, else `compute()`'s result cached with the
    /// descriptor's TTL. A computed value is always cached, including an
    /// empty list or a zero count.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        descriptor: &EntityDescriptor,
        identity: &str,
        params: &KeyParams,
        compute: F,
    ) -> Result<Lookup<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.coordinator
            .get_or_load(descriptor, identity, params, || async move {
                compute().await.map(Some)
            })
            .await
    }

    pub async fn invalidate(
        &self,
        descriptor: &EntityDescriptor,
        identity: &str,
        params: Option<&KeyParams>,
    ) {
        self.coordinator
            .invalidate(descriptor, identity, params)
            .await;
    }

    /// Sweeps every cached value of the descriptor's entity type.
    pub async fn invalidate_all(&self, descriptor: &EntityDescriptor) {
        tracing::info!(entity_type = descriptor.entity_type, "Sweeping aggregates");
        self.coordinator
            .invalidate_scope(&InvalidationScope::entity_type(descriptor.entity_type))
            .await;
    }
}
