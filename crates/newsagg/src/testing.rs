//! Test doubles shared by the unit tests of this crate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use newsagg_core::cache::{Cache, CacheError, Result as CacheResult};
use newsagg_core::storage::{
    Document, DocumentStore, Filter, FindQuery, Patch, Pipeline, RepositoryError, Result,
};

use crate::storage::inmemory::InMemoryStore;

/// In-memory store that counts reads.
pub struct CountingStore<E> {
    inner: InMemoryStore<E>,
    find_one_calls: AtomicUsize,
    find_many_calls: AtomicUsize,
    count_calls: AtomicUsize,
    aggregate_calls: AtomicUsize,
}

impl<E: Document> CountingStore<E> {
    pub fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            find_one_calls: AtomicUsize::new(0),
            find_many_calls: AtomicUsize::new(0),
            count_calls: AtomicUsize::new(0),
            aggregate_calls: AtomicUsize::new(0),
        }
    }

    /// Inserts without touching the counters.
    pub async fn seed(&self, document: E) -> String {
        self.inner.insert(&document).await.unwrap()
    }

    pub fn find_one_calls(&self) -> usize {
        self.find_one_calls.load(Ordering::SeqCst)
    }

    pub fn find_many_calls(&self) -> usize {
        self.find_many_calls.load(Ordering::SeqCst)
    }

    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    pub fn aggregate_calls(&self) -> usize {
        self.aggregate_calls.load(Ordering::SeqCst)
    }

    /// Reads of any kind.
    pub fn reads(&self) -> usize {
        self.find_one_calls() + self.find_many_calls() + self.count_calls() + self.aggregate_calls()
    }
}

#[async_trait]
impl<E: Document> DocumentStore<E> for CountingStore<E> {
    async fn find_one(&self, id: &str) -> Result<Option<E>> {
        self.find_one_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_one(id).await
    }

    async fn find_many(&self, query: &FindQuery) -> Result<Vec<E>> {
        self.find_many_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_many(query).await
    }

    async fn count(&self, filter: &Filter) -> Result<u64> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.count(filter).await
    }

    async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<Value>> {
        self.aggregate_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.aggregate(pipeline).await
    }

    async fn insert(&self, document: &E) -> Result<String> {
        self.inner.insert(document).await
    }

    async fn update(&self, id: &str, patch: &Patch) -> Result<bool> {
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        self.inner.delete(id).await
    }
}

/// Store whose every operation fails as if the database were down.
pub struct FailingStore;

fn unavailable() -> RepositoryError {
    RepositoryError::ConnectionFailed("document store unavailable".to_string())
}

#[async_trait]
impl<E: Document> DocumentStore<E> for FailingStore {
    async fn find_one(&self, _id: &str) -> Result<Option<E>> {
        Err(unavailable())
    }

    async fn find_many(&self, _query: &FindQuery) -> Result<Vec<E>> {
        Err(unavailable())
    }

    async fn count(&self, _filter: &Filter) -> Result<u64> {
        Err(unavailable())
    }

    async fn aggregate(&self, _pipeline: &Pipeline) -> Result<Vec<Value>> {
        Err(unavailable())
    }

    async fn insert(&self, _document: &E) -> Result<String> {
        Err(unavailable())
    }

    async fn update(&self, _id: &str, _patch: &Patch) -> Result<bool> {
        Err(unavailable())
    }

    async fn delete(&self, _id: &str) -> Result<bool> {
        Err(unavailable())
    }
}

/// Cache whose every operation fails as if the server were unreachable.
pub struct FailingCache;

fn refused() -> CacheError {
    CacheError::ConnectionFailed("connection refused".to_string())
}

#[async_trait]
impl Cache for FailingCache {
    async fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
        Err(refused())
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Option<Duration>) -> CacheResult<()> {
        Err(refused())
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        Err(refused())
    }

    async fn delete_pattern(&self, _pattern: &str) -> CacheResult<usize> {
        Err(refused())
    }
}
