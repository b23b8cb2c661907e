//! In-memory document store implementation.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use newsagg_core::storage::{
    run_pipeline, run_query, Document, DocumentStore, Filter, FindQuery, Patch, Pipeline,
    RepositoryError, Result,
};

#[derive(Debug, Clone)]
struct Stored {
    /// Insertion order, used when a query has no sort.
    seq: u64,
    doc: Value,
}

/// One collection of `E` documents held in memory.
///
/// Ids are generated as UUIDs unless the inserted document already
/// carries one. Clones share the same collection.
pub struct InMemoryStore<E> {
    docs: Arc<RwLock<HashMap<String, Stored>>>,
    next_seq: Arc<AtomicU64>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for InMemoryStore<E> {
    fn clone(&self) -> Self {
        Self {
            docs: Arc::clone(&self.docs),
            next_seq: Arc::clone(&self.next_seq),
            _entity: PhantomData,
        }
    }
}

impl<E: Document> Default for InMemoryStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Document> InMemoryStore<E> {
    /// Creates a new empty collection.
    pub fn new() -> Self {
        Self {
            docs: Arc::new(RwLock::new(HashMap::new())),
            next_seq: Arc::new(AtomicU64::new(0)),
            _entity: PhantomData,
        }
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Documents in insertion order.
    async fn snapshot(&self) -> Vec<Value> {
        let docs = self.docs.read().await;
        let mut stored: Vec<&Stored> = docs.values().collect();
        stored.sort_by_key(|s| s.seq);
        stored.into_iter().map(|s| s.doc.clone()).collect()
    }
}

fn to_document<E: Document>(value: &E) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

fn from_document<E: Document>(value: Value) -> Result<E> {
    serde_json::from_value(value).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

#[async_trait]
impl<E: Document> DocumentStore<E> for InMemoryStore<E> {
    async fn find_one(&self, id: &str) -> Result<Option<E>> {
        let docs = self.docs.read().await;
        docs.get(id)
            .map(|stored| from_document(stored.doc.clone()))
            .transpose()
    }

    async fn find_many(&self, query: &FindQuery) -> Result<Vec<E>> {
        run_query(self.snapshot().await, query)
            .into_iter()
            .map(from_document)
            .collect()
    }

    async fn count(&self, filter: &Filter) -> Result<u64> {
        let docs = self.docs.read().await;
        let matched = docs.values().filter(|s| filter.matches(&s.doc)).count();
        Ok(matched as u64)
    }

    async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<Value>> {
        Ok(run_pipeline(self.snapshot().await, pipeline))
    }

    async fn insert(&self, document: &E) -> Result<String> {
        let mut document = document.clone();
        let id = match document.id() {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        document.set_id(id.clone());
        let doc = to_document(&document)?;

        let mut docs = self.docs.write().await;
        if docs.contains_key(&id) {
            return Err(RepositoryError::AlreadyExists {
                entity_type: E::KIND,
                id,
            });
        }
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        docs.insert(id.clone(), Stored { seq, doc });
        Ok(id)
    }

    async fn update(&self, id: &str, patch: &Patch) -> Result<bool> {
        let mut docs = self.docs.write().await;
        let Some(stored) = docs.get_mut(id) else {
            return Ok(false);
        };

        let mut updated = stored.doc.clone();
        patch.apply(&mut updated)?;
        // reject patches that would leave an unreadable document behind
        from_document::<E>(updated.clone())?;
        stored.doc = updated;
        Ok(true)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut docs = self.docs.write().await;
        Ok(docs.remove(id).is_some())
    }
}
