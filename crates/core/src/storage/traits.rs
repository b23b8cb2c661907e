use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use super::pipeline::Pipeline;
use super::query::{Filter, FindQuery, Patch};
use super::Result;

/// A record owned by the document store.
///
/// Ids are generated by the store on insert; a document that was never
/// stored has none.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection holding documents of this type.
    const COLLECTION: &'static str;
    /// Human readable type name used in errors.
    const KIND: &'static str;

    fn id(&self) -> Option<&str>;

    fn set_id(&mut self, id: String);
}

/// Adapter over one collection of the document store.
///
/// The cache coordinator depends on nothing else: filters are composable
/// predicate values and pipelines are opaque.
#[async_trait]
pub trait DocumentStore<E: Document>: Send + Sync {
    /// Gets a document by its id.
    async fn find_one(&self, id: &str) -> Result<Option<E>>;

    /// Gets the documents matching a filter, sorted and paginated.
    async fn find_many(&self, query: &FindQuery) -> Result<Vec<E>>;

    /// Counts the documents matching a filter.
    async fn count(&self, filter: &Filter) -> Result<u64>;

    /// Runs an aggregation pipeline over the collection.
    async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<serde_json::Value>>;

    /// Inserts a document and returns its store-generated id.
    async fn insert(&self, document: &E) -> Result<String>;

    /// Applies a patch. Returns `false` when no document has this id.
    async fn update(&self, id: &str, patch: &Patch) -> Result<bool>;

    /// Deletes a document. Returns `false` when no document has this id.
    async fn delete(&self, id: &str) -> Result<bool>;
}
