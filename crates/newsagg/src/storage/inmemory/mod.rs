//! In-memory storage backend for testing.
//!
//! Implements [`newsagg_core::storage::DocumentStore`] over a `HashMap` of
//! JSON documents wrapped in `Arc<RwLock<_>>`. Filters, sorts, pipelines
//! and patches are evaluated by the pure functions of
//! `newsagg_core::storage`. Nothing is persisted.
//!
//! # Example
//!
//! ```rust,ignore
//! use newsagg::storage::inmemory::InMemoryStore;
//! use newsagg_core::news::Article;
//!
//! let articles = InMemoryStore::<Article>::new();
//! let id = articles.insert(&article).await?;
//! ```

mod store;

pub use store::InMemoryStore;
