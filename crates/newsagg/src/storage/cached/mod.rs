//! Cached repositories.
//!
//! Each repository applies the cache coordinator to one kind of document:
//!
//! - **Reads**: cache first; on a miss load from the store and populate
//! - **Writes**: persist to the store, then synchronously invalidate the
//!   document's own keys and every listing it can appear in
//!
//! Aggregates (dashboard counts, tag rollups, interaction stats) are not
//! invalidated by writes; they expire with their TTL.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! let coordinator = CacheCoordinator::new(Arc::new(MemoryCache::new(10_000)));
//! let articles = CachedArticleRepository::new(coordinator, stores.articles, Descriptors::default());
//!
//! let lookup = articles.get("a1").await?;
//! ```

mod article;
mod comment;
mod dashboard;
mod interaction;
mod user;

pub use article::CachedArticleRepository;
pub use comment::CachedCommentRepository;
pub use dashboard::CachedDashboardRepository;
pub use interaction::{CachedInteractionRepository, Target};
pub use user::CachedUserRepository;
