//! Storage backends and cached repositories.
//!
//! - [`inmemory`]: a [`DocumentStore`](newsagg_core::storage::DocumentStore)
//!   over in-process maps, used by tests and local runs.
//! - [`cached`]: per-entity repositories that put the cache coordinator in
//!   front of a store and invalidate on every write.

pub mod cached;
pub mod inmemory;

use std::sync::Arc;

use newsagg_core::news::{Article, Comment, Interaction, User};
use newsagg_core::storage::DocumentStore;

use inmemory::InMemoryStore;

/// One store handle per collection.
#[derive(Clone)]
pub struct Stores {
    pub articles: Arc<dyn DocumentStore<Article>>,
    pub users: Arc<dyn DocumentStore<User>>,
    pub comments: Arc<dyn DocumentStore<Comment>>,
    pub interactions: Arc<dyn DocumentStore<Interaction>>,
}

impl Stores {
    /// Empty in-memory collections.
    pub fn in_memory() -> Self {
        Self {
            articles: Arc::new(InMemoryStore::<Article>::new()),
            users: Arc::new(InMemoryStore::<User>::new()),
            comments: Arc::new(InMemoryStore::<Comment>::new()),
            interactions: Arc::new(InMemoryStore::<Interaction>::new()),
        }
    }
}
