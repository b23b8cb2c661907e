//! Cached comment repository.

use std::sync::Arc;

use chrono::Utc;

use newsagg_core::cache::Lookup;
use newsagg_core::news::{Comment, Descriptors};
use newsagg_core::storage::{
    Document, DocumentStore, Filter, FindQuery, Pagination, Patch, RepositoryError, Result, Sort,
};

use crate::coordinator::{CacheCoordinator, EntityCache};

/// Comments behind the cache: `comment:{id}` and the pages of each
/// article's thread, `article-comments:{article}:{page}:{limit}`.
pub struct CachedCommentRepository {
    comments: EntityCache<Comment>,
    descriptors: Descriptors,
}

impl CachedCommentRepository {
    pub fn new(
        coordinator: CacheCoordinator,
        store: Arc<dyn DocumentStore<Comment>>,
        descriptors: Descriptors,
    ) -> Self {
        Self {
            comments: EntityCache::new(coordinator, store, descriptors.comment),
            descriptors,
        }
    }

    fn store(&self) -> &Arc<dyn DocumentStore<Comment>> {
        self.comments.store()
    }

    pub async fn get(&self, id: &str) -> Result<Lookup<Comment>> {
        self.comments.get_or_load(id).await
    }

    /// Newest first.
    pub async fn for_article(
        &self,
        article_id: &str,
        page: Pagination,
    ) -> Result<Lookup<Vec<Comment>>> {
        self.comments
            .coordinator()
            .get_or_load(
                &self.descriptors.article_comments,
                article_id,
                &page.key_params(),
                || async {
                    let query = FindQuery::new(Filter::eq("article_id", article_id))
                        .sorted_by(Sort::desc("created_at"))
                        .paginate(page);
                    let comments = self.store().find_many(&query).await?;
                    Ok::<_, RepositoryError>(Some(comments))
                },
            )
            .await
    }

    pub async fn create(&self, mut comment: Comment) -> Result<Comment> {
        let id = self.store().insert(&comment).await?;
        comment.set_id(id);
        self.invalidate_thread(&comment.article_id).await;

        tracing::debug!(
            comment_id = ?comment.id,
            article_id = %comment.article_id,
            "Comment created"
        );
        Ok(comment)
    }

    pub async fn update_content(&self, id: &str, content: &str) -> Result<()> {
        let existing = self.existing(id).await?;
        let patch = Patch::new()
            .set("content", content)
            .set_serialized("updated_at", &Utc::now())?;
        if !self.store().update(id, &patch).await? {
            return Err(not_found(id));
        }
        self.comments.invalidate(id).await;
        self.invalidate_thread(&existing.article_id).await;

        tracing::debug!(comment_id = id, "Comment updated");
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let existing = self.existing(id).await?;
        if !self.store().delete(id).await? {
            return Err(not_found(id));
        }
        self.comments.invalidate(id).await;
        self.invalidate_thread(&existing.article_id).await;

        tracing::debug!(comment_id = id, "Comment deleted");
        Ok(())
    }

    /// Reads the stored comment, bypassing the cache, to learn which
    /// thread a write touches.
    async fn existing(&self, id: &str) -> Result<Comment> {
        self.store()
            .find_one(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    async fn invalidate_thread(&self, article_id: &str) {
        self.comments
            .coordinator()
            .invalidate(&self.descriptors.article_comments, article_id, None)
            .await;
    }
}

fn not_found(id: &str) -> RepositoryError {
    RepositoryError::NotFound {
        entity_type: Comment::KIND,
        id: id.to_string(),
    }
}
