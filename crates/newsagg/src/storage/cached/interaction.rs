//! Cached interaction repository.

use std::sync::Arc;

use chrono::Utc;

use newsagg_core::cache::{KeyParams, Lookup};
use newsagg_core::news::{Descriptors, Interaction, InteractionStats, InteractionUpdate};
use newsagg_core::storage::{
    Accumulator, Document, DocumentStore, Filter, FindQuery, Page, Pagination, Patch, Pipeline,
    RepositoryError, Result, Sort,
};

use crate::coordinator::{AggregateCache, CacheCoordinator};

/// Per-user interactions behind the cache.
///
/// An interaction is addressed by its target, never by its id:
/// `interaction:{user}:article:{article}[:comment:{comment}]`. A write
/// drops that key, every `read-history:{user}` page and the stats of the
/// target.
pub struct CachedInteractionRepository {
    coordinator: CacheCoordinator,
    aggregates: AggregateCache,
    store: Arc<dyn DocumentStore<Interaction>>,
    descriptors: Descriptors,
}

/// What an interaction points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target<'a> {
    pub user_id: &'a str,
    pub article_id: &'a str,
    pub comment_id: Option<&'a str>,
}

impl<'a> Target<'a> {
    pub fn article(user_id: &'a str, article_id: &'a str) -> Self {
        Self {
            user_id,
            article_id,
            comment_id: None,
        }
    }

    pub fn comment(user_id: &'a str, article_id: &'a str, comment_id: &'a str) -> Self {
        Self {
            user_id,
            article_id,
            comment_id: Some(comment_id),
        }
    }

    fn key_params(&self) -> KeyParams {
        KeyParams::new()
            .with("article", self.article_id)
            .with_opt("comment", self.comment_id)
    }

    fn filter(&self) -> Filter {
        Interaction::target_filter(self.user_id, self.article_id, self.comment_id)
    }

    fn not_found(&self) -> RepositoryError {
        let id = match self.comment_id {
            Some(comment_id) => format!("{}/{}/{}", self.user_id, self.article_id, comment_id),
            None => format!("{}/{}", self.user_id, self.article_id),
        };
        RepositoryError::NotFound {
            entity_type: Interaction::KIND,
            id,
        }
    }
}

impl CachedInteractionRepository {
    pub fn new(
        coordinator: CacheCoordinator,
        store: Arc<dyn DocumentStore<Interaction>>,
        descriptors: Descriptors,
    ) -> Self {
        Self {
            aggregates: AggregateCache::new(coordinator.clone()),
            coordinator,
            store,
            descriptors,
        }
    }

    pub async fn get(&self, target: Target<'_>) -> Result<Lookup<Interaction>> {
        self.coordinator
            .get_or_load(
                &self.descriptors.interaction,
                target.user_id,
                &target.key_params(),
                || self.find(target),
            )
            .await
    }

    /// Interactions the user has read, most recent first.
    pub async fn history(
        &self,
        user_id: &str,
        page: Pagination,
    ) -> Result<Lookup<Page<Interaction>>> {
        self.coordinator
            .get_or_load(
                &self.descriptors.read_history,
                user_id,
                &page.key_params(),
                || async {
                    let filter = Filter::eq("user_id", user_id).and(Filter::exists("read_at"));
                    let query = FindQuery::new(filter.clone())
                        .sorted_by(Sort::desc("read_at"))
                        .paginate(page);
                    let items = self.store.find_many(&query).await?;
                    let total = self.store.count(&filter).await?;
                    Ok::<_, RepositoryError>(Some(Page::new(items, total, page)))
                },
            )
            .await
    }

    /// Flag counts over every interaction with an article, or with one of
    /// its comments. Zero counts are cached too.
    pub async fn stats(
        &self,
        article_id: &str,
        comment_id: Option<&str>,
    ) -> Result<Lookup<InteractionStats>> {
        let params = KeyParams::new().with_opt("comment", comment_id);
        self.aggregates
            .get_or_compute(
                &self.descriptors.interaction_stats,
                article_id,
                &params,
                || async {
                    let pipeline = Pipeline::new()
                        .matching(
                            Filter::eq("article_id", article_id)
                                .and(Filter::eq("comment_id", comment_id)),
                        )
                        .group(
                            None,
                            vec![
                                ("liked", Accumulator::CountTrue("liked".to_string())),
                                ("saved", Accumulator::CountTrue("saved".to_string())),
                                ("shared", Accumulator::CountTrue("shared".to_string())),
                                ("report", Accumulator::CountTrue("report".to_string())),
                            ],
                        );
                    let rows = self.store.aggregate(&pipeline).await?;
                    match rows.into_iter().next() {
                        Some(row) => serde_json::from_value(row)
                            .map_err(|e| RepositoryError::Serialization(e.to_string())),
                        None => Ok(InteractionStats::default()),
                    }
                },
            )
            .await
    }

    /// Marks the target as read now, creating the interaction if the user
    /// never touched it.
    pub async fn record_read(
        &self,
        target: Target<'_>,
        article_title: Option<String>,
    ) -> Result<Interaction> {
        let now = Utc::now();
        let mut patch = Patch::new()
            .set_serialized("read_at", &now)?
            .set_serialized("updated_at", &now)?;
        if let Some(title) = &article_title {
            patch = patch.set("article_title", title.as_str());
        }

        let interaction = self
            .upsert(target, patch, |fresh| {
                fresh.read_at = Some(now);
                fresh.article_title = article_title;
            })
            .await?;

        tracing::debug!(
            user_id = target.user_id,
            article_id = target.article_id,
            "Read recorded"
        );
        Ok(interaction)
    }

    /// Applies the flags of `update`, creating the interaction if needed.
    pub async fn apply(
        &self,
        target: Target<'_>,
        update: InteractionUpdate,
    ) -> Result<Interaction> {
        let patch = update.to_patch(Utc::now())?;
        let interaction = self
            .upsert(target, patch, |fresh| update.apply_to(fresh))
            .await?;

        tracing::debug!(
            user_id = target.user_id,
            article_id = target.article_id,
            comment_id = ?target.comment_id,
            "Interaction updated"
        );
        Ok(interaction)
    }

    pub async fn delete(&self, target: Target<'_>) -> Result<()> {
        let existing = self.find(target).await?.ok_or_else(|| target.not_found())?;
        let Some(id) = existing.id() else {
            return Err(target.not_found());
        };
        if !self.store.delete(id).await? {
            return Err(target.not_found());
        }
        self.invalidate(target).await;

        tracing::debug!(
            user_id = target.user_id,
            article_id = target.article_id,
            "Interaction deleted"
        );
        Ok(())
    }

    async fn find(&self, target: Target<'_>) -> Result<Option<Interaction>> {
        let query = FindQuery::new(target.filter()).with_limit(1);
        Ok(self.store.find_many(&query).await?.into_iter().next())
    }

    async fn upsert(
        &self,
        target: Target<'_>,
        patch: Patch,
        init: impl FnOnce(&mut Interaction),
    ) -> Result<Interaction> {
        let stored = match self.find(target).await?.and_then(|i| i.id) {
            Some(id) => {
                if !self.store.update(&id, &patch).await? {
                    return Err(target.not_found());
                }
                self.store
                    .find_one(&id)
                    .await?
                    .ok_or_else(|| target.not_found())?
            }
            None => {
                let mut fresh = Interaction::new(
                    target.user_id,
                    target.article_id,
                    target.comment_id.map(str::to_string),
                );
                init(&mut fresh);
                let id = self.store.insert(&fresh).await?;
                fresh.set_id(id);
                fresh
            }
        };

        self.invalidate(target).await;
        Ok(stored)
    }

    async fn invalidate(&self, target: Target<'_>) {
        self.coordinator
            .invalidate(
                &self.descriptors.interaction,
                target.user_id,
                Some(&target.key_params()),
            )
            .await;
        self.coordinator
            .invalidate(&self.descriptors.read_history, target.user_id, None)
            .await;
        self.aggregates
            .invalidate(
                &self.descriptors.interaction_stats,
                target.article_id,
                Some(&KeyParams::new().with_opt("comment", target.comment_id)),
            )
            .await;
    }
}
