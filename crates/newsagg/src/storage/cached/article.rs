//! Cached article repository.

use std::sync::Arc;

use newsagg_core::cache::{KeyParams, Lookup};
use newsagg_core::news::{Article, ArticleSummary, ArticleUpdate, Descriptors, ALL, LATEST};
use newsagg_core::storage::{
    Document, DocumentStore, Filter, FindQuery, Page, Pagination, RepositoryError, Result, Sort,
};

use crate::coordinator::{CacheCoordinator, CacheWarmer, EntityCache, Epoch, WarmBatch};

/// Articles behind the cache.
///
/// | Read | Key |
/// |---|---|
/// | [`get`](Self::get) | `article:{id}` |
/// | [`latest`](Self::latest) | `article:last:{page}:{limit}` |
/// | [`list_page`](Self::list_page) | `article:all:{page}:{limit}` |
///
/// Every write drops `article:{id}`, `article:{id}:*`, `article:last:*` and
/// `article:all:*`.
pub struct CachedArticleRepository {
    articles: EntityCache<Article>,
    descriptors: Descriptors,
    warmer: Option<Arc<CacheWarmer>>,
}

impl CachedArticleRepository {
    pub fn new(
        coordinator: CacheCoordinator,
        store: Arc<dyn DocumentStore<Article>>,
        descriptors: Descriptors,
    ) -> Self {
        Self {
            articles: EntityCache::new(coordinator, store, descriptors.article),
            descriptors,
            warmer: None,
        }
    }

    /// Warms `article:{id}` for every article a listing loads from the store.
    pub fn with_warmer(mut self, warmer: Arc<CacheWarmer>) -> Self {
        self.warmer = Some(warmer);
        self
    }

    fn coordinator(&self) -> &CacheCoordinator {
        self.articles.coordinator()
    }

    fn store(&self) -> &Arc<dyn DocumentStore<Article>> {
        self.articles.store()
    }

    pub async fn get(&self, id: &str) -> Result<Lookup<Article>> {
        self.articles.get_or_load(id).await
    }

    /// Listing view of one article, served from the cached document.
    pub async fn get_summary(&self, id: &str) -> Result<Lookup<ArticleSummary>> {
        Ok(self.get(id).await?.map(|article| ArticleSummary::from(&article)))
    }

    /// Most recently published articles first.
    pub async fn latest(&self, page: Pagination) -> Result<Lookup<Vec<ArticleSummary>>> {
        let epoch = self.coordinator().epoch(self.descriptors.article.entity_type);
        let mut fetched: Option<Vec<Article>> = None;

        let lookup = self
            .coordinator()
            .get_or_load(
                &self.descriptors.article_listing,
                LATEST,
                &page.key_params(),
                || async {
                    let query = FindQuery::default()
                        .sorted_by(Sort::desc("published_at"))
                        .paginate(page);
                    let articles = self.store().find_many(&query).await?;
                    let summaries: Vec<ArticleSummary> =
                        articles.iter().map(ArticleSummary::from).collect();
                    fetched = Some(articles);
                    Ok::<_, RepositoryError>(Some(summaries))
                },
            )
            .await?;

        if let Some(articles) = fetched {
            self.cache_articles(&articles, epoch);
        }
        Ok(lookup)
    }

    /// Admin listing with the total number of articles.
    pub async fn list_page(&self, page: Pagination) -> Result<Lookup<Page<Article>>> {
        self.coordinator()
            .get_or_load(
                &self.descriptors.article_listing,
                ALL,
                &page.key_params(),
                || async {
                    let query = FindQuery::default()
                        .sorted_by(Sort::desc("published_at"))
                        .paginate(page);
                    let items = self.store().find_many(&query).await?;
                    let total = self.store().count(&Filter::All).await?;
                    Ok::<_, RepositoryError>(Some(Page::new(items, total, page)))
                },
            )
            .await
    }

    /// Stores a new article unless a copy ingested from the same API
    /// already exists.
    pub async fn create(&self, mut article: Article) -> Result<Article> {
        if self.store().count(&article.duplicate_filter()).await? > 0 {
            tracing::debug!(title = %article.title, "Article already exists");
            return Err(RepositoryError::AlreadyExists {
                entity_type: Article::KIND,
                id: article.title,
            });
        }

        let id = self.store().insert(&article).await?;
        article.set_id(id);
        self.invalidate_listings().await;

        tracing::debug!(article_id = ?article.id, "Article created");
        Ok(article)
    }

    pub async fn update(&self, id: &str, update: ArticleUpdate) -> Result<()> {
        let patch = update.into_patch()?;
        if !self.store().update(id, &patch).await? {
            return Err(not_found(id));
        }
        self.invalidate_article(id).await;

        tracing::debug!(article_id = id, "Article updated");
        Ok(())
    }

    /// Deletes an article and drops the cached comment pages and stats
    /// attached to it.
    pub async fn delete(&self, id: &str) -> Result<()> {
        if !self.store().delete(id).await? {
            return Err(not_found(id));
        }
        self.invalidate_article(id).await;
        let coordinator = self.coordinator();
        coordinator
            .invalidate(&self.descriptors.article_comments, id, None)
            .await;
        coordinator
            .invalidate(&self.descriptors.interaction_stats, id, None)
            .await;

        tracing::debug!(article_id = id, "Article deleted");
        Ok(())
    }

    /// Queues `article:{id}` writes for documents read from the store
    /// after the article `epoch` was observed. Returns whether the batch was queued.
    pub fn cache_articles(&self, articles: &[Article], epoch: Epoch) -> bool {
        let Some(warmer) = &self.warmer else {
            return false;
        };

        let mut batch = WarmBatch::new("articles", epoch);
        for article in articles {
            if let Some(id) = article.id() {
                batch.push(&self.descriptors.article, id, &KeyParams::new(), article);
            }
        }
        warmer.submit(batch)
    }

    async fn invalidate_article(&self, id: &str) {
        self.articles.invalidate(id).await;
        self.invalidate_listings().await;
    }

    async fn invalidate_listings(&self) {
        for identity in [LATEST, ALL] {
            self.coordinator()
                .invalidate(&self.descriptors.article_listing, identity, None)
                .await;
        }
    }
}

fn not_found(id: &str) -> RepositoryError {
    RepositoryError::NotFound {
        entity_type: Article::KIND,
        id: id.to_string(),
    }
}
