//! Cached dashboard aggregates.
//!
//! Counts and rollups are keyed by the full query shape that produced them
//! and expire with their TTL. Entity writes never touch them;
//! [`CachedDashboardRepository::refresh_all`] sweeps them on demand.

use chrono::{DateTime, Utc};
use serde_json::Value;

use newsagg_core::cache::{KeyParams, Lookup};
use newsagg_core::news::{DashboardSummary, Descriptors, TagCount, TopArticle, ALL, SUMMARY};
use newsagg_core::storage::{
    key_timestamp, Accumulator, DateWindow, Filter, Pipeline, RepositoryError, Result, Sort,
};

use crate::coordinator::{AggregateCache, CacheCoordinator};
use crate::storage::Stores;

/// Collection name used as the identity of search counts.
const ARTICLES: &str = "articles";

pub struct CachedDashboardRepository {
    aggregates: AggregateCache,
    stores: Stores,
    descriptors: Descriptors,
}

impl CachedDashboardRepository {
    pub fn new(coordinator: CacheCoordinator, stores: Stores, descriptors: Descriptors) -> Self {
        Self {
            aggregates: AggregateCache::new(coordinator),
            stores,
            descriptors,
        }
    }

    /// Documents created in `window`, per collection.
    pub async fn summary(&self, window: DateWindow) -> Result<Lookup<DashboardSummary>> {
        self.aggregates
            .get_or_compute(
                &self.descriptors.dashboard,
                SUMMARY,
                &window.key_params(),
                || async {
                    let stores = &self.stores;
                    let published = window.filter("published_at");
                    let created = window.filter("created_at");
                    let updated = window.filter("updated_at");
                    let (articles, users, comments, interactions) = tokio::try_join!(
                        stores.articles.count(&published),
                        stores.users.count(&created),
                        stores.comments.count(&created),
                        stores.interactions.count(&updated),
                    )?;
                    Ok(DashboardSummary {
                        articles,
                        users,
                        comments,
                        interactions,
                    })
                },
            )
            .await
    }

    /// Articles published in `window` whose title contains `term`.
    pub async fn search_count(&self, window: DateWindow, term: &str) -> Result<Lookup<u64>> {
        let params = window.key_params().with("q", term);
        self.aggregates
            .get_or_compute(&self.descriptors.count, ARTICLES, &params, || async {
                let filter = window.filter("published_at").and(Filter::text("title", term));
                self.stores.articles.count(&filter).await
            })
            .await
    }

    /// Every tag used by an article, alphabetically.
    pub async fn tags(&self) -> Result<Lookup<Vec<String>>> {
        self.aggregates
            .get_or_compute(&self.descriptors.tags, ALL, &KeyParams::new(), || async {
                let pipeline = Pipeline::new()
                    .unwind("tags")
                    .count_by("tags")
                    .sort(vec![Sort::asc("_id")]);
                let rows = self.stores.articles.aggregate(&pipeline).await?;
                Ok(tag_counts(rows).into_iter().map(|t| t.tag).collect())
            })
            .await
    }

    /// Tags followed by the most users.
    pub async fn top_tags(&self, limit: u64) -> Result<Lookup<Vec<TagCount>>> {
        let params = KeyParams::new().with("limit", limit);
        self.aggregates
            .get_or_compute(&self.descriptors.top_tags, ALL, &params, || async {
                let pipeline = Pipeline::new()
                    .unwind("preferences")
                    .count_by("preferences")
                    .sort(vec![Sort::desc("count"), Sort::asc("_id")])
                    .limit(limit);
                let rows = self.stores.users.aggregate(&pipeline).await?;
                Ok(tag_counts(rows))
            })
            .await
    }

    /// Articles with the most interactions updated since `since`, or ever.
    pub async fn top_articles(
        &self,
        since: Option<DateTime<Utc>>,
        limit: u64,
    ) -> Result<Lookup<Vec<TopArticle>>> {
        let identity = since
            .as_ref()
            .map(key_timestamp)
            .unwrap_or_else(|| ALL.to_string());
        let params = KeyParams::new().with("limit", limit);

        self.aggregates
            .get_or_compute(&self.descriptors.top_articles, &identity, &params, || async {
                let window = since.map(DateWindow::since).unwrap_or_default();
                let pipeline = Pipeline::new()
                    .matching(window.filter("updated_at"))
                    .group(
                        Some("article_id"),
                        vec![
                            ("read_count", Accumulator::CountPresent("read_at".to_string())),
                            ("like_count", Accumulator::CountTrue("liked".to_string())),
                            ("save_count", Accumulator::CountTrue("saved".to_string())),
                            ("share_count", Accumulator::CountTrue("shared".to_string())),
                        ],
                    )
                    .add_sum(
                        "total_interactions",
                        &["read_count", "like_count", "save_count", "share_count"],
                    )
                    .sort(vec![Sort::desc("total_interactions"), Sort::asc("_id")])
                    .limit(limit);
                let rows = self.stores.interactions.aggregate(&pipeline).await?;

                let mut top = Vec::with_capacity(rows.len());
                for row in rows {
                    let mut article = top_article(row)?;
                    article.title = self
                        .stores
                        .articles
                        .find_one(&article.article_id)
                        .await?
                        .map(|a| a.title);
                    top.push(article);
                }
                Ok(top)
            })
            .await
    }

    /// Sweeps every cached aggregate.
    pub async fn refresh_all(&self) {
        let d = &self.descriptors;
        for descriptor in [d.dashboard, d.count, d.tags, d.top_tags, d.top_articles] {
            self.aggregates.invalidate_all(&descriptor).await;
        }
    }
}

fn tag_counts(rows: Vec<Value>) -> Vec<TagCount> {
    rows.into_iter()
        .filter_map(|row| {
            Some(TagCount {
                tag: row.get("_id")?.as_str()?.to_string(),
                count: row.get("count")?.as_u64()?,
            })
        })
        .collect()
}

fn top_article(row: Value) -> Result<TopArticle> {
    let count = |field: &str| row.get(field).and_then(Value::as_u64).unwrap_or(0);
    let article_id = row
        .get("_id")
        .and_then(Value::as_str)
        .ok_or_else(|| RepositoryError::InvalidData(format!("rollup without article id: {row}")))?
        .to_string();

    Ok(TopArticle {
        article_id,
        title: None,
        read_count: count("read_count"),
        like_count: count("like_count"),
        save_count: count("save_count"),
        share_count: count("share_count"),
        total_interactions: count("total_interactions"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::TimeZone;

    use newsagg_core::cache::{Cache, Source};
    use newsagg_core::news::{Article, Comment, Interaction, User};
    use newsagg_core::storage::DocumentStore;

    use crate::cache::MemoryCache;
    use crate::testing::CountingStore;

    struct Fixture {
        repo: CachedDashboardRepository,
        articles: Arc<CountingStore<Article>>,
        users: Arc<CountingStore<User>>,
        interactions: Arc<CountingStore<Interaction>>,
        cache: Arc<MemoryCache>,
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, 12, 0, 0).unwrap()
    }

    fn article(id: &str, title: &str, d: u32, tags: &[&str]) -> Article {
        Article::new(title, format!("https://news.example/{id}"), day(d))
            .with_id(id)
            .with_tags(tags.iter().copied())
    }

    fn interaction(user: &str, article: &str, liked: bool, read: bool) -> Interaction {
        let mut interaction = Interaction::new(user, article, None);
        interaction.liked = liked;
        interaction.read_at = read.then(|| day(5));
        interaction
    }

    async fn setup() -> Fixture {
        let articles = Arc::new(CountingStore::new());
        articles.seed(article("a1", "Rust in production", 1, &["rust", "systems"])).await;
        articles.seed(article("a2", "Caching at scale", 3, &["cache", "rust"])).await;
        articles.seed(article("a3", "Weekend reads", 10, &[])).await;

        let users = Arc::new(CountingStore::new());
        users
            .seed(User::new("Ada", "Lovelace", "ada@example.com").with_preferences(vec![
                "rust".to_string(),
                "cache".to_string(),
            ]))
            .await;
        users
            .seed(User::new("Alan", "Turing", "alan@example.com").with_preferences(vec![
                "rust".to_string(),
            ]))
            .await;

        let comments: Arc<CountingStore<Comment>> = Arc::new(CountingStore::new());
        comments
            .seed(Comment::new("u1", "Ada", "a1", "nice").with_created_at(day(2)))
            .await;

        let interactions = Arc::new(CountingStore::new());
        interactions.seed(interaction("u1", "a1", true, true)).await;
        interactions.seed(interaction("u2", "a1", false, true)).await;
        interactions.seed(interaction("u1", "a2", true, false)).await;

        let cache = Arc::new(MemoryCache::new(100));
        let stores = Stores {
            articles: articles.clone(),
            users: users.clone(),
            comments,
            interactions: interactions.clone(),
        };
        let repo = CachedDashboardRepository::new(
            CacheCoordinator::new(cache.clone()),
            stores,
            Descriptors::default(),
        );
        Fixture {
            repo,
            articles,
            users,
            interactions,
            cache,
        }
    }

    #[tokio::test]
    async fn test_summary_counts_in_window() {
        let f = setup().await;
        let window = DateWindow::new(Some(day(1)), Some(day(5))).unwrap();

        let summary = f.repo.summary(window).await.unwrap();
        assert_eq!(summary.source(), Some(Source::Store));
        let summary = summary.into_option().unwrap();
        assert_eq!(summary.articles, 2);
        assert_eq!(summary.comments, 1);

        let key = "dashboard:summary:after:20240601T120000.000000000Z:before:20240605T120000.000000000Z";
        assert!(f.cache.get(key).await.unwrap().is_some());

        let again = f.repo.summary(window).await.unwrap();
        assert_eq!(again.source(), Some(Source::Cache));
        assert_eq!(f.articles.count_calls(), 1);
    }

    #[tokio::test]
    async fn test_windows_are_cached_separately() {
        let f = setup().await;
        f.repo.summary(DateWindow::unbounded()).await.unwrap();
        f.repo.summary(DateWindow::since(day(2))).await.unwrap();

        assert!(f.cache.get("dashboard:summary").await.unwrap().is_some());
        assert!(f
            .cache
            .get("dashboard:summary:after:20240602T120000.000000000Z")
            .await
            .unwrap()
            .is_some());
        assert_eq!(f.articles.count_calls(), 2);
    }

    #[tokio::test]
    async fn test_sub_second_windows_do_not_share_a_summary() {
        let f = setup().await;
        let published = day(11) + chrono::Duration::milliseconds(500);
        f.articles
            .seed(Article::new("Late edition", "https://news.example/a4", published).with_id("a4"))
            .await;

        let early = DateWindow::since(day(11));
        let late = DateWindow::since(day(11) + chrono::Duration::milliseconds(900));
        let first = f.repo.summary(early).await.unwrap().into_option().unwrap();
        let second = f.repo.summary(late).await.unwrap();

        assert_eq!(first.articles, 1);
        assert_eq!(second.source(), Some(Source::Store));
        assert_eq!(second.into_option().unwrap().articles, 0);
        assert_eq!(f.articles.count_calls(), 2);
    }

    #[tokio::test]
    async fn test_search_count() {
        let f = setup().await;
        let count = f
            .repo
            .search_count(DateWindow::unbounded(), "rust")
            .await
            .unwrap();
        assert_eq!(count.into_option(), Some(1));
        assert!(f.cache.get("count:articles:q:rust").await.unwrap().is_some());

        let none = f
            .repo
            .search_count(DateWindow::unbounded(), "golang")
            .await
            .unwrap();
        assert_eq!(none.into_option(), Some(0));
        let cached = f
            .repo
            .search_count(DateWindow::unbounded(), "golang")
            .await
            .unwrap();
        assert_eq!(cached.source(), Some(Source::Cache));
    }

    #[tokio::test]
    async fn test_tag_vocabulary() {
        let f = setup().await;
        let tags = f.repo.tags().await.unwrap().into_option().unwrap();
        assert_eq!(tags, vec!["cache", "rust", "systems"]);
        assert!(f.cache.get("tags:all").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_top_tags_follow_preferences() {
        let f = setup().await;
        let top = f.repo.top_tags(1).await.unwrap().into_option().unwrap();
        assert_eq!(
            top,
            vec![TagCount {
                tag: "rust".to_string(),
                count: 2
            }]
        );
        assert!(f.cache.get("top-tags:all:1").await.unwrap().is_some());
        f.repo.top_tags(1).await.unwrap();
        assert_eq!(f.users.aggregate_calls(), 1);
    }

    #[tokio::test]
    async fn test_top_articles() {
        let f = setup().await;
        let top = f
            .repo
            .top_articles(None, 10)
            .await
            .unwrap()
            .into_option()
            .unwrap();

        assert_eq!(top.len(), 2);
        assert_eq!(top[0].article_id, "a1");
        assert_eq!(top[0].title.as_deref(), Some("Rust in production"));
        assert_eq!(top[0].read_count, 2);
        assert_eq!(top[0].like_count, 1);
        assert_eq!(top[0].total_interactions, 3);
        assert_eq!(top[1].article_id, "a2");
        assert!(f.cache.get("top-articles:all:10").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_writes_do_not_touch_aggregates_until_refresh() {
        let f = setup().await;
        f.repo.tags().await.unwrap();
        f.repo.top_articles(None, 5).await.unwrap();

        f.articles
            .insert(&article("a4", "Zig", 4, &["zig"]))
            .await
            .unwrap();
        let stale = f.repo.tags().await.unwrap();
        assert_eq!(stale.source(), Some(Source::Cache));
        assert!(!stale.into_option().unwrap().contains(&"zig".to_string()));

        f.repo.refresh_all().await;

        assert!(f.cache.get("top-articles:all:5").await.unwrap().is_none());
        let fresh = f.repo.tags().await.unwrap();
        assert_eq!(fresh.source(), Some(Source::Store));
        assert!(fresh.into_option().unwrap().contains(&"zig".to_string()));
        assert_eq!(f.interactions.aggregate_calls(), 1);
    }
}
