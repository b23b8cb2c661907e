//! Shared application state: one cache coordinator, one warmer and a
//! cached repository per collection.

use std::sync::Arc;

use anyhow::Context;

use newsagg_core::cache::Cache;
use newsagg_core::news::Descriptors;

use crate::cache::MemoryCache;
#[cfg(feature = "redis")]
use crate::cache::RedisCache;
use crate::config::{CacheBackend, Config};
use crate::coordinator::{CacheCoordinator, CacheWarmer};
#[cfg(not(feature = "redis"))]
use crate::error::ConfigError;
use crate::storage::cached::{
    CachedArticleRepository, CachedCommentRepository, CachedDashboardRepository,
    CachedInteractionRepository, CachedUserRepository,
};
use crate::storage::Stores;

/// Cloned into every consumer; clones share the cache, the invalidation
/// epoch and the warmer.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: CacheCoordinator,
    pub descriptors: Descriptors,
    pub warmer: Arc<CacheWarmer>,
    pub articles: Arc<CachedArticleRepository>,
    pub users: Arc<CachedUserRepository>,
    pub comments: Arc<CachedCommentRepository>,
    pub interactions: Arc<CachedInteractionRepository>,
    pub dashboard: Arc<CachedDashboardRepository>,
}

impl AppState {
    /// Connects the configured cache backend and wires the repositories
    /// over `stores`.
    pub async fn new(config: &Config, stores: Stores) -> anyhow::Result<Self> {
        let cache = connect_cache(config).await?;
        Ok(Self::build(cache, config, stores))
    }

    /// Wires the repositories over an already connected cache.
    pub fn build(cache: Arc<dyn Cache>, config: &Config, stores: Stores) -> Self {
        let coordinator = CacheCoordinator::new(cache);
        let descriptors = Descriptors::new(&config.ttl);
        let warmer = Arc::new(CacheWarmer::start(
            coordinator.clone(),
            config.warmer_config(),
        ));

        let articles = CachedArticleRepository::new(
            coordinator.clone(),
            stores.articles.clone(),
            descriptors,
        )
        .with_warmer(warmer.clone());
        let users =
            CachedUserRepository::new(coordinator.clone(), stores.users.clone(), descriptors);
        let comments =
            CachedCommentRepository::new(coordinator.clone(), stores.comments.clone(), descriptors);
        let interactions = CachedInteractionRepository::new(
            coordinator.clone(),
            stores.interactions.clone(),
            descriptors,
        );
        let dashboard = CachedDashboardRepository::new(coordinator.clone(), stores, descriptors);

        Self {
            coordinator,
            descriptors,
            warmer,
            articles: Arc::new(articles),
            users: Arc::new(users),
            comments: Arc::new(comments),
            interactions: Arc::new(interactions),
            dashboard: Arc::new(dashboard),
        }
    }

    /// Writes every queued warm batch, then stops the warmer.
    pub async fn shutdown(&self) {
        self.warmer.shutdown().await;
    }
}

async fn connect_cache(config: &Config) -> anyhow::Result<Arc<dyn Cache>> {
    match config.cache_backend()? {
        CacheBackend::Memory => {
            tracing::info!(max_entries = config.cache_max_entries, "Using in-process cache");
            Ok(Arc::new(MemoryCache::new(config.cache_max_entries)))
        }
        #[cfg(feature = "redis")]
        CacheBackend::Redis(url) => {
            let cache = RedisCache::new(&url)
                .await
                .with_context(|| format!("Failed to connect to the cache at {url}"))?;
            tracing::info!(url = %url, "Using Redis cache");
            Ok(Arc::new(cache))
        }
        #[cfg(not(feature = "redis"))]
        CacheBackend::Redis(url) => Err(ConfigError::RedisDisabled(url)).context("Invalid CACHE_URL"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use newsagg_core::cache::Source;
    use newsagg_core::news::{Article, ArticleUpdate};
    use newsagg_core::storage::Pagination;

    fn memory_config() -> Config {
        let vars: HashMap<&str, &str> = HashMap::from([("CACHE_URL", "memory://")]);
        Config::from_lookup(|name| vars.get(name).map(|v| v.to_string()))
    }

    #[tokio::test]
    async fn test_state_wires_shared_cache() {
        let state = AppState::new(&memory_config(), Stores::in_memory())
            .await
            .unwrap();

        let article = state
            .articles
            .create(Article::new(
                "Hello",
                "https://news.example/hello",
                chrono::Utc::now(),
            ))
            .await
            .unwrap();
        let id = article.id.unwrap();

        assert_eq!(
            state.articles.get(&id).await.unwrap().source(),
            Some(Source::Store)
        );
        assert_eq!(
            state.articles.get(&id).await.unwrap().source(),
            Some(Source::Cache)
        );

        state
            .articles
            .update(&id, ArticleUpdate::title("Hello again"))
            .await
            .unwrap();
        let fresh = state.articles.get(&id).await.unwrap();
        assert_eq!(fresh.source(), Some(Source::Store));
        assert_eq!(fresh.into_option().unwrap().title, "Hello again");

        state.shutdown().await;
    }

    #[tokio::test]
    async fn test_listing_warms_article_keys() {
        let state = AppState::new(&memory_config(), Stores::in_memory())
            .await
            .unwrap();
        let article = state
            .articles
            .create(Article::new("Warm", "https://news.example/warm", chrono::Utc::now()))
            .await
            .unwrap();
        let id = article.id.unwrap();

        state.articles.latest(Pagination::default()).await.unwrap();
        state.shutdown().await;

        assert_eq!(
            state.articles.get(&id).await.unwrap().source(),
            Some(Source::Cache)
        );
    }

    #[tokio::test]
    async fn test_unsupported_cache_url_is_rejected() {
        let vars: HashMap<&str, &str> = HashMap::from([("CACHE_URL", "ftp://cache")]);
        let config = Config::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert!(AppState::new(&config, Stores::in_memory()).await.is_err());
    }
}
