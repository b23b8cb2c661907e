use std::{env, str::FromStr, time::Duration};

use newsagg_core::cache::TtlPolicy;

use crate::coordinator::WarmerConfig;
use crate::error::ConfigError;

/// Default cache location: the in-process LRU cache.
pub const DEFAULT_CACHE_URL: &str = "memory://";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `memory://` or `redis://host:port` (default: `memory://`)
    pub cache_url: String,
    /// Capacity of the in-process cache (default: 10,000)
    pub cache_max_entries: usize,
    /// Per-kind TTLs
    pub ttl: TtlPolicy,
    /// Background warming tasks (default: 2)
    pub warmer_workers: usize,
    /// Pending warm batches before new ones are dropped (default: 256)
    pub warmer_queue_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CACHE_URL` - cache backend URL (default: `memory://`)
    /// - `CACHE_MAX_ENTRIES` - in-process cache capacity (default: 10,000)
    /// - `ARTICLE_CACHE_TTL_SECONDS` (3600), `USER_CACHE_TTL_SECONDS` (3600),
    ///   `COMMENT_CACHE_TTL_SECONDS` (1800), `INTERACTION_CACHE_TTL_SECONDS` (600),
    ///   `LISTING_CACHE_TTL_SECONDS` (600), `AGGREGATE_CACHE_TTL_SECONDS` (1800),
    ///   `VOCABULARY_CACHE_TTL_SECONDS` (3600)
    /// - `WARMER_WORKERS` - warming tasks (default: 2)
    /// - `WARMER_QUEUE_CAPACITY` - warming queue size (default: 256)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`Config::from_env`] with variables read from `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let number = |name: &str, default: usize| {
            lookup(name)
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(default)
        };
        let seconds = |name: &str, default: Duration| {
            lookup(name)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        let defaults = TtlPolicy::default();
        let warmer = WarmerConfig::default();

        Self {
            cache_url: lookup("CACHE_URL")
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CACHE_URL.to_string()),
            cache_max_entries: number("CACHE_MAX_ENTRIES", 10_000),
            ttl: TtlPolicy {
                article: seconds("ARTICLE_CACHE_TTL_SECONDS", defaults.article),
                user: seconds("USER_CACHE_TTL_SECONDS", defaults.user),
                comment: seconds("COMMENT_CACHE_TTL_SECONDS", defaults.comment),
                interaction: seconds("INTERACTION_CACHE_TTL_SECONDS", defaults.interaction),
                listing: seconds("LISTING_CACHE_TTL_SECONDS", defaults.listing),
                aggregate: seconds("AGGREGATE_CACHE_TTL_SECONDS", defaults.aggregate),
                vocabulary: seconds("VOCABULARY_CACHE_TTL_SECONDS", defaults.vocabulary),
            },
            warmer_workers: number("WARMER_WORKERS", warmer.workers),
            warmer_queue_capacity: number("WARMER_QUEUE_CAPACITY", warmer.queue_capacity),
        }
    }

    /// Backend selected by `cache_url`.
    pub fn cache_backend(&self) -> Result<CacheBackend, ConfigError> {
        self.cache_url.parse()
    }

    pub fn warmer_config(&self) -> WarmerConfig {
        WarmerConfig {
            workers: self.warmer_workers,
            queue_capacity: self.warmer_queue_capacity,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Where cached values live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    /// In-process LRU; nothing is shared between processes.
    Memory,
    /// Shared Redis instance at this URL.
    Redis(String),
}

impl FromStr for CacheBackend {
    type Err = ConfigError;

    fn from_str(url: &str) -> Result<Self, Self::Err> {
        let url = url.trim();
        match url.split_once("://").map(|(scheme, _)| scheme) {
            Some("memory") => Ok(Self::Memory),
            Some("redis" | "rediss") => Ok(Self::Redis(url.to_string())),
            _ => Err(ConfigError::UnsupportedCacheUrl(url.to_string())),
        }
    }
}
