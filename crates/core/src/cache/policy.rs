//! Declarative per-entity cache policy: key template, TTL, and the
//! invalidation scopes derived from them.

use std::fmt;
use std::time::Duration;

use super::keys::{entity_type_pattern, CacheKey, KeyParams, KeyTemplate};

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;

/// Default TTLs per kind of cached value.
///
/// TTL bounds the staleness left behind by a missed invalidation; every
/// mutation path still invalidates explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub article: Duration,
    pub user: Duration,
    pub comment: Duration,
    pub interaction: Duration,
    /// Paginated listings (latest articles, comments of an article, ...).
    pub listing: Duration,
    /// Counts and dashboard rollups.
    pub aggregate: Duration,
    /// Slow-moving vocabularies such as the article tag list.
    pub vocabulary: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            article: Duration::from_secs(HOUR),
            user: Duration::from_secs(HOUR),
            comment: Duration::from_secs(30 * MINUTE),
            interaction: Duration::from_secs(10 * MINUTE),
            listing: Duration::from_secs(10 * MINUTE),
            aggregate: Duration::from_secs(30 * MINUTE),
            vocabulary: Duration::from_secs(HOUR),
        }
    }
}

/// A set of cache keys to drop.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InvalidationScope {
    /// A single key.
    Exact(CacheKey),
    /// Every key matching a glob pattern.
    Prefix(String),
}

impl InvalidationScope {
    /// The key itself plus every key nested below it.
    pub fn family(key: &CacheKey) -> [InvalidationScope; 2] {
        [
            InvalidationScope::Exact(key.clone()),
            InvalidationScope::Prefix(key.children_pattern()),
        ]
    }

    /// Every key of an entity type.
    pub fn entity_type(entity_type: &str) -> InvalidationScope {
        InvalidationScope::Prefix(entity_type_pattern(entity_type))
    }
}

impl fmt::Display for InvalidationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidationScope::Exact(key) => write!(f, "exact({key})"),
            InvalidationScope::Prefix(pattern) => write!(f, "prefix({pattern})"),
        }
    }
}

/// How one kind of cached value is keyed and how long it lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub entity_type: &'static str,
    pub ttl: Duration,
    pub template: KeyTemplate,
}

impl EntityDescriptor {
    pub const fn new(entity_type: &'static str, ttl: Duration) -> Self {
        Self {
            entity_type,
            ttl,
            template: KeyTemplate::EMPTY,
        }
    }

    pub const fn with_template(self, template: KeyTemplate) -> Self {
        Self { template, ..self }
    }

    pub fn with_ttl(self, ttl: Duration) -> Self {
        Self { ttl, ..self }
    }

    pub fn key(&self, identity: &str, params: &KeyParams) -> CacheKey {
        self.template.derive(self.entity_type, identity, params)
    }

    pub fn base_key(&self, identity: &str) -> CacheKey {
        KeyTemplate::base(self.entity_type, identity)
    }

    /// Scopes dropped by `invalidate(entity_type, identity, params?)`.
    ///
    /// With parameters, only the exact variant goes. Without, the base key
    /// and every cached variant of the identity go.
    pub fn invalidation_scopes(
        &self,
        identity: &str,
        params: Option<&KeyParams>,
    ) -> Vec<InvalidationScope> {
        match params {
            Some(params) => vec![InvalidationScope::Exact(self.key(identity, params))],
            None => InvalidationScope::family(&self.base_key(identity)).to_vec(),
        }
    }
}
