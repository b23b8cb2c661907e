//! Cache descriptors of every kind of value the aggregator caches.
//!
//! | Key | Value |
//! |---|---|
//! | `article:{id}` | [`Article`](super::Article) |
//! | `article:last:{page}:{limit}` | latest article summaries |
//! | `article:all:{page}:{limit}` | admin listing with total |
//! | `user:{id}` | [`User`](super::User) |
//! | `user:{id}:preferences` | followed tags |
//! | `user:all:{page}:{limit}` | admin listing with total |
//! | `comment:{id}` | [`Comment`](super::Comment) |
//! | `article-comments:{article}:{page}:{limit}` | comments of an article |
//! | `interaction:{user}:article:{a}[:comment:{c}]` | [`Interaction`](super::Interaction) |
//! | `read-history:{user}:{page}:{limit}` | read interactions of a user |
//! | `interaction-stats:{article}[:comment:{c}]` | flag counts |
//! | `tags:all` | article tag vocabulary |
//! | `top-tags:all:{limit}` | most followed tags |
//! | `dashboard:summary[:after:{t}][:before:{t}]` | per-collection counts |
//! | `top-articles:{since}:{limit}` | most interacted articles |
//! | `count:{collection}[:after:{t}][:before:{t}][:q:{term}]` | search counts |

use crate::cache::{EntityDescriptor, KeyParams, KeySlot, KeyTemplate, TtlPolicy};

/// Entity type names, the first component of every key.
pub mod entity {
    pub const ARTICLE: &str = "article";
    pub const USER: &str = "user";
    pub const COMMENT: &str = "comment";
    pub const ARTICLE_COMMENTS: &str = "article-comments";
    pub const INTERACTION: &str = "interaction";
    pub const READ_HISTORY: &str = "read-history";
    pub const INTERACTION_STATS: &str = "interaction-stats";
    pub const TAGS: &str = "tags";
    pub const TOP_TAGS: &str = "top-tags";
    pub const DASHBOARD: &str = "dashboard";
    pub const TOP_ARTICLES: &str = "top-articles";
    pub const COUNT: &str = "count";
}

/// Identity of the latest-articles listing.
pub const LATEST: &str = "last";
/// Identity of unfiltered listings and vocabularies.
pub const ALL: &str = "all";
/// Identity of the dashboard summary.
pub const SUMMARY: &str = "summary";

const PAGE: KeyTemplate =
    KeyTemplate::new(&[KeySlot::Positional("page"), KeySlot::Positional("limit")]);
const VIEW: KeyTemplate = KeyTemplate::new(&[KeySlot::Positional("view")]);
const TARGET: KeyTemplate =
    KeyTemplate::new(&[KeySlot::Named("article"), KeySlot::Named("comment")]);
const COMMENT_TARGET: KeyTemplate = KeyTemplate::new(&[KeySlot::Named("comment")]);
const LIMIT: KeyTemplate = KeyTemplate::new(&[KeySlot::Positional("limit")]);
const WINDOW: KeyTemplate = KeyTemplate::new(&[KeySlot::Named("after"), KeySlot::Named("before")]);
const SEARCH: KeyTemplate = KeyTemplate::new(&[
    KeySlot::Named("after"),
    KeySlot::Named("before"),
    KeySlot::Named("q"),
]);

/// Every descriptor, with TTLs taken from a [`TtlPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptors {
    pub article: EntityDescriptor,
    pub article_listing: EntityDescriptor,
    pub user: EntityDescriptor,
    pub user_view: EntityDescriptor,
    pub user_listing: EntityDescriptor,
    pub comment: EntityDescriptor,
    pub article_comments: EntityDescriptor,
    pub interaction: EntityDescriptor,
    pub read_history: EntityDescriptor,
    pub interaction_stats: EntityDescriptor,
    pub tags: EntityDescriptor,
    pub top_tags: EntityDescriptor,
    pub dashboard: EntityDescriptor,
    pub top_articles: EntityDescriptor,
    pub count: EntityDescriptor,
}

impl Descriptors {
    pub fn new(policy: &TtlPolicy) -> Self {
        Self {
            article: EntityDescriptor::new(entity::ARTICLE, policy.article),
            article_listing: EntityDescriptor::new(entity::ARTICLE, policy.listing)
                .with_template(PAGE),
            user: EntityDescriptor::new(entity::USER, policy.user),
            user_view: EntityDescriptor::new(entity::USER, policy.user).with_template(VIEW),
            user_listing: EntityDescriptor::new(entity::USER, policy.listing).with_template(PAGE),
            comment: EntityDescriptor::new(entity::COMMENT, policy.comment),
            article_comments: EntityDescriptor::new(entity::ARTICLE_COMMENTS, policy.listing)
                .with_template(PAGE),
            interaction: EntityDescriptor::new(entity::INTERACTION, policy.interaction)
                .with_template(TARGET),
            read_history: EntityDescriptor::new(entity::READ_HISTORY, policy.listing)
                .with_template(PAGE),
            interaction_stats: EntityDescriptor::new(entity::INTERACTION_STATS, policy.aggregate)
                .with_template(COMMENT_TARGET),
            tags: EntityDescriptor::new(entity::TAGS, policy.vocabulary),
            top_tags: EntityDescriptor::new(entity::TOP_TAGS, policy.aggregate)
                .with_template(LIMIT),
            dashboard: EntityDescriptor::new(entity::DASHBOARD, policy.aggregate)
                .with_template(WINDOW),
            top_articles: EntityDescriptor::new(entity::TOP_ARTICLES, policy.aggregate)
                .with_template(LIMIT),
            count: EntityDescriptor::new(entity::COUNT, policy.aggregate).with_template(SEARCH),
        }
    }

    fn all(&self) -> [EntityDescriptor; 15] {
        [
            self.article,
            self.article_listing,
            self.user,
            self.user_view,
            self.user_listing,
            self.comment,
            self.article_comments,
            self.interaction,
            self.read_history,
            self.interaction_stats,
            self.tags,
            self.top_tags,
            self.dashboard,
            self.top_articles,
            self.count,
        ]
    }

    /// Picks the descriptor of `entity_type` whose template declares every
    /// given parameter, falling back to the first one registered for the
    /// type. Used where only the entity type name is known, e.g. the CLI.
    pub fn resolve(&self, entity_type: &str, params: &KeyParams) -> Option<EntityDescriptor> {
        let candidates: Vec<EntityDescriptor> = self
            .all()
            .into_iter()
            .filter(|d| d.entity_type == entity_type)
            .collect();

        let declares_all = |d: &EntityDescriptor| {
            params
                .iter()
                .all(|(name, _)| d.template.slots().iter().any(|s| s.name() == name))
        };

        candidates
            .iter()
            .find(|d| !params.is_empty() && declares_all(*d))
            .or_else(|| candidates.first())
            .copied()
    }
}

impl Default for Descriptors {
    fn default() -> Self {
        Self::new(&TtlPolicy::default())
    }
}
