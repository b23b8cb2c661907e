use serde::{Deserialize, Serialize};

/// Document counts per collection within a time window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub articles: u64,
    pub users: u64,
    pub comments: u64,
    pub interactions: u64,
}

/// How many users follow a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: u64,
}

/// Interaction rollup of one article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopArticle {
    pub article_id: String,
    pub title: Option<String>,
    pub read_count: u64,
    pub like_count: u64,
    pub save_count: u64,
    pub share_count: u64,
    pub total_interactions: u64,
}
