use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::Document;

/// A comment on an article, optionally replying to another comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    /// Display name of the author at the time of writing.
    pub author: String,
    pub article_id: String,
    /// Parent comment when this is a reply.
    pub comment_fk: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(
        user_id: impl Into<String>,
        author: impl Into<String>,
        article_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            user_id: user_id.into(),
            author: author.into(),
            article_id: article_id.into(),
            comment_fk: None,
            content: content.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets a specific ID (useful for testing).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn replying_to(mut self, parent: impl Into<String>) -> Self {
        self.comment_fk = Some(parent.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = created_at;
        self
    }
}

impl Document for Comment {
    const COLLECTION: &'static str = "comments";
    const KIND: &'static str = "Comment";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}
