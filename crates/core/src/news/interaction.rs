use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{Document, Filter, Patch, Result};

/// What an interaction targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionLevel {
    #[default]
    Article,
    Comment,
}

/// One user's interaction with an article, or with a comment on it.
///
/// There is at most one interaction per `(user, article, comment)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub level_interaction: InteractionLevel,
    pub user_id: String,
    pub article_id: String,
    pub comment_id: Option<String>,
    pub article_title: Option<String>,
    pub read_at: Option<DateTime<Utc>>,
    /// Seconds spent reading.
    pub time_spent: Option<u64>,
    #[serde(default)]
    pub liked: bool,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub saved: bool,
    #[serde(default)]
    pub report: bool,
    pub updated_at: DateTime<Utc>,
}

impl Interaction {
    pub fn new(
        user_id: impl Into<String>,
        article_id: impl Into<String>,
        comment_id: Option<String>,
    ) -> Self {
        let level_interaction = if comment_id.is_some() {
            InteractionLevel::Comment
        } else {
            InteractionLevel::Article
        };
        Self {
            id: None,
            level_interaction,
            user_id: user_id.into(),
            article_id: article_id.into(),
            comment_id,
            article_title: None,
            read_at: None,
            time_spent: None,
            liked: false,
            shared: false,
            saved: false,
            report: false,
            updated_at: Utc::now(),
        }
    }

    /// Filter selecting the single interaction of a user with a target.
    pub fn target_filter(user_id: &str, article_id: &str, comment_id: Option<&str>) -> Filter {
        Filter::eq("user_id", user_id)
            .and(Filter::eq("article_id", article_id))
            .and(Filter::eq("comment_id", comment_id))
    }
}

impl Document for Interaction {
    const COLLECTION: &'static str = "user-article-interactions";
    const KIND: &'static str = "Interaction";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

/// Flags and reading time a client reports for an interaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionUpdate {
    pub time_spent: Option<u64>,
    pub liked: Option<bool>,
    pub shared: Option<bool>,
    pub saved: Option<bool>,
    pub report: Option<bool>,
}

impl InteractionUpdate {
    pub fn liked(liked: bool) -> Self {
        Self {
            liked: Some(liked),
            ..Self::default()
        }
    }

    /// Applies the update to a document that is about to be inserted.
    pub fn apply_to(&self, interaction: &mut Interaction) {
        if let Some(time_spent) = self.time_spent {
            interaction.time_spent = Some(time_spent);
        }
        if let Some(liked) = self.liked {
            interaction.liked = liked;
        }
        if let Some(shared) = self.shared {
            interaction.shared = shared;
        }
        if let Some(saved) = self.saved {
            interaction.saved = saved;
        }
        if let Some(report) = self.report {
            interaction.report = report;
        }
    }

    /// Patch for a stored interaction; always bumps `updated_at`.
    pub fn to_patch(&self, now: DateTime<Utc>) -> Result<Patch> {
        let mut patch = Patch::new().set_serialized("updated_at", &now)?;
        if let Some(time_spent) = self.time_spent {
            patch = patch.set("time_spent", time_spent);
        }
        if let Some(liked) = self.liked {
            patch = patch.set("liked", liked);
        }
        if let Some(shared) = self.shared {
            patch = patch.set("shared", shared);
        }
        if let Some(saved) = self.saved {
            patch = patch.set("saved", saved);
        }
        if let Some(report) = self.report {
            patch = patch.set("report", report);
        }
        Ok(patch)
    }
}

/// Flag counts over every interaction with an article (or comment).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionStats {
    pub liked: u64,
    pub saved: u64,
    pub shared: u64,
    pub report: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_level_follows_target() {
        assert_eq!(
            Interaction::new("u1", "a1", None).level_interaction,
            InteractionLevel::Article
        );
        assert_eq!(
            Interaction::new("u1", "a1", Some("c1".to_string())).level_interaction,
            InteractionLevel::Comment
        );
    }

    #[test]
    fn test_target_filter_distinguishes_article_and_comment() {
        let on_article = serde_json::to_value(Interaction::new("u1", "a1", None)).unwrap();
        let on_comment =
            serde_json::to_value(Interaction::new("u1", "a1", Some("c1".to_string()))).unwrap();

        let article_filter = Interaction::target_filter("u1", "a1", None);
        assert!(article_filter.matches(&on_article));
        assert!(!article_filter.matches(&on_comment));

        let comment_filter = Interaction::target_filter("u1", "a1", Some("c1"));
        assert!(comment_filter.matches(&on_comment));
    }

    #[test]
    fn test_apply_to_only_touches_given_fields() {
        let mut interaction = Interaction::new("u1", "a1", None);
        interaction.saved = true;
        InteractionUpdate::liked(true).apply_to(&mut interaction);
        assert!(interaction.liked);
        assert!(interaction.saved);
    }

    #[test]
    fn test_to_patch() {
        let now = Utc::now();
        let patch = InteractionUpdate {
            report: Some(true),
            ..InteractionUpdate::default()
        }
        .to_patch(now)
        .unwrap();
        assert_eq!(patch.get("report"), Some(&json!(true)));
        assert!(patch.get("updated_at").is_some());
        assert_eq!(patch.get("liked"), None);
    }
}
