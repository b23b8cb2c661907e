use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{Document, Filter, Patch, Result};

/// Name and link of an author or publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Byline {
    pub name: String,
    pub url: Option<String>,
}

impl Byline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
        }
    }
}

/// A news article ingested from an external news API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Identifier of the article in the API it was ingested from.
    pub extern_id: Option<String>,
    /// Name of that API.
    pub extern_api: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub author: Option<Byline>,
    pub source: Option<Byline>,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub content: Option<String>,
    pub url: String,
    pub language: Option<String>,
    pub country: Option<String>,
}

impl Article {
    pub fn new(title: impl Into<String>, url: impl Into<String>, published_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            extern_id: None,
            extern_api: None,
            title: title.into(),
            description: None,
            author: None,
            source: None,
            image_url: None,
            published_at,
            tags: Vec::new(),
            content: None,
            url: url.into(),
            language: None,
            country: None,
        }
    }

    /// Sets a specific ID (useful for testing).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_extern(mut self, api: impl Into<String>, id: impl Into<String>) -> Self {
        self.extern_api = Some(api.into());
        self.extern_id = Some(id.into());
        self
    }

    pub fn with_source(mut self, source: Byline) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Matches an already ingested copy of this article: same API, same
    /// external id, same title.
    pub fn duplicate_filter(&self) -> Filter {
        Filter::eq("extern_api", self.extern_api.clone())
            .and(Filter::eq("extern_id", self.extern_id.clone()))
            .and(Filter::eq("title", self.title.clone()))
    }
}

impl Document for Article {
    const COLLECTION: &'static str = "articles";
    const KIND: &'static str = "Article";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

/// The part of an article shown in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub source: Option<String>,
    pub published_at: DateTime<Utc>,
    pub tags: Vec<String>,
}

impl From<&Article> for ArticleSummary {
    fn from(article: &Article) -> Self {
        Self {
            id: article.id.clone(),
            title: article.title.clone(),
            description: article.description.clone(),
            image_url: article.image_url.clone(),
            source: article.source.as_ref().map(|s| s.name.clone()),
            published_at: article.published_at,
            tags: article.tags.clone(),
        }
    }
}

/// Editable fields of an article.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl ArticleUpdate {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn into_patch(self) -> Result<Patch> {
        let mut patch = Patch::new();
        if let Some(title) = self.title {
            patch = patch.set("title", title);
        }
        if let Some(description) = self.description {
            patch = patch.set("description", description);
        }
        if let Some(content) = self.content {
            patch = patch.set("content", content);
        }
        if let Some(image_url) = self.image_url {
            patch = patch.set("image_url", image_url);
        }
        if let Some(tags) = self.tags {
            patch = patch.set_serialized("tags", &tags)?;
        }
        Ok(patch)
    }
}
