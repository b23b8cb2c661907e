use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::query::Filter;
use super::DateWindowError;
use crate::cache::KeyParams;

/// Page used when the caller passes a non-positive page.
pub const DEFAULT_PAGE: u64 = 1;
/// Page size used when the caller passes a non-positive limit.
pub const DEFAULT_LIMIT: u64 = 10;

/// Format of timestamps embedded in cache keys. Has no `:` so keys stay
/// readable after escaping. Nanoseconds are always printed: windows that
/// differ below a second must not share a key.
const KEY_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.9fZ";

/// Renders a timestamp the way cache keys embed it.
pub fn key_timestamp(at: &DateTime<Utc>) -> String {
    at.format(KEY_TIMESTAMP_FORMAT).to_string()
}

/// One-based page of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
}

impl Pagination {
    /// Builds a page from raw request values; non-positive values fall back
    /// to page 1 and 10 items.
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: u64::try_from(page).ok().filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE),
            limit: u64::try_from(limit).ok().filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT),
        }
    }

    /// Number of documents to skip before this page.
    pub fn skip(&self) -> u64 {
        self.limit.saturating_mul(self.page.saturating_sub(1))
    }

    /// Key parameters identifying this page (`page`, `limit`).
    pub fn key_params(&self) -> KeyParams {
        KeyParams::new().with("page", self.page).with("limit", self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// One page of a listing, with the number of matches across all pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page,
            limit: pagination.limit,
        }
    }

    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(self.limit.max(1))
    }
}

/// Half-open time window `[after, before)`; either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
}

impl DateWindow {
    /// Creates a window, validating that `after <= before` when both are set.
    pub fn new(
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
    ) -> Result<Self, DateWindowError> {
        if let (Some(after), Some(before)) = (after, before) {
            if after > before {
                return Err(DateWindowError::Inverted);
            }
        }
        Ok(Self { after, before })
    }

    /// A window with no bounds.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Starting at `after`, open-ended.
    pub fn since(after: DateTime<Utc>) -> Self {
        Self {
            after: Some(after),
            before: None,
        }
    }

    /// Filter restricting `field` to this window.
    pub fn filter(&self, field: &str) -> Filter {
        let mut clauses = Vec::new();
        if let Some(after) = self.after {
            clauses.push(Filter::gte(field, after.to_rfc3339()));
        }
        if let Some(before) = self.before {
            clauses.push(Filter::lt(field, before.to_rfc3339()));
        }
        match clauses.len() {
            0 => Filter::All,
            1 => clauses.remove(0),
            _ => Filter::And(clauses),
        }
    }

    /// Key parameters describing this window; open bounds are omitted.
    pub fn key_params(&self) -> KeyParams {
        KeyParams::new()
            .with_opt("after", self.after.as_ref().map(key_timestamp))
            .with_opt("before", self.before.as_ref().map(key_timestamp))
    }
}
