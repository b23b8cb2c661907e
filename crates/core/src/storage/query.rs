//! Composable predicates, sort orders and patches over JSON documents.
//!
//! The coordinator treats these as opaque values handed to a
//! [`DocumentStore`](super::DocumentStore). The evaluation functions here
//! are what the in-memory store runs; a database-backed store translates
//! the same values into its own query language.

use std::cmp::Ordering;

use chrono::DateTime;
use serde::Serialize;
use serde_json::{Map, Value};

use super::types::Pagination;
use super::{RepositoryError, Result};

/// A predicate over a document. Field names may be dotted paths
/// (`account.role`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub enum Filter {
    #[default]
    All,
    Eq(String, Value),
    Ne(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    In(String, Vec<Value>),
    /// Array field contains the value.
    Contains(String, Value),
    /// Field is present and not null.
    Exists(String),
    /// Case-insensitive substring match on a string field.
    Text(String, String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }

    pub fn ne(field: &str, value: impl Into<Value>) -> Self {
        Filter::Ne(field.to_string(), value.into())
    }

    pub fn gte(field: &str, value: impl Into<Value>) -> Self {
        Filter::Gte(field.to_string(), value.into())
    }

    pub fn lt(field: &str, value: impl Into<Value>) -> Self {
        Filter::Lt(field.to_string(), value.into())
    }

    pub fn one_of<V: Into<Value>>(field: &str, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(field.to_string(), values.into_iter().map(Into::into).collect())
    }

    pub fn contains(field: &str, value: impl Into<Value>) -> Self {
        Filter::Contains(field.to_string(), value.into())
    }

    pub fn exists(field: &str) -> Self {
        Filter::Exists(field.to_string())
    }

    pub fn text(field: &str, needle: impl Into<String>) -> Self {
        Filter::Text(field.to_string(), needle.into())
    }

    /// Conjunction, flattening `All` away.
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut clauses), f) => {
                clauses.push(f);
                Filter::And(clauses)
            }
            (f, g) => Filter::And(vec![f, g]),
        }
    }

    /// Evaluates the predicate against a JSON document.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, value) => field_equals(doc, field, value),
            Filter::Ne(field, value) => !field_equals(doc, field, value),
            Filter::Gte(field, value) => matches!(
                lookup(doc, field).and_then(|v| compare_values(v, value)),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Filter::Lt(field, value) => matches!(
                lookup(doc, field).and_then(|v| compare_values(v, value)),
                Some(Ordering::Less)
            ),
            Filter::In(field, values) => values.iter().any(|v| field_equals(doc, field, v)),
            Filter::Contains(field, value) => match lookup(doc, field) {
                Some(Value::Array(items)) => items.iter().any(|item| values_equal(item, value)),
                _ => false,
            },
            Filter::Exists(field) => lookup(doc, field).is_some_and(|v| !v.is_null()),
            Filter::Text(field, needle) => match lookup(doc, field) {
                Some(Value::String(haystack)) => haystack
                    .to_lowercase()
                    .contains(&needle.to_lowercase()),
                _ => false,
            },
            Filter::And(clauses) => clauses.iter().all(|c| c.matches(doc)),
            Filter::Or(clauses) => clauses.iter().any(|c| c.matches(doc)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Ascending,
    Descending,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sort {
    pub field: String,
    pub direction: Direction,
}

impl Sort {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Ascending,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Descending,
        }
    }
}

/// Arguments of `find_many`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FindQuery {
    pub filter: Filter,
    pub sort: Vec<Sort>,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl FindQuery {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn sorted_by(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn paginate(mut self, page: Pagination) -> Self {
        self.skip = page.skip();
        self.limit = Some(page.limit);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Fields to set on an existing document. Dotted paths create nested
/// objects as needed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Patch(Map<String, Value>);

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    /// Sets a field to the JSON form of any serializable value.
    pub fn set_serialized<T: Serialize>(self, field: &str, value: &T) -> Result<Self> {
        let value = serde_json::to_value(value)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        Ok(self.set(field, value))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Applies the patch to a document in place.
    pub fn apply(&self, doc: &mut Value) -> Result<()> {
        for (path, value) in &self.0 {
            let mut target = &mut *doc;
            let mut segments = path.split('.').peekable();
            while let Some(segment) = segments.next() {
                let Value::Object(object) = target else {
                    return Err(RepositoryError::InvalidData(format!(
                        "cannot set `{path}` on a non-object value"
                    )));
                };
                if segments.peek().is_none() {
                    object.insert(segment.to_string(), value.clone());
                    break;
                }
                target = object
                    .entry(segment.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
            }
        }
        Ok(())
    }
}

/// Runs a find query over an in-memory collection of documents.
pub fn run_query(docs: impl IntoIterator<Item = Value>, query: &FindQuery) -> Vec<Value> {
    let mut matched: Vec<Value> = docs
        .into_iter()
        .filter(|doc| query.filter.matches(doc))
        .collect();

    if !query.sort.is_empty() {
        matched.sort_by(|a, b| compare_documents(a, b, &query.sort));
    }

    let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
    let limit = query
        .limit
        .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
        .unwrap_or(usize::MAX);

    matched.into_iter().skip(skip).take(limit).collect()
}

/// Resolves a dotted path inside a document.
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |value, segment| value.get(segment))
}

/// Orders two documents by a list of sort keys. Missing fields sort first.
pub fn compare_documents(a: &Value, b: &Value, sort: &[Sort]) -> Ordering {
    for key in sort {
        let ordering = match (lookup(a, &key.field), lookup(b, &key.field)) {
            (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        let ordering = match key.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Compares two scalar JSON values. RFC 3339 strings compare
/// chronologically; values of different kinds are incomparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => {
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(x), Ok(y)) => Some(x.cmp(&y)),
                _ => Some(x.cmp(y)),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    a == b || compare_values(a, b) == Some(Ordering::Equal)
}

fn field_equals(doc: &Value, field: &str, value: &Value) -> bool {
    match lookup(doc, field) {
        Some(found) => values_equal(found, value),
        None => value.is_null(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn article(title: &str, published_at: &str, tags: &[&str]) -> Value {
        json!({
            "title": title,
            "published_at": published_at,
            "tags": tags,
            "source": { "name": "Wire" },
        })
    }

    #[test]
    fn test_eq_on_nested_field() {
        let doc = article("Old", "2024-06-01T00:00:00Z", &[]);
        assert!(Filter::eq("source.name", "Wire").matches(&doc));
        assert!(!Filter::eq("source.name", "Other").matches(&doc));
        assert!(Filter::ne("source.name", "Other").matches(&doc));
    }

    #[test]
    fn test_missing_field_equals_null() {
        let doc = json!({ "title": "x" });
        assert!(Filter::eq("comment_id", Value::Null).matches(&doc));
        assert!(!Filter::eq("comment_id", "c1").matches(&doc));
    }

    #[test]
    fn test_dates_compare_chronologically() {
        // Same instant, different offsets: lexical order would disagree.
        let doc = json!({ "published_at": "2024-06-01T02:00:00+02:00" });
        assert!(Filter::gte("published_at", "2024-06-01T00:00:00Z").matches(&doc));
        assert!(!Filter::lt("published_at", "2024-06-01T00:00:00Z").matches(&doc));
    }

    #[test]
    fn test_contains_and_in() {
        let doc = article("Old", "2024-06-01T00:00:00Z", &["rust", "cache"]);
        assert!(Filter::contains("tags", "rust").matches(&doc));
        assert!(!Filter::contains("tags", "go").matches(&doc));
        assert!(Filter::one_of("title", ["New", "Old"]).matches(&doc));
    }

    #[test]
    fn test_text_is_case_insensitive() {
        let doc = article("Rust 2024 Edition", "2024-06-01T00:00:00Z", &[]);
        assert!(Filter::text("title", "edition").matches(&doc));
        assert!(!Filter::text("title", "python").matches(&doc));
    }

    #[test]
    fn test_exists() {
        assert!(Filter::exists("read_at").matches(&json!({ "read_at": "2024-06-01T00:00:00Z" })));
        assert!(!Filter::exists("read_at").matches(&json!({ "read_at": null })));
        assert!(!Filter::exists("read_at").matches(&json!({})));
    }

    #[test]
    fn test_and_flattens_all() {
        let filter = Filter::All.and(Filter::eq("a", 1)).and(Filter::eq("b", 2));
        assert_eq!(
            filter,
            Filter::And(vec![Filter::eq("a", 1), Filter::eq("b", 2)])
        );
    }

    #[test]
    fn test_run_query_sorts_skips_and_limits() {
        let docs = vec![
            article("a", "2024-06-01T00:00:00Z", &[]),
            article("b", "2024-06-03T00:00:00Z", &[]),
            article("c", "2024-06-02T00:00:00Z", &[]),
        ];
        let query = FindQuery::new(Filter::All)
            .sorted_by(Sort::desc("published_at"))
            .paginate(Pagination::new(1, 2));
        let titles: Vec<_> = run_query(docs.clone(), &query)
            .iter()
            .map(|d| d["title"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(titles, vec!["b", "c"]);

        let second = FindQuery::new(Filter::All)
            .sorted_by(Sort::desc("published_at"))
            .paginate(Pagination::new(2, 2));
        assert_eq!(run_query(docs, &second).len(), 1);
    }

    #[test]
    fn test_patch_sets_nested_fields() {
        let mut doc = json!({ "title": "Old", "account": { "role": "user" } });
        Patch::new()
            .set("title", "New")
            .set("account.status", "active")
            .apply(&mut doc)
            .unwrap();
        assert_eq!(doc["title"], "New");
        assert_eq!(doc["account"]["role"], "user");
        assert_eq!(doc["account"]["status"], "active");
    }

    #[test]
    fn test_patch_applies_every_field() {
        let mut doc = json!({ "liked": false, "saved": false });
        Patch::new()
            .set("liked", true)
            .set("saved", true)
            .set("time_spent", 42)
            .apply(&mut doc)
            .unwrap();
        assert_eq!(doc, json!({ "liked": true, "saved": true, "time_spent": 42 }));
    }

    #[test]
    fn test_patch_rejects_non_object_target() {
        let mut doc = json!({ "title": "Old" });
        let result = Patch::new().set("title.inner", 1).apply(&mut doc);
        assert!(matches!(result, Err(RepositoryError::InvalidData(_))));
    }
}
