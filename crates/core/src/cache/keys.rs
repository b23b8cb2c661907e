//! Deterministic cache key derivation.
//!
//! A key is `entity_type ":" identity` followed by the slots declared by a
//! [`KeyTemplate`], followed by any remaining parameters as `name:value`
//! pairs in name order. Every component is percent-encoded, so a `:` or a
//! glob metacharacter inside an identity or a parameter value can never
//! produce a collision or an accidental pattern match.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between key components.
pub const SEPARATOR: char = ':';

/// A derived cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wraps an already derived key, e.g. one typed on the command line.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the pattern matching every key nested below this one.
    ///
    /// ```
    /// use newsagg_core::cache::{KeyParams, KeyTemplate};
    ///
    /// let key = KeyTemplate::EMPTY.derive("user", "42", &KeyParams::new());
    /// assert_eq!(key.children_pattern(), "user:42:*");
    /// ```
    pub fn children_pattern(&self) -> String {
        format!("{}{}*", self.0, SEPARATOR)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

/// Disambiguating parameters of a cache key.
///
/// Backed by an ordered map so that the order in which parameters are
/// inserted never influences the derived key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyParams(BTreeMap<String, String>);

impl KeyParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter, consuming and returning `self`.
    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.insert(name, value);
        self
    }

    /// Adds a parameter only when a value is present.
    pub fn with_opt<V: ToString>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with(name, value),
            None => self,
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl ToString) {
        self.0.insert(name.into(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates parameters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for KeyParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

/// A slot in a key template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySlot {
    /// Emits only the value (`article:last:1:10`). A missing value emits an
    /// empty component so that positions stay aligned.
    Positional(&'static str),
    /// Emits `name:value`, or nothing when the parameter is absent.
    Named(&'static str),
}

impl KeySlot {
    pub fn name(&self) -> &'static str {
        match self {
            KeySlot::Positional(name) | KeySlot::Named(name) => name,
        }
    }
}

/// The fixed, documented order in which an entity type's parameters are
/// serialized into its keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyTemplate {
    slots: &'static [KeySlot],
}

impl KeyTemplate {
    /// A template with no declared slots. Parameters, if any, are appended
    /// in name order.
    pub const EMPTY: KeyTemplate = KeyTemplate { slots: &[] };

    pub const fn new(slots: &'static [KeySlot]) -> Self {
        Self { slots }
    }

    pub fn slots(&self) -> &'static [KeySlot] {
        self.slots
    }

    fn declares(&self, name: &str) -> bool {
        self.slots.iter().any(|slot| slot.name() == name)
    }

    /// Derives the cache key for `(entity_type, identity, params)`.
    ///
    /// ```
    /// use newsagg_core::cache::{KeyParams, KeySlot, KeyTemplate};
    ///
    /// const LISTING: KeyTemplate =
    ///     KeyTemplate::new(&[KeySlot::Positional("page"), KeySlot::Positional("limit")]);
    ///
    /// let params = KeyParams::new().with("limit", 10).with("page", 1);
    /// assert_eq!(LISTING.derive("article", "last", &params).as_str(), "article:last:1:10");
    /// ```
    pub fn derive(&self, entity_type: &str, identity: &str, params: &KeyParams) -> CacheKey {
        let mut key = String::with_capacity(entity_type.len() + identity.len() + 16);
        key.push_str(&escape_component(entity_type));
        key.push(SEPARATOR);
        key.push_str(&escape_component(identity));

        for slot in self.slots {
            match *slot {
                KeySlot::Positional(name) => {
                    key.push(SEPARATOR);
                    if let Some(value) = params.get(name) {
                        key.push_str(&escape_component(value));
                    }
                }
                KeySlot::Named(name) => {
                    if let Some(value) = params.get(name) {
                        push_pair(&mut key, name, value);
                    }
                }
            }
        }

        for (name, value) in params.iter().filter(|(name, _)| !self.declares(name)) {
            push_pair(&mut key, name, value);
        }

        CacheKey(key)
    }

    /// Derives the key of an identity without any parameters.
    pub fn base(entity_type: &str, identity: &str) -> CacheKey {
        KeyTemplate::EMPTY.derive(entity_type, identity, &KeyParams::new())
    }
}

fn push_pair(key: &mut String, name: &str, value: &str) {
    key.push(SEPARATOR);
    key.push_str(&escape_component(name));
    key.push(SEPARATOR);
    key.push_str(&escape_component(value));
}

/// Percent-encodes a single key component.
///
/// Alphanumerics and `-_.~` pass through untouched, so UUIDs and plain
/// dates stay readable.
pub fn escape_component(raw: &str) -> Cow<'_, str> {
    urlencoding::encode(raw)
}

/// Returns the pattern sweeping every key of an entity type (`user:*`).
pub fn entity_type_pattern(entity_type: &str) -> String {
    format!("{}{}*", escape_component(entity_type), SEPARATOR)
}

/// Returns the family of a key: its first two components
/// (`entity_type:identity`), or `None` for single-component keys.
///
/// ```
/// use newsagg_core::cache::key_family;
///
/// assert_eq!(key_family("article:last:1:10"), Some("article:last"));
/// assert_eq!(key_family("article:a1"), Some("article:a1"));
/// assert_eq!(key_family("orphan"), None);
/// ```
pub fn key_family(key: &str) -> Option<&str> {
    let first = key.find(SEPARATOR)?;
    let end = key[first + 1..]
        .find(SEPARATOR)
        .map(|pos| first + 1 + pos)
        .unwrap_or(key.len());
    Some(&key[..end])
}

/// Returns the family every key matched by `pattern` belongs to, if the
/// first two components of the pattern are free of wildcards.
///
/// ```
/// use newsagg_core::cache::pattern_family;
///
/// assert_eq!(pattern_family("article:last:*"), Some("article:last"));
/// assert_eq!(pattern_family("user:*"), None);
/// assert_eq!(pattern_family("*:last:*"), None);
/// ```
pub fn pattern_family(pattern: &str) -> Option<&str> {
    let family = key_family(pattern)?;
    if family.contains('*') {
        return None;
    }
    Some(family)
}

/// Returns the entity type of a key: its first component.
///
/// ```
/// use newsagg_core::cache::key_entity_type;
///
/// assert_eq!(key_entity_type("article:last:1:10"), "article");
/// assert_eq!(key_entity_type("orphan"), "orphan");
/// ```
pub fn key_entity_type(key: &str) -> &str {
    key.split_once(SEPARATOR).map_or(key, |(entity_type, _)| entity_type)
}

/// Returns the entity type shared by every key `pattern` can match, or
/// `None` when the first component contains glob syntax.
///
/// ```
/// use newsagg_core::cache::pattern_entity_type;
///
/// assert_eq!(pattern_entity_type("article:last:*"), Some("article"));
/// assert_eq!(pattern_entity_type("user:u1"), Some("user"));
/// assert_eq!(pattern_entity_type("art*"), None);
/// assert_eq!(pattern_entity_type("*:last:*"), None);
/// ```
pub fn pattern_entity_type(pattern: &str) -> Option<&str> {
    let entity_type = key_entity_type(pattern);
    if entity_type.contains(['*', '?', '[', ']', '\\']) {
        return None;
    }
    Some(entity_type)
}
