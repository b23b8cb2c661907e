//! Tagged results of a read-through lookup.

use serde::Serialize;

use crate::storage::RepositoryError;

/// Where a found value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cache,
    Store,
}

/// Outcome of a read-through lookup.
///
/// Store failures are not represented here; they travel as
/// `Err(RepositoryError)` around the lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found { value: T, source: Source },
    NotFound,
}

impl<T> Lookup<T> {
    pub fn cached(value: T) -> Self {
        Lookup::Found {
            value,
            source: Source::Cache,
        }
    }

    pub fn loaded(value: T) -> Self {
        Lookup::Found {
            value,
            source: Source::Store,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found { .. })
    }

    pub fn source(&self) -> Option<Source> {
        match self {
            Lookup::Found { source, .. } => Some(*source),
            Lookup::NotFound => None,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Lookup::Found { value, .. } => Some(value),
            Lookup::NotFound => None,
        }
    }

    /// Drops the source tag.
    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Found { value, .. } => Some(value),
            Lookup::NotFound => None,
        }
    }

    /// Maps the found value, keeping its source.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found { value, source } => Lookup::Found {
                value: f(value),
                source,
            },
            Lookup::NotFound => Lookup::NotFound,
        }
    }

    /// Turns `NotFound` into `RepositoryError::NotFound` for callers that
    /// require the value to exist.
    pub fn require(
        self,
        entity_type: &'static str,
        id: impl Into<String>,
    ) -> Result<T, RepositoryError> {
        self.into_option().ok_or_else(|| RepositoryError::NotFound {
            entity_type,
            id: id.into(),
        })
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    /// A value coming straight from the store.
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Lookup::loaded(value),
            None => Lookup::NotFound,
        }
    }
}
