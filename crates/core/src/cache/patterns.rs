//! Glob matching for cache key patterns.
//!
//! Only `*` is special. Key components are percent-encoded on derivation,
//! so the other Redis glob metacharacters (`?`, `[`, `]`, `\`) never
//! appear unescaped in a derived key. Patterns containing them are
//! rejected by [`validate_pattern`] so every backend sweeps the same keys.

use super::error::{CacheError, Result};

/// Glob metacharacters Redis understands but sweeps do not accept.
pub const UNSUPPORTED_GLOB_CHARS: [char; 4] = ['?', '[', ']', '\\'];

/// Rejects patterns using glob syntax beyond `*`.
///
/// ```
/// use newsagg_core::cache::validate_pattern;
///
/// assert!(validate_pattern("article:last:*").is_ok());
/// assert!(validate_pattern("user:u?").is_err());
/// ```
pub fn validate_pattern(pattern: &str) -> Result<()> {
    if pattern.contains(UNSUPPORTED_GLOB_CHARS) {
        return Err(CacheError::InvalidPattern(pattern.to_string()));
    }
    Ok(())
}

/// Checks if a cache key matches a glob pattern.
///
/// `*` matches any sequence of characters, including the empty one.
///
/// # Examples
///
/// ```
/// use newsagg_core::cache::pattern_matches;
///
/// assert!(pattern_matches("article:a1", "article:a1"));
/// assert!(pattern_matches("article:last:*", "article:last:2:10"));
/// assert!(pattern_matches("interaction:*:article:a1*", "interaction:u1:article:a1:comment:c1"));
/// assert!(!pattern_matches("article:last:*", "article:a1"));
/// ```
pub fn pattern_matches(pattern: &str, key: &str) -> bool {
    let Some((head, rest)) = pattern.split_once('*') else {
        return pattern == key;
    };

    let Some(remaining) = key.strip_prefix(head) else {
        return false;
    };

    // Everything after the last `*` is anchored to the end of the key.
    let (middle, tail) = rest.rsplit_once('*').unwrap_or(("", rest));
    let Some(mut remaining) = remaining.strip_suffix(tail) else {
        return false;
    };

    for segment in middle.split('*').filter(|s| !s.is_empty()) {
        match remaining.find(segment) {
            Some(pos) => remaining = &remaining[pos + segment.len()..],
            None => return false,
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(pattern_matches("article:a1", "article:a1"));
        assert!(!pattern_matches("article:a1", "article:a2"));
        assert!(!pattern_matches("article:a1", "article:a1:summary"));
    }

    #[test]
    fn test_trailing_wildcard() {
        assert!(pattern_matches("article:last:*", "article:last:1:10"));
        assert!(pattern_matches("article:last:*", "article:last:2:10"));
        assert!(pattern_matches("article:last:*", "article:last:"));
        assert!(!pattern_matches("article:last:*", "article:last"));
        assert!(!pattern_matches("article:last:*", "article:all:1:10"));
    }

    #[test]
    fn test_leading_wildcard() {
        assert!(pattern_matches("*:preferences", "user:u1:preferences"));
        assert!(!pattern_matches("*:preferences", "user:u1:preferences:x"));
    }

    #[test]
    fn test_wildcard_in_middle() {
        assert!(pattern_matches(
            "interaction:*:article:a1",
            "interaction:u1:article:a1"
        ));
        assert!(!pattern_matches(
            "interaction:*:article:a1",
            "interaction:u1:article:a2"
        ));
        assert!(!pattern_matches("interaction:*:article:a1", "comment:c1"));
    }

    #[test]
    fn test_multiple_wildcards() {
        assert!(pattern_matches(
            "interaction:*:article:*",
            "interaction:u1:article:a1:comment:c2"
        ));
        assert!(pattern_matches("*:*:*", "a:b:c"));
        assert!(!pattern_matches("*:middle:*", "start:other:end"));
    }

    #[test]
    fn test_adjacent_wildcards_collapse() {
        assert!(pattern_matches("user:**:preferences", "user:u1:preferences"));
        assert!(pattern_matches("**", "anything"));
    }

    #[test]
    fn test_wildcard_only() {
        assert!(pattern_matches("*", "anything"));
        assert!(pattern_matches("*", ""));
    }

    #[test]
    fn test_empty_pattern_and_key() {
        assert!(pattern_matches("", ""));
        assert!(!pattern_matches("", "article:a1"));
        assert!(!pattern_matches("article:*", ""));
    }

    #[test]
    fn test_escaped_components_do_not_act_as_wildcards() {
        // A search term of `*` is stored as `%2A` and must not widen a sweep.
        assert!(!pattern_matches("count:articles:q:%2A", "count:articles:q:rust"));
        assert!(pattern_matches("count:articles:q:%2A", "count:articles:q:%2A"));
    }

    #[test]
    fn test_validate_pattern_rejects_redis_only_globs() {
        for pattern in ["user:u?", "user:[ab]*", "article:a\\*"] {
            assert_eq!(
                validate_pattern(pattern),
                Err(CacheError::InvalidPattern(pattern.to_string()))
            );
        }
        assert_eq!(validate_pattern("*"), Ok(()));
        assert_eq!(validate_pattern("count:articles:q:%3F"), Ok(()));
    }

    #[test]
    fn test_entity_sweeps() {
        let user_sweep = "user:*";
        assert!(pattern_matches(user_sweep, "user:u1"));
        assert!(pattern_matches(user_sweep, "user:u1:preferences"));
        assert!(pattern_matches(user_sweep, "user:all:1:10"));
        assert!(!pattern_matches(user_sweep, "article:a1"));
        assert!(!pattern_matches(user_sweep, "users:u1"));
    }
}
