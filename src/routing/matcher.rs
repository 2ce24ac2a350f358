//! Route matching logic.
//!
//! # Responsibilities
//! - Normalize configured path prefixes
//! - Match a request path against a prefix on segment boundaries
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - `/api/v2/auth` matches `/api/v2/auth` and `/api/v2/auth/...`, never `/api/v2/authz`
//! - No regex to guarantee O(n) matching

use thiserror::Error;

/// A configured prefix that cannot be used for routing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrefixError {
    #[error("prefix `{0}` must start with `/`")]
    NotAbsolute(String),
    #[error("prefix `{0}` must not contain a query, fragment or whitespace")]
    InvalidCharacters(String),
}

/// Trim the trailing slash so `/api/v2/auth/` and `/api/v2/auth` compare equal.
pub fn normalize_prefix(raw: &str) -> Result<String, PrefixError> {
    if !raw.starts_with('/') {
        return Err(PrefixError::NotAbsolute(raw.to_string()));
    }
    if raw.contains(&['?', '#'][..]) || raw.chars().any(char::is_whitespace) {
        return Err(PrefixError::InvalidCharacters(raw.to_string()));
    }

    let trimmed = raw.trim_end_matches('/');
    if trimmed.is_empty() {
        Ok("/".to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

/// Matches the request path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a matcher from an already normalized prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The prefix this matcher tests for.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Length used to rank competing matches.
    pub fn specificity(&self) -> usize {
        self.prefix.len()
    }

    /// Returns true if `path` equals the prefix or continues it with a new segment.
    pub fn matches(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return path.starts_with('/');
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}
