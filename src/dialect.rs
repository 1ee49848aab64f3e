//! The dialect under test
//!
//! Spec files annotate expectations per shell (`## OK dash stdout: ...`,
//! `## N-I mksh STDOUT:`). Only annotations whose dialect token names the
//! active dialect are honored; all others are parsed and discarded.
//!
//! A dialect token matches when it is the dialect name, optionally followed by
//! `/word` segments: `dash` and `dash/mksh` match `dash`, while `bash/dash`
//! and `dashx` do not.

use std::fmt;

/// Dialect used when none is configured
pub const DEFAULT_DIALECT: &str = "dash";

/// The active dialect identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    name: String,
}

impl Dialect {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Regex fragment matching a dialect token for this dialect
    pub fn pattern(&self) -> String {
        format!(r"{}(?:/\w+)*", regex::escape(&self.name))
    }

    /// Check whether a whole dialect token (no surrounding spaces) names this dialect
    pub fn matches(&self, token: &str) -> bool {
        let Some(rest) = token.strip_prefix(self.name.as_str()) else {
            return false;
        };
        rest.split('/').skip(1).all(|seg| {
            !seg.is_empty() && seg.chars().all(|c| c.is_alphanumeric() || c == '_')
        }) && (rest.is_empty() || rest.starts_with('/'))
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Self::new(DEFAULT_DIALECT)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
