//! Asset selection by shell-style glob patterns.
//!
//! An asset is selected when **any** pattern matches its full name (`*`,
//! `?` and `[...]` classes, case-sensitive).  The result keeps the order the
//! source listed the assets in, never the order of the patterns.
//!
//! An empty pattern list selects nothing.  The engine treats that case as
//! "filters not configured" and skips the feed before ever calling in here.

use glob::Pattern;
use tracing::warn;

use crate::error::AdminError;

/// A compiled set of asset patterns.
#[derive(Debug, Clone, Default)]
pub struct AssetFilter {
    patterns: Vec<Pattern>,
}

impl AssetFilter {
    /// Compile `patterns`.  Blank entries are dropped; invalid ones are
    /// logged and dropped, so they can never match.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let patterns = patterns
            .iter()
            .map(|p| p.as_ref().trim())
            .filter(|p| !p.is_empty())
            .filter_map(|p| match Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!(pattern = p, error = %e, "ignoring invalid asset pattern");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(name))
    }
}

/// Subset of `asset_names` matched by any of `patterns`, in source order.
pub fn select_matching<'a, S: AsRef<str>>(patterns: &[S], asset_names: &[&'a str]) -> Vec<&'a str> {
    let filter = AssetFilter::new(patterns);
    asset_names
        .iter()
        .copied()
        .filter(|name| filter.matches(name))
        .collect()
}

/// Check administrator-entered patterns, returning them trimmed.
pub fn validate_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<String>, AdminError> {
    patterns
        .iter()
        .map(|p| p.as_ref().trim())
        .filter(|p| !p.is_empty())
        .map(|p| {
            Pattern::new(p)
                .map(|_| p.to_string())
                .map_err(|e| AdminError::InvalidPattern {
                    pattern: p.to_string(),
                    reason: e.msg.to_string(),
                })
        })
        .collect()
}

/// A pattern matching exactly `name`, with glob metacharacters escaped.
pub fn literal_pattern(name: &str) -> String {
    Pattern::escape(name)
}
