//! Filename wildcard expansion for command arguments.

use glob::{MatchOptions, glob_with};

/// Metacharacters that trigger expansion.
pub const WILDCARDS: &[char] = &['*', '?'];

pub fn has_wildcard(token: &str) -> bool {
    token.contains(WILDCARDS)
}

/// Pathnames matched by one wildcard token.
///
/// Each expansion owns its matches and lives only as long as the caller
/// keeps it; nothing is shared between tokens or commands.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct GlobExpansion {
    matches: Vec<String>,
}

impl GlobExpansion {
    /// Expands `pattern` against the filesystem.
    ///
    /// An invalid pattern, unreadable entries and non-matching patterns all
    /// produce an empty expansion.
    pub fn expand(pattern: &str) -> Self {
        let options = MatchOptions {
            require_literal_leading_dot: true,
            ..MatchOptions::new()
        };
        let matches = match glob_with(pattern, options) {
            Ok(paths) => paths
                .filter_map(Result::ok)
                .map(|path| path.to_string_lossy().into_owned())
                .collect(),
            Err(e) => {
                tracing::debug!(pattern, error = %e, "invalid wildcard pattern");
                Vec::new()
            }
        };
        Self { matches }
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// The matched paths, or the literal token when nothing matched.
    pub fn into_args(self, literal: &str) -> Vec<String> {
        if self.matches.is_empty() {
            vec![literal.to_string()]
        } else {
            self.matches
        }
    }
}
