//! Rejection of malformed lines before they reach the parser.

use crate::lexer;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Shortest line the shell will try to run.
pub const MIN_LINE_LENGTH: usize = 2;

static CONSECUTIVE_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[;&|]{2}").expect("separator pattern is valid"));

/// Why a line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidInput {
    /// Nothing but blanks; the user just pressed enter.
    #[error("empty line")]
    Empty,
    #[error("command too short: {len} character(s)")]
    TooShort { len: usize },
    /// Two separator characters next to each other. This also rules out the
    /// unsupported `&&` and `||` operators.
    #[error("consecutive separators at column {position}: '{found}'")]
    ConsecutiveSeparators { position: usize, found: String },
}

/// Checks a raw line.
///
/// Pure: nothing is printed or recorded here.
pub fn validate(line: &str) -> Result<(), InvalidInput> {
    validate_with(line, MIN_LINE_LENGTH)
}

/// Like [`validate`], with a configurable minimum length.
pub fn validate_with(line: &str, min_len: usize) -> Result<(), InvalidInput> {
    let line = lexer::trim(line);
    if line.is_empty() {
        return Err(InvalidInput::Empty);
    }
    let len = line.chars().count();
    if len < min_len {
        return Err(InvalidInput::TooShort { len });
    }
    if let Some(m) = CONSECUTIVE_SEPARATORS.find(line) {
        return Err(InvalidInput::ConsecutiveSeparators {
            position: m.start() + 1,
            found: m.as_str().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_lines() {
        assert_eq!(validate("ls -l"), Ok(()));
        assert_eq!(validate("ls | wc ; date &"), Ok(()));
        assert_eq!(validate("  pwd  "), Ok(()));
    }

    #[test]
    fn blank_line_is_empty() {
        assert_eq!(validate(""), Err(InvalidInput::Empty));
        assert_eq!(validate(" \t "), Err(InvalidInput::Empty));
    }

    #[test]
    fn single_character_is_too_short() {
        assert_eq!(validate(" w "), Err(InvalidInput::TooShort { len: 1 }));
        assert_eq!(validate_with("w", 1), Ok(()));
    }

    #[test]
    fn logical_operators_are_rejected() {
        for line in ["a && b", "a ;; b", "a || b", "a ;| b", "a |& b"] {
            assert!(
                matches!(validate(line), Err(InvalidInput::ConsecutiveSeparators { .. })),
                "{line} should be rejected"
            );
        }
    }

    #[test]
    fn reports_first_offending_pair() {
        assert_eq!(
            validate("ls &| wc"),
            Err(InvalidInput::ConsecutiveSeparators {
                position: 4,
                found: "&|".to_string(),
            })
        );
    }

    #[test]
    fn separated_separators_pass_validation() {
        // Caught later by the parser as a missing command.
        assert_eq!(validate("ls ; ; date"), Ok(()));
    }
}
