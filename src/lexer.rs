//! Whitespace trimming and tokenization of a single command's text.
//!
//! The shell has no quoting, so a token is simply a maximal run of
//! non-blank characters.

/// Characters that separate tokens inside one command.
pub const BLANKS: &[char] = &[' ', '\t', '\n'];

/// Returns `true` for the characters that delimit tokens.
pub fn is_blank(ch: char) -> bool {
    BLANKS.contains(&ch)
}

/// Trims leading and trailing blanks without copying.
pub fn trim(text: &str) -> &str {
    text.trim_matches(is_blank)
}

/// Splits the text of one command into whitespace-delimited tokens.
///
/// # Arguments
/// * `text` - The invocation text of a single command, separators and
///   redirections already removed.
///
/// # Returns
/// An iterator over non-empty token slices borrowed from `text`.
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(is_blank).filter(|token| !token.is_empty())
}

/// Returns the first token of `text` and everything after it.
///
/// Used to peel a redirection target off the text that follows `<` or `>`.
pub fn split_first_token(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start_matches(is_blank);
    if text.is_empty() {
        return None;
    }
    match text.find(is_blank) {
        Some(end) => Some((&text[..end], &text[end..])),
        None => Some((text, "")),
    }
}
