//! Extraction of `<` and `>` redirections from one command's text.

use crate::lexer;
use crate::parser::ParsingError;

pub const INPUT_MARKER: char = '<';
pub const OUTPUT_MARKER: char = '>';

/// A command's text with its redirections split off.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Redirections {
    /// Program name and arguments, still untokenized.
    pub invocation: String,
    pub input: Option<String>,
    pub output: Option<String>,
}

/// Splits redirections off `text`.
///
/// The text is split at the earlier of the first `<` and first `>`, then the
/// other marker is searched for in the remainder, so both may appear in
/// either order. A target is exactly one blank-delimited token; any tokens
/// after it are handed back as part of the invocation.
pub fn extract(text: &str) -> Result<Redirections, ParsingError> {
    let first_in = text.find(INPUT_MARKER);
    let first_out = text.find(OUTPUT_MARKER);

    let (first, second) = match (first_in, first_out) {
        (None, None) => {
            return Ok(Redirections {
                invocation: text.to_string(),
                ..Redirections::default()
            });
        }
        (Some(at), None) => ((at, INPUT_MARKER), None),
        (None, Some(at)) => ((at, OUTPUT_MARKER), None),
        (Some(i), Some(o)) if i < o => ((i, INPUT_MARKER), Some((o, OUTPUT_MARKER))),
        (Some(i), Some(o)) => ((o, OUTPUT_MARKER), Some((i, INPUT_MARKER))),
    };

    let mut found = Redirections {
        invocation: text[..first.0].to_string(),
        ..Redirections::default()
    };

    let first_tail = match second {
        Some((at, _)) => &text[first.0 + 1..at],
        None => &text[first.0 + 1..],
    };
    take_target(first_tail, first.1, &mut found)?;

    if let Some((at, marker)) = second {
        take_target(&text[at + 1..], marker, &mut found)?;
    }
    Ok(found)
}

fn take_target(tail: &str, marker: char, found: &mut Redirections) -> Result<(), ParsingError> {
    let (target, rest) =
        lexer::split_first_token(tail).ok_or(ParsingError::MissingRedirectTarget { marker })?;
    let markers = [INPUT_MARKER, OUTPUT_MARKER];
    if target.contains(markers) || rest.contains(markers) {
        return Err(ParsingError::UnexpectedRedirect { marker });
    }

    let slot = if marker == INPUT_MARKER {
        &mut found.input
    } else {
        &mut found.output
    };
    *slot = Some(target.to_string());

    let rest = lexer::trim(rest);
    if !rest.is_empty() {
        found.invocation.push(' ');
        found.invocation.push_str(rest);
    }
    Ok(())
}
