use crate::command::{Command, CommandSequence};
use crate::lexer;
use crate::redirect;
use crate::wildcard::{self, GlobExpansion};
use std::collections::TryReserveError;
use thiserror::Error;

/// Control operator that ends a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// `;`: run the next command after this one finishes.
    Sequential,
    /// `&`: run this command without waiting for it.
    Background,
    /// `|`: connect this command's output to the next command's input.
    Pipe,
}

impl Separator {
    pub const ALL: [Separator; 3] = [Separator::Sequential, Separator::Background, Separator::Pipe];

    pub fn as_char(self) -> char {
        match self {
            Separator::Sequential => ';',
            Separator::Background => '&',
            Separator::Pipe => '|',
        }
    }

}

/// Errors that can occur while turning a line into commands.
#[derive(Debug, Error)]
pub enum ParsingError {
    /// A separator had no command in front of it (`; ls`, `ls | ; x`).
    #[error("missing command before '{separator}'")]
    MissingCommand { separator: char },
    /// The last command of the line has no program name, e.g. `> out.txt`.
    #[error("missing program name")]
    MissingProgram,
    /// `<` or `>` was not followed by a path.
    #[error("missing file name after '{marker}'")]
    MissingRedirectTarget { marker: char },
    /// A redirection marker appeared where a path was expected, or the same
    /// marker was used twice in one command.
    #[error("unexpected redirection after '{marker}'")]
    UnexpectedRedirect { marker: char },
    /// Growing the command list or an argument vector failed.
    #[error("out of memory while parsing")]
    Allocation(#[from] TryReserveError),
}

/// Returns the separator that occurs first in `text`, with its byte offset.
///
/// All three candidates are located and the leftmost wins; position is the
/// only precedence rule.
pub fn lead_separator(text: &str) -> Option<(usize, Separator)> {
    Separator::ALL
        .into_iter()
        .filter_map(|sep| text.find(sep.as_char()).map(|at| (at, sep)))
        .min_by_key(|&(at, _)| at)
}

/// Builds one [`Command`] from the text between two separators.
///
/// Redirections are split off first, the rest is tokenized, and every
/// argument after the program name that carries a wildcard is replaced by
/// the paths it matches (or kept literally when nothing matches). Empty text
/// yields a command whose only argument is the empty string.
pub fn build_command(text: &str) -> Result<Command, ParsingError> {
    let found = redirect::extract(lexer::trim(text))?;
    let mut tokens = lexer::tokenize(&found.invocation);

    let mut argv = Vec::new();
    argv.try_reserve(1)?;
    argv.push(tokens.next().unwrap_or_default().to_string());

    for token in tokens {
        if wildcard::has_wildcard(token) {
            let expansion = GlobExpansion::expand(token);
            argv.try_reserve(expansion.len().max(1))?;
            argv.extend(expansion.into_args(token));
        } else {
            argv.try_reserve(1)?;
            argv.push(token.to_string());
        }
    }

    Ok(Command {
        argv,
        redirect_in: found.input,
        redirect_out: found.output,
        ..Command::default()
    })
}

/// Accumulates the commands of one parse call.
///
/// A fresh builder is created for every line, so indices used in `pipe_to`
/// always refer to positions in the sequence being built.
#[derive(Debug, Default)]
struct SequenceBuilder {
    commands: Vec<Command>,
}

impl SequenceBuilder {
    fn push(&mut self, mut command: Command, ended_by: Option<Separator>) -> Result<(), ParsingError> {
        if command.is_empty() {
            return Err(match ended_by {
                Some(sep) => ParsingError::MissingCommand { separator: sep.as_char() },
                None => ParsingError::MissingProgram,
            });
        }
        match ended_by {
            Some(Separator::Sequential) => command.sequential = true,
            Some(Separator::Background) => command.background = true,
            // 1-based index of the command that follows this one.
            Some(Separator::Pipe) => command.pipe_to = Some(self.commands.len() + 2),
            None => {}
        }
        self.commands.try_reserve(1)?;
        self.commands.push(command);
        Ok(())
    }

    fn finish(self) -> CommandSequence {
        CommandSequence::from_commands(self.commands)
    }
}

/// Parses a whole input line into an ordered [`CommandSequence`].
///
/// The line is consumed left to right: find the leftmost separator, build a
/// command from the text before it, tag the command with the separator's
/// meaning and continue after it. A trailing separator produces no extra
/// command; its flag stays on the last command.
///
/// # Arguments
///
/// * `line` - One validated input line, without the trailing newline.
///
/// # Returns
///
/// * `Result<CommandSequence, ParsingError>` - The commands in execution
///   order, or the first syntax problem found.
pub fn parse(line: &str) -> Result<CommandSequence, ParsingError> {
    let mut builder = SequenceBuilder::default();
    let mut rest = lexer::trim(line);

    loop {
        match lead_separator(rest) {
            None => {
                builder.push(build_command(rest)?, None)?;
                break;
            }
            Some((at, separator)) => {
                builder.push(build_command(&rest[..at])?, Some(separator))?;
                rest = lexer::trim(&rest[at + 1..]);
                if rest.is_empty() {
                    break;
                }
            }
        }
    }

    Ok(builder.finish())
}
