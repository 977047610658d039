use crate::history::HistoryError;
use crate::parser::ParsingError;
use crate::validate::InvalidInput;
use std::collections::TryReserveError;
use std::io;
use thiserror::Error;

/// Everything that can stop a line from running to completion.
///
/// None of these end the session; the interpreter reports them and reads the
/// next line.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("invalid input: {0}")]
    Invalid(#[from] InvalidInput),
    #[error("syntax error: {0}")]
    Syntax(#[from] ParsingError),
    #[error("history: {0}")]
    History(#[from] HistoryError),
    /// A process-control system call failed in the shell itself.
    #[error("{op}: {source}")]
    Sys {
        op: &'static str,
        #[source]
        source: nix::Error,
    },
    #[error("{path}: {source}")]
    Redirect {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("out of memory")]
    Allocation(#[from] TryReserveError),
}

impl ShellError {
    pub(crate) fn sys(op: &'static str) -> impl FnOnce(nix::Error) -> ShellError {
        move |source| ShellError::Sys { op, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::errno::Errno;

    #[test]
    fn messages_name_the_failing_operation() {
        let err = ShellError::sys("fork")(Errno::EAGAIN);
        assert_eq!(err.to_string(), format!("fork: {}", Errno::EAGAIN));

        let err = ShellError::Redirect {
            path: "missing.txt".to_string(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert!(err.to_string().starts_with("missing.txt: "));
    }

    #[test]
    fn component_errors_convert() {
        let err: ShellError = InvalidInput::Empty.into();
        assert!(matches!(err, ShellError::Invalid(InvalidInput::Empty)));
        let err: ShellError = ParsingError::MissingProgram.into();
        assert_eq!(err.to_string(), "syntax error: missing program name");
    }
}
