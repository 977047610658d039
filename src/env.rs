use crate::command::ExitCode;
use crate::config::Config;
use crate::history::History;
use std::env as stdenv;
use std::path::PathBuf;

/// Mutable, session-level state of the shell.
///
/// The environment contains:
/// - `current_dir` / `previous_dir`: the working directory and the one `cd -` returns to.
/// - `prompt`: the string printed before each line.
/// - `history`: accepted lines, for `history` and `!N`.
/// - `last_status`: exit code of the most recent command.
/// - `should_exit`: set by the `exit` built-in; the interactive loop checks it.
///
/// Note: fields are public for simplicity, built-ins update them directly.
#[derive(Debug, Clone)]
pub struct Environment {
    pub current_dir: PathBuf,
    pub previous_dir: Option<PathBuf>,
    pub prompt: String,
    pub history: History,
    pub last_status: ExitCode,
    pub should_exit: bool,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    ///
    /// `current_dir` comes from `std::env::current_dir()`; prompt and history
    /// size come from `config`.
    pub fn new(config: &Config) -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            current_dir,
            previous_dir: None,
            prompt: config.prompt.clone(),
            history: History::with_capacity(config.history_size),
            last_status: 0,
            should_exit: false,
        }
    }

    /// Get the value of a process environment variable.
    pub fn get_var(&self, key: &str) -> Option<String> {
        stdenv::var(key).ok()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}
