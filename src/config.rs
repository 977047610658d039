//! Command-line options of the `smallsh` binary and the resulting settings.

use argh::FromArgs;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_PROMPT: &str = "% ";
pub const LOG_ENV: &str = "SMALLSH_LOG";

/// How parsed commands are printed before they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpStyle {
    /// One readable paragraph per command.
    Human,
    /// Field-by-field structural dump.
    Debug,
}

impl FromStr for DumpStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "human" => Ok(DumpStyle::Human),
            "debug" => Ok(DumpStyle::Debug),
            other => Err(format!("unknown dump style '{other}', expected 'human' or 'debug'")),
        }
    }
}

impl fmt::Display for DumpStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DumpStyle::Human => "human",
            DumpStyle::Debug => "debug",
        })
    }
}

#[derive(FromArgs, Debug)]
/// A small Unix command shell with pipelines, background jobs and redirection.
pub struct ShellArgs {
    #[argh(option, default = "String::from(DEFAULT_PROMPT)")]
    /// prompt printed before each line
    pub prompt: String,

    #[argh(option, default = "crate::history::DEFAULT_CAPACITY")]
    /// number of lines kept for `history` and `!N`
    pub history_size: usize,

    #[argh(option)]
    /// print each parsed command before running it: human or debug
    pub dump: Option<DumpStyle>,

    #[argh(option, short = 'c')]
    /// run a single line and exit with its status
    pub command: Option<String>,

    #[argh(switch, short = 'v')]
    /// log dispatch details to stderr
    pub verbose: bool,
}

/// Settings the interpreter runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub prompt: String,
    pub history_size: usize,
    pub min_line_length: usize,
    pub dump: Option<DumpStyle>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            history_size: crate::history::DEFAULT_CAPACITY,
            min_line_length: crate::validate::MIN_LINE_LENGTH,
            dump: None,
        }
    }
}

impl From<&ShellArgs> for Config {
    fn from(args: &ShellArgs) -> Self {
        Self {
            prompt: args.prompt.clone(),
            history_size: args.history_size,
            dump: args.dump,
            ..Config::default()
        }
    }
}

impl ShellArgs {
    /// Default `tracing` filter when `SMALLSH_LOG` is not set.
    pub fn default_log_filter(&self) -> &'static str {
        if self.verbose { "smallsh=debug" } else { "smallsh=info" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_classic_shell() {
        let args = ShellArgs::from_args(&["smallsh"], &[]).unwrap();
        let config = Config::from(&args);
        assert_eq!(config, Config::default());
        assert_eq!(config.prompt, "% ");
        assert_eq!(config.history_size, 100);
        assert_eq!(config.min_line_length, 2);
        assert_eq!(args.command, None);
        assert_eq!(args.default_log_filter(), "smallsh=info");
    }

    #[test]
    fn options_override_defaults() {
        let args = ShellArgs::from_args(
            &["smallsh"],
            &["--prompt", "$ ", "--history-size", "5", "--dump", "debug", "-c", "ls", "-v"],
        )
        .unwrap();
        let config = Config::from(&args);
        assert_eq!(config.prompt, "$ ");
        assert_eq!(config.history_size, 5);
        assert_eq!(config.dump, Some(DumpStyle::Debug));
        assert_eq!(args.command.as_deref(), Some("ls"));
        assert_eq!(args.default_log_filter(), "smallsh=debug");
    }

    #[test]
    fn unknown_dump_style_is_rejected() {
        assert!(ShellArgs::from_args(&["smallsh"], &["--dump", "xml"]).is_err());
        assert_eq!("human".parse::<DumpStyle>(), Ok(DumpStyle::Human));
    }
}
