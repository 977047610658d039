use crate::command::{CommandSequence, ExitCode};
use crate::config::{Config, DumpStyle};
use crate::engine::{self, Engine};
use crate::env::Environment;
use crate::error::ShellError;
use crate::lexer;
use crate::parser;
use crate::validate::{self, InvalidInput};
use anyhow::Context;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

/// The read, validate, parse and execute loop of the shell.
///
/// The interpreter owns the session [`Environment`] and the [`Engine`] that
/// runs parsed lines. Lines come either from [`Interpreter::repl`] or one at a
/// time through [`Interpreter::run_line`].
///
/// Example
/// ```no_run
/// use smallsh::Interpreter;
/// use smallsh::config::Config;
/// let mut sh = Interpreter::new(Config::default());
/// let code = sh.run_line("echo hello world").unwrap();
/// assert_eq!(code, 0);
/// ```
pub struct Interpreter {
    env: Environment,
    engine: Engine,
    config: Config,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Interpreter {
    pub fn new(config: Config) -> Self {
        Self {
            env: Environment::new(&config),
            engine: Engine::new(),
            config,
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Prepares the process for interactive use: keyboard signals no longer
    /// reach the shell and finished background jobs are reaped as they exit.
    pub fn install_signal_handling(&mut self) -> anyhow::Result<()> {
        engine::ignore_shell_signals().context("failed to ignore keyboard signals")?;
        self.engine
            .install_reaper()
            .context("failed to install SIGCHLD listener")
    }

    /// Runs one raw input line.
    ///
    /// A `!N` line is replaced by history entry `N` and echoed first. A blank
    /// line does nothing and keeps the previous status. Accepted lines are
    /// added to the history before they run.
    pub fn run_line(&mut self, raw: &str) -> Result<ExitCode, ShellError> {
        let line = match self.env.history.recall(raw)? {
            Some(recalled) => {
                println!("{recalled}");
                recalled
            }
            None => raw.to_string(),
        };

        match validate::validate_with(&line, self.config.min_line_length) {
            Ok(()) => {}
            Err(InvalidInput::Empty) => return Ok(self.env.last_status),
            Err(e) => return Err(e.into()),
        }
        self.env.history.push(lexer::trim(&line));

        let sequence = parser::parse(&line)?;
        if let Some(style) = self.config.dump {
            print!("{}", render(&sequence, style));
        }
        let status = self.engine.execute(&sequence, &mut self.env);
        self.engine.reaper().reap();
        Ok(status)
    }

    /// Interactive loop on top of `rustyline`.
    ///
    /// Ctrl-C discards the current line, Ctrl-D ends the session with status
    /// 0. Returns the status the session ends with.
    pub fn repl(&mut self) -> rustyline::Result<ExitCode> {
        let mut rl = DefaultEditor::new()?;

        loop {
            self.engine.reaper().reap();
            match rl.readline(&self.env.prompt) {
                Ok(line) => {
                    if !lexer::trim(&line).is_empty() {
                        let _ = rl.add_history_entry(line.as_str());
                    }
                    if let Err(e) = self.run_line(&line) {
                        eprintln!("smallsh: {e}");
                        self.env.last_status = 1;
                    }
                    if self.env.should_exit {
                        return Ok(self.env.last_status);
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => return Ok(0),
                Err(err) => return Err(err),
            }
        }
    }
}

/// Text printed for `--dump`, one block per command.
fn render(sequence: &CommandSequence, style: DumpStyle) -> String {
    sequence
        .iter()
        .enumerate()
        .map(|(i, command)| match style {
            DumpStyle::Human => format!("{command}\n"),
            DumpStyle::Debug => command.dump(i),
        })
        .collect()
}
