use crate::command::ExitCode;
use crate::env::Environment;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "pwd" or "cd".
    fn name() -> &'static str;

    /// Executes the command, writing its output to `stdout`.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode>;
}

/// Names resolved to a [`Builtin`] instead of a program on PATH.
pub const BUILTIN_NAMES: [&str; 6] = ["cd", "pwd", "prompt", "help", "exit", "history"];

/// A built-in invocation, resolved once from the command name.
pub enum Builtin {
    Cd(Cd),
    Pwd(Pwd),
    Prompt(Prompt),
    Help(Help),
    Exit(Exit),
    History(ShowHistory),
    /// Arguments did not parse; holds argh's usage or error text.
    Usage(InvalidArgs),
}

pub struct InvalidArgs {
    output: String,
    is_error: bool,
}

fn parse_args<T: BuiltinCommand>(args: &[&str], wrap: fn(T) -> Builtin) -> Builtin {
    match T::from_args(&[T::name()], args) {
        Ok(cmd) => wrap(cmd),
        Err(EarlyExit { output, status }) => Builtin::Usage(InvalidArgs {
            output,
            is_error: status.is_err(),
        }),
    }
}

impl Builtin {
    /// Resolves `name` with its arguments; `None` when it is not a built-in.
    pub fn lookup(name: &str, args: &[String]) -> Option<Builtin> {
        if !BUILTIN_NAMES.contains(&name) {
            return None;
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        Some(match name {
            "cd" => parse_args(&args, Builtin::Cd),
            "pwd" => parse_args(&args, Builtin::Pwd),
            "prompt" => parse_args(&args, Builtin::Prompt),
            "help" => parse_args(&args, Builtin::Help),
            "exit" => parse_args(&args, Builtin::Exit),
            "history" => parse_args(&args, Builtin::History),
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Cd(_) => Cd::name(),
            Builtin::Pwd(_) => Pwd::name(),
            Builtin::Prompt(_) => Prompt::name(),
            Builtin::Help(_) => Help::name(),
            Builtin::Exit(_) => Exit::name(),
            Builtin::History(_) => ShowHistory::name(),
            Builtin::Usage(_) => "usage",
        }
    }

    /// Runs the built-in and reports failures on stderr.
    pub fn run(self, stdout: &mut dyn Write, env: &mut Environment) -> ExitCode {
        self.run_with(stdout, &mut io::stderr(), env)
    }

    /// Like [`Builtin::run`], reporting failures on `stderr`.
    pub fn run_with(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> ExitCode {
        let name = self.name();
        let result = match self {
            Builtin::Cd(cmd) => cmd.execute(stdout, env),
            Builtin::Pwd(cmd) => cmd.execute(stdout, env),
            Builtin::Prompt(cmd) => cmd.execute(stdout, env),
            Builtin::Help(cmd) => cmd.execute(stdout, env),
            Builtin::Exit(cmd) => cmd.execute(stdout, env),
            Builtin::History(cmd) => cmd.execute(stdout, env),
            Builtin::Usage(invalid) => {
                let _ = stdout.write_all(invalid.output.as_bytes());
                Ok(if invalid.is_error { 1 } else { 0 })
            }
        };
        let _ = stdout.flush();
        result.unwrap_or_else(|e| {
            let _ = writeln!(stderr, "{name}: {e:#}");
            1
        })
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// Without a target, or with `~`, changes to $HOME; `-` returns to the previous directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let target = match self.target.as_deref() {
            None | Some("") | Some("~") => env
                .get_var("HOME")
                .map(PathBuf::from)
                .context("no target and HOME not set")?,
            Some("-") => {
                let previous = env.previous_dir.clone().context("no previous directory")?;
                writeln!(stdout, "{}", previous.display())?;
                previous
            }
            Some(t) => PathBuf::from(t),
        };

        let new_dir = if target.is_absolute() {
            target
        } else {
            env.current_dir.join(target)
        };

        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("can't canonicalize {}", new_dir.display()))?;

        env::set_current_dir(&canonical)
            .with_context(|| format!("can't chdir to {}", canonical.display()))?;
        env.previous_dir = Some(std::mem::replace(&mut env.current_dir, canonical));
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Replace the shell prompt.
pub struct Prompt {
    #[argh(positional)]
    /// new prompt text; a space is added after it.
    pub text: String,
}

impl BuiltinCommand for Prompt {
    fn name() -> &'static str {
        "prompt"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        env.prompt = format!("{} ", self.text);
        Ok(0)
    }
}

const HELP_TEXT: &str = "\
smallsh - a small Unix command shell

  cmd1 ; cmd2      run cmd1, then cmd2
  cmd &            run cmd in the background, print its pid
  cmd1 | cmd2      connect cmd1's output to cmd2's input
  cmd < file       read standard input from file
  cmd > file       write standard output to file
  * ?              expand to matching file names
  !N               rerun line N of the history

Built-ins:
  cd [dir|~|-]     change directory ($HOME without argument, previous with -)
  pwd              print the current directory
  prompt TEXT      change the prompt
  history          list previous lines
  help             show this text
  exit [code]      leave the shell
";

#[derive(FromArgs)]
/// Show usage of the shell.
pub struct Help {}

impl BuiltinCommand for Help {
    fn name() -> &'static str {
        "help"
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        stdout.write_all(HELP_TEXT.as_bytes())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Exit shell process
pub struct Exit {
    #[argh(positional)]
    /// status to exit with, 0 when omitted.
    pub code: Option<ExitCode>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let code = self.code.unwrap_or(0);
        env.should_exit = true;
        env.last_status = code;
        Ok(code)
    }
}

#[derive(FromArgs)]
/// List the lines kept in history with their numbers.
pub struct ShowHistory {}

impl BuiltinCommand for ShowHistory {
    fn name() -> &'static str {
        "history"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        for (number, line) in env.history.iter() {
            writeln!(stdout, "{number:5}  {line}")?;
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env as stdenv;
    use std::sync::{Mutex, MutexGuard, OnceLock};

    pub(crate) fn lock_current_dir() -> MutexGuard<'static, ()> {
        static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        MUTEX
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_lookup_resolves_only_builtins() {
        assert!(matches!(Builtin::lookup("cd", &args(&["/"])), Some(Builtin::Cd(_))));
        assert!(matches!(Builtin::lookup("history", &[]), Some(Builtin::History(_))));
        assert!(Builtin::lookup("ls", &[]).is_none());
        assert!(Builtin::lookup("echo", &args(&["hi"])).is_none());
    }

    #[test]
    fn test_failures_go_to_given_stderr() {
        let mut env = Environment::default();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let builtin = Builtin::lookup("cd", &args(&["-"])).unwrap();
        assert_eq!(builtin.run_with(&mut out, &mut err, &mut env), 1);
        assert!(out.is_empty());
        assert_eq!(String::from_utf8(err).unwrap(), "cd: no previous directory\n");
    }

    #[test]
    fn test_bad_arguments_report_usage() {
        let mut env = Environment::default();
        let mut out = Vec::new();
        let builtin = Builtin::lookup("prompt", &[]).unwrap();
        assert!(matches!(builtin, Builtin::Usage(_)));
        assert_eq!(builtin.run(&mut out, &mut env), 1);
        assert!(!out.is_empty());
    }

    #[test]
    fn test_pwd_prints_current_dir() {
        let _lock = lock_current_dir();
        let cur = stdenv::current_dir().unwrap();
        let mut env = Environment::default();
        env.current_dir = cur.clone();

        let mut out = Vec::new();
        let res = Pwd {}.execute(&mut out, &mut env);

        assert!(res.is_ok());
        let s = String::from_utf8(out).unwrap();
        assert_eq!(s, format!("{}\n", cur.to_string_lossy()));
    }

    #[test]
    fn test_cd_to_absolute_path_and_back() {
        let _lock = lock_current_dir();
        let temp = tempfile::tempdir().expect("failed to create temp dir");
        let canonical_temp = fs::canonicalize(temp.path()).expect("canonicalize failed");
        let orig = stdenv::current_dir().unwrap();

        let mut env = Environment::default();
        env.current_dir = orig.clone();

        let cmd = Cd {
            target: Some(canonical_temp.to_string_lossy().to_string()),
        };
        assert!(cmd.execute(&mut Vec::new(), &mut env).is_ok());
        assert_eq!(fs::canonicalize(stdenv::current_dir().unwrap()).unwrap(), canonical_temp);
        assert_eq!(env.current_dir, canonical_temp);
        assert_eq!(env.previous_dir.as_deref(), Some(orig.as_path()));

        let mut out = Vec::new();
        let back = Cd {
            target: Some("-".to_string()),
        };
        assert!(back.execute(&mut out, &mut env).is_ok());
        assert_eq!(env.current_dir, fs::canonicalize(&orig).unwrap());
        assert_eq!(String::from_utf8(out).unwrap(), format!("{}\n", orig.display()));

        stdenv::set_current_dir(orig).expect("failed to restore cwd");
    }

    #[test]
    fn test_cd_to_home_when_none() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();
        let mut env = Environment::default();
        env.current_dir = orig.clone();

        let Some(home) = env.get_var("HOME") else {
            return;
        };
        let Ok(canonical_home) = fs::canonicalize(&home) else {
            return;
        };

        let res = Cd { target: None }.execute(&mut Vec::new(), &mut env);
        assert!(res.is_ok());
        assert_eq!(env.current_dir, canonical_home);

        stdenv::set_current_dir(orig).expect("failed to restore cwd");
    }

    #[test]
    fn test_cd_nonexistent_path_errors() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();
        let mut env = Environment::default();
        env.current_dir = orig.clone();

        let name = format!("nonexistent_dir_for_smallsh_test_{}", std::process::id());
        let res = Cd { target: Some(name) }.execute(&mut Vec::new(), &mut env);

        assert!(res.is_err());
        assert_eq!(stdenv::current_dir().unwrap(), orig);
        assert_eq!(env.previous_dir, None);
    }

    #[test]
    fn test_cd_dash_without_previous_fails() {
        let mut env = Environment::default();
        let code = Builtin::Cd(Cd {
            target: Some("-".to_string()),
        })
        .run(&mut Vec::new(), &mut env);
        assert_eq!(code, 1);
    }

    #[test]
    fn test_prompt_replaces_prompt() {
        let mut env = Environment::default();
        let builtin = Builtin::lookup("prompt", &args(&["$"])).unwrap();
        assert_eq!(builtin.run(&mut Vec::new(), &mut env), 0);
        assert_eq!(env.prompt, "$ ");
    }

    #[test]
    fn test_exit_requests_termination() {
        let mut env = Environment::default();
        let builtin = Builtin::lookup("exit", &args(&["3"])).unwrap();
        assert_eq!(builtin.run(&mut Vec::new(), &mut env), 3);
        assert!(env.should_exit);
        assert_eq!(env.last_status, 3);
    }

    #[test]
    fn test_history_lists_numbered_lines() {
        let mut env = Environment::default();
        env.history.push("ls -l");
        env.history.push("pwd");
        let mut out = Vec::new();
        assert_eq!(ShowHistory {}.execute(&mut out, &mut env).unwrap(), 0);
        assert_eq!(String::from_utf8(out).unwrap(), "    1  ls -l\n    2  pwd\n");
    }

    #[test]
    fn test_help_mentions_every_builtin() {
        let mut out = Vec::new();
        Help {}.execute(&mut out, &mut Environment::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        for name in BUILTIN_NAMES {
            assert!(text.contains(name), "help should mention {name}");
        }
    }
}
