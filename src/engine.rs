//! Turning a parsed [`CommandSequence`] into processes.
//!
//! The sequence is walked left to right. Each step is one of:
//! - a pipeline run of two or more commands, forked stage by stage;
//! - a built-in, run inside the shell with its redirections applied to the
//!   shell's own stdin/stdout;
//! - a background command, forked into its own process group and left to the
//!   [`Reaper`];
//! - a foreground command, forked and waited for.
//!
//! Everything a child needs (resolved program path, C strings, error text,
//! open descriptors) is prepared before `fork`, so the child only wires
//! descriptors and calls `exec`.

use crate::builtin::Builtin;
use crate::command::{Command, CommandSequence, ExitCode};
use crate::env::Environment;
use crate::error::ShellError;
use crate::external;
use crate::io_adapters::{Pipe, Redirection, SavedStdio, wire_stdio};
use crate::reaper::{Reaper, exit_code};
use nix::errno::Errno;
use nix::sys::signal::{SigHandler, Signal, signal};
use nix::sys::wait::waitpid;
use nix::unistd::{ForkResult, Pid, execv, fork, setpgid};
use std::ffi::CString;
use std::fs::File;
use std::io::{self, Write};
use std::mem::ManuallyDrop;
use std::os::fd::{AsFd, BorrowedFd, FromRawFd};
use std::os::unix::ffi::OsStringExt;

/// Status of a program that could not be found.
pub const NOT_FOUND: ExitCode = 127;
/// Status of a program that was found but could not be executed.
pub const NOT_EXECUTABLE: ExitCode = 126;

/// Signals the interactive shell ignores for itself.
const SHELL_IGNORED: [Signal; 4] = [
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTSTP,
    Signal::SIGTTOU,
];

/// Signals every child resets to their default action before `exec`.
///
/// `SIGPIPE` is ignored by the Rust runtime at startup and would otherwise be
/// inherited, turning a closed pipe into `EPIPE` instead of termination.
const CHILD_DEFAULTS: [Signal; 6] = [
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTSTP,
    Signal::SIGTTOU,
    Signal::SIGTTIN,
    Signal::SIGPIPE,
];

/// Ignores keyboard-generated signals in the shell process.
pub fn ignore_shell_signals() -> nix::Result<()> {
    for sig in SHELL_IGNORED {
        unsafe { signal(sig, SigHandler::SigIgn) }?;
    }
    Ok(())
}

/// Retries `f` while it fails with `EINTR`.
fn syscall<F, T>(f: F) -> Result<T, nix::Error>
where
    F: Fn() -> Result<T, nix::Error>,
{
    loop {
        match f() {
            Err(Errno::EINTR) => (),
            result => return result,
        }
    }
}

/// Process group a forked child is placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessGroup {
    /// Stay in the shell's group.
    Inherit,
    /// Become the leader of a new group.
    Lead,
    /// Join the group led by an earlier pipeline stage.
    Join(Pid),
}

impl ProcessGroup {
    /// The group id to pass to `setpgid` for process `pid`.
    fn pgid_for(self, pid: Pid) -> Option<Pid> {
        match self {
            ProcessGroup::Inherit => None,
            ProcessGroup::Lead => Some(pid),
            ProcessGroup::Join(leader) => Some(leader),
        }
    }
}

/// What a forked child will do, decided before the fork.
enum Target {
    Exec { path: CString, argv: Vec<CString> },
    Builtin(Builtin),
    Fail { message: String, code: ExitCode },
}

impl Target {
    fn prepare(command: &Command) -> Target {
        let name = command.name();
        if let Some(builtin) = Builtin::lookup(name, command.args()) {
            return Target::Builtin(builtin);
        }
        let Some(path) = external::resolve(name) else {
            return Target::Fail {
                message: format!("smallsh: {name}: command not found\n"),
                code: NOT_FOUND,
            };
        };
        let path = CString::new(path.into_os_string().into_vec());
        let argv = command
            .argv
            .iter()
            .map(|arg| CString::new(arg.as_bytes()))
            .collect::<Result<Vec<_>, _>>();
        match (path, argv) {
            (Ok(path), Ok(argv)) => Target::Exec { path, argv },
            _ => Target::Fail {
                message: format!("smallsh: {name}: argument contains a NUL byte\n"),
                code: NOT_EXECUTABLE,
            },
        }
    }
}

fn write_stderr(bytes: &[u8]) {
    unsafe {
        libc::write(libc::STDERR_FILENO, bytes.as_ptr().cast(), bytes.len());
    }
}

fn child_exit(code: ExitCode) -> ! {
    unsafe { libc::_exit(code) }
}

/// Runs in the forked child and never returns.
fn exec_child(
    target: Target,
    stdin: Option<BorrowedFd<'_>>,
    stdout: Option<BorrowedFd<'_>>,
    group: ProcessGroup,
    env: &mut Environment,
) -> ! {
    let own = Pid::from_raw(0);
    if let Some(pgid) = group.pgid_for(own) {
        let _ = setpgid(own, pgid);
    }
    for sig in CHILD_DEFAULTS {
        let _ = unsafe { signal(sig, SigHandler::SigDfl) };
    }
    if let Err(e) = wire_stdio(stdin, stdout) {
        write_stderr(b"smallsh: dup2: ");
        write_stderr(e.desc().as_bytes());
        write_stderr(b"\n");
        child_exit(NOT_EXECUTABLE);
    }

    match target {
        Target::Exec { path, argv } => {
            let err = match execv(&path, &argv) {
                Ok(never) => match never {},
                Err(err) => err,
            };
            write_stderr(b"smallsh: ");
            write_stderr(path.as_bytes());
            write_stderr(b": ");
            write_stderr(err.desc().as_bytes());
            write_stderr(b"\n");
            child_exit(if err == Errno::ENOENT {
                NOT_FOUND
            } else {
                NOT_EXECUTABLE
            })
        }
        Target::Builtin(builtin) => {
            // Unbuffered and lock-free: another thread may have held the
            // std stream locks at the moment of the fork.
            let mut out = ManuallyDrop::new(unsafe { File::from_raw_fd(libc::STDOUT_FILENO) });
            let mut err = ManuallyDrop::new(unsafe { File::from_raw_fd(libc::STDERR_FILENO) });
            let code = builtin.run_with(&mut *out, &mut *err, env);
            child_exit(code)
        }
        Target::Fail { message, code } => {
            write_stderr(message.as_bytes());
            child_exit(code)
        }
    }
}

/// Forks a child that runs `target` with the given stdin and stdout.
fn spawn(
    target: Target,
    stdin: Option<BorrowedFd<'_>>,
    stdout: Option<BorrowedFd<'_>>,
    group: ProcessGroup,
    env: &mut Environment,
) -> Result<Pid, ShellError> {
    // Buffered output would otherwise be written twice.
    let _ = io::stdout().flush();
    match unsafe { fork() }.map_err(ShellError::sys("fork"))? {
        ForkResult::Parent { child } => {
            // Also done by the child; whichever runs first wins the race
            // against a sibling joining the group.
            if let Some(pgid) = group.pgid_for(child) {
                if let Err(e) = setpgid(child, pgid) {
                    tracing::debug!(pid = child.as_raw(), "setpgid in parent: {e}");
                }
            }
            Ok(child)
        }
        ForkResult::Child => exec_child(target, stdin, stdout, group, env),
    }
}

/// Blocks until `pid` terminates and returns its exit code.
fn wait_for(pid: Pid) -> Result<ExitCode, ShellError> {
    loop {
        let status = syscall(|| waitpid(pid, None)).map_err(ShellError::sys("waitpid"))?;
        if let Some(code) = exit_code(status) {
            tracing::debug!(pid = pid.as_raw(), code, "child finished");
            return Ok(code);
        }
    }
}

/// Dispatches command sequences and owns the background job table.
#[derive(Default)]
pub struct Engine {
    reaper: Reaper,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reaper(&self) -> &Reaper {
        &self.reaper
    }

    /// Starts asynchronous reclamation of background jobs.
    pub fn install_reaper(&mut self) -> io::Result<()> {
        self.reaper.install()
    }

    /// Runs every command of `sequence` in order.
    ///
    /// A failed dispatch is reported on stderr and counts as status 1; the
    /// walk goes on with the next command. Returns the status of the last
    /// command that ran.
    pub fn execute(&self, sequence: &CommandSequence, env: &mut Environment) -> ExitCode {
        let mut status = 0;
        let mut index = 0;
        while index < sequence.len() {
            let end = sequence.pipeline_end(index);
            let command = &sequence[index];
            let result = if end > index {
                self.dispatch_pipeline(&sequence.as_slice()[index..=end], env)
            } else if let Some(builtin) = Builtin::lookup(command.name(), command.args()) {
                self.run_builtin(builtin, command, env)
            } else if command.background {
                self.dispatch_background(command, env)
            } else {
                self.dispatch_foreground(command, env)
            };

            status = result.unwrap_or_else(|e| {
                eprintln!("smallsh: {e}");
                1
            });
            env.last_status = status;
            if env.should_exit {
                break;
            }
            index = end + 1;
        }
        status
    }

    /// Runs a built-in in the shell process.
    ///
    /// With redirections, the shell's stdin/stdout are rebound for the call
    /// and restored afterwards, whatever the outcome.
    pub fn run_builtin(
        &self,
        builtin: Builtin,
        command: &Command,
        env: &mut Environment,
    ) -> Result<ExitCode, ShellError> {
        tracing::debug!(name = command.name(), "running built-in");
        let redirection = Redirection::open(command)?;
        if redirection.is_empty() {
            return Ok(builtin.run(&mut io::stdout(), env));
        }

        let _saved = SavedStdio::save()?;
        let _ = io::stdout().flush();
        wire_stdio(redirection.stdin(), redirection.stdout()).map_err(ShellError::sys("dup2"))?;
        Ok(builtin.run(&mut io::stdout(), env))
    }

    /// Forks `command` and waits for it.
    pub fn dispatch_foreground(
        &self,
        command: &Command,
        env: &mut Environment,
    ) -> Result<ExitCode, ShellError> {
        let redirection = Redirection::open(command)?;
        let target = Target::prepare(command);
        let child = spawn(
            target,
            redirection.stdin(),
            redirection.stdout(),
            ProcessGroup::Inherit,
            env,
        )?;
        tracing::debug!(pid = child.as_raw(), name = command.name(), "foreground");
        drop(redirection);
        wait_for(child)
    }

    /// Forks `command` as the leader of a new process group and returns
    /// without waiting. The pid is printed as `[pid]`.
    pub fn dispatch_background(
        &self,
        command: &Command,
        env: &mut Environment,
    ) -> Result<ExitCode, ShellError> {
        let redirection = Redirection::open(command)?;
        let target = Target::prepare(command);

        let mut jobs = self.reaper.jobs();
        let child = spawn(
            target,
            redirection.stdin(),
            redirection.stdout(),
            ProcessGroup::Lead,
            env,
        )?;
        jobs.insert(child);
        drop(jobs);

        tracing::debug!(pid = child.as_raw(), name = command.name(), "background");
        println!("[{child}]");
        Ok(0)
    }

    /// Runs the stages of one pipeline run concurrently.
    ///
    /// Only the first stage's `<` and the last stage's `>` are honored. The
    /// result is the last stage's status, or 0 when the run ends in `&`.
    pub fn dispatch_pipeline(
        &self,
        stages: &[Command],
        env: &mut Environment,
    ) -> Result<ExitCode, ShellError> {
        let (Some(first), Some(last)) = (stages.first(), stages.last()) else {
            return Ok(0);
        };
        let count = stages.len();
        for (i, stage) in stages.iter().enumerate() {
            if (i > 0 && stage.redirect_in.is_some()) || (i + 1 < count && stage.redirect_out.is_some()) {
                tracing::warn!(stage = i + 1, name = stage.name(), "redirection inside a pipeline ignored");
            }
        }

        let redirection =
            Redirection::open_paths(first.redirect_in.as_deref(), last.redirect_out.as_deref())?;
        let pipes = (1..count).map(|_| Pipe::new()).collect::<Result<Vec<_>, _>>()?;
        let targets: Vec<Target> = stages.iter().map(Target::prepare).collect();

        let background = last.background;
        let mut jobs = background.then(|| self.reaper.jobs());
        let mut group = if background {
            ProcessGroup::Lead
        } else {
            ProcessGroup::Inherit
        };
        let mut children = Vec::with_capacity(count);

        for (i, target) in targets.into_iter().enumerate() {
            let stdin = match i {
                0 => redirection.stdin(),
                _ => Some(pipes[i - 1].reader.as_fd()),
            };
            let stdout = if i + 1 == count {
                redirection.stdout()
            } else {
                Some(pipes[i].writer.as_fd())
            };

            match spawn(target, stdin, stdout, group, env) {
                Ok(child) => {
                    if group == ProcessGroup::Lead {
                        group = ProcessGroup::Join(child);
                    }
                    if let Some(jobs) = jobs.as_mut() {
                        jobs.insert(child);
                    }
                    children.push(child);
                }
                Err(e) => {
                    // Children already running are not killed; they finish
                    // on their own once the pipes close and get reaped.
                    if jobs.is_none() {
                        drop(pipes);
                        for child in children {
                            self.reaper.watch(child);
                        }
                    }
                    return Err(e);
                }
            }
        }
        drop(jobs);
        drop(pipes);
        drop(redirection);
        tracing::debug!(?children, background, "pipeline started");

        if background {
            if let Some(leader) = children.first() {
                println!("[{leader}]");
            }
            return Ok(0);
        }

        let mut status = 0;
        for child in children {
            status = wait_for(child)?;
        }
        Ok(status)
    }
}
