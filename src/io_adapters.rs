//! Descriptor plumbing for dispatches: redirection files, pipes and the saved
//! standard streams of the shell.
//!
//! Everything here is an [`OwnedFd`] or a [`File`], opened close-on-exec, so
//! a descriptor lives exactly as long as the value holding it and never leaks
//! into a program unless it was explicitly `dup2`'d onto 0 or 1.

use crate::command::Command;
use crate::error::ShellError;
use nix::fcntl::OFlag;
use nix::unistd;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;

/// Permission bits of files created by `>`.
pub const OUTPUT_MODE: u32 = 0o644;

/// Files named by a command's `<` and `>`, opened by the shell.
#[derive(Debug, Default)]
pub struct Redirection {
    pub input: Option<File>,
    pub output: Option<File>,
}

impl Redirection {
    /// Opens both targets of `command`, input first.
    pub fn open(command: &Command) -> Result<Self, ShellError> {
        Self::open_paths(command.redirect_in.as_deref(), command.redirect_out.as_deref())
    }

    pub fn open_paths(input: Option<&str>, output: Option<&str>) -> Result<Self, ShellError> {
        Ok(Self {
            input: input.map(open_input).transpose()?,
            output: output.map(open_output).transpose()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_none() && self.output.is_none()
    }

    pub fn stdin(&self) -> Option<BorrowedFd<'_>> {
        self.input.as_ref().map(AsFd::as_fd)
    }

    pub fn stdout(&self) -> Option<BorrowedFd<'_>> {
        self.output.as_ref().map(AsFd::as_fd)
    }
}

pub fn open_input(path: &str) -> Result<File, ShellError> {
    File::open(path).map_err(|source| ShellError::Redirect {
        path: path.to_string(),
        source,
    })
}

/// Creates or truncates `path` for writing.
pub fn open_output(path: &str) -> Result<File, ShellError> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(OUTPUT_MODE)
        .open(path)
        .map_err(|source| ShellError::Redirect {
            path: path.to_string(),
            source,
        })
}

/// One pipe between two adjacent pipeline stages.
#[derive(Debug)]
pub struct Pipe {
    pub reader: OwnedFd,
    pub writer: OwnedFd,
}

impl Pipe {
    pub fn new() -> Result<Self, ShellError> {
        let (reader, writer) = unistd::pipe2(OFlag::O_CLOEXEC).map_err(ShellError::sys("pipe"))?;
        Ok(Self { reader, writer })
    }
}

/// Makes `source` the descriptor `target`. A no-op when they already match.
fn redirect_fd(source: BorrowedFd<'_>, target: RawFd) -> nix::Result<()> {
    if source.as_raw_fd() != target {
        unistd::dup2(source.as_raw_fd(), target)?;
    }
    Ok(())
}

/// Points the process's stdin and stdout at the given descriptors.
///
/// `dup2` clears close-on-exec on the copies, so they survive `exec` while
/// the originals do not.
pub fn wire_stdio(stdin: Option<BorrowedFd<'_>>, stdout: Option<BorrowedFd<'_>>) -> nix::Result<()> {
    if let Some(fd) = stdin {
        redirect_fd(fd, libc::STDIN_FILENO)?;
    }
    if let Some(fd) = stdout {
        redirect_fd(fd, libc::STDOUT_FILENO)?;
    }
    Ok(())
}

/// Copies of the shell's own stdin and stdout, put back on drop.
///
/// Used around built-ins that run in-process with redirections applied.
pub struct SavedStdio {
    stdin: OwnedFd,
    stdout: OwnedFd,
}

impl SavedStdio {
    pub fn save() -> Result<Self, ShellError> {
        Ok(Self {
            stdin: clone_fd(io::stdin().as_fd())?,
            stdout: clone_fd(io::stdout().as_fd())?,
        })
    }
}

fn clone_fd(fd: BorrowedFd<'_>) -> Result<OwnedFd, ShellError> {
    fd.try_clone_to_owned().map_err(|source| ShellError::Redirect {
        path: format!("<fd {}>", fd.as_raw_fd()),
        source,
    })
}

impl Drop for SavedStdio {
    fn drop(&mut self) {
        let _ = io::stdout().flush();
        if let Err(e) = wire_stdio(Some(self.stdin.as_fd()), Some(self.stdout.as_fd())) {
            tracing::error!("failed to restore standard streams: {e}");
        }
    }
}
