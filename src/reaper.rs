//! Reclamation of finished background jobs.
//!
//! Background children are never waited for by the dispatcher. Their pids are
//! registered here, and a listener thread sweeps them with `WNOHANG` whenever
//! `SIGCHLD` arrives. The sweep only looks at registered pids, so foreground
//! children stay with the `waitpid` call that is blocked on them.

use crate::command::ExitCode;
use nix::errno::Errno;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use signal_hook::consts::SIGCHLD;
use signal_hook::iterator::{Handle, Signals};
use std::collections::BTreeSet;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

/// Pids of background children that have not been reaped yet.
pub type Jobs = BTreeSet<Pid>;

/// Converts a wait status into a shell exit code: the exit code itself, or
/// `128 + signal` for a child killed by a signal.
pub fn exit_code(status: WaitStatus) -> Option<ExitCode> {
    match status {
        WaitStatus::Exited(_, code) => Some(code),
        WaitStatus::Signaled(_, signal, _) => Some(128 + signal as i32),
        _ => None,
    }
}

#[derive(Default)]
pub struct Reaper {
    jobs: Arc<Mutex<Jobs>>,
    listener: Option<(Handle, JoinHandle<()>)>,
}

impl Reaper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the `SIGCHLD` listener thread. Calling it twice is a no-op.
    pub fn install(&mut self) -> io::Result<()> {
        if self.listener.is_some() {
            return Ok(());
        }
        let mut signals = Signals::new([SIGCHLD])?;
        let handle = signals.handle();
        let jobs = Arc::clone(&self.jobs);
        let thread = thread::Builder::new()
            .name("smallsh-reaper".to_string())
            .spawn(move || {
                for _ in signals.forever() {
                    sweep(&jobs);
                }
            })?;
        self.listener = Some((handle, thread));
        tracing::debug!("SIGCHLD listener installed");
        Ok(())
    }

    /// Locks the job table.
    ///
    /// The dispatcher holds this guard across `fork` and inserts the child
    /// before releasing it, so a child that exits immediately is still found
    /// by the sweep its `SIGCHLD` triggers.
    pub fn jobs(&self) -> MutexGuard<'_, Jobs> {
        lock(&self.jobs)
    }

    pub fn watch(&self, pid: Pid) {
        self.jobs().insert(pid);
    }

    /// Number of registered jobs still running.
    pub fn pending(&self) -> usize {
        self.jobs().len()
    }

    /// Sweeps the job table now, returning what was reaped.
    pub fn reap(&self) -> Vec<(Pid, Option<ExitCode>)> {
        sweep(&self.jobs)
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        if let Some((handle, thread)) = self.listener.take() {
            handle.close();
            let _ = thread.join();
        }
    }
}

fn lock(jobs: &Mutex<Jobs>) -> MutexGuard<'_, Jobs> {
    jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn sweep(jobs: &Mutex<Jobs>) -> Vec<(Pid, Option<ExitCode>)> {
    let mut jobs = lock(jobs);
    let mut reaped = Vec::new();
    jobs.retain(|&pid| match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
        Ok(WaitStatus::StillAlive) | Err(Errno::EINTR) => true,
        Ok(status @ (WaitStatus::Exited(..) | WaitStatus::Signaled(..))) => {
            let code = exit_code(status);
            tracing::info!(pid = pid.as_raw(), ?code, "background job finished");
            reaped.push((pid, code));
            false
        }
        Ok(_) => true,
        Err(e) => {
            tracing::debug!(pid = pid.as_raw(), "dropping job: {e}");
            reaped.push((pid, None));
            false
        }
    });
    reaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::Signal;
    use std::time::{Duration, Instant};

    fn spawn(program: &str, args: &[&str]) -> Pid {
        let child = std::process::Command::new(program)
            .args(args)
            .spawn()
            .expect("spawn");
        Pid::from_raw(child.id() as i32)
    }

    fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        done()
    }

    #[test]
    fn exit_codes_follow_shell_convention() {
        let pid = Pid::from_raw(1);
        assert_eq!(exit_code(WaitStatus::Exited(pid, 3)), Some(3));
        assert_eq!(
            exit_code(WaitStatus::Signaled(pid, Signal::SIGKILL, false)),
            Some(137)
        );
        assert_eq!(exit_code(WaitStatus::StillAlive), None);
    }

    #[test]
    fn synchronous_sweep_collects_finished_child() {
        let reaper = Reaper::new();
        let pid = spawn("sh", &["-c", "exit 4"]);
        reaper.watch(pid);

        let mut reaped = Vec::new();
        assert!(wait_until(Duration::from_secs(5), || {
            reaped.extend(reaper.reap());
            !reaped.is_empty()
        }));
        assert_eq!(reaped, vec![(pid, Some(4))]);
        assert_eq!(reaper.pending(), 0);
    }

    #[test]
    fn running_child_stays_registered() {
        let reaper = Reaper::new();
        let pid = spawn("sleep", &["5"]);
        reaper.watch(pid);
        assert!(reaper.reap().is_empty());
        assert_eq!(reaper.pending(), 1);

        nix::sys::signal::kill(pid, Signal::SIGKILL).unwrap();
        let mut reaped = Vec::new();
        assert!(wait_until(Duration::from_secs(5), || {
            reaped.extend(reaper.reap());
            !reaped.is_empty()
        }));
        assert_eq!(reaped, vec![(pid, Some(137))]);
    }

    #[test]
    fn listener_reaps_without_being_asked() {
        let mut reaper = Reaper::new();
        reaper.install().unwrap();
        {
            let mut jobs = reaper.jobs();
            jobs.insert(spawn("true", &[]));
        }
        assert!(wait_until(Duration::from_secs(5), || reaper.pending() == 0));
    }
}
