//! Process-group control
//!
//! A job may start programs that start programs of their own. Every job's
//! processes share one process group, and cancelling the job kills the
//! whole group with SIGKILL.

use std::collections::HashSet;
use std::io;
use std::process::{Command, Output};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// SIGKILL every process of the group led by `pgid`
pub fn kill_group(pgid: u32) {
    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
            Ok(()) => debug!("Killed process group {}", pgid),
            Err(Errno::ESRCH) => {}
            Err(e) => warn!("Failed to kill process group {}: {}", pgid, e),
        }
    }

    #[cfg(not(unix))]
    let _ = pgid;
}

/// Kills one process group when dropped, unless disarmed
#[derive(Debug)]
pub struct GroupGuard {
    pgid: Option<u32>,
}

impl GroupGuard {
    pub fn new(pgid: u32) -> Self {
        Self { pgid: Some(pgid) }
    }

    /// The group finished on its own; leave it alone
    pub fn disarm(mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }
}

#[derive(Debug, Default)]
struct GroupState {
    live: HashSet<u32>,
    killed: bool,
}

/// Programs started by one in-process job, each in its own process group
#[derive(Clone, Debug, Default)]
pub struct ChildGroups {
    state: Arc<Mutex<GroupState>>,
}

impl ChildGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a program as a new process group leader and wait for it
    ///
    /// Fails without starting anything once the groups were killed.
    pub fn output(&self, command: &mut Command) -> io::Result<Output> {
        let child = {
            let mut state = self.lock();
            if state.killed {
                return Err(io::Error::new(
                    io::ErrorKind::Interrupted,
                    "job was cancelled",
                ));
            }

            #[cfg(unix)]
            {
                use std::os::unix::process::CommandExt;
                command.process_group(0);
            }

            let child = command.spawn()?;
            state.live.insert(child.id());
            child
        };

        let pgid = child.id();
        let output = child.wait_with_output();
        self.lock().live.remove(&pgid);
        output
    }

    /// Kill every running group and refuse to start new ones
    pub fn kill_all(&self) {
        let mut state = self.lock();
        state.killed = true;
        for pgid in state.live.drain() {
            kill_group(pgid);
        }
    }

    /// Guard calling `kill_all` when dropped
    pub fn kill_on_drop(&self) -> KillOnDrop {
        KillOnDrop(self.clone())
    }

    fn lock(&self) -> MutexGuard<'_, GroupState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// See [`ChildGroups::kill_on_drop`]
#[derive(Debug)]
pub struct KillOnDrop(ChildGroups);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        self.0.kill_all();
    }
}
