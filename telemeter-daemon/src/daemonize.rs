//! Detaching from the terminal.
//!
//! The classic double step: validate the pid file, fork, the parent records
//! the child pid and exits, the child becomes session leader with stdio on
//! /dev/null. The [`Daemonizer`] trait keeps the fork behind a seam so the
//! orchestration is testable without leaving the test process.

use std::path::Path;

use tracing::info;

use crate::error::DaemonError;
use crate::pidfile;

/// Which side of the fork the caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fork {
    /// Still the foreground process; the daemon runs as `child`. The caller
    /// must exit promptly without touching the device.
    Parent { child: i32 },
    /// The detached daemon process: session leader, `/` as working
    /// directory, stdio on /dev/null.
    Child,
}

/// Fork-and-detach seam. The system implementation makes the real syscalls;
/// tests substitute a fake that stays in-process.
pub trait Daemonizer: Send + Sync {
    fn detach(&self) -> Result<Fork, DaemonError>;
}

/// [`Daemonizer`] backed by `fork(2)` and `setsid(2)`.
#[derive(Debug, Default)]
pub struct SystemDaemonizer;

impl SystemDaemonizer {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
impl Daemonizer for SystemDaemonizer {
    fn detach(&self) -> Result<Fork, DaemonError> {
        use std::os::fd::IntoRawFd;

        use nix::sys::stat::{umask, Mode};
        use nix::unistd::{chdir, close, dup2, fork, setsid, ForkResult};

        // SAFETY: detach runs before any worker threads or the async runtime
        // exist, so the child never inherits a poisoned lock.
        let outcome =
            unsafe { fork() }.map_err(|errno| DaemonError::Detach { source: errno.into() })?;
        match outcome {
            ForkResult::Parent { child } => Ok(Fork::Parent { child: child.as_raw() }),
            ForkResult::Child => {
                umask(Mode::empty());
                setsid().map_err(|errno| DaemonError::Detach { source: errno.into() })?;
                chdir("/").map_err(|errno| DaemonError::Detach { source: errno.into() })?;
                // Stray writes to stdout/stderr must land somewhere harmless,
                // so the standard descriptors move onto /dev/null.
                match std::fs::OpenOptions::new().read(true).write(true).open("/dev/null") {
                    Ok(devnull) => {
                        let fd = devnull.into_raw_fd();
                        for target in 0..3 {
                            if fd != target {
                                let _ = dup2(fd, target);
                            }
                        }
                        if fd > 2 {
                            let _ = close(fd);
                        }
                    }
                    Err(_) => {
                        for fd in 0..3 {
                            let _ = close(fd);
                        }
                    }
                }
                Ok(Fork::Child)
            }
        }
    }
}

#[cfg(not(unix))]
impl Daemonizer for SystemDaemonizer {
    fn detach(&self) -> Result<Fork, DaemonError> {
        Err(DaemonError::Runtime("daemon mode is only available on unix".to_owned()))
    }
}

/// Validate the pid file, fork, and record the child pid from the parent
/// side. Returns which side of the fork the caller is on.
pub fn daemonize(pid_file: &Path, daemonizer: &dyn Daemonizer) -> Result<Fork, DaemonError> {
    // Fail in the foreground, before the fork, if the pid file is not
    // writable.
    pidfile::ensure_writable(pid_file)?;
    let fork = daemonizer.detach()?;
    if let Fork::Parent { child } = fork {
        pidfile::write_pid(pid_file, child)?;
        info!(pid = child, pid_file = %pid_file.display(), "daemon started");
    }
    Ok(fork)
}

/// Ask a running daemon to re-read its configuration: SIGHUP to the pid on
/// record.
#[cfg(unix)]
pub fn request_reload(pid_file: &Path) -> Result<i32, DaemonError> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let pid = pidfile::read_pid(pid_file)?;
    kill(Pid::from_raw(pid), Signal::SIGHUP)
        .map_err(|errno| DaemonError::Signal { pid, source: errno.into() })?;
    info!(pid, "reload requested");
    Ok(pid)
}

#[cfg(not(unix))]
pub fn request_reload(_pid_file: &Path) -> Result<i32, DaemonError> {
    Err(DaemonError::Runtime("reload signalling is only available on unix".to_owned()))
}
