//! Pid file handling for the daemonized process.
//!
//! The file holds one decimal pid and a trailing newline. The parent writes
//! it after forking, so by the time the parent exits the pid on disk is the
//! live daemon's.

use std::path::Path;

use crate::error::{io_err, DaemonError};

/// Truncate the pid file before forking to prove it is writable. A failure
/// here surfaces in the foreground process, where the operator still sees it.
pub fn ensure_writable(path: &Path) -> Result<(), DaemonError> {
    std::fs::write(path, b"").map_err(|e| io_err(path, e))
}

/// Record `pid`, replacing whatever the file held.
pub fn write_pid(path: &Path, pid: i32) -> Result<(), DaemonError> {
    std::fs::write(path, format!("{pid}\n")).map_err(|e| io_err(path, e))
}

/// Read back the recorded pid. A missing file means no daemon is running.
pub fn read_pid(path: &Path) -> Result<i32, DaemonError> {
    if !path.exists() {
        return Err(DaemonError::NotRunning { pid_file: path.to_path_buf() });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    contents.trim().parse().map_err(|_| DaemonError::BadPid {
        pid_file: path.to_path_buf(),
        value: contents.trim().to_owned(),
    })
}
