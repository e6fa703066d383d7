use std::path::{Path, PathBuf};

pub const PID_FILE_NAME: &str = "telemeterd.pid";
pub const DAEMON_LOG_NAME: &str = "telemeterd.log";

pub fn pid_file_at(root: &Path) -> PathBuf {
    root.join("var").join("run").join(PID_FILE_NAME)
}

/// `/var/run/telemeterd.pid`, the default pid file for `--daemon`.
pub fn pid_file() -> PathBuf {
    pid_file_at(Path::new("/"))
}

pub fn daemon_log_at(root: &Path) -> PathBuf {
    root.join("var").join("log").join(DAEMON_LOG_NAME)
}

/// `/var/log/telemeterd.log`, where the detached child writes its logs.
pub fn daemon_log() -> PathBuf {
    daemon_log_at(Path::new("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_live_under_var() {
        assert_eq!(pid_file(), PathBuf::from("/var/run/telemeterd.pid"));
        assert_eq!(daemon_log(), PathBuf::from("/var/log/telemeterd.log"));
    }

    #[test]
    fn paths_follow_an_explicit_root() {
        let root = Path::new("/tmp/fake");
        assert_eq!(pid_file_at(root), PathBuf::from("/tmp/fake/var/run/telemeterd.pid"));
        assert_eq!(daemon_log_at(root), PathBuf::from("/tmp/fake/var/log/telemeterd.log"));
    }
}
