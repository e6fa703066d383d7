//! Background mode: fork, detach, run from the config files.

use std::path::Path;

use anyhow::Result;

use telemeter_core::load_config_at;
use telemeter_daemon::{
    daemonize, init_daemon_tracing, paths, request_reload, run_from_config_blocking,
    DaemonError, Fork, SystemDaemonizer,
};
use telemeter_wmbus::WmbusError;

use super::configured::config_root;

/// Fork into the background. The parent announces the child pid and returns;
/// the child runs from the config files until stopped.
pub fn run(pid_file: &Path) -> Result<()> {
    match daemonize(pid_file, &SystemDaemonizer::new())? {
        Fork::Parent { child } => {
            println!("telemeter daemon started, pid {child}");
            Ok(())
        }
        Fork::Child => run_detached(),
    }
}

fn run_detached() -> Result<()> {
    let root = config_root();
    // Peek at the config for the log level only; the run loop loads it again
    // each cycle and reports load errors through the normal error path.
    let level = load_config_at(&root)
        .map(|config| config.log_level)
        .unwrap_or_default();
    init_daemon_tracing(level, &paths::daemon_log());

    match run_from_config_blocking(&root) {
        Ok(reason) => {
            tracing::info!(%reason, "stopped");
            Ok(())
        }
        Err(err) => {
            tracing::error!(error = %err, "daemon run failed");
            if matches!(err, DaemonError::Device(WmbusError::NoDeviceFound)) {
                // Pause so a supervisor restarting on failure does not spin
                // while the dongle is unplugged.
                std::thread::sleep(std::time::Duration::from_secs(1));
            }
            Err(err.into())
        }
    }
}

/// Ask a running daemon to re-read its configuration.
pub fn reload(pid_file: &Path) -> Result<()> {
    let pid = request_reload(pid_file)?;
    println!("reload signalled to pid {pid}");
    Ok(())
}
