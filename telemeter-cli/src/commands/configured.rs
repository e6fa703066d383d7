//! Runs driven by the configuration files under `/etc`.

use std::path::PathBuf;

use anyhow::Result;

use telemeter_core::{load_config_at, CONFIG_ROOT_ENV};
use telemeter_daemon::{init_tracing, run_from_config_blocking};

/// The configuration root: `TELEMETER_CONFIG_ROOT` when set, else `/`.
pub(crate) fn config_root() -> PathBuf {
    std::env::var_os(CONFIG_ROOT_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/"))
}

/// Run from the config files until a stop condition fires; a reload signal
/// re-reads them and goes again.
pub fn run() -> Result<()> {
    let root = config_root();
    // Peek at the config once for the log level. The run loop loads it
    // again each cycle, so a load error here surfaces there too.
    let level = load_config_at(&root)
        .map(|config| config.log_level)
        .unwrap_or_default();
    init_tracing(level);
    let reason = run_from_config_blocking(&root)?;
    tracing::info!(%reason, "stopped");
    Ok(())
}
