use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the run loop, daemonization, and reload signalling.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("device error: {0}")]
    Device(#[from] telemeter_wmbus::WmbusError),

    #[error("meter error: {0}")]
    Meter(#[from] telemeter_meters::MeterError),

    #[error("configuration error: {0}")]
    Config(#[from] telemeter_core::ConfigError),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("failed to detach from the terminal: {source}")]
    Detach {
        #[source]
        source: std::io::Error,
    },

    #[error("daemon is not running (pid file missing: {pid_file})")]
    NotRunning { pid_file: PathBuf },

    #[error("pid file {pid_file} does not hold a pid: {value:?}")]
    BadPid { pid_file: PathBuf, value: String },

    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        pid: i32,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
