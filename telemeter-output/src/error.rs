//! Error type for reading delivery.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while delivering a reading to a sink.
#[derive(Debug, Error)]
pub enum PrintError {
    /// Writing a per-meter status file failed.
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A shell hook could not be spawned at all. Hooks that spawn but exit
    /// non-zero are only logged.
    #[error("failed to run shell hook `{command}`: {source}")]
    Shell {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> PrintError {
    PrintError::Io {
        path: path.into(),
        source,
    }
}
