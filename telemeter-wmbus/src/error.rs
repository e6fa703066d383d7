//! Error types for telemeter-wmbus.

use std::path::PathBuf;

use thiserror::Error;

use telemeter_core::types::LinkMode;

/// All errors that can arise from device resolution, opening and I/O.
#[derive(Debug, Error)]
pub enum WmbusError {
    /// Nothing matched during probing; the caller treats this as fatal.
    #[error("no wmbus device found")]
    NoDeviceFound,

    /// Failed to open a serial port.
    #[error("cannot open serial port {path}: {source}")]
    Serial {
        path: PathBuf,
        #[source]
        source: tokio_serial::Error,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A frame shorter than the wM-Bus header, or with a lying length byte.
    #[error("bad telegram frame: {reason}")]
    BadFrame { reason: String },

    /// The dongle answered a configuration request with a failure status.
    #[error("device did not accept link mode {mode}")]
    LinkModeRejected { mode: LinkMode },

    /// No answer to a configuration request within the response window.
    #[error("timed out waiting for a response from the device")]
    ResponseTimeout,

    /// A `telegram=|…|` line in a simulation file that does not parse.
    #[error("bad telegram on line {line} of {path}")]
    BadSimulationLine { path: PathBuf, line: usize },
}

/// Convenience constructor for [`WmbusError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> WmbusError {
    WmbusError::Io {
        path: path.into(),
        source,
    }
}
