//! Error types for telemeter-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from configuration handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load — includes file path and line context from serde_yaml.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The daemon configuration file did not exist at the expected path.
    #[error("no configuration found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// A meter key that is not valid hex.
    #[error("meter key \"{value}\" is not valid hex")]
    BadKey {
        value: String,
        #[source]
        source: hex::FromHexError,
    },

    /// A link mode string other than `c1` or `t1`.
    #[error("\"{value}\" is not a link mode, expected c1 or t1")]
    BadLinkMode { value: String },

    /// An output format string other than `text`, `json` or `fields`.
    #[error("\"{value}\" is not an output format, expected text, json or fields")]
    BadFormat { value: String },

    /// A duration that does not parse as seconds or `NNs/NNm/NNh/NNd` groups.
    #[error("\"{value}\" is not a duration, expected forms like 20h, 10m, 5s or 1h30m")]
    BadDuration { value: String },
}

/// Convenience constructor for [`ConfigError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
