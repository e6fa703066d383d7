//! Telemeter core library — domain types, configuration model and loader, errors.
//!
//! Public API surface:
//! - [`types`] — newtypes, link modes, readings
//! - [`error`] — [`ConfigError`]
//! - [`config`] — the explicit [`Config`](config::Config) object and the
//!   `/etc` loader

pub mod config;
pub mod error;
pub mod types;

pub use config::{load_config, load_config_at, parse_duration, Config, CONFIG_ROOT_ENV};
pub use error::ConfigError;
pub use types::{
    Field, FieldValue, LinkMode, LogLevel, MeterId, MeterKey, MeterName, MeterSpec,
    OutputFormat, Reading,
};
