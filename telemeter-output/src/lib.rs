//! Rendering and delivery of meter readings.
//!
//! A [`Printer`] turns each decoded [`telemeter_core::Reading`] into the
//! configured output format and hands it to every configured sink: stdout,
//! per-meter status files, and shell hooks that receive the reading as
//! `METER_*` environment variables.
//!
//! Public API surface:
//!   - [`Printer`] / [`PrintConfig`]: the sink set for one run
//!   - [`shell_env_names`]: the environment listing behind `--shellenvs`
//!   - [`PrintError`]: what can go wrong while delivering a reading

pub mod error;
pub mod printer;
pub mod shell;

pub use error::PrintError;
pub use printer::{PrintConfig, Printer};
pub use shell::shell_env_names;
