//! Telemeter daemon runtime: device reader + dispatcher + stop conditions,
//! with fork/pid-file daemonization and SIGHUP reload.

pub mod daemonize;
mod error;
pub mod paths;
pub mod pidfile;
mod runtime;

pub use daemonize::{daemonize, request_reload, Daemonizer, Fork, SystemDaemonizer};
pub use error::DaemonError;
pub use runtime::{
    init_daemon_tracing, init_tracing, run, run_blocking, run_from_config_at,
    run_from_config_blocking, run_with_device, RunState, StopReason,
};
