//! Meter types, telegram decoders and the meter registry.
//!
//! This crate turns raw wM-Bus telegrams into readings. Each configured
//! meter gets a decoder picked from a closed dispatch table keyed by the
//! meter type name; decoded updates flow to per-meter observers attached
//! in a fixed order.
//!
//! Public API surface:
//!   - [`MeterKind`]: the supported meter families and their link modes
//!   - [`negotiate`]: derive the single link mode a run will listen on
//!   - [`build_driver`] / [`MeterDriver`]: per-family telegram decoders
//!   - [`MeterRegistry`]: live meters, observers, telegram delivery

pub mod drivers;
pub mod error;
pub mod kind;
pub mod linkmode;
pub mod registry;

pub use drivers::{build_driver, MeterDriver};
pub use error::{DecodeError, MeterError};
pub use kind::MeterKind;
pub use linkmode::negotiate;
pub use registry::{Delivery, MeterCell, MeterRegistry, MeterUpdate, Observation, Observer};
