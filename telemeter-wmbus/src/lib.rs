//! Telemeter wM-Bus layer — telegram model, device resolution, device drivers.
//!
//! Public API surface:
//! - [`telegram`] — raw wM-Bus frame parsing ([`Telegram`])
//! - [`detect`] — [`resolve`] and [`DeviceDescriptor`]
//! - [`device`] — the [`WmbusDevice`] trait and [`open`]
//! - [`im871a`], [`amb8465`], [`simulator`] — the three device families

pub mod amb8465;
pub mod detect;
pub mod device;
pub mod error;
pub mod im871a;
pub mod simulator;
pub mod telegram;

pub use detect::{resolve, resolve_at, DeviceDescriptor, DeviceKind};
pub use device::{open, WmbusDevice};
pub use error::WmbusError;
pub use telegram::Telegram;
