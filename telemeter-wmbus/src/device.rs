//! The device abstraction the run loop drives.
//!
//! One trait for all three families; [`open`] dispatches on the resolved
//! descriptor. Dropping the handle releases the underlying port or file.

use async_trait::async_trait;

use telemeter_core::types::LinkMode;

use crate::amb8465::Amb8465Device;
use crate::detect::{DeviceDescriptor, DeviceKind};
use crate::error::WmbusError;
use crate::im871a::Im871aDevice;
use crate::simulator::SimulatorDevice;
use crate::telegram::Telegram;

/// A wM-Bus receiver delivering telegrams one at a time.
#[async_trait]
pub trait WmbusDevice: Send + std::fmt::Debug {
    fn kind(&self) -> DeviceKind;

    /// Apply the negotiated link mode. Called exactly once, before the first
    /// telegram is read.
    async fn set_link_mode(&mut self, mode: LinkMode) -> Result<(), WmbusError>;

    /// The next accepted telegram, or `None` once the stream has ended.
    /// Frames that fail to parse are logged and skipped, never surfaced.
    async fn next_telegram(&mut self) -> Result<Option<Telegram>, WmbusError>;

    /// Queue canned input for replay. A no-op outside the simulator.
    async fn simulate(&mut self) -> Result<(), WmbusError> {
        Ok(())
    }
}

/// Open the resolved device. `NotFound` is rejected here so every caller
/// downstream holds a live handle.
pub fn open(descriptor: &DeviceDescriptor) -> Result<Box<dyn WmbusDevice>, WmbusError> {
    match descriptor.kind {
        DeviceKind::NotFound => Err(WmbusError::NoDeviceFound),
        DeviceKind::Im871a => Ok(Box::new(Im871aDevice::open(&descriptor.path)?)),
        DeviceKind::Amb8465 => Ok(Box::new(Amb8465Device::open(&descriptor.path)?)),
        DeviceKind::Simulator => Ok(Box::new(SimulatorDevice::open(&descriptor.path)?)),
    }
}
