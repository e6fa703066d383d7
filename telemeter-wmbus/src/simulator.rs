//! Simulation-file device for tests and offline development.
//!
//! File format: one telegram per `telegram=|<hex>|` line; every other line is
//! ignored. `simulate()` queues the whole file; the stream then ends once the
//! queue drains, leaving the run loop waiting on its other stop conditions.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use telemeter_core::types::LinkMode;

use crate::detect::DeviceKind;
use crate::device::WmbusDevice;
use crate::error::{io_err, WmbusError};
use crate::telegram::Telegram;

#[derive(Debug)]
pub struct SimulatorDevice {
    path: PathBuf,
    queue: VecDeque<Telegram>,
    link_mode: Option<LinkMode>,
}

impl SimulatorDevice {
    /// Checks the file exists up front; parsing happens in `simulate`.
    pub fn open(path: &Path) -> Result<Self, WmbusError> {
        std::fs::metadata(path).map_err(|e| io_err(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            queue: VecDeque::new(),
            link_mode: None,
        })
    }

    pub fn link_mode(&self) -> Option<LinkMode> {
        self.link_mode
    }
}

/// Decode a `telegram=|<hex>|` line; `None` for anything else.
fn parse_line(line: &str) -> Option<Result<Vec<u8>, hex::FromHexError>> {
    let rest = line.trim().strip_prefix("telegram=")?;
    let cleaned: String = rest.chars().filter(|c| *c != '|').collect();
    Some(hex::decode(cleaned))
}

#[async_trait]
impl WmbusDevice for SimulatorDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Simulator
    }

    async fn set_link_mode(&mut self, mode: LinkMode) -> Result<(), WmbusError> {
        // Recorded only; the canned input is already framed.
        self.link_mode = Some(mode);
        Ok(())
    }

    async fn next_telegram(&mut self) -> Result<Option<Telegram>, WmbusError> {
        Ok(self.queue.pop_front())
    }

    async fn simulate(&mut self) -> Result<(), WmbusError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| io_err(&self.path, e))?;
        for (index, line) in contents.lines().enumerate() {
            let Some(decoded) = parse_line(line) else {
                continue;
            };
            let bytes = decoded.map_err(|_| WmbusError::BadSimulationLine {
                path: self.path.clone(),
                line: index + 1,
            })?;
            let telegram = Telegram::parse(&bytes).map_err(|_| WmbusError::BadSimulationLine {
                path: self.path.clone(),
                line: index + 1,
            })?;
            debug!(id = %telegram.id, "queued simulated telegram");
            self.queue.push_back(telegram);
        }
        info!(
            count = self.queue.len(),
            path = %self.path.display(),
            "simulation loaded"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
