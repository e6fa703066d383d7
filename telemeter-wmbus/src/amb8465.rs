//! Amber AMB8465 dongle driver.
//!
//! Framing over 9600 8N1 serial: `0xFF <cmd> <len> <payload…> <checksum>`,
//! the checksum being the XOR of every preceding byte. Received telegrams are
//! data indications whose payload is the raw wM-Bus frame; the listen mode is
//! applied with a set-mode request answered by a status byte.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::SerialStream;
use tracing::{debug, trace, warn};

use telemeter_core::types::LinkMode;

use crate::detect::DeviceKind;
use crate::device::WmbusDevice;
use crate::error::{io_err, WmbusError};
use crate::telegram::Telegram;

const BAUD_RATE: u32 = 9_600;

/// Start byte of every frame.
const START: u8 = 0xff;
/// Received-telegram indication.
const CMD_DATA_IND: u8 = 0x03;
/// Set-mode request; the response mirrors it with the answer bit set.
const CMD_SET_MODE_REQ: u8 = 0x04;
const CMD_SET_MODE_RSP: u8 = 0x44;
/// Radio mode values.
const MODE_T1: u8 = 0x05;
const MODE_C1: u8 = 0x0e;

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug)]
pub struct Amb8465Device {
    port: SerialStream,
    path: PathBuf,
    buf: Vec<u8>,
}

/// One extracted, checksum-verified frame.
#[derive(Debug, PartialEq, Eq)]
struct AmbFrame {
    cmd: u8,
    payload: Vec<u8>,
}

impl Amb8465Device {
    pub fn open(path: &Path) -> Result<Self, WmbusError> {
        let builder = tokio_serial::new(path.to_string_lossy(), BAUD_RATE);
        let port = SerialStream::open(&builder).map_err(|e| WmbusError::Serial {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(path = %path.display(), "amb8465 port open");
        Ok(Self {
            port,
            path: path.to_path_buf(),
            buf: Vec::new(),
        })
    }

    async fn fill(&mut self) -> Result<usize, WmbusError> {
        let mut chunk = [0u8; 256];
        let n = self
            .port
            .read(&mut chunk)
            .await
            .map_err(|e| io_err(&self.path, e))?;
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    /// Next complete frame, reading more bytes as needed. `None` = port closed.
    async fn read_frame(&mut self) -> Result<Option<AmbFrame>, WmbusError> {
        loop {
            if let Some(frame) = extract_frame(&mut self.buf) {
                return Ok(Some(frame));
            }
            if self.fill().await? == 0 {
                return Ok(None);
            }
        }
    }
}

fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Pull one checksum-verified frame out of the accumulated bytes. A checksum
/// mismatch discards the false start byte and rescans.
fn extract_frame(buf: &mut Vec<u8>) -> Option<AmbFrame> {
    loop {
        let start = buf.iter().position(|b| *b == START)?;
        buf.drain(..start);
        if buf.len() < 3 {
            return None;
        }
        let len = buf[2] as usize;
        let total = 3 + len + 1;
        if buf.len() < total {
            return None;
        }
        if checksum(&buf[..total - 1]) != buf[total - 1] {
            buf.drain(..1);
            continue;
        }
        let frame: Vec<u8> = buf.drain(..total).collect();
        return Some(AmbFrame {
            cmd: frame[1],
            payload: frame[3..total - 1].to_vec(),
        });
    }
}

#[async_trait]
impl WmbusDevice for Amb8465Device {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Amb8465
    }

    async fn set_link_mode(&mut self, mode: LinkMode) -> Result<(), WmbusError> {
        let mode_byte = match mode {
            LinkMode::C1 => MODE_C1,
            LinkMode::T1 => MODE_T1,
        };
        let mut request = vec![START, CMD_SET_MODE_REQ, 1, mode_byte];
        request.push(checksum(&request));
        self.port
            .write_all(&request)
            .await
            .map_err(|e| io_err(&self.path, e))?;
        self.port.flush().await.map_err(|e| io_err(&self.path, e))?;

        let response = tokio::time::timeout(RESPONSE_TIMEOUT, async {
            loop {
                match self.read_frame().await? {
                    None => {
                        return Err(io_err(
                            &self.path,
                            std::io::Error::new(
                                std::io::ErrorKind::UnexpectedEof,
                                "port closed during configuration",
                            ),
                        ))
                    }
                    Some(f) if f.cmd == CMD_SET_MODE_RSP => return Ok(f),
                    Some(f) => trace!(
                        cmd = f.cmd,
                        "skipping frame while waiting for set-mode response"
                    ),
                }
            }
        })
        .await
        .map_err(|_| WmbusError::ResponseTimeout)??;

        if response.payload.first() != Some(&0x00) {
            return Err(WmbusError::LinkModeRejected { mode });
        }
        debug!(%mode, "amb8465 listening");
        Ok(())
    }

    async fn next_telegram(&mut self) -> Result<Option<Telegram>, WmbusError> {
        loop {
            match self.read_frame().await? {
                None => return Ok(None),
                Some(f) if f.cmd == CMD_DATA_IND => match Telegram::parse(&f.payload) {
                    Ok(t) => return Ok(Some(t)),
                    Err(err) => warn!(error = %err, "dropping malformed radio frame"),
                },
                Some(f) => trace!(cmd = f.cmd, "ignoring non-data frame"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
