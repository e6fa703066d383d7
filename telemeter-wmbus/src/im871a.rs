//! IMST iM871A dongle driver.
//!
//! HCI framing over 57600 8N1 serial: every frame is
//! `0xA5 <ctrl|endpoint> <msg id> <len> <payload…>`. Radio telegrams arrive
//! as RADIOLINK indications whose payload is the raw wM-Bus frame; the listen
//! mode is applied with a DEVMGMT set-config request that the dongle answers
//! with a status byte.

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

const BAUD_RATE: u32 = 57_600;

/// Start-of-frame byte.
const SOF: u8 = 0xa5;
/// Device-management endpoint id.
const EP_DEVMGMT: u8 = 0x01;
/// Radio-link endpoint id.
const EP_RADIOLINK: u8 = 0x02;
/// DEVMGMT set-configuration request and its response.
const MSG_SET_CONFIG_REQ: u8 = 0x03;
const MSG_SET_CONFIG_RSP: u8 = 0x04;
/// RADIOLINK received-message indication.
const MSG_WMBUS_IND: u8 = 0x03;
/// Set-config field selector for the listen mode.
const CFG_FIELD_MODE: u8 = 0x02;
/// Radio mode values.
const MODE_T1: u8 = 0x03;
const MODE_C1: u8 = 0x06;

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug)]
pub struct Im871aDevice {
    port: SerialStream,
    path: PathBuf,
    buf: Vec<u8>,
}

/// One extracted HCI frame.
#[derive(Debug, PartialEq, Eq)]
struct HciFrame {
    endpoint: u8,
    msg_id: u8,
    payload: Vec<u8>,
}

impl Im871aDevice {
    pub fn open(path: &Path) -> Result<Self, WmbusError> {
        let builder = tokio_serial::new(path.to_string_lossy(), BAUD_RATE);
        let port = SerialStream::open(&builder).map_err(|e| WmbusError::Serial {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(path = %path.display(), "im871a port open");
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
    async fn read_frame(&mut self) -> Result<Option<HciFrame>, WmbusError> {
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

/// Pull one frame out of the accumulated bytes, discarding garbage before the
/// start byte. Returns `None` until a complete frame is buffered.
fn extract_frame(buf: &mut Vec<u8>) -> Option<HciFrame> {
    let start = buf.iter().position(|b| *b == SOF)?;
    buf.drain(..start);
    if buf.len() < 4 {
        return None;
    }
    let len = buf[3] as usize;
    if buf.len() < 4 + len {
        return None;
    }
    let frame: Vec<u8> = buf.drain(..4 + len).collect();
    Some(HciFrame {
        endpoint: frame[1] & 0x0f,
        msg_id: frame[2],
        payload: frame[4..].to_vec(),
    })
}

#[async_trait]
impl WmbusDevice for Im871aDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Im871a
    }

    async fn set_link_mode(&mut self, mode: LinkMode) -> Result<(), WmbusError> {
        let mode_byte = match mode {
            LinkMode::C1 => MODE_C1,
            LinkMode::T1 => MODE_T1,
        };
        // Volatile config (first 0x00): re-applied on every start.
        let request = [
            SOF,
            EP_DEVMGMT,
            MSG_SET_CONFIG_REQ,
            3,
            0x00,
            CFG_FIELD_MODE,
            mode_byte,
        ];
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
                    Some(f) if f.endpoint == EP_DEVMGMT && f.msg_id == MSG_SET_CONFIG_RSP => {
                        return Ok(f)
                    }
                    Some(f) => trace!(
                        endpoint = f.endpoint,
                        msg = f.msg_id,
                        "skipping frame while waiting for config response"
                    ),
                }
            }
        })
        .await
        .map_err(|_| WmbusError::ResponseTimeout)??;

        if response.payload.first() != Some(&0x01) {
            return Err(WmbusError::LinkModeRejected { mode });
        }
        debug!(%mode, "im871a listening");
        Ok(())
    }

    async fn next_telegram(&mut self) -> Result<Option<Telegram>, WmbusError> {
        loop {
            match self.read_frame().await? {
                None => return Ok(None),
                Some(f) if f.endpoint == EP_RADIOLINK && f.msg_id == MSG_WMBUS_IND => {
                    match Telegram::parse(&f.payload) {
                        Ok(t) => return Ok(Some(t)),
                        Err(err) => warn!(error = %err, "dropping malformed radio frame"),
                    }
                }
                Some(f) => trace!(
                    endpoint = f.endpoint,
                    msg = f.msg_id,
                    "ignoring non-radio frame"
                ),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
