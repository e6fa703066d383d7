//! Raw wM-Bus telegram parsing.
//!
//! Only the data-link header is interpreted here: enough to attribute a frame
//! to a configured meter and hand the application payload to a decoder.
//!
//! ```text
//! L C MM IIII V T CI payload…
//! │ │ │  │    │ │ └─ application CI field
//! │ │ │  │    │ └─ device type (media)
//! │ │ │  │    └─ version
//! │ │ │  └─ meter id, 4 BCD bytes, least significant first
//! │ │ └─ manufacturer, 15-bit packed code, little endian
//! │ └─ control field
//! └─ length byte: number of bytes after itself
//! ```

use crate::error::WmbusError;

/// Bytes before the CI field: L C M(2) A(6) CI.
const HEADER_LEN: usize = 11;

/// One parsed inbound telegram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Telegram {
    /// The transmitting meter's id as printed: eight BCD digits.
    pub id: String,
    /// Three-letter manufacturer code, e.g. `KAM`.
    pub manufacturer: String,
    pub version: u8,
    pub device_type: u8,
    pub ci: u8,
    /// Application payload after the CI field.
    pub payload: Vec<u8>,
    /// The complete frame, kept for hex logging.
    pub frame: Vec<u8>,
}

impl Telegram {
    /// Parse a complete frame starting at the length byte.
    pub fn parse(frame: &[u8]) -> Result<Self, WmbusError> {
        if frame.len() < HEADER_LEN {
            return Err(WmbusError::BadFrame {
                reason: format!(
                    "{} bytes is shorter than the {HEADER_LEN}-byte header",
                    frame.len()
                ),
            });
        }
        let announced = frame[0] as usize;
        if announced != frame.len() - 1 {
            return Err(WmbusError::BadFrame {
                reason: format!(
                    "length byte says {announced} but frame carries {} bytes",
                    frame.len() - 1
                ),
            });
        }

        let manufacturer = unpack_manufacturer(u16::from_le_bytes([frame[2], frame[3]]));
        let id = format!(
            "{:02x}{:02x}{:02x}{:02x}",
            frame[7], frame[6], frame[5], frame[4]
        );

        Ok(Self {
            id,
            manufacturer,
            version: frame[8],
            device_type: frame[9],
            ci: frame[10],
            payload: frame[HEADER_LEN..].to_vec(),
            frame: frame.to_vec(),
        })
    }

    /// The full frame as lowercase hex, for `log_telegrams` output.
    pub fn hex(&self) -> String {
        hex::encode(&self.frame)
    }
}

/// Unpack the 15-bit manufacturer flag: three 5-bit letters, `A` = 1.
fn unpack_manufacturer(m: u16) -> String {
    [(m >> 10) & 0x1f, (m >> 5) & 0x1f, m & 0x1f]
        .iter()
        .map(|l| char::from(*l as u8 + 64))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
