//! Per-family telegram decoders.
//!
//! Every driver owns the [`MeterSpec`] it was built for plus the last good
//! reading, and decodes telegrams addressed to its meter id. All supported
//! payloads open with a four byte TPL header (access counter, status,
//! configuration word); a non-zero configuration word marks the payload as
//! encrypted, which no driver here can decode. Field offsets below are
//! relative to the body that follows the header; errors report positions
//! in the full payload.

mod iperl;
mod multical21;
mod multical302;
mod omnipower;
mod qcaloric;
mod supercom587;

pub use iperl::Iperl;
pub use multical21::Multical21;
pub use multical302::Multical302;
pub use omnipower::Omnipower;
pub use qcaloric::QCaloric;
pub use supercom587::Supercom587;

use telemeter_core::{MeterSpec, Reading};
use telemeter_wmbus::Telegram;

use crate::error::DecodeError;
use crate::kind::MeterKind;

// ---------------------------------------------------------------------------
// MeterDriver
// ---------------------------------------------------------------------------

/// A decoder for one configured meter.
pub trait MeterDriver: Send {
    /// The configuration this driver was built for.
    fn spec(&self) -> &MeterSpec;

    /// The family this driver reports as. Families that share a decoder
    /// still report their own kind here.
    fn kind(&self) -> MeterKind;

    /// Whether this telegram is addressed to this meter.
    fn wants(&self, telegram: &Telegram) -> bool {
        telegram.id == self.spec().id.0
    }

    /// Decode one telegram into the driver's reading state. A failed decode
    /// leaves the previous state untouched.
    fn consume(&mut self, telegram: &Telegram) -> Result<(), DecodeError>;

    /// Snapshot of the most recent reading. Before the first update all
    /// numeric fields are zero.
    fn reading(&self) -> Reading;

    /// The field keys this driver exports, in output order.
    fn field_names(&self) -> Vec<String> {
        self.reading().fields.iter().map(|f| f.key()).collect()
    }
}

/// Build the decoder for a meter kind.
///
/// flowiq3100 shares the multical21 decoder: the two families transmit the
/// same payload layout, so only the reported kind differs.
pub fn build_driver(kind: MeterKind, spec: MeterSpec) -> Box<dyn MeterDriver> {
    match kind {
        MeterKind::Multical21 | MeterKind::FlowIq3100 => Box::new(Multical21::new(kind, spec)),
        MeterKind::Multical302 => Box::new(Multical302::new(spec)),
        MeterKind::Omnipower => Box::new(Omnipower::new(spec)),
        MeterKind::Supercom587 => Box::new(Supercom587::new(spec)),
        MeterKind::Iperl => Box::new(Iperl::new(spec)),
        MeterKind::QCaloric => Box::new(QCaloric::new(spec)),
    }
}

// ---------------------------------------------------------------------------
// Shared payload plumbing
// ---------------------------------------------------------------------------

/// Bytes of TPL header before the measurement body.
const TPL_HEADER_LEN: usize = 4;

/// Check the CI field, strip the TPL header and reject encrypted payloads.
fn plain_body(telegram: &Telegram, expected_ci: u8) -> Result<&[u8], DecodeError> {
    if telegram.ci != expected_ci {
        return Err(DecodeError::UnexpectedCi {
            ci: telegram.ci,
            expected: expected_ci,
        });
    }
    let payload = &telegram.payload;
    if payload.len() < TPL_HEADER_LEN {
        return Err(DecodeError::ShortPayload {
            need: TPL_HEADER_LEN,
            have: payload.len(),
        });
    }
    let config = u16::from_le_bytes([payload[2], payload[3]]);
    if config != 0 {
        return Err(DecodeError::Encrypted);
    }
    Ok(&payload[TPL_HEADER_LEN..])
}

fn slice(body: &[u8], offset: usize, len: usize) -> Result<&[u8], DecodeError> {
    body.get(offset..offset + len)
        .ok_or(DecodeError::ShortPayload {
            need: TPL_HEADER_LEN + offset + len,
            have: TPL_HEADER_LEN + body.len(),
        })
}

fn read_u8(body: &[u8], offset: usize) -> Result<u8, DecodeError> {
    Ok(slice(body, offset, 1)?[0])
}

fn read_i8(body: &[u8], offset: usize) -> Result<i8, DecodeError> {
    Ok(read_u8(body, offset)? as i8)
}

fn read_u16(body: &[u8], offset: usize) -> Result<u16, DecodeError> {
    let bytes = slice(body, offset, 2)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(body: &[u8], offset: usize) -> Result<u32, DecodeError> {
    let bytes = slice(body, offset, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::testutil::{encrypted_payload, plain_payload, spec, telegram};
    use super::*;

    #[test]
    fn plain_body_strips_the_header() {
        let t = telegram("76348799", 0x7a, &plain_payload(&[0xaa, 0xbb]));
        let body = plain_body(&t, 0x7a).expect("plaintext");
        assert_eq!(body, &[0xaa, 0xbb]);
    }

    #[test]
    fn plain_body_rejects_wrong_ci() {
        let t = telegram("76348799", 0x79, &plain_payload(&[]));
        let err = plain_body(&t, 0x7a).expect_err("wrong dialect");
        assert_eq!(
            err,
            DecodeError::UnexpectedCi {
                ci: 0x79,
                expected: 0x7a
            }
        );
    }

    #[test]
    fn plain_body_rejects_encrypted_configuration() {
        let t = telegram("76348799", 0x7a, &encrypted_payload(&[0x01, 0x02]));
        assert_eq!(plain_body(&t, 0x7a), Err(DecodeError::Encrypted));
    }

    #[test]
    fn plain_body_rejects_truncated_header() {
        let t = telegram("76348799", 0x7a, &[0x2a, 0x00]);
        assert_eq!(
            plain_body(&t, 0x7a),
            Err(DecodeError::ShortPayload { need: 4, have: 2 })
        );
    }

    #[test]
    fn reads_report_full_payload_positions() {
        let body = [0x01, 0x02, 0x03];
        let err = read_u32(&body, 0).expect_err("three bytes only");
        assert_eq!(err, DecodeError::ShortPayload { need: 8, have: 7 });
        assert_eq!(read_u16(&body, 1).expect("in range"), 0x0302);
        assert_eq!(read_i8(&body, 2).expect("in range"), 3);
    }

    #[test]
    fn factory_covers_every_kind() {
        for kind in MeterKind::ALL {
            let driver = build_driver(kind, spec("m", kind.as_str(), "11223344"));
            assert_eq!(driver.kind(), kind);
        }
    }

    #[test]
    fn flowiq3100_reports_its_own_kind() {
        let driver = build_driver(
            MeterKind::FlowIq3100,
            spec("tap", "flowiq3100", "11223344"),
        );
        assert_eq!(driver.kind(), MeterKind::FlowIq3100);
    }

    #[test]
    fn wants_matches_on_transmitted_id() {
        let payload = plain_payload(&[0; 6]);
        let driver = build_driver(MeterKind::Iperl, spec("tap", "iperl", "12345678"));
        assert!(driver.wants(&telegram("12345678", 0x7a, &payload)));
        assert!(!driver.wants(&telegram("87654321", 0x7a, &payload)));
    }
}
