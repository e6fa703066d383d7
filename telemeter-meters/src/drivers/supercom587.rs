//! Sontex Supercom 587 water meter.
//!
//! Body after the TPL header is a single u32 LE: total consumption in
//! litres.

use chrono::{DateTime, Utc};
use telemeter_core::{Field, MeterSpec, Reading};
use telemeter_wmbus::Telegram;

use super::{plain_body, read_u32, MeterDriver};
use crate::error::DecodeError;
use crate::kind::MeterKind;

/// CI field of a Supercom short frame.
const SHORT_CI: u8 = 0x7a;

pub struct Supercom587 {
    spec: MeterSpec,
    total_m3: f64,
    updated_at: DateTime<Utc>,
}

impl Supercom587 {
    pub fn new(spec: MeterSpec) -> Self {
        Self {
            spec,
            total_m3: 0.0,
            updated_at: Utc::now(),
        }
    }
}

impl MeterDriver for Supercom587 {
    fn spec(&self) -> &MeterSpec {
        &self.spec
    }

    fn kind(&self) -> MeterKind {
        MeterKind::Supercom587
    }

    fn consume(&mut self, telegram: &Telegram) -> Result<(), DecodeError> {
        let body = plain_body(telegram, SHORT_CI)?;
        let total_l = read_u32(body, 0)?;

        self.total_m3 = f64::from(total_l) / 1000.0;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn reading(&self) -> Reading {
        Reading {
            meter: self.spec.name.clone(),
            id: self.spec.id.clone(),
            fields: vec![Field::number("total", "m3", self.total_m3)],
            timestamp: self.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use telemeter_core::FieldValue;

    use super::*;
    use crate::drivers::testutil::{plain_payload, spec, telegram};

    #[test]
    fn decodes_total_volume() {
        let mut d = Supercom587::new(spec("Garden", "supercom587", "77777777"));
        let t = telegram(
            "77777777",
            SHORT_CI,
            &plain_payload(&8_042u32.to_le_bytes()),
        );
        d.consume(&t).expect("decoded");
        assert_eq!(d.reading().fields[0].value, FieldValue::Number(8.042));
    }

    #[test]
    fn empty_body_is_rejected() {
        let mut d = Supercom587::new(spec("Garden", "supercom587", "77777777"));
        let t = telegram("77777777", SHORT_CI, &plain_payload(&[]));
        assert_eq!(
            d.consume(&t),
            Err(DecodeError::ShortPayload { need: 8, have: 4 })
        );
    }
}
