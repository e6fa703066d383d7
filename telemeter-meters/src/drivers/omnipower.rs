//! Kamstrup Omnipower electricity meter.
//!
//! Body after the TPL header is a single u32 LE: total energy in watt
//! hours.

use chrono::{DateTime, Utc};
use telemeter_core::{Field, MeterSpec, Reading};
use telemeter_wmbus::Telegram;

use super::{plain_body, read_u32, MeterDriver};
use crate::error::DecodeError;
use crate::kind::MeterKind;

/// CI field of an Omnipower short frame.
const SHORT_CI: u8 = 0x7a;

pub struct Omnipower {
    spec: MeterSpec,
    total_kwh: f64,
    updated_at: DateTime<Utc>,
}

impl Omnipower {
    pub fn new(spec: MeterSpec) -> Self {
        Self {
            spec,
            total_kwh: 0.0,
            updated_at: Utc::now(),
        }
    }
}

impl MeterDriver for Omnipower {
    fn spec(&self) -> &MeterSpec {
        &self.spec
    }

    fn kind(&self) -> MeterKind {
        MeterKind::Omnipower
    }

    fn consume(&mut self, telegram: &Telegram) -> Result<(), DecodeError> {
        let body = plain_body(telegram, SHORT_CI)?;
        let total_wh = read_u32(body, 0)?;

        self.total_kwh = f64::from(total_wh) / 1000.0;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn reading(&self) -> Reading {
        Reading {
            meter: self.spec.name.clone(),
            id: self.spec.id.clone(),
            fields: vec![Field::number("total", "kwh", self.total_kwh)],
            timestamp: self.updated_at,
        }
    }
}
