//! Sensus iPERL water meter.
//!
//! Body after the TPL header: total consumption as u32 LE litres, then the
//! maximum flow seen since the last transmission as u16 LE litres/hour.

use chrono::{DateTime, Utc};
use telemeter_core::{Field, MeterSpec, Reading};
use telemeter_wmbus::Telegram;

use super::{plain_body, read_u16, read_u32, MeterDriver};
use crate::error::DecodeError;
use crate::kind::MeterKind;

/// CI field of an iPERL short frame.
const SHORT_CI: u8 = 0x7a;

pub struct Iperl {
    spec: MeterSpec,
    total_m3: f64,
    max_flow_m3h: f64,
    updated_at: DateTime<Utc>,
}

impl Iperl {
    pub fn new(spec: MeterSpec) -> Self {
        Self {
            spec,
            total_m3: 0.0,
            max_flow_m3h: 0.0,
            updated_at: Utc::now(),
        }
    }
}

impl MeterDriver for Iperl {
    fn spec(&self) -> &MeterSpec {
        &self.spec
    }

    fn kind(&self) -> MeterKind {
        MeterKind::Iperl
    }

    fn consume(&mut self, telegram: &Telegram) -> Result<(), DecodeError> {
        let body = plain_body(telegram, SHORT_CI)?;
        let total_l = read_u32(body, 0)?;
        let max_flow_lh = read_u16(body, 4)?;

        self.total_m3 = f64::from(total_l) / 1000.0;
        self.max_flow_m3h = f64::from(max_flow_lh) / 1000.0;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn reading(&self) -> Reading {
        Reading {
            meter: self.spec.name.clone(),
            id: self.spec.id.clone(),
            fields: vec![
                Field::number("total", "m3", self.total_m3),
                Field::number("max_flow", "m3h", self.max_flow_m3h),
            ],
            timestamp: self.updated_at,
        }
    }
}
