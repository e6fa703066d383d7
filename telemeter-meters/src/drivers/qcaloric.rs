//! Qundis Q caloric heat cost allocator.
//!
//! Body after the TPL header: the current period's consumption as u16 LE,
//! then the previous period's, both in dimensionless heat cost allocation
//! units.

use chrono::{DateTime, Utc};
use telemeter_core::{Field, MeterSpec, Reading};
use telemeter_wmbus::Telegram;

use super::{plain_body, read_u16, MeterDriver};
use crate::error::DecodeError;
use crate::kind::MeterKind;

/// CI field of a Q caloric short frame.
const SHORT_CI: u8 = 0x7a;

pub struct QCaloric {
    spec: MeterSpec,
    current_hca: f64,
    previous_hca: f64,
    updated_at: DateTime<Utc>,
}

impl QCaloric {
    pub fn new(spec: MeterSpec) -> Self {
        Self {
            spec,
            current_hca: 0.0,
            previous_hca: 0.0,
            updated_at: Utc::now(),
        }
    }
}

impl MeterDriver for QCaloric {
    fn spec(&self) -> &MeterSpec {
        &self.spec
    }

    fn kind(&self) -> MeterKind {
        MeterKind::QCaloric
    }

    fn consume(&mut self, telegram: &Telegram) -> Result<(), DecodeError> {
        let body = plain_body(telegram, SHORT_CI)?;
        let current = read_u16(body, 0)?;
        let previous = read_u16(body, 2)?;

        self.current_hca = f64::from(current);
        self.previous_hca = f64::from(previous);
        self.updated_at = Utc::now();
        Ok(())
    }

    fn reading(&self) -> Reading {
        Reading {
            meter: self.spec.name.clone(),
            id: self.spec.id.clone(),
            fields: vec![
                Field::number("current", "hca", self.current_hca),
                Field::number("previous", "hca", self.previous_hca),
            ],
            timestamp: self.updated_at,
        }
    }
}
