//! Link-mode negotiation.
//!
//! A radio dongle listens in exactly one link mode at a time, so before a
//! run starts every configured meter must agree on one. An explicit mode
//! from the command line wins; otherwise the mode is inferred from the
//! meter types, and any disagreement is a hard configuration error rather
//! than a run that silently misses telegrams.

use telemeter_core::{LinkMode, MeterSpec};

use crate::error::MeterError;
use crate::kind::MeterKind;

/// Derive the single link mode for a run.
///
/// Precedence: an explicit mode always wins, even over conflicting meter
/// types. Without one, the first meter sets the mode and every later meter
/// must match it. Zero meters and no explicit mode is an error, because
/// there is nothing to infer from.
pub fn negotiate(explicit: Option<LinkMode>, meters: &[MeterSpec]) -> Result<LinkMode, MeterError> {
    if let Some(mode) = explicit {
        return Ok(mode);
    }
    let mut inferred: Option<(&MeterSpec, LinkMode)> = None;
    for spec in meters {
        let kind: MeterKind = spec.kind.parse()?;
        let required = kind.link_mode();
        match inferred {
            None => inferred = Some((spec, required)),
            Some((first, mode)) if mode != required => {
                return Err(MeterError::LinkModeConflict {
                    first: first.name.to_string(),
                    first_mode: mode,
                    second: spec.name.to_string(),
                    second_mode: required,
                });
            }
            Some(_) => {}
        }
    }
    match inferred {
        Some((_, mode)) => Ok(mode),
        None => Err(MeterError::NoLinkMode),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
