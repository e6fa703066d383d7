//! Error types for meter dispatch and telegram decoding.

use telemeter_core::LinkMode;
use thiserror::Error;

// ---------------------------------------------------------------------------
// MeterError
// ---------------------------------------------------------------------------

/// Failures while configuring or registering meters.
#[derive(Debug, Error)]
pub enum MeterError {
    /// The meter type name is not in the dispatch table. Unknown types are
    /// rejected, never silently defaulted.
    #[error("not a valid meter type: \"{value}\"")]
    UnknownKind { value: String },

    /// Two configured meters require different link modes, so no single
    /// listening mode can serve them both.
    #[error(
        "a different link mode has been set already: \"{second}\" needs {second_mode}, \
         but \"{first}\" already set {first_mode}"
    )]
    LinkModeConflict {
        first: String,
        first_mode: LinkMode,
        second: String,
        second_mode: LinkMode,
    },

    /// No meters are configured and no explicit mode was given, so there is
    /// nothing to infer the link mode from.
    #[error("with no meters configured the link mode must be given explicitly: --c1 or --t1")]
    NoLinkMode,

    /// Meter names identify meters in output and shell hooks and must be
    /// unique within a run.
    #[error("a meter named \"{name}\" is already registered")]
    DuplicateName { name: String },

    /// An observer was aimed at a meter name that is not registered.
    #[error("no meter named \"{name}\" is registered")]
    NoSuchMeter { name: String },
}

// ---------------------------------------------------------------------------
// DecodeError
// ---------------------------------------------------------------------------

/// Why a telegram addressed to a meter could not be decoded.
///
/// A failed decode never touches the meter's last good reading and never
/// counts as an update.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The CI field does not match the dialect this decoder speaks.
    #[error("unexpected CI field {ci:#04x}, this decoder handles {expected:#04x}")]
    UnexpectedCi { ci: u8, expected: u8 },

    /// The configuration word in the TPL header marks the payload as
    /// encrypted. Decryption is not supported.
    #[error("telegram payload is encrypted and cannot be decoded")]
    Encrypted,

    /// The payload ends before the fields this decoder expects.
    #[error("payload too short: need at least {need} bytes, have {have}")]
    ShortPayload { need: usize, have: usize },
}
