//! Domain types for telemeter.
//!
//! Meter names and ids are string newtypes; keys carry decoded bytes and
//! parse from hex. Everything that appears in configuration files is
//! serializable via serde + serde_yaml.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for a configured meter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeterName(pub String);

impl fmt::Display for MeterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for MeterName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MeterName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A strongly-typed meter identity — the 8-digit address a meter transmits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeterId(pub String);

impl fmt::Display for MeterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for MeterId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MeterId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// An AES key for an encrypted meter; empty means the meter is not encrypted.
///
/// Parses from a hex string in configuration; debug output never shows the
/// key bytes.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MeterKey(Vec<u8>);

impl MeterKey {
    pub fn from_hex(s: &str) -> Result<Self, ConfigError> {
        if s.is_empty() {
            return Ok(Self::default());
        }
        let bytes = hex::decode(s).map_err(|e| ConfigError::BadKey {
            value: s.to_owned(),
            source: e,
        })?;
        Ok(Self(bytes))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for MeterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "MeterKey(none)")
        } else {
            write!(f, "MeterKey({} bytes)", self.0.len())
        }
    }
}

impl TryFrom<String> for MeterKey {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<MeterKey> for String {
    fn from(key: MeterKey) -> Self {
        hex::encode(key.0)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// The radio link mode a device listens in. One value per process, set once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    C1,
    T1,
}

impl LinkMode {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkMode::C1 => "c1",
            LinkMode::T1 => "t1",
        }
    }
}

impl fmt::Display for LinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "c1" => Ok(LinkMode::C1),
            "t1" => Ok(LinkMode::T1),
            _ => Err(ConfigError::BadLinkMode { value: s.to_owned() }),
        }
    }
}

/// How readings are rendered on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Fields,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Fields => write!(f, "fields"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "fields" => Ok(OutputFormat::Fields),
            _ => Err(ConfigError::BadFormat { value: s.to_owned() }),
        }
    }
}

/// Log verbosity, derived from the silence/verbose/debug flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Silent,
    #[default]
    Normal,
    Verbose,
    Debug,
}

impl LogLevel {
    /// Flag precedence: debug beats verbose beats silence.
    pub fn from_flags(silence: bool, verbose: bool, debug: bool) -> Self {
        if debug {
            LogLevel::Debug
        } else if verbose {
            LogLevel::Verbose
        } else if silence {
            LogLevel::Silent
        } else {
            LogLevel::Normal
        }
    }

    /// The tracing filter directive this level maps to.
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Silent => "error",
            LogLevel::Normal => "info",
            LogLevel::Verbose => "debug",
            LogLevel::Debug => "trace",
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// One configured meter: name, type name, transmitted id, optional key.
///
/// The type name stays a plain string here; the closed dispatch over known
/// meter types lives with the decoders, which reject unknown names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterSpec {
    pub name: MeterName,
    #[serde(rename = "type")]
    pub kind: String,
    pub id: MeterId,
    #[serde(default)]
    pub key: MeterKey,
}

/// One decoded value of a reading.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{n:.3}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

/// A named, unit-annotated value within a reading.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: &'static str,
    /// Empty for unitless fields (status words, counters).
    pub unit: &'static str,
    pub value: FieldValue,
}

impl Field {
    pub fn number(name: &'static str, unit: &'static str, value: f64) -> Self {
        Self {
            name,
            unit,
            value: FieldValue::Number(value),
        }
    }

    pub fn text(name: &'static str, value: String) -> Self {
        Self {
            name,
            unit: "",
            value: FieldValue::Text(value),
        }
    }

    /// The field key used in JSON output and environment names: `total_m3`.
    pub fn key(&self) -> String {
        if self.unit.is_empty() {
            self.name.to_owned()
        } else {
            format!("{}_{}", self.name, self.unit)
        }
    }
}

/// One decoded update from a meter, as handed to the output sinks.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub meter: MeterName,
    pub id: MeterId,
    pub fields: Vec<Field>,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
