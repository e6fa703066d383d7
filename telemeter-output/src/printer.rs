//! Reading renderers and the stdout/meterfile/shell sink set.
//!
//! One rendered line per reading. The three formats:
//!
//! ```text
//! text:    MyTapWater  76348799  6.388 m3  OK  2018-02-08T09:07:22Z   (tab separated)
//! json:    {"id":"76348799","name":"MyTapWater","total_m3":6.388,...}
//! fields:  MyTapWater;76348799;6.388;OK;2018-02-08T09:07:22Z
//! ```
//!
//! Shell hooks always receive the JSON rendering in `METER_JSON`, whatever
//! the stdout format is.

use std::fs;
use std::path::PathBuf;

use chrono::SecondsFormat;
use serde_json::Value;
use tracing::debug;

use telemeter_core::{FieldValue, OutputFormat, Reading};

use crate::error::{io_err, PrintError};
use crate::shell;

// ---------------------------------------------------------------------------
// PrintConfig
// ---------------------------------------------------------------------------

/// The sink configuration for one run.
#[derive(Debug, Clone)]
pub struct PrintConfig {
    pub format: OutputFormat,
    /// Separator for the `fields` format.
    pub separator: char,
    /// Directory for per-meter status files, one file per meter name,
    /// truncated on every update.
    pub meterfiles: Option<PathBuf>,
    /// Shell hooks run after each update with `METER_*` in the environment.
    pub shells: Vec<String>,
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            separator: ';',
            meterfiles: None,
            shells: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Printer
// ---------------------------------------------------------------------------

/// Renders readings and delivers them to every configured sink.
pub struct Printer {
    config: PrintConfig,
}

impl Printer {
    pub fn new(config: PrintConfig) -> Self {
        Self { config }
    }

    /// Deliver one reading: stdout always, then meter file and shell hooks
    /// if configured.
    pub fn print(&self, reading: &Reading) -> Result<(), PrintError> {
        let line = self.render(reading);
        println!("{line}");

        if let Some(dir) = &self.config.meterfiles {
            let path = dir.join(reading.meter.to_string());
            fs::write(&path, format!("{line}\n")).map_err(|e| io_err(&path, e))?;
            debug!(path = %path.display(), "meter file updated");
        }

        if !self.config.shells.is_empty() {
            let envs = shell::reading_env(reading, &render_json(reading));
            for command in &self.config.shells {
                shell::run_hook(command, &envs)?;
            }
        }
        Ok(())
    }

    /// Render in the configured stdout format.
    pub fn render(&self, reading: &Reading) -> String {
        match self.config.format {
            OutputFormat::Text => render_text(reading),
            OutputFormat::Json => render_json(reading),
            OutputFormat::Fields => render_fields(reading, self.config.separator),
        }
    }
}

// ---------------------------------------------------------------------------
// Format renderers
// ---------------------------------------------------------------------------

pub fn render_text(reading: &Reading) -> String {
    let mut parts = vec![reading.meter.to_string(), reading.id.to_string()];
    for field in &reading.fields {
        if field.unit.is_empty() {
            parts.push(field.value.to_string());
        } else {
            parts.push(format!("{} {}", field.value, field.unit));
        }
    }
    parts.push(timestamp(reading));
    parts.join("\t")
}

pub fn render_json(reading: &Reading) -> String {
    let mut map = serde_json::Map::new();
    map.insert("name".to_string(), Value::String(reading.meter.to_string()));
    map.insert("id".to_string(), Value::String(reading.id.to_string()));
    for field in &reading.fields {
        map.insert(field.key(), json_value(&field.value));
    }
    map.insert("timestamp".to_string(), Value::String(timestamp(reading)));
    Value::Object(map).to_string()
}

pub fn render_fields(reading: &Reading, separator: char) -> String {
    let mut parts = vec![reading.meter.to_string(), reading.id.to_string()];
    for field in &reading.fields {
        parts.push(field.value.to_string());
    }
    parts.push(timestamp(reading));
    parts.join(&separator.to_string())
}

fn timestamp(reading: &Reading) -> String {
    reading.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn json_value(value: &FieldValue) -> Value {
    match value {
        // Non-finite numbers have no JSON rendering and become null.
        FieldValue::Number(n) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        FieldValue::Text(s) => Value::String(s.clone()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
