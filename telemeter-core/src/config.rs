//! The explicit configuration object and its `/etc` loader.
//!
//! # Storage layout
//!
//! ```text
//! <root>/etc/
//!   telemeter.yaml      (daemon settings, may carry inline meters:)
//!   telemeter.d/
//!     <anything>.yaml   (one meter per file, loaded in file-name order)
//! ```
//!
//! # API pattern
//!
//! Every loading function has two forms:
//! - `fn_at(root: &Path)` — explicit root; used in tests with `TempDir`
//! - `fn()` — resolves root from `TELEMETER_CONFIG_ROOT`, else `/`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.
//!
//! The same [`Config`] shape is assembled from command-line arguments in
//! foreground mode, so the run loop sees one configuration object regardless
//! of entry mode. There is no ambient mutable state behind it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::types::{LinkMode, LogLevel, MeterSpec, OutputFormat};

/// Environment variable overriding the configuration root. Primarily a
/// testing hook, mirroring how the daemon is exercised in CI.
pub const CONFIG_ROOT_ENV: &str = "TELEMETER_CONFIG_ROOT";

// ---------------------------------------------------------------------------
// 1. Config object
// ---------------------------------------------------------------------------

/// Everything a run needs, from either entry mode (CLI or config files).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// `auto`, a device path, `im871a:PATH`, `amb8465:PATH`, or a simulation file.
    #[serde(default = "default_device")]
    pub device: String,
    /// Explicit link mode; inferred from the meter types when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_mode: Option<LinkMode>,
    /// Stop once every configured meter has reported at least once.
    #[serde(default)]
    pub one_shot: bool,
    /// Time budget, forms like `20h`, `10m`, `5s`, `1h30m`.
    #[serde(default, with = "exit_after_serde", skip_serializing_if = "Option::is_none")]
    pub exit_after: Option<Duration>,
    #[serde(default)]
    pub log_level: LogLevel,
    /// Log each accepted telegram as hex.
    #[serde(default)]
    pub log_telegrams: bool,
    #[serde(default)]
    pub format: OutputFormat,
    /// Field separator for `fields` output.
    #[serde(default = "default_separator")]
    pub separator: char,
    /// Directory for per-meter status files holding the latest reading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meterfiles: Option<PathBuf>,
    /// Shell commands invoked with `METER_*` environment per update.
    #[serde(default)]
    pub shells: Vec<String>,
    #[serde(default)]
    pub meters: Vec<MeterSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: default_device(),
            link_mode: None,
            one_shot: false,
            exit_after: None,
            log_level: LogLevel::default(),
            log_telegrams: false,
            format: OutputFormat::default(),
            separator: default_separator(),
            meterfiles: None,
            shells: vec![],
            meters: vec![],
        }
    }
}

fn default_device() -> String {
    "auto".to_owned()
}

fn default_separator() -> char {
    ';'
}

mod exit_after_serde {
    use std::time::Duration;

    use serde::de::Error as DeError;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        ser: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => ser.serialize_str(&format!("{}s", d.as_secs())),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        de: D,
    ) -> Result<Option<Duration>, D::Error> {
        match Option::<String>::deserialize(de)? {
            None => Ok(None),
            Some(s) => super::parse_duration(&s).map(Some).map_err(DeError::custom),
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Duration parsing
// ---------------------------------------------------------------------------

/// Parse a time budget: plain seconds (`3600`) or unit groups with `s`, `m`,
/// `h`, `d` suffixes (`20h`, `10m`, `5s`, `1h30m`, `2d12h`).
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(bad_duration(s));
    }
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    for c in trimmed.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if digits.is_empty() {
            return Err(bad_duration(s));
        }
        let value: u64 = digits.parse().map_err(|_| bad_duration(s))?;
        let multiplier = match c {
            's' => 1,
            'm' => 60,
            'h' => 3600,
            'd' => 86400,
            _ => return Err(bad_duration(s)),
        };
        total = total.saturating_add(value.saturating_mul(multiplier));
        digits.clear();
    }
    // Trailing digits without a unit ("1h30") are ambiguous.
    if !digits.is_empty() {
        return Err(bad_duration(s));
    }
    Ok(Duration::from_secs(total))
}

fn bad_duration(s: &str) -> ConfigError {
    ConfigError::BadDuration { value: s.to_owned() }
}

// ---------------------------------------------------------------------------
// 3. Path helpers
// ---------------------------------------------------------------------------

/// `<root>/etc/telemeter.yaml` — pure, no I/O.
pub fn config_path_at(root: &Path) -> PathBuf {
    root.join("etc").join("telemeter.yaml")
}

/// `<root>/etc/telemeter.d` — pure, no I/O.
pub fn meter_dir_at(root: &Path) -> PathBuf {
    root.join("etc").join("telemeter.d")
}

// ---------------------------------------------------------------------------
// 4. Load
// ---------------------------------------------------------------------------

/// Load the daemon configuration plus every meter file under the drop-in
/// directory, in file-name order. Inline `meters:` entries keep their place
/// ahead of drop-ins.
///
/// Returns `ConfigError::ConfigNotFound` if the daemon file is absent,
/// `ConfigError::Parse` (with path + line context) if any YAML is malformed.
pub fn load_config_at(root: &Path) -> Result<Config, ConfigError> {
    let path = config_path_at(root);
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound { path });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let mut config: Config =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })?;

    let dir = meter_dir_at(root);
    if dir.exists() {
        let mut entries: Vec<_> = std::fs::read_dir(&dir)
            .map_err(|e| io_err(&dir, e))?
            .filter_map(|e| e.ok())
            .collect();
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let fname = entry.file_name();
            let name = fname.to_string_lossy();
            if !name.ends_with(".yaml") {
                continue;
            }
            let contents =
                std::fs::read_to_string(entry.path()).map_err(|e| io_err(entry.path(), e))?;
            let spec: MeterSpec = serde_yaml::from_str(&contents).map_err(|e| {
                ConfigError::Parse { path: entry.path(), source: e }
            })?;
            config.meters.push(spec);
        }
    }
    Ok(config)
}

/// `load_config_at` convenience wrapper — root from [`CONFIG_ROOT_ENV`], else `/`.
pub fn load_config() -> Result<Config, ConfigError> {
    let root = std::env::var_os(CONFIG_ROOT_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/"));
    load_config_at(&root)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
