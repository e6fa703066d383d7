//! Shell hooks: user commands run after each update with the reading in
//! the environment.

use std::process::Command;

use chrono::SecondsFormat;
use tracing::{debug, warn};

use telemeter_core::Reading;

use crate::error::PrintError;

/// Environment every hook sees, before the per-field variables.
const BASE_ENV_NAMES: [&str; 4] = ["METER_JSON", "METER_NAME", "METER_ID", "METER_TIMESTAMP"];

/// The `METER_*` environment for one reading. `json` is the JSON rendering
/// of the same reading.
pub(crate) fn reading_env(reading: &Reading, json: &str) -> Vec<(String, String)> {
    let mut envs = vec![
        ("METER_JSON".to_string(), json.to_string()),
        ("METER_NAME".to_string(), reading.meter.to_string()),
        ("METER_ID".to_string(), reading.id.to_string()),
        (
            "METER_TIMESTAMP".to_string(),
            reading.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
    ];
    for field in &reading.fields {
        envs.push((env_name(&field.key()), field.value.to_string()));
    }
    envs
}

fn env_name(key: &str) -> String {
    format!("METER_{}", key.to_ascii_uppercase())
}

/// The environment variable names a meter's hooks will see. This is the
/// listing behind `--shellenvs`.
pub fn shell_env_names(field_keys: &[String]) -> Vec<String> {
    BASE_ENV_NAMES
        .iter()
        .map(|name| name.to_string())
        .chain(field_keys.iter().map(|key| env_name(key)))
        .collect()
}

/// Run one hook through `sh -c`.
///
/// A hook that spawns but exits non-zero is only logged; readings keep
/// flowing to the remaining sinks.
pub(crate) fn run_hook(command: &str, envs: &[(String, String)]) -> Result<(), PrintError> {
    let status = Command::new("/bin/sh")
        .arg("-c")
        .arg(command)
        .envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .status()
        .map_err(|e| PrintError::Shell {
            command: command.to_string(),
            source: e,
        })?;
    if status.success() {
        debug!(command, "shell hook finished");
    } else {
        warn!(command, code = status.code(), "shell hook exited non-zero");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use telemeter_core::{Field, Reading};

    use super::*;

    fn reading() -> Reading {
        Reading {
            meter: "MyTapWater".into(),
            id: "76348799".into(),
            fields: vec![
                Field::number("total", "m3", 6.388),
                Field::text("current_status", "OK".into()),
            ],
            timestamp: Utc.with_ymd_and_hms(2018, 2, 8, 9, 7, 22).unwrap(),
        }
    }

    #[test]
    fn env_listing_prefixes_field_keys() {
        let names = shell_env_names(&["total_m3".to_string(), "current_status".to_string()]);
        assert_eq!(
            names,
            vec![
                "METER_JSON",
                "METER_NAME",
                "METER_ID",
                "METER_TIMESTAMP",
                "METER_TOTAL_M3",
                "METER_CURRENT_STATUS",
            ]
        );
    }

    #[test]
    fn reading_env_carries_rendered_values() {
        let envs = reading_env(&reading(), "{}");
        let get = |name: &str| {
            envs.iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("METER_JSON"), Some("{}"));
        assert_eq!(get("METER_NAME"), Some("MyTapWater"));
        assert_eq!(get("METER_ID"), Some("76348799"));
        assert_eq!(get("METER_TIMESTAMP"), Some("2018-02-08T09:07:22Z"));
        assert_eq!(get("METER_TOTAL_M3"), Some("6.388"));
        assert_eq!(get("METER_CURRENT_STATUS"), Some("OK"));
    }

    #[cfg(unix)]
    #[test]
    fn hook_sees_the_environment() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("hook-out");
        let command = format!("printf '%s' \"$METER_ID\" > {}", out.display());

        run_hook(&command, &reading_env(&reading(), "{}")).expect("hook ran");
        assert_eq!(std::fs::read_to_string(&out).expect("hook output"), "76348799");
    }

    #[cfg(unix)]
    #[test]
    fn failing_hook_is_not_an_error() {
        run_hook("exit 1", &[]).expect("non-zero exit is only logged");
    }
}
