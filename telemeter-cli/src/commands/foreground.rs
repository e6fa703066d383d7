//! Foreground runs: listen on the terminal until a stop condition fires.

use anyhow::{bail, Result};

use telemeter_core::Config;
use telemeter_daemon::{init_tracing, run_blocking};
use telemeter_meters::{build_driver, MeterKind};
use telemeter_output::shell_env_names;

/// Run with the given configuration until interrupted, reloaded or done.
pub fn run(config: Config) -> Result<()> {
    init_tracing(config.log_level);
    let reason = run_blocking(&config)?;
    tracing::info!(%reason, "stopped");
    Ok(())
}

/// List the environment variables a shell hook would receive for the first
/// configured meter. The listing depends only on the meter type, so one
/// quadruplet is enough.
pub fn print_shell_envs(config: &Config) -> Result<()> {
    let Some(first) = config.meters.first() else {
        bail!("--shellenvs needs at least one meter quadruplet");
    };
    let kind: MeterKind = first.kind.parse()?;
    let driver = build_driver(kind, first.clone());
    println!(
        "Environment variables provided to shell for meter {}:",
        first.kind
    );
    for name in shell_env_names(&driver.field_names()) {
        println!("{name}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use telemeter_core::types::{MeterKey, MeterSpec};

    use super::*;

    fn config_with(meters: Vec<MeterSpec>) -> Config {
        Config {
            device: "simulation.txt".to_string(),
            meters,
            ..Config::default()
        }
    }

    #[test]
    fn shellenvs_needs_a_meter() {
        let err = print_shell_envs(&config_with(Vec::new())).unwrap_err();
        assert!(err.to_string().contains("quadruplet"), "got: {err}");
    }

    #[test]
    fn shellenvs_rejects_an_unknown_type() {
        let spec = MeterSpec {
            name: "tap".into(),
            kind: "watermeter3000".to_string(),
            id: "12345678".into(),
            key: MeterKey::default(),
        };
        let err = print_shell_envs(&config_with(vec![spec])).unwrap_err();
        assert!(err.to_string().contains("watermeter3000"), "got: {err}");
    }
}
