//! Telemeter — wireless utility-meter reading daemon.
//!
//! # Usage
//!
//! ```text
//! telemeter [OPTIONS] [DEVICE] [NAME TYPE ID KEY]...
//! telemeter --useconfig
//! telemeter --daemon[=PIDFILE]
//! telemeter --reload
//! ```
//!
//! `DEVICE` is `auto`, a port path, `im871a:PATH`, `amb8465:PATH`, or a
//! simulation file. Trailing arguments configure meters in quadruplets.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;

use telemeter_core::types::{LinkMode, LogLevel, MeterId, MeterKey, MeterName, MeterSpec, OutputFormat};
use telemeter_core::{parse_duration, Config};

const DEFAULT_PID_FILE: &str = "/var/run/telemeterd.pid";

// ---------------------------------------------------------------------------
// CLI surface
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "telemeter",
    version,
    about = "Read wireless utility meters through a wM-Bus dongle or a simulation file",
    after_help = "Meter types: multical21, flowiq3100, supercom587, iperl (water), \
multical302 (heat), omnipower (electricity), qcaloric (heat cost).\n\
Specifying auto as the device probes /dev/im871a, /dev/amb8465 and /simulation.txt."
)]
struct Cli {
    /// auto, a port path, im871a:PATH, amb8465:PATH, or a simulation file.
    #[arg(value_name = "DEVICE")]
    device: Option<String>,

    /// Meter quadruplets: NAME TYPE ID KEY. KEY may be "" when the meter is
    /// not encrypted. Repeat to listen to more meters.
    #[arg(value_name = "NAME TYPE ID KEY", num_args = 0..)]
    meters: Vec<String>,

    /// Listen in link mode C1.
    #[arg(long, conflicts_with = "t1")]
    c1: bool,

    /// Listen in link mode T1.
    #[arg(long)]
    t1: bool,

    /// Wait for one update from every configured meter, then quit.
    #[arg(long)]
    oneshot: bool,

    /// Exit after running this long: 20h, 10m, 5s, or combined forms.
    #[arg(long, value_name = "DURATION")]
    exitafter: Option<String>,

    /// Output format: text, json or fields.
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    format: OutputFormat,

    /// Field separator for the fields format.
    #[arg(long, value_name = "CHAR", default_value_t = ';')]
    separator: char,

    /// Store the latest reading per meter in DIR/<meter name>.
    #[arg(
        long,
        value_name = "DIR",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "/tmp"
    )]
    meterfiles: Option<PathBuf>,

    /// Invoke CMD with METER_* environment variables for every reading.
    #[arg(long, value_name = "CMD")]
    shell: Vec<String>,

    /// List the environment variables a shell hook would see for the first
    /// configured meter, then exit.
    #[arg(long)]
    shellenvs: bool,

    /// Log each accepted telegram as hex.
    #[arg(long)]
    logtelegrams: bool,

    /// More detail on communication.
    #[arg(long)]
    verbose: bool,

    /// Protocol-level detail.
    #[arg(long)]
    debug: bool,

    /// Suppress everything but errors.
    #[arg(long)]
    silence: bool,

    /// Run from /etc/telemeter.yaml and /etc/telemeter.d/ (root overridable
    /// via TELEMETER_CONFIG_ROOT).
    #[arg(long)]
    useconfig: bool,

    /// Detach and run in the background, recording the pid.
    #[arg(
        long,
        value_name = "PIDFILE",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = DEFAULT_PID_FILE
    )]
    daemon: Option<PathBuf>,

    /// Tell a running daemon to re-read its configuration, then exit.
    #[arg(long)]
    reload: bool,
}

impl Cli {
    /// Assemble the run configuration for foreground mode. Fails on usage
    /// errors: missing device, ragged quadruplets, bad duration, bad key hex.
    fn into_config(self) -> Result<Config> {
        let Some(device) = self.device else {
            bail!(
                "a device is required: auto, a port path, im871a:PATH, amb8465:PATH \
                 or a simulation file"
            );
        };
        let link_mode = if self.c1 {
            Some(LinkMode::C1)
        } else if self.t1 {
            Some(LinkMode::T1)
        } else {
            None
        };
        let exit_after = self.exitafter.as_deref().map(parse_duration).transpose()?;
        let meters = parse_meters(&self.meters)?;
        Ok(Config {
            device,
            link_mode,
            one_shot: self.oneshot,
            exit_after,
            log_level: LogLevel::from_flags(self.silence, self.verbose, self.debug),
            log_telegrams: self.logtelegrams,
            format: self.format,
            separator: self.separator,
            meterfiles: self.meterfiles,
            shells: self.shell,
            meters,
        })
    }
}

/// Trailing arguments come in quadruplets: NAME TYPE ID KEY.
fn parse_meters(args: &[String]) -> Result<Vec<MeterSpec>> {
    if args.len() % 4 != 0 {
        bail!(
            "meter arguments must be quadruplets of NAME TYPE ID KEY; got {} trailing arguments",
            args.len()
        );
    }
    args.chunks(4)
        .map(|quad| {
            let key = MeterKey::from_hex(&quad[3])
                .with_context(|| format!("meter \"{}\"", quad[0]))?;
            Ok(MeterSpec {
                name: MeterName::from(quad[0].as_str()),
                kind: quad[1].clone(),
                id: MeterId::from(quad[2].as_str()),
                key,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

/// Entry modes are mutually exclusive, checked in a fixed order: reload,
/// daemon, config files, foreground.
fn try_main() -> Result<()> {
    let cli = Cli::parse();

    if cli.reload {
        let pid_file = cli
            .daemon
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PID_FILE));
        return commands::daemon::reload(&pid_file);
    }
    if let Some(pid_file) = cli.daemon.clone() {
        return commands::daemon::run(&pid_file);
    }
    if cli.useconfig {
        return commands::configured::run();
    }

    let shellenvs = cli.shellenvs;
    let config = cli.into_config()?;
    if shellenvs {
        return commands::foreground::print_shell_envs(&config);
    }
    commands::foreground::run(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadruplets_parse_in_order() {
        let args: Vec<String> = [
            "Kitchen", "multical21", "76348799", "",
            "Garage", "iperl", "33225544", "deadbeef",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let meters = parse_meters(&args).expect("parse");
        assert_eq!(meters.len(), 2);
        assert_eq!(meters[0].name, MeterName::from("Kitchen"));
        assert_eq!(meters[0].kind, "multical21");
        assert!(meters[0].key.is_empty());
        assert_eq!(meters[1].id, MeterId::from("33225544"));
        assert!(!meters[1].key.is_empty());
    }

    #[test]
    fn ragged_quadruplets_are_rejected() {
        let args: Vec<String> = ["Kitchen", "multical21", "76348799"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let err = parse_meters(&args).unwrap_err();
        assert!(err.to_string().contains("quadruplets"), "got: {err}");
    }

    #[test]
    fn bad_key_hex_names_the_meter() {
        let args: Vec<String> = ["Kitchen", "multical21", "76348799", "zz"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let err = parse_meters(&args).unwrap_err();
        assert!(format!("{err:#}").contains("Kitchen"), "got: {err:#}");
    }

    #[test]
    fn cli_shape_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
