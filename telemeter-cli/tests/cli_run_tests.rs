use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn telemeter_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("telemeter"))
}

/// An iperl telegram line: total litres plus max flow, plain TPL header.
fn iperl_line(id: &str, total_litres: u32, max_flow: u16) -> String {
    let mut f = vec![0u8, 0x44, 0xae, 0x4c];
    let id_bytes = hex::decode(id).expect("id hex");
    f.extend(id_bytes.iter().rev());
    f.extend_from_slice(&[0x68, 0x07, 0x7a]);
    f.extend_from_slice(&[0x2a, 0x00, 0x00, 0x00]);
    f.extend_from_slice(&total_litres.to_le_bytes());
    f.extend_from_slice(&max_flow.to_le_bytes());
    f[0] = (f.len() - 1) as u8;
    format!("telegram=|{}|", hex::encode(f))
}

fn write_simulation(dir: &Path, lines: &[String]) -> std::path::PathBuf {
    let path = dir.join("simulation_cli.txt");
    let mut contents = String::from("# generated by the test\n");
    for line in lines {
        contents.push_str(line);
        contents.push('\n');
    }
    fs::write(&path, contents).expect("write simulation file");
    path
}

#[test]
fn oneshot_simulation_prints_each_meter_and_exits_zero() {
    let dir = TempDir::new().expect("tempdir");
    let sim = write_simulation(
        dir.path(),
        &[
            iperl_line("11111111", 8_042, 362),
            iperl_line("22222222", 100, 0),
        ],
    );

    let assert = telemeter_cmd()
        .arg(&sim)
        .args(["first", "iperl", "11111111", ""])
        .args(["second", "iperl", "22222222", ""])
        .args(["--oneshot", "--format", "fields"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8");
    assert!(
        stdout.contains("first;11111111;8.042;0.362;"),
        "missing first reading in: {stdout}"
    );
    assert!(
        stdout.contains("second;22222222;0.100;0.000;"),
        "missing second reading in: {stdout}"
    );
}

#[test]
fn meterfiles_holds_the_latest_reading_after_the_run() {
    let dir = TempDir::new().expect("tempdir");
    let meterfiles = dir.path().join("readings");
    fs::create_dir_all(&meterfiles).expect("mkdir");
    let sim = write_simulation(dir.path(), &[iperl_line("33225544", 1_000, 0)]);

    telemeter_cmd()
        .arg(&sim)
        .args(["Garage", "iperl", "33225544", ""])
        .arg("--oneshot")
        .arg(format!("--meterfiles={}", meterfiles.display()))
        .assert()
        .success();

    let contents = fs::read_to_string(meterfiles.join("Garage")).expect("meter file");
    assert!(
        contents.starts_with("Garage\t33225544\t1.000 m3\t"),
        "unexpected meter file: {contents}"
    );
}

#[cfg(unix)]
#[test]
fn shell_hook_runs_once_per_reading() {
    let dir = TempDir::new().expect("tempdir");
    let hook_out = dir.path().join("hook-out");
    let sim = write_simulation(
        dir.path(),
        &[
            iperl_line("11111111", 500, 0),
            iperl_line("22222222", 600, 0),
        ],
    );

    telemeter_cmd()
        .arg(&sim)
        .args(["first", "iperl", "11111111", ""])
        .args(["second", "iperl", "22222222", ""])
        .arg("--oneshot")
        .arg("--shell")
        .arg(format!("printf '%s\\n' \"$METER_ID\" >> {}", hook_out.display()))
        .assert()
        .success();

    let contents = fs::read_to_string(&hook_out).expect("hook output");
    assert_eq!(contents, "11111111\n22222222\n");
}

#[test]
fn promiscuous_run_prints_ids_of_unconfigured_meters() {
    let dir = TempDir::new().expect("tempdir");
    let sim = write_simulation(
        dir.path(),
        &[
            iperl_line("11111111", 500, 0),
            iperl_line("22222222", 600, 0),
        ],
    );

    let assert = telemeter_cmd()
        .arg(&sim)
        .args(["--t1", "--exitafter", "1s"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8");
    assert!(
        stdout.lines().any(|line| line == "11111111"),
        "missing first id in: {stdout}"
    );
    assert!(
        stdout.lines().any(|line| line == "22222222"),
        "missing second id in: {stdout}"
    );
}

#[test]
fn empty_airwaves_exit_zero_on_the_time_budget() {
    let dir = TempDir::new().expect("tempdir");
    let sim = write_simulation(dir.path(), &[]);

    telemeter_cmd()
        .arg(&sim)
        .args(["--t1", "--exitafter", "1s"])
        .assert()
        .success();
}

#[test]
fn conflicting_meter_types_fail_naming_both_meters() {
    let dir = TempDir::new().expect("tempdir");
    let sim = write_simulation(dir.path(), &[]);

    telemeter_cmd()
        .arg(&sim)
        .args(["water", "multical21", "11111111", ""])
        .args(["power", "omnipower", "22222222", ""])
        .assert()
        .failure()
        .stderr(contains("a different link mode has been set already"))
        .stderr(contains("water"))
        .stderr(contains("power"));
}

#[test]
fn ragged_meter_arguments_are_a_usage_error() {
    telemeter_cmd()
        .args(["simulation.txt", "kitchen", "multical21"])
        .assert()
        .failure()
        .stderr(contains("quadruplets"));
}

#[test]
fn missing_device_is_a_usage_error() {
    telemeter_cmd()
        .arg("--oneshot")
        .assert()
        .failure()
        .stderr(contains("a device is required"));
}

#[test]
fn unknown_meter_type_is_rejected_before_the_run() {
    let dir = TempDir::new().expect("tempdir");
    let sim = write_simulation(dir.path(), &[]);

    telemeter_cmd()
        .arg(&sim)
        .args(["mystery", "watermeter3000", "11111111", ""])
        .assert()
        .failure()
        .stderr(contains("watermeter3000"));
}

#[test]
fn shellenvs_lists_the_environment_for_the_first_meter() {
    telemeter_cmd()
        .args(["simulation.txt", "Vatten", "multical21", "76348799", ""])
        .arg("--shellenvs")
        .assert()
        .success()
        .stdout(contains(
            "Environment variables provided to shell for meter multical21:",
        ))
        .stdout(contains("METER_JSON"))
        .stdout(contains("METER_TOTAL_M3"))
        .stdout(contains("METER_FLOW_TEMPERATURE_C"));
}

#[test]
fn reload_without_a_daemon_reports_not_running() {
    let dir = TempDir::new().expect("tempdir");
    let pid_file = dir.path().join("telemeterd.pid");

    telemeter_cmd()
        .arg("--reload")
        .arg(format!("--daemon={}", pid_file.display()))
        .assert()
        .failure()
        .stderr(contains("not running"));
}
