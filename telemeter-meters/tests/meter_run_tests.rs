//! End-to-end tests over the public meters API: link-mode negotiation plus
//! registry delivery, the way the run loop drives them.

use std::sync::{Arc, Mutex};

use telemeter_core::{LinkMode, MeterName, MeterSpec};
use telemeter_meters::{negotiate, MeterError, MeterRegistry, Observation, Observer};
use telemeter_wmbus::Telegram;

fn spec(name: &str, kind: &str, id: &str) -> MeterSpec {
    MeterSpec {
        name: name.into(),
        kind: kind.to_string(),
        id: id.into(),
        key: Default::default(),
    }
}

/// A short wM-Bus frame addressed to `id` with a plaintext TPL header.
fn short_frame(id: &str, ci: u8, body: &[u8]) -> Telegram {
    let id_bytes = hex::decode(id).expect("id digits");
    let mut frame = vec![0u8, 0x44, 0xae, 0x4c];
    frame.extend(id_bytes.iter().rev());
    frame.extend_from_slice(&[0x1b, 0x16, ci, 0x2a, 0x00, 0x00, 0x00]);
    frame.extend_from_slice(body);
    frame[0] = (frame.len() - 1) as u8;
    Telegram::parse(&frame).expect("well-formed frame")
}

fn iperl_frame(id: &str, total_l: u32) -> Telegram {
    let mut body = Vec::new();
    body.extend_from_slice(&total_l.to_le_bytes());
    body.extend_from_slice(&100u16.to_le_bytes());
    short_frame(id, 0x7a, &body)
}

// ---------------------------------------------------------------------------
// 1. Link-mode negotiation over full configurations
// ---------------------------------------------------------------------------

#[test]
fn homogeneous_config_infers_its_mode() {
    let meters = vec![
        spec("kitchen", "multical21", "11111111"),
        spec("bathroom", "flowiq3100", "22222222"),
        spec("radiator", "qcaloric", "33333333"),
    ];
    let mode = negotiate(None, &meters).expect("negotiated");
    assert_eq!(mode, LinkMode::C1);
}

#[test]
fn mixed_config_fails_with_both_names() {
    let meters = vec![
        spec("water", "multical21", "11111111"),
        spec("power", "omnipower", "22222222"),
    ];
    let err = negotiate(None, &meters).expect_err("conflict");
    assert!(matches!(err, MeterError::LinkModeConflict { .. }), "got: {err}");
    let msg = err.to_string();
    assert!(msg.contains("water") && msg.contains("power"), "got: {msg}");
    assert!(msg.contains("c1") && msg.contains("t1"), "got: {msg}");
}

#[test]
fn explicit_mode_overrides_a_conflict() {
    let meters = vec![
        spec("water", "multical21", "11111111"),
        spec("power", "omnipower", "22222222"),
    ];
    let mode = negotiate(Some(LinkMode::C1), &meters).expect("explicit wins");
    assert_eq!(mode, LinkMode::C1);
}

// ---------------------------------------------------------------------------
// 2. One-shot run against a registry
// ---------------------------------------------------------------------------

fn output_then_barrier(registry: &mut MeterRegistry, name: &str, printed: &Arc<Mutex<Vec<String>>>) {
    let log = Arc::clone(printed);
    let print: Observer = Box::new(move |update| {
        let reading = update.cell.reading();
        log.lock().expect("log lock").push(reading.meter.to_string());
        Observation::Continue
    });
    let barrier: Observer = Box::new(|update| {
        if update.registry.all_reported() {
            Observation::RequestStop
        } else {
            Observation::Continue
        }
    });
    let name = MeterName::from(name);
    registry.subscribe(&name, print).expect("print observer");
    registry.subscribe(&name, barrier).expect("barrier observer");
}

#[test]
fn one_shot_run_prints_every_meter_before_stopping() {
    let mut registry = MeterRegistry::new();
    registry
        .register(spec("kitchen", "iperl", "11111111"))
        .expect("kitchen");
    registry
        .register(spec("garage", "iperl", "22222222"))
        .expect("garage");

    let printed = Arc::new(Mutex::new(Vec::new()));
    output_then_barrier(&mut registry, "kitchen", &printed);
    output_then_barrier(&mut registry, "garage", &printed);

    // Duplicates and strangers must not trip the barrier early.
    assert!(!registry.deliver(&iperl_frame("11111111", 1000)).stop_requested);
    assert!(!registry.deliver(&iperl_frame("11111111", 1001)).stop_requested);
    assert!(!registry.deliver(&iperl_frame("99999999", 5000)).stop_requested);

    let last = registry.deliver(&iperl_frame("22222222", 2000));
    assert!(last.stop_requested);

    // The final reading was printed before the stop request was raised.
    let printed = printed.lock().expect("log lock");
    assert_eq!(printed.last().map(String::as_str), Some("garage"));
}

#[test]
fn decode_failures_keep_the_run_alive() {
    let mut registry = MeterRegistry::new();
    registry
        .register(spec("kitchen", "iperl", "11111111"))
        .expect("kitchen");
    let printed = Arc::new(Mutex::new(Vec::new()));
    output_then_barrier(&mut registry, "kitchen", &printed);

    // Addressed correctly but undecodable: wrong dialect, then encrypted.
    let wrong_ci = short_frame("11111111", 0x79, &[0; 6]);
    assert_eq!(registry.deliver(&wrong_ci).updated, 0);

    let mut body = Vec::new();
    body.extend_from_slice(&1000u32.to_le_bytes());
    body.extend_from_slice(&100u16.to_le_bytes());
    let mut frame_bytes = iperl_frame("11111111", 1000).frame;
    frame_bytes[13] = 0x05; // configuration word marks encryption
    let encrypted = Telegram::parse(&frame_bytes).expect("reparse");
    assert_eq!(registry.deliver(&encrypted).updated, 0);

    assert!(printed.lock().expect("log lock").is_empty());
    assert!(!registry.all_reported());

    // A good telegram still lands afterwards.
    let delivery = registry.deliver(&iperl_frame("11111111", 1000));
    assert_eq!(delivery.updated, 1);
    assert!(delivery.stop_requested);
}
