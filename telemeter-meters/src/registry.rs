//! The meter registry: live meters, observers and telegram delivery.
//!
//! The registry owns every configured meter for the lifetime of a run.
//! Each meter carries its decoder, a count of successful updates and an
//! ordered list of observers. Delivery is synchronous and single-threaded:
//! the run loop hands telegrams to [`MeterRegistry::deliver`] one at a
//! time, so observers never race and see a consistent registry.

use std::mem;

use tracing::{debug, trace, warn};

use telemeter_core::{MeterName, MeterSpec, Reading};
use telemeter_wmbus::Telegram;

use crate::drivers::{build_driver, MeterDriver};
use crate::error::MeterError;
use crate::kind::MeterKind;

// ---------------------------------------------------------------------------
// Observers
// ---------------------------------------------------------------------------

/// What an observer asks of the run loop after seeing an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Keep running.
    Continue,
    /// Stop the run; used by the one-shot barrier once every meter has
    /// reported.
    RequestStop,
}

/// A borrowed view of one updated meter, valid only for the callback.
///
/// The update count of `cell` is already bumped when observers run, so a
/// barrier observer checking [`MeterRegistry::all_reported`] sees the
/// update that triggered it.
pub struct MeterUpdate<'a> {
    pub cell: &'a MeterCell,
    pub registry: &'a MeterRegistry,
}

/// An observer attached to one meter, invoked after each successful decode.
pub type Observer = Box<dyn FnMut(&MeterUpdate<'_>) -> Observation + Send>;

// ---------------------------------------------------------------------------
// MeterCell
// ---------------------------------------------------------------------------

/// One live meter: its configuration, decoder, update count and observers.
pub struct MeterCell {
    spec: MeterSpec,
    kind: MeterKind,
    driver: Box<dyn MeterDriver>,
    update_count: u64,
    observers: Vec<Observer>,
}

impl MeterCell {
    pub fn spec(&self) -> &MeterSpec {
        &self.spec
    }

    pub fn kind(&self) -> MeterKind {
        self.kind
    }

    /// How many telegrams this meter has successfully decoded. Only
    /// [`MeterRegistry::deliver`] increments this, and only on success.
    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    /// The meter's most recent reading.
    pub fn reading(&self) -> Reading {
        self.driver.reading()
    }

    /// The field keys this meter exports, in output order.
    pub fn field_names(&self) -> Vec<String> {
        self.driver.field_names()
    }
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// Outcome of delivering one telegram.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// How many meters accepted and decoded the telegram.
    pub updated: usize,
    /// Whether some observer asked the run loop to stop.
    pub stop_requested: bool,
}

// ---------------------------------------------------------------------------
// MeterRegistry
// ---------------------------------------------------------------------------

/// All meters of a run, in registration order.
#[derive(Default)]
pub struct MeterRegistry {
    cells: Vec<MeterCell>,
}

impl MeterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one configured meter.
    ///
    /// Dispatch over meter types is closed: an unknown type name is an
    /// error, never a default. Meter names must be unique within a run
    /// because output lines and shell hooks identify meters by name.
    pub fn register(&mut self, spec: MeterSpec) -> Result<(), MeterError> {
        let kind: MeterKind = spec.kind.parse()?;
        if self.cells.iter().any(|cell| cell.spec.name == spec.name) {
            return Err(MeterError::DuplicateName {
                name: spec.name.to_string(),
            });
        }
        debug!(
            name = %spec.name,
            kind = %kind,
            id = %spec.id,
            media = kind.media(),
            encrypted = !spec.key.is_empty(),
            "meter registered"
        );
        let driver = build_driver(kind, spec.clone());
        self.cells.push(MeterCell {
            spec,
            kind,
            driver,
            update_count: 0,
            observers: Vec::new(),
        });
        Ok(())
    }

    /// Attach an observer to the named meter. Observers run in attachment
    /// order, so attach the output observer before the one-shot barrier to
    /// guarantee the final reading is printed before the stop request.
    pub fn subscribe(&mut self, name: &MeterName, observer: Observer) -> Result<(), MeterError> {
        let cell = self
            .cells
            .iter_mut()
            .find(|cell| cell.spec.name == *name)
            .ok_or_else(|| MeterError::NoSuchMeter {
                name: name.to_string(),
            })?;
        cell.observers.push(observer);
        Ok(())
    }

    /// Route one telegram to every meter that claims it.
    ///
    /// For each claiming meter in registration order: decode, and on
    /// success bump the update count and run that meter's observers before
    /// the next meter is considered. A failed decode is logged and counts
    /// for nothing.
    pub fn deliver(&mut self, telegram: &Telegram) -> Delivery {
        let mut delivery = Delivery::default();
        for index in 0..self.cells.len() {
            if !self.cells[index].driver.wants(telegram) {
                continue;
            }
            if let Err(err) = self.cells[index].driver.consume(telegram) {
                warn!(
                    meter = %self.cells[index].spec.name,
                    telegram = %telegram.id,
                    error = %err,
                    "telegram not decoded"
                );
                continue;
            }
            self.cells[index].update_count += 1;
            delivery.updated += 1;
            trace!(
                meter = %self.cells[index].spec.name,
                updates = self.cells[index].update_count,
                "meter updated"
            );

            // Observers get shared access to the whole registry, so their
            // storage is taken out of the cell for the duration of the
            // callbacks and restored afterwards.
            let mut observers = mem::take(&mut self.cells[index].observers);
            for observer in observers.iter_mut() {
                let update = MeterUpdate {
                    cell: &self.cells[index],
                    registry: &*self,
                };
                if observer(&update) == Observation::RequestStop {
                    delivery.stop_requested = true;
                }
            }
            self.cells[index].observers = observers;
        }
        delivery
    }

    /// The quiescence predicate: has every meter reported at least once?
    ///
    /// Re-scans all meters on each call. Meter counts are small, so the
    /// linear scan is not worth caching.
    pub fn all_reported(&self) -> bool {
        self.cells.iter().all(|cell| cell.update_count >= 1)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The meters in registration order.
    pub fn cells(&self) -> impl Iterator<Item = &MeterCell> {
        self.cells.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::drivers::testutil::{plain_payload, spec, telegram};

    fn iperl_telegram(id: &str, total_l: u32, max_flow_lh: u16) -> Telegram {
        let mut body = Vec::new();
        body.extend_from_slice(&total_l.to_le_bytes());
        body.extend_from_slice(&max_flow_lh.to_le_bytes());
        telegram(id, 0x7a, &plain_payload(&body))
    }

    fn log_observer(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Observer {
        let log = Arc::clone(log);
        Box::new(move |update| {
            log.lock()
                .expect("log lock")
                .push(format!("{tag}:{}", update.cell.spec().name));
            Observation::Continue
        })
    }

    fn barrier_observer() -> Observer {
        Box::new(|update| {
            if update.registry.all_reported() {
                Observation::RequestStop
            } else {
                Observation::Continue
            }
        })
    }

    #[test]
    fn register_rejects_unknown_type() {
        let mut registry = MeterRegistry::new();
        let err = registry
            .register(spec("m", "gazmeter", "11111111"))
            .expect_err("unknown type");
        assert!(err.to_string().contains("gazmeter"));
        assert!(registry.is_empty());
    }

    #[test]
    fn register_rejects_duplicate_names() {
        let mut registry = MeterRegistry::new();
        registry
            .register(spec("water", "iperl", "11111111"))
            .expect("first");
        let err = registry
            .register(spec("water", "iperl", "22222222"))
            .expect_err("same name");
        assert!(matches!(err, MeterError::DuplicateName { .. }));
        assert!(err.to_string().contains("water"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn two_meters_may_listen_to_the_same_id() {
        let mut registry = MeterRegistry::new();
        registry
            .register(spec("first", "iperl", "11111111"))
            .expect("first");
        registry
            .register(spec("second", "iperl", "11111111"))
            .expect("second");

        let delivery = registry.deliver(&iperl_telegram("11111111", 1000, 10));
        assert_eq!(delivery.updated, 2);
        assert!(registry.all_reported());
    }

    #[test]
    fn subscribe_to_unknown_meter_fails() {
        let mut registry = MeterRegistry::new();
        let err = registry
            .subscribe(&MeterName::from("ghost"), barrier_observer())
            .expect_err("not registered");
        assert!(matches!(err, MeterError::NoSuchMeter { .. }));
    }

    #[test]
    fn unaddressed_telegrams_update_nothing() {
        let mut registry = MeterRegistry::new();
        registry
            .register(spec("water", "iperl", "11111111"))
            .expect("registered");

        let delivery = registry.deliver(&iperl_telegram("99999999", 1000, 10));
        assert_eq!(delivery, Delivery::default());
        assert!(!registry.all_reported());
    }

    #[test]
    fn failed_decode_never_counts_as_an_update() {
        let mut registry = MeterRegistry::new();
        registry
            .register(spec("water", "iperl", "11111111"))
            .expect("registered");

        // Addressed to the meter but in the wrong dialect.
        let wrong_ci = telegram("11111111", 0x79, &plain_payload(&[0; 6]));
        let delivery = registry.deliver(&wrong_ci);
        assert_eq!(delivery.updated, 0);
        assert!(!registry.all_reported());

        let cell = registry.cells().next().expect("one meter");
        assert_eq!(cell.update_count(), 0);
    }

    #[test]
    fn update_counts_are_monotonic() {
        let mut registry = MeterRegistry::new();
        registry
            .register(spec("water", "iperl", "11111111"))
            .expect("registered");

        registry.deliver(&iperl_telegram("11111111", 1000, 10));
        registry.deliver(&iperl_telegram("11111111", 2000, 20));
        let cell = registry.cells().next().expect("one meter");
        assert_eq!(cell.update_count(), 2);
    }

    #[test]
    fn observers_run_in_subscription_order() {
        let mut registry = MeterRegistry::new();
        registry
            .register(spec("water", "iperl", "11111111"))
            .expect("registered");

        let log = Arc::new(Mutex::new(Vec::new()));
        let name = MeterName::from("water");
        registry
            .subscribe(&name, log_observer(&log, "print"))
            .expect("print observer");
        registry
            .subscribe(&name, log_observer(&log, "oneshot"))
            .expect("oneshot observer");

        registry.deliver(&iperl_telegram("11111111", 1000, 10));
        assert_eq!(
            *log.lock().expect("log lock"),
            vec!["print:water", "oneshot:water"]
        );
    }

    #[test]
    fn one_shot_barrier_stops_once_every_meter_reported() {
        let mut registry = MeterRegistry::new();
        registry
            .register(spec("kitchen", "iperl", "11111111"))
            .expect("kitchen");
        registry
            .register(spec("garage", "iperl", "22222222"))
            .expect("garage");
        for name in ["kitchen", "garage"] {
            registry
                .subscribe(&MeterName::from(name), barrier_observer())
                .expect("barrier");
        }

        let first = registry.deliver(&iperl_telegram("11111111", 1000, 10));
        assert!(!first.stop_requested);

        let second = registry.deliver(&iperl_telegram("22222222", 2000, 20));
        assert!(second.stop_requested);
    }

    #[test]
    fn repeats_from_one_meter_do_not_satisfy_the_barrier() {
        let mut registry = MeterRegistry::new();
        registry
            .register(spec("kitchen", "iperl", "11111111"))
            .expect("kitchen");
        registry
            .register(spec("garage", "iperl", "22222222"))
            .expect("garage");
        registry
            .subscribe(&MeterName::from("kitchen"), barrier_observer())
            .expect("barrier");

        for _ in 0..3 {
            let delivery = registry.deliver(&iperl_telegram("11111111", 1000, 10));
            assert!(!delivery.stop_requested);
        }
        assert!(!registry.all_reported());
    }

    #[test]
    fn observer_sees_the_update_that_triggered_it() {
        let mut registry = MeterRegistry::new();
        registry
            .register(spec("water", "iperl", "11111111"))
            .expect("registered");
        registry
            .subscribe(
                &MeterName::from("water"),
                Box::new(|update| {
                    assert_eq!(update.cell.update_count(), 1);
                    let reading = update.cell.reading();
                    assert_eq!(reading.fields[0].key(), "total_m3");
                    Observation::Continue
                }),
            )
            .expect("observer");

        registry.deliver(&iperl_telegram("11111111", 1000, 10));
    }

    #[test]
    fn delivery_to_an_empty_registry_is_inert() {
        let mut registry = MeterRegistry::new();
        let delivery = registry.deliver(&iperl_telegram("11111111", 1000, 10));
        assert_eq!(delivery, Delivery::default());
        // Vacuously true; the run loop never consults the barrier when no
        // meters are configured.
        assert!(registry.all_reported());
    }
}
