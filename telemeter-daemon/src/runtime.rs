//! The run loop.
//!
//! One reader task pulls telegrams off the device, one dispatcher task owns
//! the meter registry and drives its observers, a signal task and an optional
//! time-budget task watch for stop conditions. All tasks share a broadcast
//! shutdown channel; the first stop condition to fire wins and the rest
//! drain out.
//!
//! Entry points by mode: [`run_blocking`] for a one-off command-line run,
//! [`run_from_config_blocking`] for config-file runs that reload on SIGHUP,
//! and [`run_with_device`] as the injectable core the tests drive with a
//! simulator.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use telemeter_core::types::LogLevel;
use telemeter_core::{load_config_at, Config};
use telemeter_meters::{negotiate, MeterRegistry, MeterUpdate, Observation, Observer};
use telemeter_output::{PrintConfig, Printer};
use telemeter_wmbus::{open, resolve, Telegram, WmbusDevice};

use crate::error::{io_err, DaemonError};

// ---------------------------------------------------------------------------
// 1. Lifecycle types
// ---------------------------------------------------------------------------

/// The phases of one run, logged at every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    ResolvingDevice,
    NegotiatingLinkMode,
    Running,
    /// Running with the one-shot barrier armed.
    OneshotWaiting,
    ShuttingDown,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Init => "init",
            RunState::ResolvingDevice => "resolving-device",
            RunState::NegotiatingLinkMode => "negotiating-link-mode",
            RunState::Running => "running",
            RunState::OneshotWaiting => "oneshot-waiting",
            RunState::ShuttingDown => "shutting-down",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run stopped. Only [`StopReason::Reload`] makes config-file runs go
/// again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Ctrl-c or SIGTERM.
    Interrupted,
    /// SIGHUP.
    Reload,
    /// The configured `exit_after` budget elapsed.
    Budget,
    /// One-shot: every configured meter has reported at least once.
    Quiescent,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::Interrupted => "interrupted",
            StopReason::Reload => "reload",
            StopReason::Budget => "budget",
            StopReason::Quiescent => "quiescent",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn enter(state: &mut RunState, next: RunState) {
    tracing::debug!(from = %state, to = %next, "run state");
    *state = next;
}

// ---------------------------------------------------------------------------
// 2. Entry points
// ---------------------------------------------------------------------------

/// Resolve and open the configured device, then run until a stop condition
/// fires.
pub async fn run(config: &Config) -> Result<StopReason, DaemonError> {
    // A link mode conflict is caller input, so it surfaces before the port
    // is opened.
    negotiate(config.link_mode, &config.meters)?;
    let descriptor = resolve(&config.device);
    let device = open(&descriptor)?;
    tracing::info!(
        kind = %descriptor.kind,
        path = %descriptor.path.display(),
        "device resolved"
    );
    run_with_device(config, device).await
}

/// One command-line run on a fresh runtime, blocking until it stops.
pub fn run_blocking(config: &Config) -> Result<StopReason, DaemonError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config))
}

/// Run from the on-disk configuration under `root`, re-reading it and going
/// again whenever a reload is requested.
pub async fn run_from_config_at(root: &Path) -> Result<StopReason, DaemonError> {
    loop {
        let config = load_config_at(root)?;
        match run(&config).await? {
            StopReason::Reload => {
                tracing::info!("reload requested, re-reading configuration");
            }
            reason => return Ok(reason),
        }
    }
}

/// [`run_from_config_at`] on a fresh runtime, blocking until it stops.
pub fn run_from_config_blocking(root: &Path) -> Result<StopReason, DaemonError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run_from_config_at(root))
}

/// Run the full loop over an already-opened device.
pub async fn run_with_device(
    config: &Config,
    mut device: Box<dyn WmbusDevice>,
) -> Result<StopReason, DaemonError> {
    let mut state = RunState::Init;
    enter(&mut state, RunState::ResolvingDevice);
    tracing::debug!(device = %device.kind(), "device attached");

    enter(&mut state, RunState::NegotiatingLinkMode);
    let mode = negotiate(config.link_mode, &config.meters)?;
    device.set_link_mode(mode).await?;
    tracing::info!(mode = %mode, "link mode set");

    let mut registry = MeterRegistry::new();
    for spec in &config.meters {
        registry.register(spec.clone())?;
    }
    let printer = Arc::new(Printer::new(print_config(config)));
    attach_observers(&mut registry, &printer, config.one_shot)?;

    let promiscuous = registry.is_empty();
    if promiscuous {
        tracing::info!("no meters configured, printing id:s of all telegrams heard");
    }

    // Queues canned input when the device is a simulator; a no-op otherwise.
    device.simulate().await?;

    enter(&mut state, RunState::Running);
    if config.one_shot {
        enter(&mut state, RunState::OneshotWaiting);
    }

    let (telegram_tx, telegram_rx) = mpsc::channel::<Telegram>(64);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let reader_handle = {
        let shutdown = shutdown_tx.clone();
        let log_telegrams = config.log_telegrams;
        tokio::spawn(async move {
            let result =
                reader_task(device, telegram_tx, shutdown.subscribe(), log_telegrams).await;
            // A clean end of the stream is not a stop condition; only a
            // device failure brings the run down.
            if result.is_err() {
                let _ = shutdown.send(());
            }
            result
        })
    };

    let dispatcher_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let result = dispatcher_task(
                registry,
                telegram_rx,
                promiscuous,
                shutdown.clone(),
                shutdown.subscribe(),
            )
            .await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let result = signal_task(shutdown.clone(), shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let budget_handle = config.exit_after.map(|budget| {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let result = budget_task(budget, shutdown.clone(), shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    });

    let (reader_result, dispatcher_result, signal_result) =
        tokio::join!(reader_handle, dispatcher_handle, signal_handle);
    let budget_result = match budget_handle {
        Some(handle) => Some(handle.await),
        None => None,
    };

    enter(&mut state, RunState::ShuttingDown);
    handle_join("reader", reader_result)?;
    let quiescent = handle_join("dispatcher", dispatcher_result)?;
    let signalled = handle_join("signal_handler", signal_result)?;
    let elapsed = match budget_result {
        Some(result) => handle_join("budget", result)?,
        None => None,
    };

    let reason = signalled
        .or(quiescent)
        .or(elapsed)
        .unwrap_or(StopReason::Interrupted);
    tracing::info!(reason = %reason, "run finished");
    Ok(reason)
}

// ---------------------------------------------------------------------------
// 3. Setup helpers
// ---------------------------------------------------------------------------

fn print_config(config: &Config) -> PrintConfig {
    PrintConfig {
        format: config.format,
        separator: config.separator,
        meterfiles: config.meterfiles.clone(),
        shells: config.shells.clone(),
    }
}

/// Give every meter its print observer, then (in one-shot runs) the barrier
/// observer. Order matters: a reading is printed before the barrier may
/// request a stop.
fn attach_observers(
    registry: &mut MeterRegistry,
    printer: &Arc<Printer>,
    one_shot: bool,
) -> Result<(), DaemonError> {
    let names: Vec<_> = registry.cells().map(|cell| cell.spec().name.clone()).collect();
    for name in names {
        let print: Observer = {
            let printer = Arc::clone(printer);
            Box::new(move |update: &MeterUpdate<'_>| {
                if let Err(err) = printer.print(&update.cell.reading()) {
                    tracing::error!(
                        meter = %update.cell.spec().name,
                        error = %err,
                        "failed to publish reading"
                    );
                }
                Observation::Continue
            })
        };
        registry.subscribe(&name, print)?;

        if one_shot {
            let barrier: Observer = Box::new(|update: &MeterUpdate<'_>| {
                if update.registry.all_reported() {
                    Observation::RequestStop
                } else {
                    Observation::Continue
                }
            });
            registry.subscribe(&name, barrier)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// 4. Tasks
// ---------------------------------------------------------------------------

async fn reader_task(
    mut device: Box<dyn WmbusDevice>,
    telegram_tx: mpsc::Sender<Telegram>,
    mut shutdown_rx: broadcast::Receiver<()>,
    log_telegrams: bool,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            next = device.next_telegram() => {
                match next {
                    Ok(Some(telegram)) => {
                        if log_telegrams {
                            tracing::info!(id = %telegram.id, hex = %telegram.hex(), "telegram");
                        }
                        if telegram_tx.send(telegram).await.is_err() {
                            break;
                        }
                    }
                    // End of the stream (a drained simulation).
                    Ok(None) => break,
                    Err(err) => return Err(err.into()),
                }
            }
        }
    }
    Ok(())
}

async fn dispatcher_task(
    mut registry: MeterRegistry,
    mut telegram_rx: mpsc::Receiver<Telegram>,
    promiscuous: bool,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<Option<StopReason>, DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe = telegram_rx.recv() => {
                let Some(telegram) = maybe else {
                    // The stream ended; stop conditions still govern the
                    // run, so park until one fires.
                    let _ = shutdown_rx.recv().await;
                    break;
                };
                if promiscuous {
                    println!("{}", telegram.id);
                    continue;
                }
                let delivery = registry.deliver(&telegram);
                if delivery.stop_requested {
                    tracing::info!("all meters have reported, stopping");
                    let _ = shutdown_tx.send(());
                    return Ok(Some(StopReason::Quiescent));
                }
            }
        }
    }
    Ok(None)
}

#[cfg(unix)]
async fn signal_task(
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<Option<StopReason>, DaemonError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).map_err(|e| io_err("sighup-handler", e))?;
    let mut terminate =
        signal(SignalKind::terminate()).map_err(|e| io_err("sigterm-handler", e))?;

    tokio::select! {
        _ = shutdown_rx.recv() => Ok(None),
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => {
                tracing::info!("received ctrl-c, shutting down");
                let _ = shutdown_tx.send(());
                Ok(Some(StopReason::Interrupted))
            }
            Err(err) => Err(io_err("ctrl-c-handler", err)),
        },
        _ = terminate.recv() => {
            tracing::info!("received SIGTERM, shutting down");
            let _ = shutdown_tx.send(());
            Ok(Some(StopReason::Interrupted))
        }
        _ = hangup.recv() => {
            tracing::info!("received SIGHUP");
            let _ = shutdown_tx.send(());
            Ok(Some(StopReason::Reload))
        }
    }
}

#[cfg(not(unix))]
async fn signal_task(
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<Option<StopReason>, DaemonError> {
    tokio::select! {
        _ = shutdown_rx.recv() => Ok(None),
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => {
                tracing::info!("received ctrl-c, shutting down");
                let _ = shutdown_tx.send(());
                Ok(Some(StopReason::Interrupted))
            }
            Err(err) => Err(io_err("ctrl-c-handler", err)),
        },
    }
}

async fn budget_task(
    budget: Duration,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<Option<StopReason>, DaemonError> {
    tokio::select! {
        _ = shutdown_rx.recv() => Ok(None),
        _ = tokio::time::sleep(budget) => {
            tracing::info!(budget = ?budget, "run time budget exhausted, shutting down");
            let _ = shutdown_tx.send(());
            Ok(Some(StopReason::Budget))
        }
    }
}

fn handle_join<T>(
    task: &str,
    result: Result<Result<T, DaemonError>, tokio::task::JoinError>,
) -> Result<T, DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Runtime(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// 5. Tracing
// ---------------------------------------------------------------------------

/// Install the global subscriber for foreground runs. `RUST_LOG` overrides
/// the flag-derived level.
pub fn init_tracing(level: LogLevel) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

/// Install logging for the detached child. Stdio points at /dev/null, so
/// records go to the daemon log file as JSON lines; if the file cannot be
/// opened the child runs silent.
pub fn init_daemon_tracing(level: LogLevel, log_path: &Path) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::new(level.as_filter());
    if let Ok(file) = std::fs::OpenOptions::new().create(true).append(true).open(log_path) {
        let _ = fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(Arc::new(file))
            .try_init();
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
