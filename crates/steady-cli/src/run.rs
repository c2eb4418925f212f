//! `steady run`: the engine driven by an event script on stdin.

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use steady_core::{
    ActivationState, Engine, EngineStats, InjectError, Injector, InputBus, LiveSettings,
    ModifierAdapter, PointerButton, Settings, StopOutcome, TriggerAdapter, spawn_adapter,
};
use steady_store::ProfileStore;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

use crate::script::{ScriptCommand, parse_line};

/// Writes every injected event to stdout as `move dx dy` / `scroll n`.
/// Stands in for a platform injection back-end.
pub struct EchoInjector;

impl Injector for EchoInjector {
    fn move_relative(&self, dx: i32, dy: i32) -> Result<(), InjectError> {
        writeln!(std::io::stdout().lock(), "move {dx} {dy}")?;
        Ok(())
    }

    fn scroll(&self, amount: i32) -> Result<(), InjectError> {
        writeln!(std::io::stdout().lock(), "scroll {amount}")?;
        Ok(())
    }
}

pub struct RunOptions {
    pub button: PointerButton,
}

pub async fn run(store: &ProfileStore, settings: Settings, opts: RunOptions) -> Result<EngineStats> {
    let (activation, reduction) = ActivationState::with_percent(settings.reduction_percent);
    let engine = Engine::new(Arc::new(activation), EchoInjector);
    let live = LiveSettings::new(settings, engine.handle(), reduction);

    let bus = InputBus::default();
    let adapters = [
        spawn_adapter(&bus, TriggerAdapter::new(opts.button, live.clone())),
        spawn_adapter(&bus, ModifierAdapter::new(live.clone())),
    ];

    let mut reports = engine.subscribe();
    let report_task = tokio::spawn(async move {
        loop {
            match reports.recv().await {
                Ok(report) => eprintln!("{report}"),
                Err(RecvError::Lagged(n)) => eprintln!("warning: {n} engine reports dropped"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    engine.start().context("failed to start compensation engine")?;
    tracing::info!("engine running; trigger button is {}", opts.button);

    let mut lines = spawn_stdin_reader();
    let mut line_no = 0usize;
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        let line = tokio::select! {
            line = lines.recv() => line,
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received");
                break;
            }
        };
        let Some(line) = line else { break };
        line_no += 1;
        match parse_line(&line) {
            Ok(Some(cmd)) => {
                // a long `wait` must not hold off a signal
                tokio::select! {
                    _ = apply(cmd, &bus, &live, store) => {}
                    _ = &mut shutdown => {
                        tracing::info!("shutdown signal received");
                        break;
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("script line {line_no}: {e}");
                eprintln!("line {line_no}: {e}");
            }
        }
    }

    if engine.stop().await == StopOutcome::Zombie {
        tracing::warn!("engine loop left running at exit");
    }
    engine.activation().reset();
    drop(bus);
    for adapter in adapters {
        if let Err(e) = adapter.await {
            tracing::warn!("input adapter ended abnormally: {e}");
        }
    }
    report_task.abort();
    Ok(engine.stats())
}

/// Blocking stdin reads run on a plain thread so a pending read never holds
/// up runtime shutdown after a signal. Invalid UTF-8 is replaced rather than
/// rejected; a read error ends the script like EOF.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(64);
    std::thread::spawn(move || {
        let mut stdin = std::io::stdin().lock();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match stdin.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']).to_string();
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::warn!("stopped reading event script: {e}");
                    break;
                }
            }
        }
    });
    rx
}

async fn apply(cmd: ScriptCommand, bus: &InputBus, live: &LiveSettings, store: &ProfileStore) {
    match cmd {
        ScriptCommand::Input(event) => {
            bus.publish(event);
        }
        ScriptCommand::Enable(enabled) => live.set_enabled(enabled),
        ScriptCommand::Wait(d) => tokio::time::sleep(d).await,
        ScriptCommand::IntervalMs(ms) => {
            live.set_interval_ms(ms);
        }
        ScriptCommand::Reduction(pct) => live.set_reduction_percent(pct),
        ScriptCommand::Modifier(key) => {
            live.set_modifier_key(&key);
        }
        ScriptCommand::Load(name) => match store.get(&name) {
            Some(profile) => live.apply_profile(profile),
            None => {
                tracing::warn!("no profile named '{name}'");
                eprintln!("no profile named '{name}'");
            }
        },
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("cannot listen for SIGTERM: {e}");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
