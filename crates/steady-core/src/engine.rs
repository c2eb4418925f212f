//! The compensation loop and its lifecycle.
//!
//! One tokio task per run samples the activation flags, advances the
//! accumulator against the active profile, and hands whole units to the
//! injector. A failed tick, including a panic raised by the injector or the
//! reduction source, is reported and backed off. A panic elsewhere in the
//! loop body ends the run and leaves the engine `Stopped`.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::accumulator::{Accumulator, Step};
use crate::activation::ActivationState;
use crate::constants::{
    DEFAULT_INTERVAL_SECS, ERROR_BACKOFF, IDLE_INTERVAL, MAX_INTERVAL_SECS, MIN_INTERVAL_SECS,
    STOP_GRACE, WHEEL_DELTA,
};
use crate::inject::{InjectError, Injector};
use crate::profile::Profile;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    Idle = 0,
    Running = 1,
    Stopped = 2,
}

impl EngineState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => EngineState::Running,
            2 => EngineState::Stopped,
            _ => EngineState::Idle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    AlreadyRunning,
    /// `start()` was called outside a tokio runtime.
    NoRuntime,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::AlreadyRunning => write!(f, "compensation loop is already running"),
            EngineError::NoRuntime => write!(f, "no tokio runtime to run the compensation loop"),
        }
    }
}

impl std::error::Error for EngineError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

/// Human-readable diagnostic published by the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineReport {
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for EngineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        };
        write!(f, "{tag}: {}", self.message)
    }
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub idle_interval: Duration,
    pub error_backoff: Duration,
    pub stop_grace: Duration,
    /// Zero the accumulator on every `start()` instead of carrying the
    /// remainder over from the previous run.
    pub reset_accumulator_on_start: bool,
    pub report_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            idle_interval: IDLE_INTERVAL,
            error_backoff: ERROR_BACKOFF,
            stop_grace: STOP_GRACE,
            reset_accumulator_on_start: false,
            report_capacity: 64,
        }
    }
}

/// Result of [`Engine::stop`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopOutcome {
    NotRunning,
    Stopped,
    /// The loop did not exit within the grace period. It was cancelled and
    /// will exit at its next check, but nobody waits for it.
    Zombie,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub ticks: u64,
    pub pointer_events: u64,
    pub scroll_events: u64,
    pub failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    pointer_events: AtomicU64,
    scroll_events: AtomicU64,
    failures: AtomicU64,
}

impl Counters {
    fn record(&self, step: &Step) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.record_emitted(step);
    }

    /// A failed tick still counts whatever reached the injector first.
    fn record_failure(&self, emitted: &Step) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.record_emitted(emitted);
    }

    fn record_emitted(&self, step: &Step) {
        if step.has_pointer() {
            self.pointer_events.fetch_add(1, Ordering::Relaxed);
        }
        if step.has_scroll() {
            self.scroll_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> EngineStats {
        EngineStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            pointer_events: self.pointer_events.load(Ordering::Relaxed),
            scroll_events: self.scroll_events.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Clamp a requested interval into the supported range. `None` for NaN/inf.
pub fn clamp_interval(secs: f64) -> Option<f64> {
    secs.is_finite().then(|| secs.clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS))
}

/// Reduction factors outside [0, 1] are clamped; non-finite ones mean "no reduction".
fn sanitize_factor(factor: f64) -> f64 {
    if factor.is_finite() {
        factor.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

fn saturate(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// An injector call failed partway through a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickError {
    /// What the injector accepted before the failing call.
    pub emitted: Step,
    pub cause: InjectError,
}

impl fmt::Display for TickError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.cause.fmt(f)
    }
}

impl std::error::Error for TickError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

/// One compensation tick: advance the accumulator and emit whatever whole
/// units it released. Pointer first, scroll second; empty axes emit nothing.
pub fn tick<I: Injector + ?Sized>(
    accum: &mut Accumulator,
    profile: &Profile,
    factor: f64,
    injector: &I,
) -> Result<Step, TickError> {
    let step = accum.advance(profile, factor);
    let mut emitted = Step::default();
    if step.has_pointer() {
        let (dx, dy) = (saturate(step.dx), saturate(step.dy));
        tracing::trace!(dx, dy, "pointer move");
        injector
            .move_relative(dx, dy)
            .map_err(|cause| TickError { emitted, cause })?;
        emitted.dx = step.dx;
        emitted.dy = step.dy;
    }
    if step.has_scroll() {
        let amount = saturate(step.dz).saturating_mul(WHEEL_DELTA);
        tracing::trace!(amount, "scroll");
        injector
            .scroll(amount)
            .map_err(|cause| TickError { emitted, cause })?;
    }
    Ok(step)
}

/// Everything the configuration side may touch while the loop runs.
#[derive(Debug)]
struct Controls {
    activation: Arc<ActivationState>,
    profile: RwLock<Option<Arc<Profile>>>,
    interval_bits: AtomicU64,
    /// Panics the loop outside the tick guard on its next iteration.
    #[cfg(test)]
    fault: std::sync::atomic::AtomicBool,
}

impl Controls {
    fn interval(&self) -> Duration {
        Duration::from_secs_f64(f64::from_bits(self.interval_bits.load(Ordering::Relaxed)))
    }

    /// The profile to apply this tick, if all three preconditions hold.
    fn armed(&self) -> Option<(Arc<Profile>, bool)> {
        let snap = self.activation.snapshot();
        if !snap.is_firing() {
            return None;
        }
        let profile = self.profile.read().clone()?;
        Some((profile, snap.reduction_active))
    }
}

/// Cloneable view used by input adapters and configuration code. It can
/// change what the loop does but not whether it runs.
#[derive(Clone, Debug)]
pub struct EngineHandle {
    controls: Arc<Controls>,
}

impl EngineHandle {
    pub fn activation(&self) -> &Arc<ActivationState> {
        &self.controls.activation
    }

    /// Adopted on the next tick.
    pub fn set_profile(&self, profile: Profile) {
        tracing::debug!(name = %profile.name, "active profile replaced");
        *self.controls.profile.write() = Some(Arc::new(profile));
    }

    pub fn clear_profile(&self) {
        *self.controls.profile.write() = None;
    }

    pub fn profile(&self) -> Option<Arc<Profile>> {
        self.controls.profile.read().clone()
    }

    /// Store a new compensation interval, clamped to 1-100ms, and return the
    /// effective value. Non-finite input keeps the current interval.
    pub fn set_interval(&self, secs: f64) -> f64 {
        match clamp_interval(secs) {
            Some(clamped) => {
                self.controls
                    .interval_bits
                    .store(clamped.to_bits(), Ordering::Relaxed);
                clamped
            }
            None => {
                tracing::warn!("ignoring non-finite compensation interval {secs}");
                self.interval_secs()
            }
        }
    }

    pub fn set_interval_ms(&self, ms: f64) -> f64 {
        self.set_interval(ms / 1000.0)
    }

    pub fn interval_secs(&self) -> f64 {
        f64::from_bits(self.controls.interval_bits.load(Ordering::Relaxed))
    }
}

struct LoopShared<I> {
    injector: I,
    config: EngineConfig,
    state: AtomicU8,
    /// Bumped on every start so a zombie run cannot clobber its successor.
    generation: AtomicU64,
    counters: Counters,
    reports: broadcast::Sender<EngineReport>,
    /// Accumulator parked between runs.
    parked: Mutex<Accumulator>,
}

impl<I> LoopShared<I> {
    fn set_state(&self, state: EngineState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn report(&self, severity: Severity, message: String) {
        // no subscribers is fine
        let _ = self.reports.send(EngineReport { severity, message });
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

struct RunningLoop {
    token: CancellationToken,
    task: JoinHandle<()>,
}

pub struct Engine<I: Injector> {
    handle: EngineHandle,
    shared: Arc<LoopShared<I>>,
    run: Mutex<Option<RunningLoop>>,
}

impl<I: Injector> Engine<I> {
    pub fn new(activation: Arc<ActivationState>, injector: I) -> Self {
        Self::with_config(activation, injector, EngineConfig::default())
    }

    pub fn with_config(activation: Arc<ActivationState>, injector: I, config: EngineConfig) -> Self {
        let (reports, _) = broadcast::channel(config.report_capacity.max(1));
        Self {
            handle: EngineHandle {
                controls: Arc::new(Controls {
                    activation,
                    profile: RwLock::new(None),
                    interval_bits: AtomicU64::new(DEFAULT_INTERVAL_SECS.to_bits()),
                    #[cfg(test)]
                    fault: std::sync::atomic::AtomicBool::new(false),
                }),
            },
            shared: Arc::new(LoopShared {
                injector,
                config,
                state: AtomicU8::new(EngineState::Idle as u8),
                generation: AtomicU64::new(0),
                counters: Counters::default(),
                reports,
                parked: Mutex::new(Accumulator::new()),
            }),
            run: Mutex::new(None),
        }
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    pub fn activation(&self) -> &Arc<ActivationState> {
        self.handle.activation()
    }

    pub fn set_profile(&self, profile: Profile) {
        self.handle.set_profile(profile);
    }

    pub fn set_interval(&self, secs: f64) -> f64 {
        self.handle.set_interval(secs)
    }

    pub fn state(&self) -> EngineState {
        EngineState::from_u8(self.shared.state.load(Ordering::SeqCst))
    }

    pub fn stats(&self) -> EngineStats {
        self.shared.counters.snapshot()
    }

    pub fn injector(&self) -> &I {
        &self.shared.injector
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineReport> {
        self.shared.reports.subscribe()
    }

    /// Spawn the loop on the current tokio runtime.
    pub fn start(&self) -> Result<(), EngineError> {
        let mut run = self.run.lock();
        if self.state() == EngineState::Running {
            return Err(EngineError::AlreadyRunning);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| EngineError::NoRuntime)?;

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let accum = if self.shared.config.reset_accumulator_on_start {
            Accumulator::new()
        } else {
            *self.shared.parked.lock()
        };
        let token = CancellationToken::new();
        self.shared.set_state(EngineState::Running);
        let task = runtime.spawn(supervise(
            self.shared.clone(),
            self.handle.controls.clone(),
            token.clone(),
            accum,
            generation,
        ));
        *run = Some(RunningLoop { token, task });
        Ok(())
    }

    /// Signal the loop to exit, clear the trigger, and wait up to the grace
    /// period. Never fails; a loop that does not exit in time is logged and
    /// left behind.
    pub async fn stop(&self) -> StopOutcome {
        let running = self.run.lock().take();
        let activation = self.handle.activation();
        activation.set_button_held(false);
        activation.set_engine_active(false);

        let Some(RunningLoop { token, task }) = running else {
            return StopOutcome::NotRunning;
        };
        token.cancel();
        self.shared.set_state(EngineState::Stopped);

        match tokio::time::timeout(self.shared.config.stop_grace, task).await {
            Ok(Ok(())) => StopOutcome::Stopped,
            Ok(Err(e)) => {
                tracing::warn!("compensation task ended abnormally: {e}");
                StopOutcome::Stopped
            }
            Err(_) => {
                let grace = self.shared.config.stop_grace;
                tracing::warn!("compensation loop did not exit within {grace:?}; leaving it behind");
                self.shared.report(
                    Severity::Warning,
                    format!("compensation loop did not stop within {}ms", grace.as_millis()),
                );
                StopOutcome::Zombie
            }
        }
    }
}

impl<I: Injector> Drop for Engine<I> {
    fn drop(&mut self) {
        if let Some(run) = self.run.get_mut().take() {
            run.token.cancel();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn supervise<I: Injector>(
    shared: Arc<LoopShared<I>>,
    controls: Arc<Controls>,
    token: CancellationToken,
    mut accum: Accumulator,
    generation: u64,
) {
    tracing::info!("compensation loop started");
    let outcome = AssertUnwindSafe(run_loop(&shared, &controls, &token, &mut accum))
        .catch_unwind()
        .await;
    settle(&shared, generation, accum, outcome);
}

/// Record how a run ended. Only the current generation may touch the parked
/// accumulator or the engine state.
fn settle<I>(
    shared: &LoopShared<I>,
    generation: u64,
    accum: Accumulator,
    outcome: Result<(), Box<dyn Any + Send>>,
) {
    match outcome {
        Ok(()) => {
            if shared.is_current(generation) {
                *shared.parked.lock() = accum;
            }
            tracing::info!("compensation loop stopped");
        }
        Err(payload) => {
            let msg = panic_message(payload.as_ref());
            tracing::error!("critical error in compensation loop: {msg}");
            if shared.is_current(generation) {
                // remainder may be mid-update; start the next run clean
                *shared.parked.lock() = Accumulator::new();
                shared.set_state(EngineState::Stopped);
            }
            shared.report(Severity::Critical, format!("critical loop error: {msg}"));
        }
    }
}

struct TickFailure {
    emitted: Step,
    message: String,
}

/// One tick with the factor read included; panics come back as errors.
fn guarded_tick<I: Injector>(
    shared: &LoopShared<I>,
    controls: &Controls,
    accum: &mut Accumulator,
    profile: &Profile,
    reduced: bool,
) -> Result<Step, TickFailure> {
    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
        let factor = if reduced {
            sanitize_factor(controls.activation.reduction_factor())
        } else {
            1.0
        };
        tick(accum, profile, factor, &shared.injector)
    }));
    match outcome {
        Ok(Ok(step)) => Ok(step),
        Ok(Err(e)) => Err(TickFailure {
            emitted: e.emitted,
            message: e.to_string(),
        }),
        Err(payload) => Err(TickFailure {
            emitted: Step::default(),
            message: format!("panic: {}", panic_message(payload.as_ref())),
        }),
    }
}

async fn run_loop<I: Injector>(
    shared: &LoopShared<I>,
    controls: &Controls,
    token: &CancellationToken,
    accum: &mut Accumulator,
) {
    while !token.is_cancelled() {
        #[cfg(test)]
        if controls.fault.load(Ordering::SeqCst) {
            panic!("loop body fault");
        }

        let pause = match controls.armed() {
            None => shared.config.idle_interval,
            Some((profile, reduced)) => {
                match guarded_tick(shared, controls, accum, &profile, reduced) {
                    Ok(step) => {
                        shared.counters.record(&step);
                        controls.interval()
                    }
                    Err(TickFailure { emitted, message }) => {
                        shared.counters.record_failure(&emitted);
                        tracing::error!("compensation tick failed: {message}");
                        shared.report(Severity::Error, format!("tick failed: {message}"));
                        shared.config.error_backoff
                    }
                }
            }
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(pause) => {}
        }
    }
}
