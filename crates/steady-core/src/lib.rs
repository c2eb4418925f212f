//! Fractional input-compensation engine.
//!
//! While a trigger is held, a background loop adds a per-tick compensation
//! vector to an accumulator and injects the whole units as relative pointer
//! moves and scroll steps, carrying the fractions forward so non-integer
//! vectors average out exactly. A modifier key scales the vector down.
//!
//! No file I/O here: persistence lives in `steady-store`, and the platform
//! injection primitive sits behind the [`Injector`] trait.

pub mod accumulator;
pub mod activation;
pub mod constants;
pub mod engine;
pub mod inject;
pub mod input;
pub mod profile;
pub mod settings;

pub use accumulator::{Accumulator, Step};
pub use activation::{ActivationSnapshot, ActivationState, ReductionFactor, ReductionPercent};
pub use constants::{
    DEFAULT_INTERVAL_SECS, ERROR_BACKOFF, IDLE_INTERVAL, MAX_INTERVAL_SECS, MIN_INTERVAL_SECS,
    STOP_GRACE, WHEEL_DELTA,
};
pub use engine::{
    Engine, EngineConfig, EngineError, EngineHandle, EngineReport, EngineState, EngineStats,
    Severity, StopOutcome, TickError, clamp_interval, tick,
};
pub use inject::{Emitted, InjectError, Injector, RecordingInjector};
pub use input::{
    AdapterError, InputAdapter, InputBus, InputEvent, ModifierAdapter, PointerButton,
    TriggerAdapter, key_matches, normalize_key, spawn_adapter,
};
pub use profile::Profile;
pub use settings::{LiveSettings, Settings};
