use std::time::Duration;

/// Polling period while the engine is inactive, independent of the
/// configured compensation interval.
pub const IDLE_INTERVAL: Duration = Duration::from_millis(10);

/// Pause after a failed tick before the loop retries.
pub const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// How long `stop()` waits for the loop to exit before declaring it a zombie.
pub const STOP_GRACE: Duration = Duration::from_millis(2000);

/// Lower bound for the compensation interval (seconds)
pub const MIN_INTERVAL_SECS: f64 = 0.001;

/// Upper bound for the compensation interval (seconds)
pub const MAX_INTERVAL_SECS: f64 = 0.1;

/// Compensation interval used until one is configured (10ms)
pub const DEFAULT_INTERVAL_SECS: f64 = 0.01;

/// Platform wheel units per whole scroll step.
pub const WHEEL_DELTA: i32 = 120;

/// Largest pointer displacement released per axis in one tick. Anything
/// beyond it stays in the accumulator for later ticks.
pub const MAX_POINTER_STEP: f64 = i32::MAX as f64;

/// Largest scroll step released in one tick, so that `step * WHEEL_DELTA`
/// still fits the injector's `i32`.
pub const MAX_SCROLL_STEP: f64 = (i32::MAX / WHEEL_DELTA) as f64;

/// Accumulator values this close to an integer snap to it before truncation.
pub const SNAP_EPSILON: f64 = 1e-9;

/// Name given to profiles deserialized without one.
pub const DEFAULT_PROFILE_NAME: &str = "preset";

/// Name of the profile captured from live settings on trigger press.
pub const LIVE_PROFILE_NAME: &str = "live";
