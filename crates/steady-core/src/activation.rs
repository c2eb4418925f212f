//! Flags shared between the compensation loop and the input side.
//!
//! Every flag is an independent atomic. A snapshot may combine values from
//! slightly different instants; the worst outcome of a stale read is one
//! missed or one extra tick, bounded by the idle interval.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Source of the reduction factor, read by the engine on every reduced tick.
///
/// Implementations must not block.
pub trait ReductionFactor: Send + Sync {
    fn factor(&self) -> f64;
}

impl<F> ReductionFactor for F
where
    F: Fn() -> f64 + Send + Sync,
{
    fn factor(&self) -> f64 {
        self()
    }
}

/// Reduction expressed as a 0-100 percentage, settable from the
/// configuration side.
#[derive(Debug)]
pub struct ReductionPercent(AtomicU8);

impl ReductionPercent {
    pub fn new(percent: u8) -> Self {
        Self(AtomicU8::new(percent.min(100)))
    }

    pub fn set(&self, percent: u8) {
        self.0.store(percent.min(100), Ordering::Relaxed);
    }

    pub fn get(&self) -> u8 {
        self.0.load(Ordering::Relaxed)
    }
}

impl ReductionFactor for ReductionPercent {
    fn factor(&self) -> f64 {
        f64::from(self.get()) / 100.0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActivationSnapshot {
    pub engine_active: bool,
    pub button_held: bool,
    pub reduction_active: bool,
}

impl ActivationSnapshot {
    /// Both the global enable and the trigger are on. The engine adds the
    /// third condition (a profile is loaded) itself.
    pub fn is_firing(&self) -> bool {
        self.engine_active && self.button_held
    }
}

pub struct ActivationState {
    engine_active: AtomicBool,
    button_held: AtomicBool,
    reduction_active: AtomicBool,
    reduction: Arc<dyn ReductionFactor>,
}

impl ActivationState {
    pub fn new(reduction: Arc<dyn ReductionFactor>) -> Self {
        Self {
            engine_active: AtomicBool::new(false),
            button_held: AtomicBool::new(false),
            reduction_active: AtomicBool::new(false),
            reduction,
        }
    }

    /// State backed by a [`ReductionPercent`]; the percent handle is returned
    /// so the configuration side can keep adjusting it.
    pub fn with_percent(percent: u8) -> (Self, Arc<ReductionPercent>) {
        let pct = Arc::new(ReductionPercent::new(percent));
        (Self::new(pct.clone()), pct)
    }

    pub fn set_engine_active(&self, active: bool) {
        self.engine_active.store(active, Ordering::Release);
    }

    pub fn set_button_held(&self, held: bool) {
        self.button_held.store(held, Ordering::Release);
    }

    pub fn set_reduction_active(&self, active: bool) {
        self.reduction_active.store(active, Ordering::Release);
    }

    pub fn engine_active(&self) -> bool {
        self.engine_active.load(Ordering::Acquire)
    }

    pub fn button_held(&self) -> bool {
        self.button_held.load(Ordering::Acquire)
    }

    pub fn reduction_active(&self) -> bool {
        self.reduction_active.load(Ordering::Acquire)
    }

    /// Raw value from the accessor. The engine sanitizes it before use.
    pub fn reduction_factor(&self) -> f64 {
        self.reduction.factor()
    }

    pub fn snapshot(&self) -> ActivationSnapshot {
        ActivationSnapshot {
            engine_active: self.engine_active(),
            button_held: self.button_held(),
            reduction_active: self.reduction_active(),
        }
    }

    /// Clear every flag. Used on shutdown.
    pub fn reset(&self) {
        self.set_engine_active(false);
        self.set_button_held(false);
        self.set_reduction_active(false);
    }
}

impl fmt::Debug for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivationState")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_inactive() {
        let (state, _) = ActivationState::with_percent(50);
        assert_eq!(state.snapshot(), ActivationSnapshot::default());
        assert!(!state.snapshot().is_firing());
    }

    #[test]
    fn test_setters_touch_one_field() {
        let (state, _) = ActivationState::with_percent(50);
        state.set_button_held(true);
        assert_eq!(
            state.snapshot(),
            ActivationSnapshot {
                engine_active: false,
                button_held: true,
                reduction_active: false,
            }
        );
        state.set_button_held(true);
        assert!(state.button_held());
        state.set_engine_active(true);
        assert!(state.snapshot().is_firing());
        state.set_reduction_active(true);
        assert!(state.reduction_active());
        state.reset();
        assert_eq!(state.snapshot(), ActivationSnapshot::default());
    }

    #[test]
    fn test_percent_factor_tracks_updates() {
        let (state, pct) = ActivationState::with_percent(50);
        assert_eq!(state.reduction_factor(), 0.5);
        pct.set(25);
        assert_eq!(state.reduction_factor(), 0.25);
        pct.set(250);
        assert_eq!(pct.get(), 100);
        assert_eq!(state.reduction_factor(), 1.0);
    }

    #[test]
    fn test_closure_accessor() {
        let state = ActivationState::new(Arc::new(|| 0.3));
        assert_eq!(state.reduction_factor(), 0.3);
    }

    #[test]
    fn test_shared_across_threads() {
        let (state, _) = ActivationState::with_percent(50);
        let state = Arc::new(state);
        let writer = {
            let state = state.clone();
            std::thread::spawn(move || {
                for i in 0..1000 {
                    state.set_button_held(i % 2 == 0);
                }
                state.set_button_held(true);
            })
        };
        for _ in 0..1000 {
            let _ = state.snapshot();
        }
        writer.join().unwrap();
        assert!(state.button_held());
    }
}
