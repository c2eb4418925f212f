//! Seam between the engine and the platform's pointer injection primitive.
//!
//! Delivery is best-effort. An error from an injector fails the current
//! tick only; the engine reports it and keeps running.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectError {
    /// The platform refused or dropped the event.
    Rejected(String),
    /// The output sink is gone (closed pipe, lost device).
    Unavailable(String),
}

impl fmt::Display for InjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InjectError::Rejected(msg) => write!(f, "injection rejected: {msg}"),
            InjectError::Unavailable(msg) => write!(f, "injection target unavailable: {msg}"),
        }
    }
}

impl std::error::Error for InjectError {}

impl From<std::io::Error> for InjectError {
    fn from(e: std::io::Error) -> Self {
        InjectError::Unavailable(e.to_string())
    }
}

pub trait Injector: Send + Sync + 'static {
    /// Relative pointer move in device units.
    fn move_relative(&self, dx: i32, dy: i32) -> Result<(), InjectError>;

    /// Wheel rotation in platform units (already multiplied by the wheel delta).
    fn scroll(&self, amount: i32) -> Result<(), InjectError>;
}

/// One event as it reached an injector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Emitted {
    Move { dx: i32, dy: i32 },
    Scroll { amount: i32 },
}

/// In-memory injector that records every event it accepts.
///
/// Can be armed to fail a number of upcoming calls, which is how the loop's
/// error path is exercised.
#[derive(Debug, Default)]
pub struct RecordingInjector {
    events: Mutex<Vec<Emitted>>,
    failures: AtomicUsize,
}

impl RecordingInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` injection calls.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<Emitted> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<Emitted> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&self, event: Emitted) -> Result<(), InjectError> {
        let armed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if armed {
            return Err(InjectError::Rejected(format!("simulated failure on {event:?}")));
        }
        self.events.lock().push(event);
        Ok(())
    }
}

impl Injector for RecordingInjector {
    fn move_relative(&self, dx: i32, dy: i32) -> Result<(), InjectError> {
        self.record(Emitted::Move { dx, dy })
    }

    fn scroll(&self, amount: i32) -> Result<(), InjectError> {
        self.record(Emitted::Scroll { amount })
    }
}

impl<T: Injector> Injector for std::sync::Arc<T> {
    fn move_relative(&self, dx: i32, dy: i32) -> Result<(), InjectError> {
        (**self).move_relative(dx, dy)
    }

    fn scroll(&self, amount: i32) -> Result<(), InjectError> {
        (**self).scroll(amount)
    }
}
