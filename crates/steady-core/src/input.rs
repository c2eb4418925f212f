//! Input trigger adapters.
//!
//! Sources publish [`InputEvent`]s on an [`InputBus`]; each adapter runs on
//! its own task, subscribes independently, and turns transitions into
//! updates of the activation state. A failing or panicking handler is
//! logged and skipped; it never reaches the source.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::settings::LiveSettings;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerButton {
    Left,
    Right,
    Middle,
    Other(u8),
}

impl FromStr for PointerButton {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let s = s.strip_prefix("button.").unwrap_or(&s);
        match s {
            "left" => Ok(PointerButton::Left),
            "right" => Ok(PointerButton::Right),
            "middle" => Ok(PointerButton::Middle),
            "x1" => Ok(PointerButton::Other(4)),
            "x2" => Ok(PointerButton::Other(5)),
            other => other
                .parse::<u8>()
                .map(PointerButton::Other)
                .map_err(|_| format!("unknown pointer button '{other}'")),
        }
    }
}

impl fmt::Display for PointerButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointerButton::Left => write!(f, "left"),
            PointerButton::Right => write!(f, "right"),
            PointerButton::Middle => write!(f, "middle"),
            PointerButton::Other(n) => write!(f, "{n}"),
        }
    }
}

/// A press or release observed on some input device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Button { button: PointerButton, pressed: bool },
    Key { key: String, pressed: bool },
}

/// Canonical key name: trimmed, lowercased, without a `key.`/`keycode.`
/// qualifier or surrounding quotes.
pub fn normalize_key(raw: &str) -> String {
    let key = raw.trim().to_lowercase();
    let key = key
        .strip_prefix("keycode.")
        .or_else(|| key.strip_prefix("key."))
        .unwrap_or(&key);
    key.trim_matches(|c| c == '\'' || c == '"').to_string()
}

/// Does an observed key satisfy the configured one? Side-specific names
/// (`ctrl_l`, `shift_r`) also match their generic form.
pub fn key_matches(configured: &str, observed: &str) -> bool {
    let observed = normalize_key(observed);
    if observed == configured {
        return true;
    }
    observed
        .strip_suffix("_l")
        .or_else(|| observed.strip_suffix("_r"))
        .is_some_and(|base| base == configured)
}

/// Fan-out channel between input sources and adapters.
#[derive(Clone, Debug)]
pub struct InputBus {
    tx: broadcast::Sender<InputEvent>,
}

impl InputBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Returns how many adapters saw the event. Never blocks.
    pub fn publish(&self, event: InputEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InputEvent> {
        self.tx.subscribe()
    }
}

impl Default for InputBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdapterError {
    /// The live settings produced a vector the engine cannot use.
    InvalidProfile(String),
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterError::InvalidProfile(msg) => write!(f, "invalid profile: {msg}"),
        }
    }
}

impl std::error::Error for AdapterError {}

pub trait InputAdapter: Send + 'static {
    fn name(&self) -> &'static str;

    /// Must return quickly; it runs on the adapter's dispatch task.
    fn handle(&mut self, event: &InputEvent) -> Result<(), AdapterError>;
}

/// Primary trigger: holding the button drives compensation.
///
/// Each press captures the live vector, so edits made while idle apply to
/// the next activation.
pub struct TriggerAdapter {
    button: PointerButton,
    settings: LiveSettings,
}

impl TriggerAdapter {
    pub fn new(button: PointerButton, settings: LiveSettings) -> Self {
        Self { button, settings }
    }
}

impl InputAdapter for TriggerAdapter {
    fn name(&self) -> &'static str {
        "trigger"
    }

    fn handle(&mut self, event: &InputEvent) -> Result<(), AdapterError> {
        let InputEvent::Button { button, pressed } = event else {
            return Ok(());
        };
        if *button != self.button {
            return Ok(());
        }
        let engine = self.settings.engine();
        if !*pressed {
            engine.activation().set_button_held(false);
            return Ok(());
        }
        if !self.settings.is_enabled() {
            return Ok(());
        }
        let profile = self.settings.capture_profile();
        if !profile.is_finite() {
            return Err(AdapterError::InvalidProfile(format!("{:?}", profile.axes())));
        }
        engine.set_profile(profile);
        engine.activation().set_button_held(true);
        Ok(())
    }
}

/// Reduction modifier: tracks whether the configured key is down.
pub struct ModifierAdapter {
    settings: LiveSettings,
}

impl ModifierAdapter {
    pub fn new(settings: LiveSettings) -> Self {
        Self { settings }
    }
}

impl InputAdapter for ModifierAdapter {
    fn name(&self) -> &'static str {
        "modifier"
    }

    fn handle(&mut self, event: &InputEvent) -> Result<(), AdapterError> {
        let InputEvent::Key { key, pressed } = event else {
            return Ok(());
        };
        if let Some(configured) = self.settings.modifier_key()
            && key_matches(&configured, key)
        {
            self.settings
                .engine()
                .activation()
                .set_reduction_active(*pressed);
        }
        Ok(())
    }
}

/// Run `adapter` on its own task until the bus closes.
pub fn spawn_adapter<A: InputAdapter>(bus: &InputBus, mut adapter: A) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        let name = adapter.name();
        loop {
            match rx.recv().await {
                Ok(event) => {
                    match std::panic::catch_unwind(AssertUnwindSafe(|| adapter.handle(&event))) {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => tracing::warn!("{name} adapter failed on {event:?}: {e}"),
                        Err(_) => tracing::error!("{name} adapter panicked on {event:?}"),
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("{name} adapter fell behind, {n} events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!("{name} adapter stopped");
    })
}
