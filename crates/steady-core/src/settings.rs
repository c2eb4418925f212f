//! Live configuration owned by the foreground side.
//!
//! `Settings` is the plain, serializable record. `LiveSettings` wraps it in a
//! lock and pushes every change to the place the engine reads it from, so
//! the loop never has to look at the settings themselves.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::activation::ReductionPercent;
use crate::engine::EngineHandle;
use crate::input::normalize_key;
use crate::profile::Profile;

pub const MIN_INTERVAL_MS: f64 = 1.0;
pub const MAX_INTERVAL_MS: f64 = 100.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub axis_x: f64,
    pub axis_y: f64,
    pub axis_z: f64,
    /// Compensation interval in milliseconds (1-100).
    pub interval_ms: f64,
    /// Key that activates reduction. Empty disables it.
    pub modifier_key: String,
    /// Share of compensation kept while the modifier is held (0-100).
    pub reduction_percent: u8,
    pub enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            axis_x: 0.0,
            axis_y: -0.7,
            axis_z: 0.0,
            interval_ms: 10.0,
            modifier_key: "ctrl".to_string(),
            reduction_percent: 50,
            enabled: true,
        }
    }
}

impl Settings {
    /// Bring every field into its accepted range. Non-finite axes become 0.
    pub fn normalized(mut self) -> Self {
        for axis in [&mut self.axis_x, &mut self.axis_y, &mut self.axis_z] {
            if !axis.is_finite() {
                *axis = 0.0;
            }
        }
        self.interval_ms = clamp_interval_ms(self.interval_ms).unwrap_or(10.0);
        self.modifier_key = normalize_key(&self.modifier_key);
        self.reduction_percent = self.reduction_percent.min(100);
        self
    }

    pub fn modifier(&self) -> Option<&str> {
        (!self.modifier_key.is_empty()).then_some(self.modifier_key.as_str())
    }

    pub fn profile(&self) -> Profile {
        Profile::live(self.axis_x, self.axis_y, self.axis_z)
    }
}

fn clamp_interval_ms(ms: f64) -> Option<f64> {
    ms.is_finite().then(|| ms.clamp(MIN_INTERVAL_MS, MAX_INTERVAL_MS))
}

#[derive(Clone, Debug)]
pub struct LiveSettings {
    inner: Arc<RwLock<Settings>>,
    engine: EngineHandle,
    reduction: Arc<ReductionPercent>,
}

impl LiveSettings {
    /// Take ownership of `settings` and apply them to the engine side.
    pub fn new(settings: Settings, engine: EngineHandle, reduction: Arc<ReductionPercent>) -> Self {
        let settings = settings.normalized();
        engine.set_interval_ms(settings.interval_ms);
        engine.activation().set_engine_active(settings.enabled);
        reduction.set(settings.reduction_percent);
        Self {
            inner: Arc::new(RwLock::new(settings)),
            engine,
            reduction,
        }
    }

    pub fn get(&self) -> Settings {
        self.inner.read().clone()
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    /// Fresh snapshot of the configured vector, for handing to the engine.
    pub fn capture_profile(&self) -> Profile {
        self.inner.read().profile()
    }

    pub fn set_vector(&self, axis_x: f64, axis_y: f64, axis_z: f64) {
        let mut s = self.inner.write();
        s.axis_x = axis_x;
        s.axis_y = axis_y;
        s.axis_z = axis_z;
    }

    /// Copy a stored profile's vector into the live settings. Takes effect on
    /// the next trigger press.
    pub fn apply_profile(&self, profile: &Profile) {
        self.set_vector(profile.axis_x, profile.axis_y, profile.axis_z);
        tracing::info!("loaded profile '{}'", profile.name);
    }

    /// Returns the effective interval in milliseconds.
    pub fn set_interval_ms(&self, ms: f64) -> f64 {
        let Some(ms) = clamp_interval_ms(ms) else {
            tracing::warn!("ignoring non-finite interval {ms}");
            return self.inner.read().interval_ms;
        };
        self.inner.write().interval_ms = ms;
        self.engine.set_interval_ms(ms);
        tracing::info!("compensation interval set to {ms}ms");
        ms
    }

    pub fn set_reduction_percent(&self, percent: u8) {
        let percent = percent.min(100);
        self.inner.write().reduction_percent = percent;
        self.reduction.set(percent);
    }

    /// Returns the normalized key, or `None` if the modifier was cleared.
    pub fn set_modifier_key(&self, key: &str) -> Option<String> {
        let key = normalize_key(key);
        self.inner.write().modifier_key = key.clone();
        if key.is_empty() {
            self.engine.activation().set_reduction_active(false);
            tracing::info!("modifier key cleared");
            None
        } else {
            tracing::info!("modifier key set to '{key}'");
            Some(key)
        }
    }

    pub fn modifier_key(&self) -> Option<String> {
        self.inner.read().modifier().map(str::to_string)
    }

    /// The global enable switch. Disabling also releases the trigger.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.write().enabled = enabled;
        let activation = self.engine.activation();
        activation.set_engine_active(enabled);
        if !enabled {
            activation.set_button_held(false);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.read().enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationState;
    use crate::engine::Engine;
    use crate::inject::RecordingInjector;

    fn live(settings: Settings) -> (LiveSettings, Engine<RecordingInjector>) {
        let (activation, pct) = ActivationState::with_percent(0);
        let engine = Engine::new(Arc::new(activation), RecordingInjector::new());
        (LiveSettings::new(settings, engine.handle(), pct), engine)
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.profile(), Profile::live(0.0, -0.7, 0.0));
        assert_eq!(s.modifier(), Some("ctrl"));
        assert_eq!(s.reduction_percent, 50);
    }

    #[test]
    fn test_new_applies_to_engine() {
        let (live, engine) = live(Settings {
            interval_ms: 25.0,
            reduction_percent: 30,
            ..Settings::default()
        });
        assert!(engine.activation().engine_active());
        assert_eq!(engine.handle().interval_secs(), 0.025);
        assert_eq!(engine.activation().reduction_factor(), 0.3);
        assert!(live.is_enabled());
    }

    #[test]
    fn test_normalized_clamps() {
        let s = Settings {
            axis_x: f64::NAN,
            interval_ms: 500.0,
            modifier_key: "  Key.SHIFT ".to_string(),
            reduction_percent: 180,
            ..Settings::default()
        }
        .normalized();
        assert_eq!(s.axis_x, 0.0);
        assert_eq!(s.interval_ms, 100.0);
        assert_eq!(s.modifier_key, "shift");
        assert_eq!(s.reduction_percent, 100);
    }

    #[test]
    fn test_interval_clamped_to_ms_range() {
        let (live, engine) = live(Settings::default());
        assert_eq!(live.set_interval_ms(0.2), 1.0);
        assert_eq!(engine.handle().interval_secs(), 0.001);
        assert_eq!(live.set_interval_ms(f64::INFINITY), 1.0);
        assert_eq!(live.set_interval_ms(40.0), 40.0);
        assert_eq!(live.get().interval_ms, 40.0);
    }

    #[test]
    fn test_clearing_modifier_clears_reduction() {
        let (live, engine) = live(Settings::default());
        engine.activation().set_reduction_active(true);
        assert_eq!(live.set_modifier_key(" "), None);
        assert!(!engine.activation().reduction_active());
        assert_eq!(live.modifier_key(), None);
        assert_eq!(live.set_modifier_key("C"), Some("c".to_string()));
    }

    #[test]
    fn test_disable_releases_trigger() {
        let (live, engine) = live(Settings::default());
        engine.activation().set_button_held(true);
        live.set_enabled(false);
        assert!(!engine.activation().engine_active());
        assert!(!engine.activation().button_held());
        live.set_enabled(true);
        assert!(engine.activation().engine_active());
    }

    #[test]
    fn test_capture_reflects_edits() {
        let (live, _engine) = live(Settings::default());
        live.apply_profile(&Profile::new("smg", 0.1, -1.2, 0.0));
        assert_eq!(live.capture_profile(), Profile::live(0.1, -1.2, 0.0));
        live.set_reduction_percent(75);
        assert_eq!(live.get().reduction_percent, 75);
    }
}
