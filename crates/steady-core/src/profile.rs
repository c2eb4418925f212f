use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PROFILE_NAME, LIVE_PROFILE_NAME};

/// A named compensation vector: per-tick displacement on the two pointer
/// axes plus the scroll axis.
///
/// The engine only ever reads a profile through an `Arc` snapshot; adopting
/// new values means swapping in a new `Profile`, never mutating one in place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default = "default_name")]
    pub name: String,
    /// Accepts the older `move_*` field names on input.
    #[serde(alias = "move_x", default)]
    pub axis_x: f64,
    #[serde(alias = "move_y", default)]
    pub axis_y: f64,
    #[serde(alias = "move_z", default)]
    pub axis_z: f64,
}

fn default_name() -> String {
    DEFAULT_PROFILE_NAME.to_string()
}

impl Profile {
    pub fn new(name: &str, axis_x: f64, axis_y: f64, axis_z: f64) -> Self {
        Self {
            name: name.to_string(),
            axis_x,
            axis_y,
            axis_z,
        }
    }

    /// Snapshot of the live configuration, taken when the trigger fires.
    pub fn live(axis_x: f64, axis_y: f64, axis_z: f64) -> Self {
        Self::new(LIVE_PROFILE_NAME, axis_x, axis_y, axis_z)
    }

    pub fn axes(&self) -> [f64; 3] {
        [self.axis_x, self.axis_y, self.axis_z]
    }

    pub fn is_finite(&self) -> bool {
        self.axes().iter().all(|v| v.is_finite())
    }

    /// Same vector under a different name.
    pub fn renamed(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self.clone()
        }
    }
}
