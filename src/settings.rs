//! Animation Settings
//!
//! Runtime configuration consumed by [`FrameScheduler`](crate::animation::FrameScheduler).
//!
//! Every switch that influences interpolation or clock handling lives here and
//! is handed to the scheduler at construction, so two schedulers in the same
//! process can run with different policies.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use myth_animation::{AnimationSettings, InterpolationOptions};
//!
//! // Default: real elapsed time, matrices snap between keys
//! let settings = AnimationSettings::default();
//!
//! // Deterministic playback with interpolated bone matrices
//! let settings = AnimationSettings {
//!     use_constant_delta: true,
//!     interpolation: InterpolationOptions {
//!         matrix_interpolation: true,
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! };
//! ```

use serde::{Deserialize, Serialize};

/// Matrix handling shared by curve interpolation, blending and late binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationOptions {
    /// When `false`, matrix curves hold the start key of each segment.
    pub matrix_interpolation: bool,
    /// Blend matrices through scale/rotation/translation instead of
    /// component-wise. Avoids shearing.
    pub matrix_decomposition: bool,
}

impl Default for InterpolationOptions {
    fn default() -> Self {
        Self {
            matrix_interpolation: false,
            matrix_decomposition: true,
        }
    }
}

/// Scheduler-wide animation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationSettings {
    /// Global switch; a disabled scheduler ignores ticks.
    pub enabled: bool,
    /// Advance by `constant_delta_ms` every tick instead of real elapsed time.
    pub use_constant_delta: bool,
    /// Synthetic delta in milliseconds.
    pub constant_delta_ms: f64,
    /// Multiplier applied to every delta.
    pub time_scale: f64,
    pub interpolation: InterpolationOptions,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            use_constant_delta: false,
            constant_delta_ms: 16.0,
            time_scale: 1.0,
            interpolation: InterpolationOptions::default(),
        }
    }
}

impl AnimationSettings {
    /// Parses settings from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> crate::errors::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings =
            AnimationSettings::from_json(r#"{ "time_scale": 2.0, "interpolation": { "matrix_interpolation": true } }"#)
                .unwrap();

        assert!(settings.enabled);
        assert_eq!(settings.time_scale, 2.0);
        assert_eq!(settings.constant_delta_ms, 16.0);
        assert!(settings.interpolation.matrix_interpolation);
        assert!(settings.interpolation.matrix_decomposition);
    }
}
