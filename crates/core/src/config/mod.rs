use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{lock::DEFAULT_LOCK_SECONDS, smoothing::DEFAULT_WINDOW, Result};

/// Top-level configuration structure for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Frame pump cadence in frames per second.
    pub frame_rate: u32,
    /// How long an explicit parameter command holds off automatic animation.
    pub lock_duration_secs: f64,
    pub smoothing: SmoothingConfig,
    pub animator: AnimatorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60,
            lock_duration_secs: DEFAULT_LOCK_SECONDS,
            smoothing: SmoothingConfig::default(),
            animator: AnimatorConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parses a configuration document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// Configuration specific to the smoothing pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub enabled: bool,
    pub window_length: usize,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_length: DEFAULT_WINDOW,
        }
    }
}

/// Configuration for idle blink and breathing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimatorConfig {
    pub auto_blink: bool,
    pub auto_breath: bool,
    /// Lower bound of the randomized gap between blinks, in seconds.
    pub blink_interval_min: f64,
    /// Upper bound (exclusive) of the gap between blinks, in seconds.
    pub blink_interval_max: f64,
    /// How long the eyes stay shut before the reopen proposal.
    pub blink_closed_secs: f64,
    pub eye_parameters: Vec<String>,
    pub breath_parameter: String,
    /// Angular frequency of the breathing sinusoid in radians per second.
    pub breath_frequency: f64,
    /// Fixed seed for the blink scheduler. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self {
            auto_blink: true,
            auto_breath: true,
            blink_interval_min: 2.0,
            blink_interval_max: 5.0,
            blink_closed_secs: 0.1,
            eye_parameters: vec!["ParamEyeLOpen".to_string(), "ParamEyeROpen".to_string()],
            breath_parameter: "ParamBreath".to_string(),
            breath_frequency: 2.0,
            seed: None,
        }
    }
}
