//! Runtime-tunable engine configuration and its JSON persistence.
//!
//! The config is a single small JSON object. Unknown fields are ignored,
//! missing fields fall back to their defaults, and any load failure silently
//! yields the default config so a corrupt file can never block startup.

use crate::error::EngineError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name the config persists under.
pub const CONFIG_FILE: &str = "lyrehero-audio-config.json";

/// Clarity gate applied after a successful note calibration. The permissive
/// default below is the uncalibrated fallback.
pub const STRICT_CLARITY_THRESHOLD: f32 = 0.3;

const DEFAULT_RMS_THRESHOLD: f32 = 5e-4;
const DEFAULT_CLARITY_THRESHOLD: f32 = 0.01;
const DEFAULT_HOLD_DURATION_MS: u64 = 100;
const DEFAULT_GAIN: f32 = 1.5;

/// The four runtime-mutable engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Minimum RMS for a frame to be considered at all.
    pub rms_threshold: f32,
    /// Minimum NSDF clarity for a frame to carry a note.
    pub clarity_threshold: f32,
    /// How long a correct note must hold before the tutor advances.
    pub hold_duration_ms: u64,
    /// Input gain applied after the band-pass chain.
    pub gain: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            rms_threshold: DEFAULT_RMS_THRESHOLD,
            clarity_threshold: DEFAULT_CLARITY_THRESHOLD,
            hold_duration_ms: DEFAULT_HOLD_DURATION_MS,
            gain: DEFAULT_GAIN,
        }
    }
}

impl EngineConfig {
    /// Loads the config from `path`.
    ///
    /// Returns `ConfigLoadFailed` when the file is absent or unparseable;
    /// most callers want [`EngineConfig::load_or_default`] instead.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let run = || -> anyhow::Result<Self> {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let config: EngineConfig = serde_json::from_str(&data)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok(config.sanitized())
        };
        run().map_err(EngineError::ConfigLoadFailed)
    }

    /// Loads the config from `path`, logging and falling back to defaults on
    /// any failure.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => {
                log::info!("loaded audio config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("{}; using defaults", e);
                EngineConfig::default()
            }
        }
    }

    /// Writes the config to `path` as pretty JSON.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)?;
        log::info!("audio config saved to {}", path.display());
        Ok(())
    }

    /// Clamps fields to their legal ranges.
    pub fn sanitized(mut self) -> Self {
        self.gain = self.gain.clamp(crate::audio::MIN_GAIN, crate::audio::MAX_GAIN);
        self.rms_threshold = self.rms_threshold.max(0.0);
        self.clarity_threshold = self.clarity_threshold.max(0.0);
        self
    }
}
