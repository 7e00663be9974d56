//! Two-phase calibration wizard.
//!
//! Both phases run while the host keeps polling the engine:
//!
//! 1. **Noise**: the player stays silent; collected RMS readings set the
//!    volume gate comfortably above the room.
//! 2. **Note**: thresholds are temporarily dropped so even a weak pluck is
//!    detected, and the best observed clarity sets the clarity gate.
//!
//! Each wizard is a small value the host feeds frames into and then
//! finishes; applying results back onto the engine is explicit, so an
//! abandoned wizard changes nothing.

use crate::config::STRICT_CLARITY_THRESHOLD;
use crate::engine::PitchEngine;
use crate::error::EngineError;
use crate::DetectionFrame;

/// Floor for the calibrated RMS threshold.
const MIN_RMS_THRESHOLD: f32 = 3e-4;
/// Headroom multiplier over the measured ambient RMS.
const NOISE_MULTIPLIER: f32 = 2.5;

/// Permissive thresholds in force during the note phase.
const PROBE_RMS_THRESHOLD: f32 = 1e-4;
const PROBE_CLARITY_THRESHOLD: f32 = 5e-3;

/// A measured note below this clarity is unusable for calibration.
const MIN_VALID_CLARITY: f32 = 0.01;
/// The calibrated clarity gate is half the measured clarity, no lower than
/// this and capped at [`STRICT_CLARITY_THRESHOLD`].
const CLARITY_SCALE: f32 = 0.5;
const CLARITY_GATE_MIN: f32 = 5e-3;

/// Noise phase: accumulates RMS readings while the player is silent.
#[derive(Debug, Default)]
pub struct NoiseCalibration {
    samples: Vec<f32>,
}

impl NoiseCalibration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, frame: &DetectionFrame) {
        self.samples.push(frame.volume);
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// The RMS threshold this phase measured: the mean ambient RMS with
    /// headroom, never below the minimum. With no samples the minimum is
    /// returned.
    pub fn threshold(&self) -> f32 {
        if self.samples.is_empty() {
            return MIN_RMS_THRESHOLD;
        }
        let mean = self.samples.iter().sum::<f32>() / self.samples.len() as f32;
        (mean * NOISE_MULTIPLIER).max(MIN_RMS_THRESHOLD)
    }

    /// Applies the measured threshold to the engine and returns it.
    pub fn finish(self, engine: &mut PitchEngine) -> f32 {
        let threshold = self.threshold();
        log::info!(
            "noise calibration: {} samples, rms threshold {:.6}",
            self.samples.len(),
            threshold
        );
        engine.rms_threshold = threshold;
        threshold
    }
}

/// Note phase: drops the engine's gates so a weak note still registers,
/// tracks the best stable detection, and derives the clarity gate from it.
#[derive(Debug)]
pub struct NoteCalibration {
    saved_rms_threshold: f32,
    saved_clarity_threshold: f32,
    best: Option<(&'static str, f32)>,
}

impl NoteCalibration {
    /// Starts the phase, saving the engine's thresholds and installing the
    /// permissive probe values.
    pub fn begin(engine: &mut PitchEngine) -> Self {
        let wizard = NoteCalibration {
            saved_rms_threshold: engine.rms_threshold,
            saved_clarity_threshold: engine.clarity_threshold,
            best: None,
        };
        engine.rms_threshold = PROBE_RMS_THRESHOLD;
        engine.clarity_threshold = PROBE_CLARITY_THRESHOLD;
        wizard
    }

    pub fn observe(&mut self, frame: &DetectionFrame) {
        if let Some(note) = frame.note {
            if self.best.map_or(true, |(_, c)| frame.clarity > c) {
                self.best = Some((note, frame.clarity));
            }
        }
    }

    /// The best stable detection seen so far.
    pub fn best(&self) -> Option<(&'static str, f32)> {
        self.best
    }

    /// Ends the phase. The saved thresholds are restored first; on success
    /// the clarity gate is then replaced by the calibrated value, which is
    /// also returned. Without a usable note the engine is left exactly as
    /// it was and [`EngineError::CalibrationFailedNoNote`] is returned.
    pub fn finish(self, engine: &mut PitchEngine) -> Result<f32, EngineError> {
        engine.rms_threshold = self.saved_rms_threshold;
        engine.clarity_threshold = self.saved_clarity_threshold;

        match self.best {
            Some((note, clarity)) if clarity > MIN_VALID_CLARITY => {
                let gate =
                    (clarity * CLARITY_SCALE).clamp(CLARITY_GATE_MIN, STRICT_CLARITY_THRESHOLD);
                log::info!(
                    "note calibration: {} at clarity {:.3}, clarity threshold {:.3}",
                    note,
                    clarity,
                    gate
                );
                engine.clarity_threshold = gate;
                Ok(gate)
            }
            _ => Err(EngineError::CalibrationFailedNoNote),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn frame(note: Option<&'static str>, clarity: f32, volume: f32) -> DetectionFrame {
        DetectionFrame {
            note,
            frequency: 440.0,
            clarity,
            volume,
            cents_offset: note.map(|_| 0.0),
        }
    }

    #[test]
    fn noise_phase_sets_gate_above_ambient() {
        let mut engine = PitchEngine::new(&EngineConfig::default());
        let mut wizard = NoiseCalibration::new();
        for _ in 0..30 {
            wizard.observe(&frame(None, 0.0, 2e-3));
        }
        assert_eq!(wizard.sample_count(), 30);
        let threshold = wizard.finish(&mut engine);
        assert!((threshold - 5e-3).abs() < 1e-6);
        assert_eq!(engine.rms_threshold, threshold);
    }

    #[test]
    fn noise_phase_never_drops_below_minimum() {
        let mut engine = PitchEngine::new(&EngineConfig::default());
        let mut wizard = NoiseCalibration::new();
        for _ in 0..30 {
            wizard.observe(&frame(None, 0.0, 1e-6));
        }
        assert_eq!(wizard.finish(&mut engine), 3e-4);
    }

    #[test]
    fn note_phase_halves_the_measured_clarity() {
        let mut engine = PitchEngine::new(&EngineConfig::default());
        let mut wizard = NoteCalibration::begin(&mut engine);
        assert_eq!(engine.rms_threshold, 1e-4);
        assert_eq!(engine.clarity_threshold, 5e-3);

        wizard.observe(&frame(Some("A4"), 0.6, 0.05));
        wizard.observe(&frame(Some("A4"), 0.9, 0.05));
        wizard.observe(&frame(None, 0.0, 1e-4));
        assert_eq!(wizard.best(), Some(("A4", 0.9)));

        let gate = wizard.finish(&mut engine).unwrap();
        assert!((gate - 0.3).abs() < 1e-6); // 0.45 clamped to the strict cap
        assert_eq!(engine.clarity_threshold, gate);
        assert_eq!(engine.rms_threshold, EngineConfig::default().rms_threshold);
    }

    #[test]
    fn weak_measurement_stays_inside_the_gate_range() {
        let mut engine = PitchEngine::new(&EngineConfig::default());
        let mut wizard = NoteCalibration::begin(&mut engine);
        wizard.observe(&frame(Some("C4"), 0.012, 0.01));
        let gate = wizard.finish(&mut engine).unwrap();
        assert!((gate - 6e-3).abs() < 1e-6);
    }

    #[test]
    fn no_note_leaves_thresholds_unchanged() {
        let mut engine = PitchEngine::new(&EngineConfig::default());
        let before = (engine.rms_threshold, engine.clarity_threshold);
        let mut wizard = NoteCalibration::begin(&mut engine);
        wizard.observe(&frame(None, 0.0, 1e-4));
        let result = wizard.finish(&mut engine);
        assert!(matches!(result, Err(EngineError::CalibrationFailedNoNote)));
        assert_eq!((engine.rms_threshold, engine.clarity_threshold), before);
    }

    #[test]
    fn too_quiet_a_note_fails_calibration() {
        let mut engine = PitchEngine::new(&EngineConfig::default());
        let mut wizard = NoteCalibration::begin(&mut engine);
        wizard.observe(&frame(Some("C4"), 0.005, 0.01));
        assert!(wizard.finish(&mut engine).is_err());
    }
}
