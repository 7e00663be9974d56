//! # Pitch Engine Module
//!
//! The per-frame pipeline behind `detect_pitch`: poll audio, estimate the
//! fundamental, extract features, update the adaptive noise floor, gate,
//! classify against the lyre strings, and smooth. One call produces one
//! [`DetectionFrame`], and everything the call touches — histories, noise
//! floor, thresholds — belongs to the calling thread, so the update is
//! atomic from the host's point of view.
//!
//! The engine performs no background work and owns no timers; the host
//! drives it once per display frame.

use crate::audio::AudioFrontEnd;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::features;
use crate::notes;
use crate::pitch;
use crate::smoothing::{NoiseFloor, NoteSmoother};
use crate::DetectionFrame;

/// Frames with a zero-crossing rate above this are broadband noise.
const MAX_ZCR: f32 = 0.3;
/// Frames with spectral flatness at or above this need the harmonic check to
/// pass instead.
const MAX_FLATNESS: f32 = 0.3;

/// Real-time pitch detection engine for the lyre tutor.
///
/// Thresholds are plain public fields: calibration mutates them mid-session
/// and the single-driver model makes that race-free.
pub struct PitchEngine {
    front_end: AudioFrontEnd,
    /// Minimum RMS for a frame to carry a note. The adaptive noise floor may
    /// raise the effective gate above this.
    pub rms_threshold: f32,
    /// Minimum NSDF clarity for a frame to carry a note.
    pub clarity_threshold: f32,
    smoother: NoteSmoother,
    noise_floor: NoiseFloor,
}

impl PitchEngine {
    pub fn new(config: &EngineConfig) -> Self {
        PitchEngine {
            front_end: AudioFrontEnd::new(config.gain),
            rms_threshold: config.rms_threshold,
            clarity_threshold: config.clarity_threshold,
            smoother: NoteSmoother::new(),
            noise_floor: NoiseFloor::new(),
        }
    }

    /// Applies threshold and gain settings. Hold duration belongs to the
    /// tutor and is not consumed here.
    pub fn apply_config(&mut self, config: &EngineConfig) {
        self.rms_threshold = config.rms_threshold;
        self.clarity_threshold = config.clarity_threshold;
        self.front_end.set_gain(config.gain);
    }

    /// Starts the capture session. Idempotent; fails with
    /// [`EngineError::CaptureUnavailable`] when the microphone cannot be
    /// opened.
    pub fn start(&mut self) -> Result<(), EngineError> {
        self.front_end.start()
    }

    /// Stops capture and resets all detection state: histories empty, noise
    /// floor back to its seed. Idempotent.
    pub fn stop(&mut self) {
        self.front_end.stop();
        self.smoother.reset();
        self.noise_floor.reset();
    }

    pub fn is_running(&self) -> bool {
        self.front_end.is_running()
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.front_end.set_gain(gain);
    }

    pub fn gain(&self) -> f32 {
        self.front_end.gain()
    }

    /// Current ambient RMS estimate.
    pub fn noise_floor(&self) -> f32 {
        self.noise_floor.floor()
    }

    /// The RMS gate currently in force.
    pub fn effective_rms_threshold(&self) -> f32 {
        self.noise_floor.effective_gate(self.rms_threshold)
    }

    /// dB spectrum of the current analysis window, for visualizers.
    /// `None` while stopped or before the window has filled.
    pub fn spectrum_snapshot(&self) -> Option<Vec<f32>> {
        self.front_end.magnitude_spectrum_db()
    }

    /// Runs one detection frame against the live capture window.
    ///
    /// Returns `None` while the engine is stopped or the first window is
    /// still filling; a tick that lands after `stop` therefore no-ops.
    pub fn detect_pitch(&mut self) -> Option<DetectionFrame> {
        if !self.front_end.is_running() {
            return None;
        }
        self.front_end.poll();
        let window = self.front_end.time_window()?;
        let spectrum_db = self.front_end.magnitude_spectrum_db()?;
        let sample_rate = self.front_end.sample_rate() as f32;
        Some(self.analyze_window(&window, &spectrum_db, sample_rate))
    }

    /// The full per-frame analysis over an arbitrary window and its dB
    /// spectrum.
    ///
    /// `detect_pitch` calls this with the live capture window; tests call it
    /// directly with synthetic frames. A frame's raw note survives to the
    /// history only when every gate agrees:
    ///
    /// - RMS above the effective (noise-floor-adjusted) threshold
    /// - clarity above the clarity threshold
    /// - zero-crossing rate at most 0.3
    /// - fundamental inside the lyre band
    /// - spectral flatness below 0.3, or harmonics present
    ///
    /// The emitted frame carries the *smoothed* note and frequency.
    pub fn analyze_window(
        &mut self,
        window: &[f32],
        spectrum_db: &[f32],
        sample_rate: f32,
    ) -> DetectionFrame {
        let estimate = pitch::detect_pitch_nsdf(window, sample_rate);
        let volume = features::rms(window);

        self.noise_floor.observe(volume);
        let gate = self.noise_floor.effective_gate(self.rms_threshold);

        let raw_note = if volume > gate
            && estimate.clarity > self.clarity_threshold
            && features::zero_crossing_rate(window) <= MAX_ZCR
            && (features::LYRE_BAND_MIN_HZ..=features::LYRE_BAND_MAX_HZ)
                .contains(&estimate.frequency)
            && (features::spectral_flatness(spectrum_db, sample_rate) < MAX_FLATNESS
                || features::harmonic_presence(spectrum_db, estimate.frequency, sample_rate))
        {
            notes::classify_lyre(estimate.frequency).map(|(name, _)| name)
        } else {
            None
        };

        self.smoother.push(raw_note, estimate.frequency);

        let note = self.smoother.stable_note();
        let frequency = self.smoother.stable_frequency();
        let cents_offset = note
            .and_then(notes::note_frequency)
            .map(|target| notes::cents_between(frequency, target));

        DetectionFrame {
            note,
            frequency,
            clarity: estimate.clarity,
            volume,
            cents_offset,
        }
    }
}
