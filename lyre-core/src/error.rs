//! Engine error kinds. Deliberately coarse: detection itself is best-effort
//! per frame and never errors; only the capture boundary, config persistence,
//! and calibration can fail in ways a host has to react to.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Microphone permission was denied or the device failed. The front-end
    /// is stopped; the host must explicitly restart.
    #[error("audio capture unavailable: {0}")]
    CaptureUnavailable(#[source] anyhow::Error),

    /// The persisted config could not be read or parsed. Non-fatal; callers
    /// proceed with defaults.
    #[error("failed to load audio config: {0}")]
    ConfigLoadFailed(#[source] anyhow::Error),

    /// The note-calibration phase ended without a usable stable note.
    /// Non-fatal; thresholds are left unchanged.
    #[error("no note detected during calibration")]
    CalibrationFailedNoNote,
}
