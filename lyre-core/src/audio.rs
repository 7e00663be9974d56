//! # Audio Front-End Module
//!
//! Real-time microphone capture using CPAL, plus the conditioning chain the
//! analysis expects: high-pass at 150 Hz and low-pass at 1200 Hz (both
//! Q ≈ 0.707) followed by a configurable gain, feeding a sliding
//! 8192-sample analysis window.
//!
//! The capture callback runs on the host audio thread and only forwards raw
//! chunks over a channel; filtering, gain, and windowing happen on the
//! driver thread when the engine polls, so the whole DSP state stays
//! single-threaded.
//!
//! Capture wants a plain signal: hardware echo cancellation, auto-gain, and
//! noise suppression distort pitch periods and corrupt RMS, so the default
//! input device is used as-is and no host-side processing is requested.

use crate::biquad::{Biquad, FilterKind};
use crate::error::EngineError;
use crate::fft::{SpectrumAnalyzer, FFT_SIZE};
use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::{Receiver, Sender};
use std::collections::VecDeque;

/// Samples in the analysis window; equals the FFT size.
pub const WINDOW_SIZE: usize = FFT_SIZE;

/// Preferred capture rate in Hz. The actual device rate may differ; it is
/// fixed for the life of a capture session.
pub const TARGET_SAMPLE_RATE: u32 = 48_000;

/// High-pass cutoff ahead of analysis, in Hz.
pub const HIGHPASS_CUTOFF_HZ: f32 = 150.0;
/// Low-pass cutoff ahead of analysis, in Hz.
pub const LOWPASS_CUTOFF_HZ: f32 = 1200.0;
/// Quality factor of both filter sections.
pub const FILTER_Q: f32 = 0.707;

/// Lower bound of the input gain.
pub const MIN_GAIN: f32 = 0.5;
/// Upper bound of the input gain.
pub const MAX_GAIN: f32 = 5.0;

/// Capture chunks queued between audio thread and driver. At 60 Hz polling
/// this is far more slack than ever builds up; overflow drops the chunk.
const CHANNEL_CAPACITY: usize = 64;

/// Microphone capture session plus the analysis conditioning chain.
pub struct AudioFrontEnd {
    stream: Option<cpal::Stream>,
    receiver: Option<Receiver<Vec<f32>>>,
    window: VecDeque<f32>,
    highpass: Biquad,
    lowpass: Biquad,
    gain: f32,
    sample_rate: u32,
    analyzer: SpectrumAnalyzer,
}

impl AudioFrontEnd {
    pub fn new(gain: f32) -> Self {
        let sample_rate = TARGET_SAMPLE_RATE;
        AudioFrontEnd {
            stream: None,
            receiver: None,
            window: VecDeque::with_capacity(WINDOW_SIZE),
            highpass: Biquad::new(
                FilterKind::HighPass,
                HIGHPASS_CUTOFF_HZ,
                FILTER_Q,
                sample_rate as f32,
            ),
            lowpass: Biquad::new(
                FilterKind::LowPass,
                LOWPASS_CUTOFF_HZ,
                FILTER_Q,
                sample_rate as f32,
            ),
            gain: gain.clamp(MIN_GAIN, MAX_GAIN),
            sample_rate,
            analyzer: SpectrumAnalyzer::new(),
        }
    }

    /// Starts capture from the default input device. Idempotent; returns
    /// only once the stream is playing. On failure the front-end stays
    /// stopped.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let (stream, sample_rate, receiver) =
            open_input_stream().map_err(EngineError::CaptureUnavailable)?;

        if sample_rate != self.sample_rate {
            log::info!("capture running at {} Hz", sample_rate);
        }
        self.sample_rate = sample_rate;
        self.highpass = Biquad::new(
            FilterKind::HighPass,
            HIGHPASS_CUTOFF_HZ,
            FILTER_Q,
            sample_rate as f32,
        );
        self.lowpass = Biquad::new(
            FilterKind::LowPass,
            LOWPASS_CUTOFF_HZ,
            FILTER_Q,
            sample_rate as f32,
        );
        self.window.clear();
        self.stream = Some(stream);
        self.receiver = Some(receiver);
        Ok(())
    }

    /// Stops capture and releases the device. Idempotent. The analysis
    /// window and filter state are cleared so a later start begins fresh.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::warn!("error pausing capture stream: {}", e);
            }
            drop(stream);
            log::info!("capture stopped");
        }
        self.receiver = None;
        self.window.clear();
        self.highpass.reset();
        self.lowpass.reset();
    }

    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }

    /// Drains captured chunks into the sliding window, applying the
    /// band-pass chain and gain in arrival order.
    pub fn poll(&mut self) {
        let Some(receiver) = &self.receiver else {
            return;
        };
        while let Ok(chunk) = receiver.try_recv() {
            for sample in chunk {
                let conditioned = self.lowpass.process(self.highpass.process(sample)) * self.gain;
                if self.window.len() == WINDOW_SIZE {
                    self.window.pop_front();
                }
                self.window.push_back(conditioned);
            }
        }
    }

    /// Whether a full analysis window has accumulated since start.
    pub fn window_ready(&self) -> bool {
        self.window.len() == WINDOW_SIZE
    }

    /// Snapshot of the current analysis window, oldest sample first.
    /// `None` until the window has filled.
    pub fn time_window(&self) -> Option<Vec<f32>> {
        if !self.window_ready() {
            return None;
        }
        Some(self.window.iter().copied().collect())
    }

    /// dB magnitude spectrum of the current window. `None` until the window
    /// has filled.
    pub fn magnitude_spectrum_db(&self) -> Option<Vec<f32>> {
        self.time_window()
            .map(|window| self.analyzer.magnitude_spectrum_db(&window))
    }

    /// Sets the input gain, clamped to [[`MIN_GAIN`], [`MAX_GAIN`]].
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(MIN_GAIN, MAX_GAIN);
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Capture rate of the running (or most recent) session, in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Opens the default input device as a mono f32 stream near the target rate
/// and wires its callback to a bounded channel.
fn open_input_stream() -> Result<(cpal::Stream, u32, Receiver<Vec<f32>>)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("no input device available"))?;

    log::info!("using audio input device: {}", device.name()?);

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported = find_supported_config(configs)
        .ok_or_else(|| anyhow!("no suitable mono f32 input format found"))?;

    let sample_rate = TARGET_SAMPLE_RATE
        .clamp(supported.min_sample_rate().0, supported.max_sample_rate().0);
    let config: cpal::StreamConfig = supported
        .with_sample_rate(cpal::SampleRate(sample_rate))
        .into();

    log::info!("selected sample rate: {} Hz", sample_rate);

    let (sender, receiver): (Sender<Vec<f32>>, Receiver<Vec<f32>>) =
        crossbeam_channel::bounded(CHANNEL_CAPACITY);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            // Dropping a chunk under backpressure is preferable to blocking
            // the audio thread.
            let _ = sender.try_send(data.to_vec());
        },
        |err| log::error!("audio stream error: {}", err),
        None,
    )?;

    stream.play()?;

    Ok((stream, sample_rate, receiver))
}

/// Picks the mono f32 input config whose rate range sits closest to the
/// target rate.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.channels() == 1 && c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min_diff = (c.min_sample_rate().0 as i64 - TARGET_SAMPLE_RATE as i64).abs();
            let max_diff = (c.max_sample_rate().0 as i64 - TARGET_SAMPLE_RATE as i64).abs();
            min_diff.min(max_diff)
        })
}
