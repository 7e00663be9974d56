//! # Feature Extraction Module
//!
//! Per-frame signal features used to corroborate (or veto) the pitch
//! estimate before classification:
//!
//! 1. RMS level over the full window — the volume gate
//! 2. Zero-crossing rate — broadband noise (speech fricatives, handling) veto
//! 3. Spectral flatness (Wiener entropy) over the lyre band — tonality check
//! 4. Harmonic presence — a plucked string shows energy at 2f and 3f; a
//!    stray tonal artifact usually does not

/// Lower edge of the band the flatness and classifier gates consider, in Hz.
/// Just below the lowest lyre string (F3 ≈ 174.6 Hz).
pub const LYRE_BAND_MIN_HZ: f32 = 165.0;
/// Upper edge of the gating band, in Hz. Just above C6 ≈ 1046.5 Hz.
pub const LYRE_BAND_MAX_HZ: f32 = 1100.0;

/// Zero crossings are counted over this many leading samples.
const ZCR_SPAN: usize = 2048;
/// A harmonic peak within this many dB of the fundamental peak counts as
/// present.
const HARMONIC_TOLERANCE_DB: f32 = 25.0;
/// Half-width of the search window around an expected harmonic bin, as a
/// fraction of the harmonic frequency.
const HARMONIC_SEARCH_FRACTION: f32 = 0.08;

/// Root-mean-square level of the window.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// Fraction of adjacent sample pairs with opposite sign, measured over the
/// first [`ZCR_SPAN`] samples.
///
/// A sustained string tone in the lyre band crosses zero a few percent of
/// the time; broadband noise approaches 0.5.
pub fn zero_crossing_rate(samples: &[f32]) -> f32 {
    let span = samples.len().min(ZCR_SPAN);
    if span < 2 {
        return 0.0;
    }
    let crossings = samples[..span]
        .windows(2)
        .filter(|pair| pair[0] * pair[1] < 0.0)
        .count();
    crossings as f32 / span as f32
}

/// Spectral flatness (geometric mean over arithmetic mean of bin powers)
/// inside the lyre band, clamped to [0, 1].
///
/// `spectrum_db` is a dB magnitude spectrum whose bin `i` covers
/// `i * sample_rate / (2 * len)` Hz. Low values mean tonal content; values
/// near 1 mean noise. An empty band or degenerate mean reports 1.0, i.e.
/// noise.
pub fn spectral_flatness(spectrum_db: &[f32], sample_rate: f32) -> f32 {
    if spectrum_db.is_empty() {
        return 1.0;
    }
    let bin_width = sample_rate / (2.0 * spectrum_db.len() as f32);

    let mut log_sum = 0.0f64;
    let mut linear_sum = 0.0f64;
    let mut count = 0usize;
    for (i, &db) in spectrum_db.iter().enumerate() {
        let freq = i as f32 * bin_width;
        if freq < LYRE_BAND_MIN_HZ || freq > LYRE_BAND_MAX_HZ {
            continue;
        }
        let power = 10.0f64.powf(db as f64 / 10.0);
        log_sum += (power + 1e-10).ln();
        linear_sum += power;
        count += 1;
    }

    if count == 0 {
        return 1.0;
    }
    let arithmetic_mean = linear_sum / count as f64;
    if arithmetic_mean <= 0.0 {
        return 1.0;
    }
    let geometric_mean = (log_sum / count as f64).exp();
    (geometric_mean / arithmetic_mean).clamp(0.0, 1.0) as f32
}

/// Peak dB magnitude near the bin for `freq`, searched over a window of
/// ±max(1, freq · [`HARMONIC_SEARCH_FRACTION`] / bin width) bins.
fn band_peak_db(spectrum_db: &[f32], freq: f32, bin_width: f32) -> Option<f32> {
    let center = (freq / bin_width).round() as isize;
    if center < 0 || center as usize >= spectrum_db.len() {
        return None;
    }
    let radius = ((freq * HARMONIC_SEARCH_FRACTION / bin_width).round() as isize).max(1);
    let lo = (center - radius).max(0) as usize;
    let hi = ((center + radius) as usize).min(spectrum_db.len() - 1);
    spectrum_db[lo..=hi]
        .iter()
        .copied()
        .reduce(f32::max)
}

/// Whether the spectrum shows at least one of the 2nd and 3rd harmonics of
/// `fundamental`.
///
/// Two conditions, both anchored on the fundamental's own peak:
///
/// 1. The fundamental must itself be present — its peak within
///    [`HARMONIC_TOLERANCE_DB`] of the spectrum's maximum. An estimator
///    that locked onto a subharmonic of an out-of-band tone reports a
///    fundamental with no energy under it, and comparing floor-level bins
///    against each other would otherwise vacuously "find" harmonics.
/// 2. A harmonic counts as present when its peak magnitude is within
///    [`HARMONIC_TOLERANCE_DB`] of the fundamental's peak, in either
///    direction.
pub fn harmonic_presence(spectrum_db: &[f32], fundamental: f32, sample_rate: f32) -> bool {
    if fundamental <= 0.0 || spectrum_db.is_empty() {
        return false;
    }
    let bin_width = sample_rate / (2.0 * spectrum_db.len() as f32);
    let Some(fundamental_peak) = band_peak_db(spectrum_db, fundamental, bin_width) else {
        return false;
    };

    let spectrum_max = spectrum_db.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if fundamental_peak < spectrum_max - HARMONIC_TOLERANCE_DB {
        return false;
    }

    [2.0f32, 3.0]
        .iter()
        .filter_map(|&k| band_peak_db(spectrum_db, k * fundamental, bin_width))
        .any(|peak| (peak - fundamental_peak).abs() <= HARMONIC_TOLERANCE_DB)
}
