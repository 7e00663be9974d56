//! # Note Table Module
//!
//! Equal-tempered note frequencies and the lyre-string classifier.
//! The full table spans C3..D6 (A4 = 440 Hz); the classification target is
//! the 19 diatonic strings of the lyre harp, F3..C6.
//!
//! ## Features
//! - Equal temperament frequency calculations (A4 = 440 Hz)
//! - Sharp and flat spellings of the same pitch resolve to the same frequency
//! - Cent deviation calculations for tuning accuracy
//! - Nearest-string classification with a 50-cent acceptance window

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// Maximum distance, in cents, between a detected frequency and the nearest
/// lyre string for the detection to count as that string.
pub const CENTS_TOLERANCE: f32 = 50.0;

/// MIDI number of the lowest table entry (C3).
const TABLE_LOW_MIDI: i32 = 48;
/// MIDI number of the highest table entry (D6).
const TABLE_HIGH_MIDI: i32 = 86;

const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Flat spelling for each pitch class, where one exists.
const FLAT_NAMES: [Option<&str>; 12] = [
    None,
    Some("Db"),
    None,
    Some("Eb"),
    None,
    None,
    Some("Gb"),
    None,
    Some("Ab"),
    None,
    Some("Bb"),
    None,
];

/// The 19 diatonic lyre strings, low to high.
pub const LYRE_SET: [&str; 19] = [
    "F3", "G3", "A3", "B3", "C4", "D4", "E4", "F4", "G4", "A4", "B4", "C5", "D5", "E5", "F5", "G5",
    "A5", "B5", "C6",
];

fn midi_to_frequency(midi: i32) -> f32 {
    440.0 * 2.0_f32.powf((midi - 69) as f32 / 12.0)
}

fn midi_to_name(midi: i32) -> String {
    let pitch_class = midi.rem_euclid(12) as usize;
    let octave = midi / 12 - 1;
    format!("{}{}", SHARP_NAMES[pitch_class], octave)
}

/// Static map for note name to frequency lookups, C3 to D6.
///
/// Holds every canonical (sharp) spelling plus the flat alias of each
/// accidental, so "A#3" and "Bb3" both resolve. Computed once at startup.
static NOTE_FREQUENCIES: Lazy<BTreeMap<String, f32>> = Lazy::new(|| {
    let mut map = BTreeMap::new();
    for midi in TABLE_LOW_MIDI..=TABLE_HIGH_MIDI {
        let frequency = midi_to_frequency(midi);
        map.insert(midi_to_name(midi), frequency);
        let pitch_class = midi.rem_euclid(12) as usize;
        if let Some(flat) = FLAT_NAMES[pitch_class] {
            map.insert(format!("{}{}", flat, midi / 12 - 1), frequency);
        }
    }
    map
});

/// The lyre strings paired with their target frequencies, low to high.
static LYRE_NOTES: Lazy<Vec<(&'static str, f32)>> = Lazy::new(|| {
    LYRE_SET
        .iter()
        .filter_map(|&name| NOTE_FREQUENCIES.get(name).map(|&f| (name, f)))
        .collect()
});

/// Looks up the equal-tempered frequency of a note name.
///
/// Accepts both sharp and flat spellings. Returns `None` for names outside
/// the C3..D6 table.
pub fn note_frequency(name: &str) -> Option<f32> {
    NOTE_FREQUENCIES.get(name).copied()
}

/// Whether `name` is one of the 19 lyre strings.
pub fn is_lyre_note(name: &str) -> bool {
    LYRE_SET.contains(&name)
}

/// Calculates the deviation of `freq` from `target` in cents.
///
/// 100 cents = 1 semitone, 1200 cents = 1 octave. Positive values indicate
/// sharpness, negative values indicate flatness.
pub fn cents_between(freq: f32, target: f32) -> f32 {
    1200.0 * (freq / target).log2()
}

/// Maps a frequency to the nearest lyre string.
///
/// Returns the string name and the cent deviation from it, or `None` when
/// the frequency is non-positive or more than [`CENTS_TOLERANCE`] cents away
/// from every string.
pub fn classify_lyre(freq: f32) -> Option<(&'static str, f32)> {
    if freq <= 0.0 {
        return None;
    }

    let (name, cents) = LYRE_NOTES
        .iter()
        .map(|&(name, target)| (name, cents_between(freq, target)))
        .min_by(|a, b| {
            a.1.abs()
                .partial_cmp(&b.1.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;

    if cents.abs() <= CENTS_TOLERANCE {
        Some((name, cents))
    } else {
        None
    }
}
