//! # LyreHero CLI
//!
//! Terminal host for the lyre-core engine. Drives the engine the way the
//! tutor UI does — one `detect_pitch` poll per ~16 ms display frame on a
//! single thread — and exposes three commands:
//!
//! - `live`               print detections as they stabilize
//! - `tutor <song.json>`  play through a song with hold-to-advance
//! - `calibrate`          run the noise and note wizards, persist the config

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use lyre_core::calibration::{NoiseCalibration, NoteCalibration};
use lyre_core::config::{EngineConfig, CONFIG_FILE};
use lyre_core::song::Song;
use lyre_core::tutor::{Tutor, TutorState};
use lyre_core::PitchEngine;

/// One display frame at ~60 Hz.
const TICK: Duration = Duration::from_millis(16);

const NOISE_PHASE: Duration = Duration::from_secs(3);
const NOTE_PHASE: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None | Some("live") => run_live(),
        Some("tutor") => {
            let path = args
                .get(1)
                .map(PathBuf::from)
                .context("usage: lyre-cli tutor <song.json>")?;
            run_tutor(&path)
        }
        Some("calibrate") => run_calibrate(),
        Some(other) => {
            bail!("unknown command '{}'; expected live, tutor or calibrate", other)
        }
    }
}

fn config_path() -> PathBuf {
    PathBuf::from(CONFIG_FILE)
}

fn start_engine(config: &EngineConfig) -> Result<PitchEngine> {
    let mut engine = PitchEngine::new(config);
    engine
        .start()
        .context("starting capture (is a microphone connected and allowed?)")?;
    Ok(engine)
}

/// Print detections until interrupted.
fn run_live() -> Result<()> {
    let config = EngineConfig::load_or_default(&config_path());
    let mut engine = start_engine(&config)?;
    println!("Listening. Play a note (Ctrl-C to quit).");

    let mut last_note: Option<&'static str> = None;
    loop {
        std::thread::sleep(TICK);
        let Some(frame) = engine.detect_pitch() else {
            continue;
        };
        if frame.note != last_note {
            match frame.note {
                Some(name) => println!(
                    "{:<3} {:7.2} Hz  {:+5.1} cents  clarity {:.2}  volume {:.4}",
                    name,
                    frame.frequency,
                    frame.cents_offset.unwrap_or(0.0),
                    frame.clarity,
                    frame.volume
                ),
                None => println!("--"),
            }
            last_note = frame.note;
        }
    }
}

/// Play through a song with the hold-to-advance state machine.
fn run_tutor(song_path: &Path) -> Result<()> {
    let config = EngineConfig::load_or_default(&config_path());
    let mut tutor = Tutor::new(Song::load(song_path)?, config.hold_duration_ms);

    let song = tutor.song();
    println!(
        "{} ({:?}, {} notes){}",
        song.title,
        song.difficulty,
        song.notes.len(),
        song.artist
            .as_deref()
            .map(|a| format!(" - {}", a))
            .unwrap_or_default()
    );
    let mut engine = match start_engine(&config) {
        Ok(engine) => engine,
        Err(e) => {
            tutor.capture_failed();
            return Err(e);
        }
    };
    tutor.begin();

    let mut shown_index = usize::MAX;
    while tutor.is_listening() {
        std::thread::sleep(TICK);
        let Some(frame) = engine.detect_pitch() else {
            continue;
        };
        tutor.on_frame(frame.note, Instant::now());

        if tutor.current_index() != shown_index {
            if shown_index != usize::MAX {
                println!();
            }
            shown_index = tutor.current_index();
        }
        let filled = (tutor.hold_progress() * 10.0) as usize;
        print!(
            "\rplay {:<3} [{:<10}]",
            tutor.current_note().unwrap_or("--"),
            "#".repeat(filled)
        );
        std::io::stdout().flush().ok();
    }
    engine.stop();

    match tutor.state() {
        TutorState::Finished => {
            println!("\nSong complete!");
            Ok(())
        }
        state => bail!("tutor stopped in state {:?}", state),
    }
}

/// Run both calibration phases and persist the resulting config.
fn run_calibrate() -> Result<()> {
    let path = config_path();
    let mut config = EngineConfig::load_or_default(&path);
    let mut engine = start_engine(&config)?;

    println!("Noise calibration: stay silent for {} seconds...", NOISE_PHASE.as_secs());
    let mut noise = NoiseCalibration::new();
    let deadline = Instant::now() + NOISE_PHASE;
    while Instant::now() < deadline {
        std::thread::sleep(TICK);
        if let Some(frame) = engine.detect_pitch() {
            noise.observe(&frame);
        }
    }
    let measured_frames = noise.sample_count();
    config.rms_threshold = noise.finish(&mut engine);
    println!(
        "  measured {} frames; volume gate set to {:.6}",
        measured_frames, config.rms_threshold
    );

    println!("Note calibration: pluck and hold one clear note for {} seconds...", NOTE_PHASE.as_secs());
    let mut note = NoteCalibration::begin(&mut engine);
    let deadline = Instant::now() + NOTE_PHASE;
    while Instant::now() < deadline {
        std::thread::sleep(TICK);
        if let Some(frame) = engine.detect_pitch() {
            note.observe(&frame);
        }
    }
    let heard = note.best();
    match note.finish(&mut engine) {
        Ok(gate) => {
            config.clarity_threshold = gate;
            match heard {
                Some((name, clarity)) => println!(
                    "  heard {} at clarity {:.2}; clarity gate set to {:.3}",
                    name, clarity, gate
                ),
                None => println!("  clarity gate set to {:.3}", gate),
            }
        }
        Err(e) => println!("  {}; clarity gate unchanged", e),
    }

    engine.stop();
    config
        .save(&path)
        .with_context(|| format!("saving {}", path.display()))?;
    println!("Saved {}.", path.display());
    Ok(())
}
