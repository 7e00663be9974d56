//! Song schema and JSON loading.
//!
//! A song is an ordered list of note events. Only `note` drives detection
//! matching; `bassNote` and `lyric` are presentation-only, and `duration`
//! is a display hint. Unknown JSON fields are ignored so song files can
//! carry extra metadata.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::notes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Display note value, serialized in the song format's fraction spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteValue {
    #[serde(rename = "1")]
    Whole,
    #[serde(rename = "1/2")]
    Half,
    #[serde(rename = "1/4")]
    Quarter,
    #[serde(rename = "1/8")]
    Eighth,
}

/// One entry of a song's note sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEvent {
    /// Melody note the player must hit. A name from the full note table.
    pub note: String,
    /// Accompaniment note, displayed only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bass_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lyric: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<NoteValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Song {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    pub difficulty: Difficulty,
    pub notes: Vec<NoteEvent>,
}

impl Song {
    /// Parses a song from JSON and validates every melody note against the
    /// note table.
    pub fn from_json(json: &str) -> Result<Self> {
        let song: Song = serde_json::from_str(json).context("parsing song JSON")?;
        song.validate()?;
        Ok(song)
    }

    /// Loads and validates a song file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading song file {}", path.display()))?;
        Self::from_json(&data)
    }

    fn validate(&self) -> Result<()> {
        if self.notes.is_empty() {
            bail!("song '{}' has no notes", self.title);
        }
        for (i, event) in self.notes.iter().enumerate() {
            if notes::note_frequency(&event.note).is_none() {
                bail!(
                    "song '{}': note {} ('{}') is not in the note table",
                    self.title,
                    i,
                    event.note
                );
            }
        }
        Ok(())
    }
}
