// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Chord type: a named fingering with a beat duration and strumming pattern.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{fretted_note, MidiNote, MAX_FRET, MUTED_STRING, STRING_COUNT};

/// Strumming pattern for a chord.
///
/// Only `Once` and `Down` affect how trigger events are scheduled; the
/// remaining patterns are rendered by the instrument layer as per-beat
/// articulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrummingPattern {
    /// Strum on the chord's first beat and let it ring
    Once,
    /// Strum on every beat
    Down,
    /// Down on the beat, up on the off-beat
    DownUp,
    /// Down, down, up over two beats
    DownDownUp,
    /// D-DU-UDU folk pattern over four beats
    Folk,
}

impl Default for StrummingPattern {
    fn default() -> Self {
        StrummingPattern::Once
    }
}

/// Validation errors for chord data
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChordError {
    #[error("chord '{name}' has a zero beat count; every chord must span at least one beat")]
    ZeroBeats { name: String },
    #[error("chord '{name}' has fret {fret} on string {string}; frets must be within -1..={max}", max = MAX_FRET)]
    FretOutOfRange { name: String, string: usize, fret: i8 },
}

/// A chord in a progression: display name, duration in beats, a six-string
/// fingering (-1 muted, 0 open, >0 fretted) and a strumming pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chord {
    /// Stable identifier, unique within its progression
    #[serde(default)]
    pub id: u64,
    /// Display name (e.g. "Am7")
    pub name: String,
    /// Duration in beats
    pub beats: u32,
    /// One entry per string, low string first
    pub fingering: [i8; STRING_COUNT],
    /// How the chord is strummed
    #[serde(default)]
    pub pattern: StrummingPattern,
}

impl Chord {
    /// Create a chord with the default one-strum pattern
    pub fn new(name: impl Into<String>, beats: u32, fingering: [i8; STRING_COUNT]) -> Self {
        Self {
            id: 0,
            name: name.into(),
            beats,
            fingering,
            pattern: StrummingPattern::Once,
        }
    }

    /// Set the strumming pattern
    pub fn with_pattern(mut self, pattern: StrummingPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Check the chord's invariants
    pub fn validate(&self) -> Result<(), ChordError> {
        if self.beats == 0 {
            return Err(ChordError::ZeroBeats {
                name: self.name.clone(),
            });
        }
        for (string, &fret) in self.fingering.iter().enumerate() {
            if fret < MUTED_STRING || fret > MAX_FRET {
                return Err(ChordError::FretOutOfRange {
                    name: self.name.clone(),
                    string,
                    fret,
                });
            }
        }
        Ok(())
    }

    /// MIDI notes this chord sounds, low string first, honoring the capo.
    /// Muted strings are skipped.
    pub fn sounding_notes(&self, capo: u8) -> Vec<MidiNote> {
        self.fingering
            .iter()
            .enumerate()
            .filter_map(|(string, &fret)| fretted_note(string, fret, capo))
            .collect()
    }
}
