// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Musical data model for chord charts.
//!
//! Provides the chord and progression types the playback engine consumes,
//! plus the standard-tuning fret arithmetic used to turn a fingering into
//! MIDI notes.

pub mod chord;
pub mod progression;

pub use chord::{Chord, ChordError, StrummingPattern};
pub use progression::Progression;

/// MIDI note number type (0-127)
pub type MidiNote = u8;

/// Number of strings on the modeled instrument
pub const STRING_COUNT: usize = 6;

/// Standard tuning, low string first: E2 A2 D3 G3 B3 E4
pub const STANDARD_TUNING: [MidiNote; STRING_COUNT] = [40, 45, 50, 55, 59, 64];

/// Highest supported capo position
pub const MAX_CAPO: u8 = 11;

/// Highest fret a fingering may reference
pub const MAX_FRET: i8 = 24;

/// Fret value meaning "do not sound this string"
pub const MUTED_STRING: i8 = -1;

/// Resolve a string/fret/capo triple to a MIDI note.
///
/// Returns `None` for a muted string, an out-of-range string index, or a
/// note that would land outside the MIDI range.
pub fn fretted_note(string: usize, fret: i8, capo: u8) -> Option<MidiNote> {
    if string >= STRING_COUNT || fret < 0 {
        return None;
    }
    let note = STANDARD_TUNING[string] as i32 + fret as i32 + capo as i32;
    if (0..=127).contains(&note) {
        Some(note as MidiNote)
    } else {
        None
    }
}
