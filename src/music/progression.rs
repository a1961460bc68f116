// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Progression: an ordered chord chart.
//!
//! Insertion order is performance order. The editing layer mutates a
//! progression between playback runs; the transport snapshots it at
//! schedule-compile time, so in-flight edits never touch a running schedule.

use super::chord::{Chord, ChordError};

/// An ordered sequence of chords with stable per-chord ids.
#[derive(Debug, Clone, Default)]
pub struct Progression {
    chords: Vec<Chord>,
    next_id: u64,
}

impl Progression {
    /// Create an empty progression
    pub fn new() -> Self {
        Self {
            chords: Vec::new(),
            next_id: 1,
        }
    }

    /// Build a progression from existing chords, assigning fresh ids
    pub fn from_chords(chords: impl IntoIterator<Item = Chord>) -> Self {
        let mut progression = Self::new();
        for chord in chords {
            progression.push(chord);
        }
        progression
    }

    /// Append a chord, returning its assigned id
    pub fn push(&mut self, mut chord: Chord) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        chord.id = id;
        self.chords.push(chord);
        id
    }

    /// Insert a chord at a position, returning its assigned id
    pub fn insert(&mut self, index: usize, mut chord: Chord) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        chord.id = id;
        let index = index.min(self.chords.len());
        self.chords.insert(index, chord);
        id
    }

    /// Remove a chord by id
    pub fn remove(&mut self, id: u64) -> Option<Chord> {
        let index = self.chords.iter().position(|c| c.id == id)?;
        Some(self.chords.remove(index))
    }

    /// Move the chord at `from` to position `to`
    pub fn reorder(&mut self, from: usize, to: usize) {
        if from >= self.chords.len() {
            return;
        }
        let chord = self.chords.remove(from);
        let to = to.min(self.chords.len());
        self.chords.insert(to, chord);
    }

    /// Look up a chord by id
    pub fn get(&self, id: u64) -> Option<&Chord> {
        self.chords.iter().find(|c| c.id == id)
    }

    /// Look up a chord by id, mutably
    pub fn get_mut(&mut self, id: u64) -> Option<&mut Chord> {
        self.chords.iter_mut().find(|c| c.id == id)
    }

    /// The chords in performance order
    pub fn chords(&self) -> &[Chord] {
        &self.chords
    }

    /// Number of chords
    pub fn len(&self) -> usize {
        self.chords.len()
    }

    /// Whether the progression has no chords
    pub fn is_empty(&self) -> bool {
        self.chords.is_empty()
    }

    /// Total duration in beats
    pub fn total_beats(&self) -> u64 {
        self.chords.iter().map(|c| c.beats as u64).sum()
    }

    /// Validate every chord in the progression
    pub fn validate(&self) -> Result<(), ChordError> {
        for chord in &self.chords {
            chord.validate()?;
        }
        Ok(())
    }
}
