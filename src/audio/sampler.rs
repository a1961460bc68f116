// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Guitar sampler built on FluidLite.
//!
//! `FluidSampler` wraps the synth itself (soundfont loading, program
//! selection, rendering). `GuitarSampler` is the control-side handle the
//! transport strums through: it turns a chord plus strumming pattern into
//! frame-stamped notes on the mix bus, with per-string stagger and a
//! little velocity humanization.

use std::path::Path;
use std::sync::{Arc, Mutex};

use fluidlite::{IsSettings, Settings, Synth};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{AudioError, Instrument, MixBus};
use crate::music::{fretted_note, Chord, MidiNote, StrummingPattern, STRING_COUNT};

/// Seconds between adjacent strings in a strum
const STRUM_STAGGER_SECS: f64 = 0.02;

/// Base strum velocity before humanization
const BASE_VELOCITY: u8 = 90;

/// Maximum velocity jitter applied per note
const HUMANIZE_RANGE: i16 = 8;

/// Selectable instrument sounds, mapped to General MIDI programs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SoundBank {
    ElectricClean,
    ElectricDistorted,
    Acoustic,
    Nylon,
    Jazz,
    SynthPad,
    Piano,
}

impl Default for SoundBank {
    fn default() -> Self {
        SoundBank::ElectricClean
    }
}

impl SoundBank {
    /// General MIDI program number for this sound
    pub fn program(self) -> u8 {
        match self {
            SoundBank::ElectricClean => 27,
            SoundBank::ElectricDistorted => 30,
            SoundBank::Acoustic => 25,
            SoundBank::Nylon => 24,
            SoundBank::Jazz => 26,
            SoundBank::SynthPad => 88,
            SoundBank::Piano => 0,
        }
    }
}

/// Direction of a single strum stroke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrumDirection {
    /// Low string first
    Down,
    /// High string first
    Up,
}

/// Expand a strumming pattern into (beat offset, direction) strokes for a
/// chord of the given length.
///
/// `Once` and `Down` produce a single down stroke: `Down` chords get one
/// trigger event per beat from the compiler, so each event renders one
/// stroke. The richer patterns are spread across the chord's beats from
/// its single beat-0 trigger.
pub fn articulation(pattern: StrummingPattern, beats: u32) -> Vec<(f64, StrumDirection)> {
    use StrumDirection::{Down, Up};

    let span = beats as f64;
    let strokes: Vec<(f64, StrumDirection)> = match pattern {
        StrummingPattern::Once | StrummingPattern::Down => vec![(0.0, Down)],
        StrummingPattern::DownUp => (0..beats)
            .flat_map(|b| [(b as f64, Down), (b as f64 + 0.5, Up)])
            .collect(),
        StrummingPattern::DownDownUp => (0..beats)
            .step_by(2)
            .flat_map(|b| {
                let s = b as f64;
                [(s, Down), (s + 1.0, Down), (s + 1.5, Up)]
            })
            .collect(),
        StrummingPattern::Folk => (0..beats)
            .step_by(4)
            .flat_map(|b| {
                let s = b as f64;
                [
                    (s, Down),
                    (s + 1.0, Down),
                    (s + 1.5, Up),
                    (s + 2.5, Up),
                    (s + 3.0, Down),
                    (s + 3.5, Up),
                ]
            })
            .collect(),
    };
    strokes
        .into_iter()
        .filter(|&(offset, _)| offset < span)
        .collect()
}

/// FluidLite synth wrapper: one melodic channel, selectable program
pub struct FluidSampler {
    synth: Synth,
    gain: f32,
    soundfont_id: Option<u32>,
}

impl FluidSampler {
    pub fn with_sample_rate(sample_rate: f64) -> Self {
        let settings = Settings::new().expect("failed to create FluidLite settings");
        if let Some(setting) = settings.num("synth.sample-rate") {
            setting.set(sample_rate);
        }
        if let Some(setting) = settings.num("synth.gain") {
            setting.set(0.5);
        }
        if let Some(setting) = settings.int("synth.polyphony") {
            setting.set(128);
        }

        let synth = Synth::new(settings).expect("failed to create FluidLite synth");
        synth.set_reverb_on(false);
        synth.set_chorus_on(false);

        Self {
            synth,
            gain: 0.5,
            soundfont_id: None,
        }
    }

    /// Load an SF2 soundfont, replacing any previous one
    pub fn load_soundfont(&mut self, path: &Path) -> Result<(), AudioError> {
        if !path.exists() {
            return Err(AudioError::SoundfontLoadFailed(format!(
                "soundfont file not found: {}",
                path.display()
            )));
        }
        if let Some(id) = self.soundfont_id {
            let _ = self.synth.sfunload(id, true);
        }
        match self.synth.sfload(path, true) {
            Ok(id) => {
                self.soundfont_id = Some(id);
                Ok(())
            }
            Err(_) => Err(AudioError::SoundfontLoadFailed(format!(
                "failed to load soundfont: {}",
                path.display()
            ))),
        }
    }

    pub fn has_soundfont(&self) -> bool {
        self.soundfont_id.is_some()
    }

    /// Select a General MIDI program
    pub fn set_program(&mut self, program: u8) {
        let _ = self.synth.program_change(0, program as u32);
    }

    pub fn note_on(&mut self, note: MidiNote, velocity: u8) {
        let _ = self.synth.note_on(0, note as u32, velocity as u32);
    }

    pub fn note_off(&mut self, note: MidiNote) {
        let _ = self.synth.note_off(0, note as u32);
    }

    /// Cut everything ringing on the channel
    pub fn all_notes_off(&mut self) {
        // CC 123 = All Notes Off, CC 120 = All Sound Off
        let _ = self.synth.cc(0, 123, 0);
        let _ = self.synth.cc(0, 120, 0);
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(0.0, 1.0);
    }

    /// Render interleaved audio into the buffer
    pub fn render(&mut self, buffer: &mut [f32], channels: usize) {
        if channels == 2 {
            let _ = self.synth.write(&mut *buffer);
            for sample in buffer.iter_mut() {
                *sample *= self.gain;
            }
        } else {
            // Render stereo then mix down
            let frames = buffer.len() / channels.max(1);
            let mut stereo = vec![0.0f32; frames * 2];
            let _ = self.synth.write(stereo.as_mut_slice());
            for i in 0..frames {
                let mono = (stereo[i * 2] + stereo[i * 2 + 1]) * 0.5 * self.gain;
                for ch in 0..channels {
                    buffer[i * channels + ch] = mono;
                }
            }
        }
    }
}

/// Control-side strumming handle over the mix bus
pub struct GuitarSampler {
    bus: Arc<Mutex<MixBus>>,
    rng: StdRng,
}

impl GuitarSampler {
    pub fn new(bus: Arc<Mutex<MixBus>>) -> Self {
        Self {
            bus,
            rng: StdRng::from_entropy(),
        }
    }

    fn humanized_velocity(&mut self) -> u8 {
        let jitter = self.rng.gen_range(-HUMANIZE_RANGE..=HUMANIZE_RANGE);
        (BASE_VELOCITY as i16 + jitter).clamp(1, 127) as u8
    }

    /// Queue one stroke of the chord at a delay from now
    fn queue_stroke(&mut self, chord: &Chord, capo: u8, direction: StrumDirection, at: f64) {
        let mut notes = chord.sounding_notes(capo);
        if notes.is_empty() {
            return;
        }
        if direction == StrumDirection::Up {
            notes.reverse();
        }
        let velocity = self.humanized_velocity();
        if let Ok(mut bus) = self.bus.lock() {
            for (i, note) in notes.iter().enumerate() {
                bus.queue_note(at + i as f64 * STRUM_STAGGER_SECS, *note, velocity);
            }
        }
    }
}

impl Instrument for GuitarSampler {
    fn strum_chord(&mut self, chord: &Chord, capo: u8, seconds_per_beat: f64) {
        for (beat_offset, direction) in articulation(chord.pattern, chord.beats) {
            self.queue_stroke(chord, capo, direction, beat_offset * seconds_per_beat);
        }
    }

    fn trigger_notes(&mut self, notes: &[MidiNote], velocity: u8, stagger: f64) {
        if let Ok(mut bus) = self.bus.lock() {
            for (i, note) in notes.iter().enumerate() {
                bus.queue_note(i as f64 * stagger, *note, velocity);
            }
        }
    }

    fn trigger_note(&mut self, string: usize, fret: i8, capo: u8) {
        if string >= STRING_COUNT {
            return;
        }
        if let Some(note) = fretted_note(string, fret, capo) {
            let velocity = self.humanized_velocity();
            if let Ok(mut bus) = self.bus.lock() {
                bus.queue_note(0.0, note, velocity);
            }
        }
    }

    fn silence(&mut self) {
        if let Ok(mut bus) = self.bus.lock() {
            bus.silence();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use StrumDirection::{Down, Up};

    #[test]
    fn test_once_is_single_down_stroke() {
        assert_eq!(articulation(StrummingPattern::Once, 4), vec![(0.0, Down)]);
    }

    #[test]
    fn test_down_is_single_stroke_per_event() {
        // The compiler emits one trigger per beat for Down chords
        assert_eq!(articulation(StrummingPattern::Down, 4), vec![(0.0, Down)]);
    }

    #[test]
    fn test_down_up_alternates_within_each_beat() {
        let strokes = articulation(StrummingPattern::DownUp, 2);
        assert_eq!(
            strokes,
            vec![(0.0, Down), (0.5, Up), (1.0, Down), (1.5, Up)]
        );
    }

    #[test]
    fn test_down_down_up_spans_two_beats() {
        let strokes = articulation(StrummingPattern::DownDownUp, 4);
        assert_eq!(
            strokes,
            vec![
                (0.0, Down),
                (1.0, Down),
                (1.5, Up),
                (2.0, Down),
                (3.0, Down),
                (3.5, Up),
            ]
        );
    }

    #[test]
    fn test_folk_truncates_to_chord_length() {
        let strokes = articulation(StrummingPattern::Folk, 2);
        assert_eq!(strokes, vec![(0.0, Down), (1.0, Down), (1.5, Up)]);
    }

    #[test]
    fn test_strokes_never_exceed_chord_span() {
        for pattern in [
            StrummingPattern::DownUp,
            StrummingPattern::DownDownUp,
            StrummingPattern::Folk,
        ] {
            for beats in 1..=8u32 {
                for (offset, _) in articulation(pattern, beats) {
                    assert!(offset < beats as f64, "{pattern:?} at {beats} beats");
                }
            }
        }
    }

    #[test]
    fn test_sound_bank_programs() {
        assert_eq!(SoundBank::Nylon.program(), 24);
        assert_eq!(SoundBank::Piano.program(), 0);
        assert_eq!(SoundBank::default(), SoundBank::ElectricClean);
    }
}
