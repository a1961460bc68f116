// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Audio engine for chordloop.
//!
//! This module provides:
//! - FluidLite-backed guitar sampler for strummed chords
//! - A frame-stamped mix bus combining synth output with timeline clips
//! - Audio output via cpal
//! - Background WAV loading for imported clips
//!
//! The playback core talks to this module only through the `Instrument`
//! and `ClipDeck` seams, so tests can substitute recording stubs.

pub mod loader;
pub mod output;
pub mod sampler;

pub use loader::{ClipAudio, ClipLoader, LoadedClip};
pub use output::{AudioConfig, AudioOutput};
pub use sampler::{GuitarSampler, SoundBank, StrumDirection};

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::music::{Chord, MidiNote};
use crate::playback::ClipId;
use sampler::FluidSampler;

/// How long a queued note rings before its note-off
const NOTE_RELEASE_SECS: f64 = 2.0;

/// Audio error types
#[derive(Debug, Clone, Error)]
pub enum AudioError {
    #[error("audio initialization failed: {0}")]
    InitFailed(String),
    #[error("soundfont load failed: {0}")]
    SoundfontLoadFailed(String),
    #[error("audio stream failed: {0}")]
    StreamFailed(String),
    #[error("no audio output device available")]
    NoDevice,
    #[error("clip load failed: {0}")]
    ClipLoadFailed(String),
}

/// Note-trigger capability the transport strums through.
///
/// The engine decides which strings sound and when; the implementation
/// produces the sound.
pub trait Instrument: Send {
    /// Sound a chord, spreading its strumming pattern across the chord's
    /// beats at the given seconds-per-beat factor
    fn strum_chord(&mut self, chord: &Chord, capo: u8, seconds_per_beat: f64);
    /// Sound a set of notes together, staggered by `stagger` seconds each
    fn trigger_notes(&mut self, notes: &[MidiNote], velocity: u8, stagger: f64);
    /// Sound a single fretted string
    fn trigger_note(&mut self, string: usize, fret: i8, capo: u8);
    /// Cut every queued and ringing note
    fn silence(&mut self);
}

/// Timeline placement for a clip voice, all in seconds of transport time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoicePlacement {
    /// When the clip starts on the transport timeline
    pub start_secs: f64,
    /// Trim into the clip's source audio
    pub offset_secs: f64,
    /// How much of the clip plays
    pub duration_secs: f64,
}

/// Clip playback capability the synchronizer converges against.
///
/// Voices keep their timeline identity while silent, so un-muting resumes
/// in sync instead of restarting the clip.
pub trait ClipDeck {
    fn add_voice(
        &mut self,
        id: ClipId,
        audio: ClipAudio,
        placement: VoicePlacement,
        gain: f32,
        silent: bool,
    );
    fn remove_voice(&mut self, id: ClipId);
    fn set_voice_silent(&mut self, id: ClipId, silent: bool);
    fn set_voice_gain(&mut self, id: ClipId, gain: f32);
    /// Move a voice to a new timeline placement (tempo changes re-place
    /// every clip against the new seconds-per-beat factor)
    fn set_voice_placement(&mut self, id: ClipId, placement: VoicePlacement);
}

/// A queued synth note, stamped with the output frame it fires on
#[derive(Debug, Clone, Copy)]
struct QueuedNote {
    frame: u64,
    seq: u64,
    note: MidiNote,
    /// Zero velocity is a note-off
    velocity: u8,
}

impl PartialEq for QueuedNote {
    fn eq(&self, other: &Self) -> bool {
        self.frame == other.frame && self.seq == other.seq
    }
}

impl Eq for QueuedNote {}

impl Ord for QueuedNote {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap behavior
        other
            .frame
            .cmp(&self.frame)
            .then(other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedNote {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A placed clip rendered against the transport frame counter
struct ClipVoice {
    id: ClipId,
    audio: ClipAudio,
    start_frame: u64,
    end_frame: u64,
    /// Trim into the source, in source frames
    src_offset: f64,
    /// Source frames per output frame (rate conversion)
    step: f64,
    gain: f32,
    silent: bool,
}

impl ClipVoice {
    /// Sample the voice at an absolute transport frame (already
    /// loop-wrapped); returns (left, right)
    fn sample_at(&self, frame: u64) -> Option<(f32, f32)> {
        if self.silent || frame < self.start_frame || frame >= self.end_frame {
            return None;
        }
        let src_pos = self.src_offset + (frame - self.start_frame) as f64 * self.step;
        let channels = self.audio.channels as usize;
        let frames = self.audio.frames();
        let index = src_pos as usize;
        if index + 1 >= frames {
            return None;
        }
        let frac = (src_pos - index as f64) as f32;
        let lerp = |ch: usize| {
            let a = self.audio.samples[index * channels + ch];
            let b = self.audio.samples[(index + 1) * channels + ch];
            (a + (b - a) * frac) * self.gain
        };
        if channels >= 2 {
            Some((lerp(0), lerp(1)))
        } else {
            let mono = lerp(0);
            Some((mono, mono))
        }
    }
}

/// Shared state between the control side and the audio render callback.
///
/// Everything time-critical is frame-stamped: strums arrive as queued
/// notes, clips as voices anchored to the transport frame counter that
/// resets when a run starts.
pub struct MixBus {
    synth: FluidSampler,
    notes: BinaryHeap<QueuedNote>,
    voices: Vec<ClipVoice>,
    /// Output frames since the bus was created or the transport started
    frame: u64,
    /// Whether a transport run is in progress (gates clip voices)
    rolling: bool,
    /// Loop length in frames; voices wrap against it
    loop_frames: Option<u64>,
    sample_rate: u32,
    master_gain: f32,
    seq: u64,
}

impl MixBus {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            synth: FluidSampler::with_sample_rate(sample_rate as f64),
            notes: BinaryHeap::new(),
            voices: Vec::new(),
            frame: 0,
            rolling: false,
            loop_frames: None,
            sample_rate,
            master_gain: 1.0,
            seq: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Queue a note-on `delay` seconds from now, with its note-off after
    /// the release interval
    pub fn queue_note(&mut self, delay: f64, note: MidiNote, velocity: u8) {
        let on_frame = self.frame + self.secs_to_frames(delay.max(0.0));
        let off_frame = on_frame + self.secs_to_frames(NOTE_RELEASE_SECS);
        self.push_note(on_frame, note, velocity.max(1));
        self.push_note(off_frame, note, 0);
    }

    /// Drop queued notes and cut everything ringing
    pub fn silence(&mut self) {
        self.notes.clear();
        self.synth.all_notes_off();
    }

    pub fn load_soundfont(&mut self, path: &Path) -> Result<(), AudioError> {
        self.synth.load_soundfont(path)
    }

    pub fn has_soundfont(&self) -> bool {
        self.synth.has_soundfont()
    }

    pub fn set_sound_bank(&mut self, bank: SoundBank) {
        self.synth.set_program(bank.program());
    }

    pub fn set_instrument_gain(&mut self, gain: f32) {
        self.synth.set_gain(gain);
    }

    pub fn set_master_gain(&mut self, gain: f32) {
        self.master_gain = gain.clamp(0.0, 1.0);
    }

    /// A run is starting: rewind the frame counter so clip voices anchor
    /// to transport zero
    pub fn transport_started(&mut self, loop_secs: Option<f64>) {
        self.frame = 0;
        self.notes.clear();
        self.loop_frames = loop_secs
            .filter(|&secs| secs > 0.0)
            .map(|secs| self.secs_to_frames(secs).max(1));
        self.rolling = true;
    }

    pub fn transport_stopped(&mut self) {
        self.rolling = false;
        self.silence();
    }

    /// Align the frame counter with a transport position (seek or tempo
    /// change while running)
    pub fn set_transport_position(&mut self, secs: f64) {
        self.frame = self.secs_to_frames(secs.max(0.0));
    }

    /// Update the loop boundary without restarting the run
    pub fn set_loop_length(&mut self, loop_secs: Option<f64>) {
        self.loop_frames = loop_secs
            .filter(|&secs| secs > 0.0)
            .map(|secs| self.secs_to_frames(secs).max(1));
    }

    pub fn is_rolling(&self) -> bool {
        self.rolling
    }

    fn secs_to_frames(&self, secs: f64) -> u64 {
        (secs * self.sample_rate as f64).round() as u64
    }

    fn push_note(&mut self, frame: u64, note: MidiNote, velocity: u8) {
        let queued = QueuedNote {
            frame,
            seq: self.seq,
            note,
            velocity,
        };
        self.seq += 1;
        self.notes.push(queued);
    }

    fn voice_index(&self, id: ClipId) -> Option<usize> {
        self.voices.iter().position(|v| v.id == id)
    }

    /// Render interleaved output, triggering queued notes sample-accurately
    /// by rendering in chunks up to each note boundary
    pub fn render(&mut self, buffer: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let total = buffer.len() / channels;
        let mut cursor = 0usize;

        while cursor < total {
            while self
                .notes
                .peek()
                .is_some_and(|queued| queued.frame <= self.frame)
            {
                if let Some(queued) = self.notes.pop() {
                    if queued.velocity == 0 {
                        self.synth.note_off(queued.note);
                    } else {
                        self.synth.note_on(queued.note, queued.velocity);
                    }
                }
            }

            let until = self
                .notes
                .peek()
                .map(|queued| (queued.frame - self.frame) as usize)
                .unwrap_or(total - cursor)
                .clamp(1, total - cursor);

            let chunk = &mut buffer[cursor * channels..(cursor + until) * channels];
            self.synth.render(chunk, channels);

            if self.rolling && !self.voices.is_empty() {
                for i in 0..until {
                    let frame = self.frame + i as u64;
                    let frame = match self.loop_frames {
                        Some(lf) => frame % lf,
                        None => frame,
                    };
                    let mut left = 0.0f32;
                    let mut right = 0.0f32;
                    for voice in &self.voices {
                        if let Some((l, r)) = voice.sample_at(frame) {
                            left += l;
                            right += r;
                        }
                    }
                    chunk[i * channels] += left;
                    if channels >= 2 {
                        chunk[i * channels + 1] += right;
                    }
                }
            }

            self.frame += until as u64;
            cursor += until;
        }

        if self.master_gain != 1.0 {
            for sample in buffer.iter_mut() {
                *sample *= self.master_gain;
            }
        }
    }
}

impl ClipDeck for MixBus {
    fn add_voice(
        &mut self,
        id: ClipId,
        audio: ClipAudio,
        placement: VoicePlacement,
        gain: f32,
        silent: bool,
    ) {
        // Replacing an existing voice keeps exactly one per clip
        self.remove_voice(id);
        let start_frame = self.secs_to_frames(placement.start_secs.max(0.0));
        let end_frame = start_frame + self.secs_to_frames(placement.duration_secs.max(0.0));
        let step = audio.sample_rate as f64 / self.sample_rate as f64;
        let src_offset = placement.offset_secs.max(0.0) * audio.sample_rate as f64;
        self.voices.push(ClipVoice {
            id,
            audio,
            start_frame,
            end_frame,
            src_offset,
            step,
            gain,
            silent,
        });
    }

    fn remove_voice(&mut self, id: ClipId) {
        if let Some(index) = self.voice_index(id) {
            self.voices.swap_remove(index);
        }
    }

    fn set_voice_silent(&mut self, id: ClipId, silent: bool) {
        if let Some(index) = self.voice_index(id) {
            self.voices[index].silent = silent;
        }
    }

    fn set_voice_gain(&mut self, id: ClipId, gain: f32) {
        if let Some(index) = self.voice_index(id) {
            self.voices[index].gain = gain;
        }
    }

    fn set_voice_placement(&mut self, id: ClipId, placement: VoicePlacement) {
        let start_frame = self.secs_to_frames(placement.start_secs.max(0.0));
        let end_frame = start_frame + self.secs_to_frames(placement.duration_secs.max(0.0));
        if let Some(index) = self.voice_index(id) {
            let voice = &mut self.voices[index];
            voice.src_offset = placement.offset_secs.max(0.0) * voice.audio.sample_rate as f64;
            voice.start_frame = start_frame;
            voice.end_frame = end_frame;
        }
    }
}

/// Audio engine: owns the mix bus and the output stream.
///
/// Created explicitly by the embedding application and passed to the
/// playback engine; there is no ambient global audio state.
pub struct AudioEngine {
    bus: Arc<Mutex<MixBus>>,
    output: Option<AudioOutput>,
    config: AudioConfig,
}

impl AudioEngine {
    pub fn new() -> Self {
        Self::with_config(AudioConfig::default())
    }

    pub fn with_config(config: AudioConfig) -> Self {
        Self {
            bus: Arc::new(Mutex::new(MixBus::new(config.sample_rate))),
            output: None,
            config,
        }
    }

    /// Shared handle to the mix bus (the `ClipDeck`)
    pub fn bus(&self) -> Arc<Mutex<MixBus>> {
        Arc::clone(&self.bus)
    }

    /// Control-side sampler handle implementing `Instrument`
    pub fn sampler(&self) -> GuitarSampler {
        GuitarSampler::new(self.bus())
    }

    /// Start the output stream. Idempotent; fails if no output device is
    /// available or the stream cannot be built (the caller may retry once
    /// the runtime is unlocked).
    pub fn start(&mut self) -> Result<(), AudioError> {
        if self.output.is_some() {
            return Ok(());
        }
        let bus = self.bus();
        let output = AudioOutput::new(self.config.clone(), move |buffer, channels| {
            if let Ok(mut bus) = bus.lock() {
                bus.render(buffer, channels);
            }
        })?;
        self.output = Some(output);
        tracing::info!(sample_rate = self.config.sample_rate, "audio output started");
        Ok(())
    }

    /// Tear down the output stream
    pub fn stop(&mut self) {
        self.output = None;
    }

    pub fn is_running(&self) -> bool {
        self.output.is_some()
    }

    pub fn load_soundfont(&self, path: &Path) -> Result<(), AudioError> {
        match self.bus.lock() {
            Ok(mut bus) => bus.load_soundfont(path),
            Err(_) => Err(AudioError::InitFailed(String::from("mix bus poisoned"))),
        }
    }

    pub fn set_sound_bank(&self, bank: SoundBank) {
        if let Ok(mut bus) = self.bus.lock() {
            bus.set_sound_bank(bank);
        }
    }

    pub fn set_master_volume(&self, gain: f32) {
        if let Ok(mut bus) = self.bus.lock() {
            bus.set_master_gain(gain);
        }
    }

    pub fn set_instrument_volume(&self, gain: f32) {
        if let Ok(mut bus) = self.bus.lock() {
            bus.set_instrument_gain(gain);
        }
    }

    pub fn transport_started(&self, loop_secs: Option<f64>) {
        if let Ok(mut bus) = self.bus.lock() {
            bus.transport_started(loop_secs);
        }
    }

    pub fn transport_stopped(&self) {
        if let Ok(mut bus) = self.bus.lock() {
            bus.transport_stopped();
        }
    }

    pub fn transport_repositioned(&self, position_secs: f64, loop_secs: Option<f64>) {
        if let Ok(mut bus) = self.bus.lock() {
            bus.set_transport_position(position_secs);
            bus.set_loop_length(loop_secs);
        }
    }
}

impl Default for AudioEngine {
    fn default() -> Self {
        Self::new()
    }
}
