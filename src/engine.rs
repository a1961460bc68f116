// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Engine façade.
//!
//! Ties the audio engine, transport, track mixer, and clip synchronizer
//! together behind the surface the view layer drives. Cross-cutting
//! operations live here: deleting a track removes its clips in the same
//! call, any mute/solo change re-resolves audibility for everything, and
//! tempo changes re-place every clip with the same seconds-per-beat factor
//! the schedule compiled with.

use std::path::Path;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{info, warn};

use crate::audio::{AudioEngine, AudioError, Instrument, SoundBank};
use crate::messaging::{ui_channel, UiEvent, UiEventQueue, UiSender};
use crate::music::{Chord, Progression, MAX_CAPO};
use crate::playback::{
    AudioClip, ClipId, ClipSynchronizer, MixerError, NewClip, PlaybackState, Track, TrackId,
    TrackKind, TrackMixer, TransportController, TransportError, CHORDS_TRACK,
};
use crate::timing::{tempo_in_range, TransportTiming};

/// Errors surfaced by the engine façade
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Mixer(#[from] MixerError),
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error("{0} does not exist")]
    UnknownClip(ClipId),
    #[error("{0} cannot hold audio clips")]
    NotAnAudioTrack(TrackId),
}

impl EngineError {
    /// Whether retrying can succeed (audio runtime not yet unlocked)
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Transport(e) if e.is_retryable())
    }
}

/// The playback engine the view layer drives.
pub struct Engine {
    audio: AudioEngine,
    transport: TransportController,
    mixer: TrackMixer,
    clips: ClipSynchronizer,
    instrument: Arc<Mutex<dyn Instrument>>,
    queue: UiEventQueue,
    ui: UiSender,
    capo: u8,
    audio_track_counter: usize,
}

impl Engine {
    pub fn new() -> Self {
        let audio = AudioEngine::new();
        let instrument: Arc<Mutex<dyn Instrument>> = Arc::new(Mutex::new(audio.sampler()));
        let (ui, queue) = ui_channel();
        let transport = TransportController::new(Arc::clone(&instrument), ui.clone());
        Self {
            audio,
            transport,
            mixer: TrackMixer::new(),
            clips: ClipSynchronizer::new(),
            instrument,
            queue,
            ui,
            capo: 0,
            audio_track_counter: 0,
        }
    }

    // ----- transport ------------------------------------------------------

    /// Compile the progression and play it. Fails without scheduling
    /// anything on a bad chart, an unsupported tempo, or an audio runtime
    /// that is not available yet (retryable).
    pub fn play(&mut self, progression: &Progression, bpm: f64) -> Result<(), EngineError> {
        if !tempo_in_range(bpm) {
            return Err(TransportError::TempoOutOfRange(bpm).into());
        }
        if progression.is_empty() {
            return Err(TransportError::EmptyProgression.into());
        }
        progression.validate().map_err(TransportError::from)?;

        self.audio
            .start()
            .map_err(|e| TransportError::AudioUnavailable(e.to_string()))?;

        // The bus frame counter must be at transport zero before the first
        // strum can arrive from the clock thread
        let timing = TransportTiming::new(bpm);
        let loop_secs = self
            .transport
            .is_looping()
            .then(|| timing.beats_to_seconds(progression.total_beats() as f64));
        self.audio.transport_started(loop_secs);

        if let Err(error) = self.transport.play(progression, bpm) {
            self.audio.transport_stopped();
            return Err(error.into());
        }
        self.retime_clips();
        Ok(())
    }

    /// Cancel the schedule, rewind, and clear the UI's active chord
    pub fn stop(&mut self) {
        self.transport.stop();
        self.audio.transport_stopped();
    }

    /// Change tempo; while running this recompiles the schedule and
    /// re-places every clip, keeping the playhead at the same beat
    pub fn set_tempo(&mut self, bpm: f64) -> Result<(), EngineError> {
        let was_running = self.transport.state() == PlaybackState::Running;
        self.transport.set_tempo(bpm)?;
        self.retime_clips();
        if was_running {
            let timing = self.transport.timing();
            let loop_secs = self
                .transport
                .is_looping()
                .then(|| self.transport.run_total_seconds());
            self.audio.transport_repositioned(
                timing.beats_to_seconds(self.transport.playhead_beats()),
                loop_secs,
            );
        }
        Ok(())
    }

    /// Jump the playhead to a beat position
    pub fn seek(&mut self, beats: f64) {
        self.transport.seek(beats);
        let timing = self.transport.timing();
        let loop_secs = self
            .transport
            .is_looping()
            .then(|| self.transport.run_total_seconds());
        self.audio
            .transport_repositioned(timing.beats_to_seconds(beats.max(0.0)), loop_secs);
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.transport.set_looping(looping);
        if self.transport.state() == PlaybackState::Running {
            let loop_secs = looping.then(|| self.transport.run_total_seconds());
            self.audio.transport_repositioned(
                self.transport
                    .timing()
                    .beats_to_seconds(self.transport.playhead_beats()),
                loop_secs,
            );
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.transport.state()
    }

    /// Continuous playhead position in beats, polled at UI refresh rate
    pub fn playhead_beats(&self) -> f64 {
        self.transport.playhead_beats()
    }

    /// Drain pending UI events, first folding in any finished clip loads
    pub fn poll_events(&mut self) -> Vec<UiEvent> {
        let timing = self.transport.timing();
        let bus = self.audio.bus();
        if let Ok(mut bus) = bus.lock() {
            self.clips.pump(&mut *bus, &timing, &self.mixer, &self.ui);
        }
        self.queue.drain()
    }

    // ----- tracks ---------------------------------------------------------

    /// Add an audio track with a generated name
    pub fn add_track(&mut self) -> TrackId {
        self.audio_track_counter += 1;
        self.add_track_named(format!("Audio Track {}", self.audio_track_counter))
    }

    /// Add an audio track with an explicit name
    pub fn add_track_named(&mut self, name: impl Into<String>) -> TrackId {
        let id = self.mixer.add_audio_track(name);
        info!(%id, "track added");
        id
    }

    /// Remove a track and, atomically with it, every clip it owns.
    /// The chords track cannot be removed.
    pub fn remove_track(&mut self, id: TrackId) -> Result<(), EngineError> {
        self.mixer.remove_track(id)?;
        let bus = self.audio.bus();
        if let Ok(mut bus) = bus.lock() {
            let removed = self.clips.remove_for_track(id, &mut *bus);
            info!(%id, clips = removed.len(), "track removed");
        }
        self.refresh_audibility();
        Ok(())
    }

    pub fn set_track_muted(&mut self, id: TrackId, muted: bool) -> Result<(), EngineError> {
        self.mixer.set_muted(id, muted)?;
        self.refresh_audibility();
        Ok(())
    }

    pub fn set_track_soloed(&mut self, id: TrackId, soloed: bool) -> Result<(), EngineError> {
        self.mixer.set_soloed(id, soloed)?;
        self.refresh_audibility();
        Ok(())
    }

    pub fn set_track_gain(&mut self, id: TrackId, gain: f32) -> Result<(), EngineError> {
        self.mixer.set_gain(id, gain)?;
        let gain = self.mixer.track(id).map(|t| t.gain).unwrap_or(1.0);
        let bus = self.audio.bus();
        if let Ok(mut bus) = bus.lock() {
            use crate::audio::ClipDeck;
            for clip in self.clips.clips_for_track(id) {
                bus.set_voice_gain(clip, gain);
            }
        }
        Ok(())
    }

    pub fn tracks(&self) -> &[Track] {
        self.mixer.tracks()
    }

    // ----- clips ----------------------------------------------------------

    /// Register a clip on an audio track and start loading its source.
    /// The clip becomes audible once loading completes; a failed load is
    /// reported through the event queue and never interrupts playback.
    pub fn add_clip(&mut self, clip: NewClip) -> Result<ClipId, EngineError> {
        let track = self
            .mixer
            .track(clip.track)
            .ok_or(MixerError::UnknownTrack(clip.track))?;
        if track.kind != TrackKind::Audio {
            return Err(EngineError::NotAnAudioTrack(clip.track));
        }
        Ok(self.clips.add_clip(clip))
    }

    pub fn remove_clip(&mut self, id: ClipId) -> Result<(), EngineError> {
        let bus = self.audio.bus();
        let mut bus = bus
            .lock()
            .map_err(|_| AudioError::InitFailed(String::from("mix bus poisoned")))?;
        self.clips
            .remove_clip(id, &mut *bus)
            .map(|_| ())
            .ok_or(EngineError::UnknownClip(id))
    }

    pub fn set_clip_muted(&mut self, id: ClipId, muted: bool) -> Result<(), EngineError> {
        let bus = self.audio.bus();
        let mut bus = bus
            .lock()
            .map_err(|_| AudioError::InitFailed(String::from("mix bus poisoned")))?;
        if self.clips.set_muted(id, muted, &mut *bus) {
            Ok(())
        } else {
            Err(EngineError::UnknownClip(id))
        }
    }

    pub fn clip(&self, id: ClipId) -> Option<&AudioClip> {
        self.clips.get(id)
    }

    pub fn clips(&self) -> impl Iterator<Item = &AudioClip> {
        self.clips.clips()
    }

    pub fn clip_count(&self) -> usize {
        self.clips.clip_count()
    }

    // ----- instrument -----------------------------------------------------

    /// Strum a chord immediately, outside any transport run
    pub fn preview_chord(&mut self, chord: &Chord) {
        if let Err(error) = self.audio.start() {
            warn!(%error, "audio unavailable for preview");
            return;
        }
        let spb = self.transport.timing().seconds_per_beat();
        if let Ok(mut instrument) = self.instrument.lock() {
            instrument.strum_chord(chord, self.capo, spb);
        }
    }

    /// Sound a single fretted string (fretboard UIs)
    pub fn trigger_note(&mut self, string: usize, fret: i8) {
        if let Err(error) = self.audio.start() {
            warn!(%error, "audio unavailable for note trigger");
            return;
        }
        if let Ok(mut instrument) = self.instrument.lock() {
            instrument.trigger_note(string, fret, self.capo);
        }
    }

    pub fn set_capo(&mut self, capo: u8) {
        self.capo = capo.min(MAX_CAPO);
        self.transport.set_capo(self.capo);
    }

    pub fn capo(&self) -> u8 {
        self.capo
    }

    pub fn set_sound_bank(&self, bank: SoundBank) {
        self.audio.set_sound_bank(bank);
    }

    pub fn load_soundfont(&self, path: &Path) -> Result<(), EngineError> {
        self.audio.load_soundfont(path)?;
        Ok(())
    }

    pub fn set_master_volume(&self, gain: f32) {
        self.audio.set_master_volume(gain);
    }

    pub fn set_instrument_volume(&self, gain: f32) {
        self.audio.set_instrument_volume(gain);
    }

    // ----- internals ------------------------------------------------------

    /// Recompute the global mute/solo join and push it everywhere: the
    /// chords track gates strums, every clip voice gets its silent flag.
    fn refresh_audibility(&mut self) {
        let audibility = self.mixer.resolve_audibility();
        let chords_audible = *audibility.get(&CHORDS_TRACK).unwrap_or(&true);
        self.transport.set_chords_audible(chords_audible);
        let bus = self.audio.bus();
        if let Ok(mut bus) = bus.lock() {
            self.clips.apply_audibility(audibility, &mut *bus);
        };
    }

    fn retime_clips(&mut self) {
        let timing = self.transport.timing();
        let bus = self.audio.bus();
        if let Ok(mut bus) = bus.lock() {
            self.clips.retime(&timing, &mut *bus);
        };
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
