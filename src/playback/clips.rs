// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Clip synchronizer.
//!
//! Owns the desired clip set (beat-anchored, trimmed, per-clip mute) and
//! converges the live clip deck to match: newly added clips are loaded in
//! the background and placed, removed clips are torn down, and mute/solo
//! changes only flip a voice's silent flag so un-muting resumes in sync.
//!
//! Placement always goes through the same `TransportTiming` the event
//! compiler used, so chords and clips can never drift apart. Voices are
//! anchored to the transport's own frame counter; a clip added mid-run
//! therefore lands on the correct beat, not on the wall clock.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, warn};

use super::mixer::TrackMixer;
use super::{ClipId, TrackId};
use crate::audio::{ClipDeck, ClipLoader, VoicePlacement};
use crate::messaging::{UiEvent, UiSender};
use crate::timing::TransportTiming;

/// A clip as requested by the editing layer
#[derive(Debug, Clone)]
pub struct NewClip {
    pub track: TrackId,
    pub name: String,
    /// Clip source reference, resolved by the loader
    pub source: PathBuf,
    /// Where the clip starts on the timeline, in beats
    pub start_beat: f64,
    /// How long the clip plays, in beats
    pub beats: f64,
    /// Trim into the clip's own audio, in beats
    pub offset_beats: f64,
}

/// A placed clip owned by the synchronizer
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub id: ClipId,
    pub track: TrackId,
    pub name: String,
    pub source: PathBuf,
    pub start_beat: f64,
    pub beats: f64,
    pub offset_beats: f64,
    /// Explicit per-clip mute, independent of track flags
    pub muted: bool,
}

/// Load lifecycle of a clip's source audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipLoadState {
    Loading,
    Ready,
    Failed,
}

/// Converges the desired clip set onto the live deck
pub struct ClipSynchronizer {
    clips: HashMap<ClipId, AudioClip>,
    load_states: HashMap<ClipId, ClipLoadState>,
    loader: ClipLoader,
    /// Latest full audibility resolution from the mixer
    audibility: HashMap<TrackId, bool>,
    next_id: u64,
}

impl ClipSynchronizer {
    pub fn new() -> Self {
        Self {
            clips: HashMap::new(),
            load_states: HashMap::new(),
            loader: ClipLoader::new(),
            audibility: HashMap::new(),
            next_id: 1,
        }
    }

    /// Register a clip and start loading its source. The voice appears on
    /// the deck once the load completes (see `pump`).
    pub fn add_clip(&mut self, new: NewClip) -> ClipId {
        let id = ClipId(self.next_id);
        self.next_id += 1;
        self.loader.request(id, new.source.clone());
        self.load_states.insert(id, ClipLoadState::Loading);
        self.clips.insert(
            id,
            AudioClip {
                id,
                track: new.track,
                name: new.name,
                source: new.source,
                start_beat: new.start_beat,
                beats: new.beats,
                offset_beats: new.offset_beats,
                muted: false,
            },
        );
        debug!(%id, "clip registered");
        id
    }

    /// Remove a clip and its live voice
    pub fn remove_clip(&mut self, id: ClipId, deck: &mut dyn ClipDeck) -> Option<AudioClip> {
        let clip = self.clips.remove(&id)?;
        self.load_states.remove(&id);
        deck.remove_voice(id);
        Some(clip)
    }

    /// Remove every clip owned by a track (track deletion cascade)
    pub fn remove_for_track(&mut self, track: TrackId, deck: &mut dyn ClipDeck) -> Vec<ClipId> {
        let doomed: Vec<ClipId> = self
            .clips
            .values()
            .filter(|clip| clip.track == track)
            .map(|clip| clip.id)
            .collect();
        for id in &doomed {
            self.clips.remove(id);
            self.load_states.remove(id);
            deck.remove_voice(*id);
        }
        doomed
    }

    /// Set a clip's explicit mute flag; the voice is silenced in place,
    /// never recreated
    pub fn set_muted(&mut self, id: ClipId, muted: bool, deck: &mut dyn ClipDeck) -> bool {
        let audibility = &self.audibility;
        match self.clips.get_mut(&id) {
            Some(clip) => {
                clip.muted = muted;
                let track_audible = *audibility.get(&clip.track).unwrap_or(&true);
                deck.set_voice_silent(id, muted || !track_audible);
                true
            }
            None => false,
        }
    }

    /// Apply a fresh audibility resolution to every live voice
    pub fn apply_audibility(
        &mut self,
        audibility: HashMap<TrackId, bool>,
        deck: &mut dyn ClipDeck,
    ) {
        self.audibility = audibility;
        for clip in self.clips.values() {
            deck.set_voice_silent(clip.id, !self.is_audible(clip));
        }
    }

    /// Re-place every loaded voice against a new tempo
    pub fn retime(&mut self, timing: &TransportTiming, deck: &mut dyn ClipDeck) {
        for clip in self.clips.values() {
            if self.load_states.get(&clip.id) == Some(&ClipLoadState::Ready) {
                deck.set_voice_placement(clip.id, Self::placement(clip, timing));
            }
        }
    }

    /// Process finished loads: place ready clips on the deck, mark and
    /// report failures. Non-fatal to playback either way.
    pub fn pump(
        &mut self,
        deck: &mut dyn ClipDeck,
        timing: &TransportTiming,
        mixer: &TrackMixer,
        ui: &UiSender,
    ) {
        for loaded in self.loader.completed() {
            let Some(clip) = self.clips.get(&loaded.clip) else {
                // Removed while still loading; drop the result
                continue;
            };
            match loaded.result {
                Ok(audio) => {
                    let gain = mixer.track(clip.track).map(|t| t.gain).unwrap_or(1.0);
                    let silent = !self.is_audible(clip);
                    deck.add_voice(clip.id, audio, Self::placement(clip, timing), gain, silent);
                    self.load_states.insert(loaded.clip, ClipLoadState::Ready);
                    debug!(clip = %loaded.clip, "clip placed");
                }
                Err(error) => {
                    warn!(clip = %loaded.clip, %error, "clip load failed");
                    self.load_states.insert(loaded.clip, ClipLoadState::Failed);
                    ui.send(UiEvent::ClipLoadFailed {
                        clip: loaded.clip,
                        message: error.to_string(),
                    });
                }
            }
        }
    }

    /// Timeline placement for a clip at a tempo, through the one
    /// beat-to-seconds mapping shared with the event compiler
    fn placement(clip: &AudioClip, timing: &TransportTiming) -> VoicePlacement {
        VoicePlacement {
            start_secs: timing.beats_to_seconds(clip.start_beat),
            offset_secs: timing.beats_to_seconds(clip.offset_beats),
            duration_secs: timing.beats_to_seconds(clip.beats),
        }
    }

    fn is_audible(&self, clip: &AudioClip) -> bool {
        !clip.muted && *self.audibility.get(&clip.track).unwrap_or(&true)
    }

    /// Whether there are outstanding loads
    pub fn loading(&self) -> bool {
        self.load_states
            .values()
            .any(|state| *state == ClipLoadState::Loading)
    }

    pub fn load_state(&self, id: ClipId) -> Option<ClipLoadState> {
        self.load_states.get(&id).copied()
    }

    pub fn get(&self, id: ClipId) -> Option<&AudioClip> {
        self.clips.get(&id)
    }

    pub fn clips(&self) -> impl Iterator<Item = &AudioClip> {
        self.clips.values()
    }

    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }

    pub fn clips_for_track(&self, track: TrackId) -> Vec<ClipId> {
        self.clips
            .values()
            .filter(|clip| clip.track == track)
            .map(|clip| clip.id)
            .collect()
    }
}

impl Default for ClipSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ClipAudio;
    use crate::messaging::ui_channel;
    use std::path::Path;
    use std::time::{Duration, Instant};

    /// Deck stub recording every call
    #[derive(Default)]
    struct RecordingDeck {
        added: Vec<(ClipId, VoicePlacement, bool)>,
        removed: Vec<ClipId>,
        silenced: Vec<(ClipId, bool)>,
        placed: Vec<(ClipId, VoicePlacement)>,
    }

    impl ClipDeck for RecordingDeck {
        fn add_voice(
            &mut self,
            id: ClipId,
            _audio: ClipAudio,
            placement: VoicePlacement,
            _gain: f32,
            silent: bool,
        ) {
            self.added.push((id, placement, silent));
        }
        fn remove_voice(&mut self, id: ClipId) {
            self.removed.push(id);
        }
        fn set_voice_silent(&mut self, id: ClipId, silent: bool) {
            self.silenced.push((id, silent));
        }
        fn set_voice_gain(&mut self, _id: ClipId, _gain: f32) {}
        fn set_voice_placement(&mut self, id: ClipId, placement: VoicePlacement) {
            self.placed.push((id, placement));
        }
    }

    fn write_test_wav(path: &Path) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..441 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn new_clip(track: TrackId, source: PathBuf, start_beat: f64) -> NewClip {
        NewClip {
            track,
            name: String::from("clip"),
            source,
            start_beat,
            beats: 8.0,
            offset_beats: 0.0,
        }
    }

    fn pump_until<F: Fn(&RecordingDeck, &ClipSynchronizer) -> bool>(
        sync: &mut ClipSynchronizer,
        deck: &mut RecordingDeck,
        timing: &TransportTiming,
        mixer: &TrackMixer,
        ui: &UiSender,
        done: F,
    ) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(deck, sync) && Instant::now() < deadline {
            sync.pump(deck, timing, mixer, ui);
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_loaded_clip_lands_at_its_beat() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        write_test_wav(&path);

        let mut mixer = TrackMixer::new();
        let track = mixer.add_audio_track("Audio 1");
        let (ui, _queue) = ui_channel();
        let timing = TransportTiming::new(120.0);

        let mut sync = ClipSynchronizer::new();
        let mut deck = RecordingDeck::default();
        let id = sync.add_clip(new_clip(track, path, 4.0));

        pump_until(&mut sync, &mut deck, &timing, &mixer, &ui, |d, _| {
            !d.added.is_empty()
        });

        // startBeat 4 at 120 BPM = 2.0 seconds
        let (added_id, placement, silent) = deck.added[0];
        assert_eq!(added_id, id);
        assert!((placement.start_secs - 2.0).abs() < 1e-12);
        assert!(!silent);
        assert_eq!(sync.load_state(id), Some(ClipLoadState::Ready));
    }

    #[test]
    fn test_failed_load_is_reported_not_fatal() {
        let mixer = TrackMixer::new();
        let (ui, queue) = ui_channel();
        let timing = TransportTiming::default();

        let mut sync = ClipSynchronizer::new();
        let mut deck = RecordingDeck::default();
        let id = sync.add_clip(new_clip(
            TrackId(1),
            PathBuf::from("/nonexistent/clip.wav"),
            0.0,
        ));

        pump_until(&mut sync, &mut deck, &timing, &mixer, &ui, |_, s| {
            s.load_state(id) == Some(ClipLoadState::Failed)
        });

        assert!(deck.added.is_empty());
        assert!(queue
            .drain()
            .iter()
            .any(|e| matches!(e, UiEvent::ClipLoadFailed { clip, .. } if *clip == id)));
        // The clip stays registered so the UI can show the failure
        assert_eq!(sync.clip_count(), 1);
    }

    #[test]
    fn test_mute_silences_in_place() {
        let mut sync = ClipSynchronizer::new();
        let mut deck = RecordingDeck::default();
        let id = sync.add_clip(new_clip(TrackId(1), PathBuf::from("x.wav"), 0.0));

        assert!(sync.set_muted(id, true, &mut deck));
        assert_eq!(deck.silenced, vec![(id, true)]);
        assert!(deck.removed.is_empty());

        assert!(sync.set_muted(id, false, &mut deck));
        assert_eq!(deck.silenced[1], (id, false));
    }

    #[test]
    fn test_track_audibility_overrides_unmuted_clip() {
        let mut sync = ClipSynchronizer::new();
        let mut deck = RecordingDeck::default();
        let track = TrackId(1);
        let id = sync.add_clip(new_clip(track, PathBuf::from("x.wav"), 0.0));

        let mut audibility = HashMap::new();
        audibility.insert(track, false);
        sync.apply_audibility(audibility, &mut deck);
        assert_eq!(deck.silenced, vec![(id, true)]);

        let mut audibility = HashMap::new();
        audibility.insert(track, true);
        sync.apply_audibility(audibility, &mut deck);
        assert_eq!(deck.silenced[1], (id, false));
    }

    #[test]
    fn test_remove_for_track_cascades() {
        let mut sync = ClipSynchronizer::new();
        let mut deck = RecordingDeck::default();
        let doomed_track = TrackId(1);
        let kept_track = TrackId(2);
        let a = sync.add_clip(new_clip(doomed_track, PathBuf::from("a.wav"), 0.0));
        let b = sync.add_clip(new_clip(doomed_track, PathBuf::from("b.wav"), 4.0));
        let c = sync.add_clip(new_clip(kept_track, PathBuf::from("c.wav"), 8.0));

        let removed = sync.remove_for_track(doomed_track, &mut deck);
        assert_eq!(removed.len(), 2);
        assert!(removed.contains(&a) && removed.contains(&b));
        assert_eq!(sync.clip_count(), 1);
        assert!(sync.get(c).is_some());
        assert!(sync.clips_for_track(doomed_track).is_empty());
        assert!(deck.removed.contains(&a) && deck.removed.contains(&b));
    }

    #[test]
    fn test_retime_re_places_ready_clips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        write_test_wav(&path);

        let mut mixer = TrackMixer::new();
        let track = mixer.add_audio_track("Audio 1");
        let (ui, _queue) = ui_channel();
        let timing = TransportTiming::new(120.0);

        let mut sync = ClipSynchronizer::new();
        let mut deck = RecordingDeck::default();
        let id = sync.add_clip(new_clip(track, path, 4.0));
        pump_until(&mut sync, &mut deck, &timing, &mixer, &ui, |d, _| {
            !d.added.is_empty()
        });

        // Same chart at 60 BPM: beat 4 is now at 4.0 seconds
        sync.retime(&TransportTiming::new(60.0), &mut deck);
        let (placed_id, placement) = deck.placed[0];
        assert_eq!(placed_id, id);
        assert!((placement.start_secs - 4.0).abs() < 1e-12);
    }
}
