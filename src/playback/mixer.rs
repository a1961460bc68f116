// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Track mixer with mute/solo resolution.
//!
//! The mixer owns the track list: one permanent chords track plus any
//! number of audio-clip tracks. Audibility is a global join over every
//! track's flags, so it is recomputed in full whenever any flag changes
//! rather than patched incrementally.

use std::collections::HashMap;

use thiserror::Error;

use super::TrackId;

/// The fixed track carrying the strummed chord chart
pub const CHORDS_TRACK: TrackId = TrackId(0);

/// What a track carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    /// The strummed chord chart; exactly one, cannot be removed
    Chords,
    /// Imported audio clips
    Audio,
}

/// A mute/solo-addressable channel
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub kind: TrackKind,
    pub name: String,
    pub muted: bool,
    pub soloed: bool,
    /// Linear gain applied to the track's clips (1.0 = unity)
    pub gain: f32,
}

/// Track registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MixerError {
    #[error("{0} does not exist")]
    UnknownTrack(TrackId),
    #[error("the chords track cannot be removed")]
    ChordsTrackPermanent,
}

/// Registry of tracks and their mute/solo/gain state
pub struct TrackMixer {
    tracks: Vec<Track>,
    next_id: u64,
}

impl TrackMixer {
    /// Create a mixer with the permanent chords track installed
    pub fn new() -> Self {
        Self {
            tracks: vec![Track {
                id: CHORDS_TRACK,
                kind: TrackKind::Chords,
                name: String::from("Chords"),
                muted: false,
                soloed: false,
                gain: 1.0,
            }],
            next_id: 1,
        }
    }

    /// Add an audio track, returning its id
    pub fn add_audio_track(&mut self, name: impl Into<String>) -> TrackId {
        let id = TrackId(self.next_id);
        self.next_id += 1;
        self.tracks.push(Track {
            id,
            kind: TrackKind::Audio,
            name: name.into(),
            muted: false,
            soloed: false,
            gain: 1.0,
        });
        id
    }

    /// Remove a track. The chords track is permanent; removing it is an
    /// error. The caller is responsible for removing the track's clips in
    /// the same operation.
    pub fn remove_track(&mut self, id: TrackId) -> Result<Track, MixerError> {
        if id == CHORDS_TRACK {
            return Err(MixerError::ChordsTrackPermanent);
        }
        let index = self
            .tracks
            .iter()
            .position(|t| t.id == id)
            .ok_or(MixerError::UnknownTrack(id))?;
        Ok(self.tracks.remove(index))
    }

    /// Look up a track
    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// All tracks, chords track first
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Number of tracks, the chords track included
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Set a track's mute flag
    pub fn set_muted(&mut self, id: TrackId, muted: bool) -> Result<(), MixerError> {
        self.track_mut(id)?.muted = muted;
        Ok(())
    }

    /// Set a track's solo flag
    pub fn set_soloed(&mut self, id: TrackId, soloed: bool) -> Result<(), MixerError> {
        self.track_mut(id)?.soloed = soloed;
        Ok(())
    }

    /// Set a track's gain
    pub fn set_gain(&mut self, id: TrackId, gain: f32) -> Result<(), MixerError> {
        self.track_mut(id)?.gain = gain.clamp(0.0, 2.0);
        Ok(())
    }

    /// Whether any track is soloed
    pub fn any_solo(&self) -> bool {
        self.tracks.iter().any(|t| t.soloed)
    }

    /// Resolve the effective audibility of every track.
    ///
    /// If any track is soloed, every non-soloed track is inaudible
    /// regardless of its own mute flag. Mute beats solo on the same track.
    /// With no solo anywhere, audibility is simply `!muted`.
    pub fn resolve_audibility(&self) -> HashMap<TrackId, bool> {
        let any_solo = self.any_solo();
        self.tracks
            .iter()
            .map(|t| (t.id, !t.muted && (!any_solo || t.soloed)))
            .collect()
    }

    fn track_mut(&mut self, id: TrackId) -> Result<&mut Track, MixerError> {
        self.tracks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(MixerError::UnknownTrack(id))
    }
}

impl Default for TrackMixer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chords_track_preinstalled() {
        let mixer = TrackMixer::new();
        assert_eq!(mixer.track_count(), 1);
        assert_eq!(mixer.track(CHORDS_TRACK).unwrap().kind, TrackKind::Chords);
    }

    #[test]
    fn test_chords_track_cannot_be_removed() {
        let mut mixer = TrackMixer::new();
        assert_eq!(
            mixer.remove_track(CHORDS_TRACK),
            Err(MixerError::ChordsTrackPermanent)
        );
    }

    #[test]
    fn test_add_and_remove_audio_track() {
        let mut mixer = TrackMixer::new();
        let id = mixer.add_audio_track("Audio 1");
        assert_eq!(mixer.track_count(), 2);

        let removed = mixer.remove_track(id).unwrap();
        assert_eq!(removed.name, "Audio 1");
        assert_eq!(mixer.track_count(), 1);
        assert_eq!(mixer.remove_track(id), Err(MixerError::UnknownTrack(id)));
    }

    #[test]
    fn test_no_solo_audibility_is_not_muted() {
        let mut mixer = TrackMixer::new();
        let a = mixer.add_audio_track("A");
        mixer.set_muted(a, true).unwrap();

        let audibility = mixer.resolve_audibility();
        assert_eq!(audibility[&CHORDS_TRACK], true);
        assert_eq!(audibility[&a], false);
    }

    #[test]
    fn test_solo_silences_everything_else() {
        let mut mixer = TrackMixer::new();
        let a = mixer.add_audio_track("A");
        let b = mixer.add_audio_track("B");
        mixer.set_soloed(a, true).unwrap();

        let audibility = mixer.resolve_audibility();
        assert_eq!(audibility[&a], true);
        assert_eq!(audibility[&b], false);
        assert_eq!(audibility[&CHORDS_TRACK], false);
    }

    #[test]
    fn test_mute_beats_solo_on_same_track() {
        // A soloed, B plain, C muted and soloed: only A is audible
        let mut mixer = TrackMixer::new();
        let a = mixer.add_audio_track("A");
        let b = mixer.add_audio_track("B");
        let c = mixer.add_audio_track("C");
        mixer.set_soloed(a, true).unwrap();
        mixer.set_muted(c, true).unwrap();
        mixer.set_soloed(c, true).unwrap();

        let audibility = mixer.resolve_audibility();
        assert_eq!(audibility[&a], true);
        assert_eq!(audibility[&b], false);
        assert_eq!(audibility[&c], false);
    }

    #[test]
    fn test_audibility_recomputes_after_second_solo_toggles_off() {
        let mut mixer = TrackMixer::new();
        let a = mixer.add_audio_track("A");
        let b = mixer.add_audio_track("B");
        mixer.set_soloed(a, true).unwrap();
        mixer.set_soloed(b, true).unwrap();
        mixer.set_soloed(a, false).unwrap();

        let audibility = mixer.resolve_audibility();
        assert_eq!(audibility[&a], false);
        assert_eq!(audibility[&b], true);
    }

    #[test]
    fn test_chords_track_can_be_soloed() {
        let mut mixer = TrackMixer::new();
        let a = mixer.add_audio_track("A");
        mixer.set_soloed(CHORDS_TRACK, true).unwrap();

        let audibility = mixer.resolve_audibility();
        assert_eq!(audibility[&CHORDS_TRACK], true);
        assert_eq!(audibility[&a], false);
    }
}
