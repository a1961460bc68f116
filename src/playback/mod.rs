// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Playback core: schedule compilation and the transport that runs it.
//!
//! This module provides:
//! - Event compiler turning a chord chart plus tempo into a timed schedule
//! - Transport controller owning the playback lifecycle
//! - Track mixer resolving mute/solo audibility
//! - Clip synchronizer converging timeline clips onto the live engine

pub mod clips;
pub mod compiler;
pub mod mixer;
pub mod transport;

pub use clips::{AudioClip, ClipSynchronizer, NewClip};
pub use compiler::{compile, total_duration, EventKind, ScheduledEvent};
pub use mixer::{MixerError, Track, TrackKind, TrackMixer, CHORDS_TRACK};
pub use transport::{PlaybackState, TransportController, TransportError};

use std::fmt;

/// Identifier for a mixer track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track#{}", self.0)
    }
}

/// Identifier for a timeline clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipId(pub u64);

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clip#{}", self.0)
    }
}
