// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! chordloop - a transport-synchronized chord playback engine.
//!
//! Compiles a chord chart plus a tempo into a deterministic timed event
//! schedule, strums it through a FluidLite guitar sampler, mixes
//! beat-anchored audio clips against the same clock with per-track
//! mute/solo resolution, and reports progress to the embedding view layer
//! through a drained event queue.

pub mod audio;
pub mod config;
pub mod engine;
pub mod messaging;
pub mod music;
pub mod playback;
pub mod timing;

pub use engine::{Engine, EngineError};
pub use messaging::UiEvent;
pub use music::{Chord, Progression, StrummingPattern};
pub use playback::{ClipId, NewClip, PlaybackState, TrackId};
