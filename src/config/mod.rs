// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Session configuration.
//!
//! A session file is a YAML document carrying the song settings (tempo,
//! capo, sound bank), the chord chart, and any audio tracks and clips.
//! Loading is strict about structure but lenient about omissions: most
//! fields have sensible defaults.

pub mod watcher;

pub use watcher::{SessionEvent, SessionWatcher};

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::audio::SoundBank;
use crate::music::{Chord, Progression, StrummingPattern, MAX_CAPO, MAX_FRET, STRING_COUNT};
use crate::timing::{MAX_TEMPO, MIN_TEMPO};

fn default_tempo() -> f64 {
    120.0
}

fn default_beats() -> u32 {
    4
}

fn default_clip_beats() -> f64 {
    8.0
}

fn default_gain() -> f32 {
    1.0
}

/// Root configuration for a session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionFile {
    /// Song metadata and settings
    pub session: SessionConfig,
    /// The chord chart, in performance order
    #[serde(default)]
    pub chords: Vec<ChordSpec>,
    /// Audio tracks
    #[serde(default)]
    pub tracks: Vec<TrackSpec>,
    /// Clip placements; `track` indexes into `tracks`
    #[serde(default)]
    pub clips: Vec<ClipSpec>,
}

/// Song-level settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Session name
    pub name: String,
    /// Tempo in BPM
    #[serde(default = "default_tempo")]
    pub tempo: f64,
    /// Loop the chart instead of finishing
    #[serde(default)]
    pub looping: bool,
    /// Capo position (0-11)
    #[serde(default)]
    pub capo: u8,
    /// Instrument sound
    #[serde(default)]
    pub sound_bank: SoundBank,
    /// SF2 soundfont path
    #[serde(default)]
    pub soundfont: Option<PathBuf>,
}

/// A chord in the chart
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChordSpec {
    /// Display name (e.g. "Am7")
    pub name: String,
    /// Duration in beats
    #[serde(default = "default_beats")]
    pub beats: u32,
    /// One entry per string, low string first (-1 muted, 0 open)
    pub fingering: Vec<i8>,
    /// Strumming pattern
    #[serde(default)]
    pub pattern: StrummingPattern,
}

/// An audio track
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackSpec {
    pub name: String,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub soloed: bool,
    #[serde(default = "default_gain")]
    pub gain: f32,
}

/// A clip placement on an audio track
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClipSpec {
    pub name: String,
    /// WAV source path
    pub file: PathBuf,
    /// Index into the `tracks` list
    #[serde(default)]
    pub track: usize,
    #[serde(default)]
    pub start_beat: f64,
    #[serde(default = "default_clip_beats")]
    pub beats: f64,
    #[serde(default)]
    pub offset_beats: f64,
    #[serde(default)]
    pub muted: bool,
}

impl SessionFile {
    /// Load a session from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read session file: {:?}", path.as_ref()))?;
        Self::from_yaml(&contents)
    }

    /// Parse a session from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse YAML session")
    }

    /// Serialize to a YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize session to YAML")
    }

    /// Save to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = self.to_yaml()?;
        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write session file: {:?}", path.as_ref()))
    }

    /// Check the session for problems, reporting every one found rather
    /// than stopping at the first
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if !(MIN_TEMPO..=MAX_TEMPO).contains(&self.session.tempo) {
            problems.push(format!(
                "tempo {} is outside the supported {}-{} BPM range",
                self.session.tempo, MIN_TEMPO, MAX_TEMPO
            ));
        }
        if self.session.capo > MAX_CAPO {
            problems.push(format!(
                "capo {} is above the maximum of {}",
                self.session.capo, MAX_CAPO
            ));
        }

        for (i, chord) in self.chords.iter().enumerate() {
            if chord.beats == 0 {
                problems.push(format!("chord {} ('{}') has zero beats", i, chord.name));
            }
            if chord.fingering.len() != STRING_COUNT {
                problems.push(format!(
                    "chord {} ('{}') has {} fingering entries; expected {}",
                    i,
                    chord.name,
                    chord.fingering.len(),
                    STRING_COUNT
                ));
            }
            for (string, &fret) in chord.fingering.iter().enumerate() {
                if !(-1..=MAX_FRET).contains(&fret) {
                    problems.push(format!(
                        "chord {} ('{}') has invalid fret {} on string {}",
                        i, chord.name, fret, string
                    ));
                }
            }
        }

        for (i, clip) in self.clips.iter().enumerate() {
            if clip.track >= self.tracks.len() {
                problems.push(format!(
                    "clip {} ('{}') references track {} but only {} tracks are defined",
                    i,
                    clip.name,
                    clip.track,
                    self.tracks.len()
                ));
            }
            if clip.beats <= 0.0 {
                problems.push(format!(
                    "clip {} ('{}') has a non-positive duration",
                    i, clip.name
                ));
            }
            if clip.start_beat < 0.0 {
                problems.push(format!(
                    "clip {} ('{}') starts before the timeline",
                    i, clip.name
                ));
            }
        }

        problems
    }

    /// Build the chart from the chord specs. Fails on structural problems
    /// (wrong fingering length); use `validate` for the full report.
    pub fn progression(&self) -> Result<Progression> {
        let mut progression = Progression::new();
        for spec in &self.chords {
            let fingering: [i8; STRING_COUNT] =
                spec.fingering.clone().try_into().map_err(|_| {
                    anyhow::anyhow!(
                        "chord '{}' needs exactly {} fingering entries",
                        spec.name,
                        STRING_COUNT
                    )
                })?;
            progression
                .push(Chord::new(spec.name.clone(), spec.beats, fingering).with_pattern(spec.pattern));
        }
        Ok(progression)
    }

    /// A small starter session for `chordloop init`
    pub fn starter(name: impl Into<String>) -> Self {
        Self {
            session: SessionConfig {
                name: name.into(),
                tempo: 120.0,
                looping: false,
                capo: 0,
                sound_bank: SoundBank::default(),
                soundfont: None,
            },
            chords: vec![
                ChordSpec {
                    name: String::from("C"),
                    beats: 4,
                    fingering: vec![-1, 3, 2, 0, 1, 0],
                    pattern: StrummingPattern::Down,
                },
                ChordSpec {
                    name: String::from("G"),
                    beats: 4,
                    fingering: vec![3, 2, 0, 0, 0, 3],
                    pattern: StrummingPattern::Down,
                },
                ChordSpec {
                    name: String::from("Am"),
                    beats: 4,
                    fingering: vec![-1, 0, 2, 2, 1, 0],
                    pattern: StrummingPattern::DownUp,
                },
                ChordSpec {
                    name: String::from("F"),
                    beats: 4,
                    fingering: vec![1, 3, 3, 2, 1, 1],
                    pattern: StrummingPattern::Down,
                },
            ],
            tracks: Vec::new(),
            clips: Vec::new(),
        }
    }
}
