// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Background clip loading.
//!
//! Decodes WAV sources off the control thread and reports completions over
//! a channel. A failed load surfaces as an error result for the owning
//! clip; it never takes the transport down.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use super::AudioError;
use crate::playback::ClipId;

/// Decoded clip audio, interleaved f32 at the source sample rate
#[derive(Debug, Clone)]
pub struct ClipAudio {
    pub samples: Arc<Vec<f32>>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl ClipAudio {
    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Source duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate.max(1) as f64
    }
}

/// Decode a WAV file into normalized f32 samples
pub fn decode_wav(path: &Path) -> Result<ClipAudio, AudioError> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| AudioError::ClipLoadFailed(format!("{}: {e}", path.display())))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| AudioError::ClipLoadFailed(format!("{}: {e}", path.display())))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| AudioError::ClipLoadFailed(format!("{}: {e}", path.display())))?
        }
    };

    if samples.is_empty() {
        return Err(AudioError::ClipLoadFailed(format!(
            "{}: no audio data",
            path.display()
        )));
    }

    Ok(ClipAudio {
        samples: Arc::new(samples),
        channels: spec.channels,
        sample_rate: spec.sample_rate,
    })
}

/// A finished load, successful or not
#[derive(Debug)]
pub struct LoadedClip {
    pub clip: ClipId,
    pub result: Result<ClipAudio, AudioError>,
}

/// Asynchronous clip loader.
///
/// `request` spawns a decode in the background; `completed` drains whatever
/// has finished since the last call.
pub struct ClipLoader {
    tx: Sender<LoadedClip>,
    rx: Receiver<LoadedClip>,
}

impl ClipLoader {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self { tx, rx }
    }

    /// Start decoding a clip source in the background
    pub fn request(&self, clip: ClipId, path: PathBuf) {
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = decode_wav(&path);
            let _ = tx.send(LoadedClip { clip, result });
        });
    }

    /// Finished loads since the last drain
    pub fn completed(&self) -> Vec<LoadedClip> {
        self.rx.try_iter().collect()
    }
}

impl Default for ClipLoader {
    fn default() -> Self {
        Self::new()
    }
}
