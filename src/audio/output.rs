// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Audio output via cpal.
//!
//! Owns the output stream and pumps the render callback. Stream errors
//! surface as retryable `AudioError`s; the common case is an audio runtime
//! that is not yet unlocked by a user gesture.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use super::AudioError;

/// Audio output configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Buffer size in frames
    pub buffer_size: u32,
    /// Number of output channels
    pub channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            buffer_size: 512,
            channels: 2,
        }
    }
}

/// Live output stream feeding the render callback
pub struct AudioOutput {
    _stream: Stream,
    _device: Device,
    config: AudioConfig,
}

impl AudioOutput {
    /// Open the default output device and start streaming through
    /// `render(buffer, channels)`
    pub fn new<F>(config: AudioConfig, mut render: F) -> Result<Self, AudioError>
    where
        F: FnMut(&mut [f32], usize) + Send + 'static,
    {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let stream_config = StreamConfig {
            channels: config.channels,
            sample_rate: SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(config.buffer_size),
        };
        let channels = config.channels as usize;

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    data.fill(0.0);
                    render(data, channels);
                },
                |err| tracing::warn!("audio stream error: {err}"),
                None,
            )
            .map_err(|e| AudioError::StreamFailed(format!("failed to build stream: {e}")))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamFailed(format!("failed to start stream: {e}")))?;

        Ok(Self {
            _stream: stream,
            _device: device,
            config,
        })
    }

    /// The configuration the stream was opened with
    pub fn config(&self) -> &AudioConfig {
        &self.config
    }
}
