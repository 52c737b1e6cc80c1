//! Audio capture from microphone

use std::time::Instant;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use super::{AudioFrame, FrameBuffer};
use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Samples per frame (0.5 seconds at 16kHz)
pub const FRAME_SIZE: usize = 8000;

/// Producer of fixed-size audio frames
///
/// Implementations push frames into the buffer from their own thread or
/// callback and must never block while doing so.
pub trait AudioSource {
    /// Start producing frames into `buffer`
    ///
    /// # Errors
    ///
    /// Returns error if the stream cannot be opened
    fn open(&mut self, buffer: FrameBuffer) -> Result<()>;

    /// Stop producing frames
    fn close(&mut self);
}

/// Captures frames from the default input device
pub struct MicrophoneSource {
    config: StreamConfig,
    frame_size: usize,
    stream: Option<Stream>,
}

impl MicrophoneSource {
    /// Create a capture source for mono audio at `sample_rate`
    ///
    /// # Errors
    ///
    /// Returns error if no input device supports the requested format
    pub fn new(sample_rate: u32, frame_size: usize) -> Result<Self> {
        if frame_size == 0 {
            return Err(Error::Config("frame size must be positive".to_string()));
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(sample_rate)
                    && c.max_sample_rate() >= SampleRate(sample_rate)
            })
            .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(sample_rate))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate,
            frame_size,
            "audio capture initialized"
        );

        Ok(Self {
            config,
            frame_size,
            stream: None,
        })
    }
}

impl AudioSource for MicrophoneSource {
    fn open(&mut self, buffer: FrameBuffer) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device".to_string()))?;

        let frame_size = self.frame_size;
        let mut pending: Vec<i16> = Vec::with_capacity(frame_size * 2);

        let stream = device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    pending.extend(data.iter().map(|&s| to_i16(s)));
                    while pending.len() >= frame_size {
                        let block: Vec<i16> = pending.drain(..frame_size).collect();
                        buffer.push(AudioFrame::from_samples(&block, Instant::now()));
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Convert f32 [-1.0, 1.0] to i16
#[allow(clippy::cast_possible_truncation)]
fn to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

/// Encode PCM samples as WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
