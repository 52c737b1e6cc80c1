//! Audio playback to speakers

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig, SupportedStreamConfigRange};

use crate::{Error, Result};

/// Mono samples at the rate they were produced
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Plays audio to the default output device
pub struct AudioPlayback {
    device_name: String,
}

impl AudioPlayback {
    /// Create a new audio playback instance
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available
    pub fn new() -> Result<Self> {
        let device = default_device()?;
        let device_name = device.name().unwrap_or_default();

        tracing::debug!(device = %device_name, "audio playback initialized");

        Ok(Self { device_name })
    }

    /// Play audio from MP3 bytes, blocking until output completes
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    pub fn play_mp3(&self, mp3_data: &[u8]) -> Result<()> {
        let audio = decode_mp3(mp3_data)?;
        self.play(audio.samples, audio.sample_rate)
    }

    /// Play mono f32 samples recorded at `sample_rate`, blocking until output completes
    ///
    /// The stream runs at `sample_rate` when the device supports it; otherwise
    /// samples are resampled to the device's default rate.
    ///
    /// # Errors
    ///
    /// Returns error if the output stream fails
    pub fn play(&self, samples: Vec<f32>, sample_rate: u32) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let device = default_device()?;
        let config = output_config(&device, sample_rate)?;
        let output_rate = config.sample_rate.0;

        let samples = if output_rate == sample_rate {
            samples
        } else {
            tracing::debug!(from = sample_rate, to = output_rate, "resampling for output device");
            resample(&samples, sample_rate, output_rate)?
        };

        let channels = usize::from(config.channels);
        let sample_count = samples.len();
        let samples = Arc::new(samples);
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let stream = {
            let samples = Arc::clone(&samples);
            let position = Arc::clone(&position);
            let finished = Arc::clone(&finished);
            device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let mut pos = position.load(Ordering::Relaxed);
                        for frame in data.chunks_mut(channels) {
                            let sample = samples.get(pos).copied().unwrap_or(0.0);
                            frame.fill(sample);
                            if pos < samples.len() {
                                pos += 1;
                            }
                        }
                        position.store(pos, Ordering::Relaxed);
                        if pos >= samples.len() {
                            finished.store(true, Ordering::Release);
                        }
                    },
                    |err| {
                        tracing::error!(error = %err, "audio playback error");
                    },
                    None,
                )
                .map_err(|e| Error::Audio(e.to_string()))?
        };

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let duration_ms = (sample_count as u64 * 1000) / u64::from(output_rate);
        let start = Instant::now();
        let timeout = Duration::from_millis(duration_ms + 500);

        while !finished.load(Ordering::Acquire) {
            if start.elapsed() > timeout {
                tracing::warn!("playback did not signal completion in time");
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        drop(stream);
        tracing::debug!(
            device = %self.device_name,
            samples = sample_count,
            sample_rate = output_rate,
            "playback complete"
        );

        Ok(())
    }
}

fn default_device() -> Result<cpal::Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))
}

/// Pick a mono (or stereo) config at `sample_rate`, else the device default
fn output_config(device: &cpal::Device, sample_rate: u32) -> Result<StreamConfig> {
    let supports = |channels: u16| {
        move |c: &SupportedStreamConfigRange| {
            c.channels() == channels
                && c.min_sample_rate() <= SampleRate(sample_rate)
                && c.max_sample_rate() >= SampleRate(sample_rate)
        }
    };

    let exact = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(supports(1))
        .or_else(|| {
            // Fallback: try stereo
            device.supported_output_configs().ok()?.find(supports(2))
        });

    if let Some(range) = exact {
        return Ok(range.with_sample_rate(SampleRate(sample_rate)).config());
    }

    device
        .default_output_config()
        .map(|c| c.config())
        .map_err(|e| Error::Audio(format!("no suitable output config found: {e}")))
}

/// Resample mono audio using rubato
#[allow(clippy::cast_possible_truncation)]
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{FftFixedIn, Resampler};

    let chunk_size = 1024;
    let sub_chunks = 2;

    let mut resampler =
        FftFixedIn::<f64>::new(from_rate as usize, to_rate as usize, chunk_size, sub_chunks, 1)
            .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    let mut output = Vec::new();
    for chunk in samples.chunks(chunk_size) {
        // Pad the tail so the last partial chunk is not lost
        let mut input: Vec<f64> = chunk.iter().map(|&s| f64::from(s)).collect();
        input.resize(chunk_size, 0.0);

        let result = resampler
            .process(&[input], None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        output.extend(result[0].iter().map(|&s| s as f32));
    }

    Ok(output)
}

/// Decode MP3 bytes to mono f32 samples, keeping the stream's sample rate
fn decode_mp3(mp3_data: &[u8]) -> Result<DecodedAudio> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = None;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                let rate = u32::try_from(frame.sample_rate)
                    .map_err(|_| Error::Audio(format!("invalid MP3 sample rate {}", frame.sample_rate)))?;
                match sample_rate {
                    None => sample_rate = Some(rate),
                    Some(first) if first != rate => {
                        tracing::warn!(first, rate, "MP3 sample rate changed mid-stream");
                    }
                    Some(_) => {}
                }

                if frame.channels == 2 {
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    let sample_rate = sample_rate.ok_or_else(|| Error::Audio("MP3 contained no frames".to_string()))?;

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Silent MPEG-1 Layer III stream: 128 kbps stereo at the given sample rate
    fn silent_mp3(rate_bits: u8, frame_len: usize, frames: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(frame_len * frames);
        for _ in 0..frames {
            let mut frame = vec![0u8; frame_len];
            frame[0] = 0xFF;
            frame[1] = 0xFB;
            frame[2] = 0x90 | (rate_bits << 2);
            frame[3] = 0x00;
            data.extend(frame);
        }
        data
    }

    #[test]
    fn test_decode_reports_stream_rate() {
        // 144 * 128000 / 44100 = 417 bytes per frame
        let audio = decode_mp3(&silent_mp3(0b00, 417, 16)).unwrap();
        assert_eq!(audio.sample_rate, 44100);
        assert!(!audio.samples.is_empty());
        assert!(audio.samples.iter().all(|s| s.abs() < 1e-3));

        // 144 * 128000 / 48000 = 384 bytes per frame
        let audio = decode_mp3(&silent_mp3(0b01, 384, 16)).unwrap();
        assert_eq!(audio.sample_rate, 48000);
    }

    #[test]
    fn test_decode_empty_input_is_error() {
        assert!(matches!(decode_mp3(&[]), Err(Error::Audio(_))));
    }

    #[test]
    fn test_resample_scales_length() {
        let samples = vec![0.25_f32; 24000];
        let out = resample(&samples, 24000, 48000).unwrap();
        // One second in, roughly one second out at the new rate
        assert!(out.len() >= 47000 && out.len() <= 50000, "{}", out.len());
    }
}
