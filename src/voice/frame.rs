//! Fixed-size blocks of captured PCM audio

use std::sync::Arc;
use std::time::Instant;

/// One sampling block of 16-bit signed little-endian mono PCM
///
/// Frames are immutable once built and cheap to clone.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    bytes: Arc<[u8]>,
    captured_at: Instant,
}

impl AudioFrame {
    /// Wrap raw PCM bytes captured at `captured_at`
    #[must_use]
    pub fn new(bytes: impl Into<Arc<[u8]>>, captured_at: Instant) -> Self {
        Self {
            bytes: bytes.into(),
            captured_at,
        }
    }

    /// Build a frame from decoded samples
    #[must_use]
    pub fn from_samples(samples: &[i16], captured_at: Instant) -> Self {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self::new(bytes, captured_at)
    }

    /// Raw PCM bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decoded samples; a trailing odd byte is ignored
    pub fn samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
    }

    /// Number of whole samples in the frame
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.bytes.len() / 2
    }

    /// When the capture callback produced this frame
    #[must_use]
    pub const fn captured_at(&self) -> Instant {
        self.captured_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_decode_little_endian() {
        let frame = AudioFrame::new(vec![0x01, 0x00, 0xff, 0xff, 0x00, 0x80], Instant::now());
        let samples: Vec<i16> = frame.samples().collect();
        assert_eq!(samples, vec![1, -1, i16::MIN]);
    }

    #[test]
    fn test_odd_trailing_byte_ignored() {
        let frame = AudioFrame::new(vec![0x10, 0x00, 0x7f], Instant::now());
        assert_eq!(frame.sample_count(), 1);
        assert_eq!(frame.samples().count(), 1);
    }
}
