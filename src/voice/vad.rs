//! Energy-based voice activity detection
//!
//! Classifies a single frame as voiced or silent by comparing its RMS
//! amplitude against a fixed threshold. Stateless; callers layer their own
//! timing on top.

use super::AudioFrame;

/// Default RMS threshold in raw 16-bit sample units
pub const DEFAULT_THRESHOLD: f32 = 250.0;

/// Result of classifying one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadDecision {
    /// Root-mean-square sample amplitude
    pub energy: f32,
    /// Whether `energy` is above the threshold
    pub is_voice: bool,
}

/// RMS-over-threshold voice activity detector
#[derive(Debug, Clone, Copy)]
pub struct EnergyVad {
    threshold: f32,
}

impl EnergyVad {
    /// Create a detector with the given RMS threshold
    #[must_use]
    pub const fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Classify a frame
    #[must_use]
    pub fn classify(&self, frame: &AudioFrame) -> VadDecision {
        let energy = rms(frame);
        VadDecision {
            energy,
            is_voice: energy > self.threshold,
        }
    }

    /// Configured threshold
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

/// Calculate RMS energy of a frame, accumulating in f64
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn rms(frame: &AudioFrame) -> f32 {
    let count = frame.sample_count();
    if count == 0 {
        return 0.0;
    }

    let sum_squares: f64 = frame
        .samples()
        .map(|s| {
            let s = f64::from(s);
            s * s
        })
        .sum();
    (sum_squares / count as f64).sqrt() as f32
}
