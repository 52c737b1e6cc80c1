//! Single-shot command capture

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::ShutdownSignal;
use crate::clock::Clock;
use crate::voice::{EnergyVad, FrameBuffer, Recognizer};

/// Bounds on one command capture
#[derive(Debug, Clone, Copy)]
pub struct CaptureLimits {
    /// Longest the capture may run
    pub max_duration: Duration,
    /// Trailing silence that ends the capture
    pub silence_window: Duration,
    /// How long a single buffer read waits
    pub poll_timeout: Duration,
}

/// Captures one spoken command through a fresh recognition context
pub struct UtteranceCapture {
    buffer: FrameBuffer,
    clock: Arc<dyn Clock>,
    vad: EnergyVad,
    limits: CaptureLimits,
}

impl UtteranceCapture {
    #[must_use]
    pub fn new(buffer: FrameBuffer, clock: Arc<dyn Clock>, vad: EnergyVad, limits: CaptureLimits) -> Self {
        Self {
            buffer,
            clock,
            vad,
            limits,
        }
    }

    /// Listen until trailing silence or the time limit and return what was said
    ///
    /// Always returns exactly one string, empty when nothing was recognized.
    /// Frames for which `guarded` returns true are skipped. Recognizer
    /// failures count as "no text" for that frame.
    pub fn capture(
        &self,
        recognizer: &dyn Recognizer,
        sample_rate: u32,
        guarded: impl Fn(Instant) -> bool,
        shutdown: &ShutdownSignal,
    ) -> String {
        let mut context = match recognizer.new_context(sample_rate) {
            Ok(context) => context,
            Err(e) => {
                tracing::warn!(error = %e, "could not start command recognition");
                return String::new();
            }
        };

        let start = self.clock.now();
        let mut last_voice = start;
        let mut transcript = Transcript::default();
        let mut frames = 0usize;

        loop {
            if shutdown.is_triggered() {
                break;
            }

            let now = self.clock.now();
            if now.saturating_duration_since(last_voice) >= self.limits.silence_window {
                tracing::debug!("command capture ended on trailing silence");
                break;
            }
            if now.saturating_duration_since(start) >= self.limits.max_duration {
                tracing::debug!("command capture hit time limit");
                break;
            }

            let Some(frame) = self.buffer.pop(self.limits.poll_timeout) else {
                continue;
            };
            if guarded(frame.captured_at()) {
                continue;
            }
            frames += 1;

            if self.vad.classify(&frame).is_voice {
                last_voice = self.clock.now();
            }

            match context.accept(&frame) {
                Ok(Some(event)) if event.is_final => transcript.push(&event.text),
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "recognizer skipped a frame"),
            }
        }

        match context.flush() {
            Ok(text) => transcript.push(&text),
            Err(e) => tracing::debug!(error = %e, "recognizer flush failed"),
        }

        let text = transcript.finish();
        tracing::info!(frames, command = %text, "command captured");
        text
    }
}

/// Space-joined fragments with consecutive repeats dropped
#[derive(Default)]
struct Transcript {
    parts: Vec<String>,
}

impl Transcript {
    fn push(&mut self, fragment: &str) {
        let fragment = fragment.trim();
        if fragment.is_empty() || self.parts.last().is_some_and(|last| last == fragment) {
            return;
        }
        self.parts.push(fragment.to_string());
    }

    fn finish(self) -> String {
        self.parts.join(" ").trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_joins_and_skips_repeats() {
        let mut transcript = Transcript::default();
        transcript.push("what time");
        transcript.push("what time");
        transcript.push("  ");
        transcript.push("is it ");
        assert_eq!(transcript.finish(), "what time is it");
    }
}
