//! Self-hearing suppression around the assistant's own speech

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::SessionState;
use crate::clock::Clock;
use crate::voice::{FrameBuffer, Speaker};

/// Wraps the speaker so nothing it says is heard back as user speech
///
/// After speaking, frames captured before `speaking_until` are ignored and
/// the frame buffer is drained of whatever queued up during playback.
pub struct SpeakingGuard {
    speaker: Box<dyn Speaker>,
    buffer: FrameBuffer,
    clock: Arc<dyn Clock>,
    margin: Duration,
    settle: Duration,
    speaking_until: Option<Instant>,
}

impl SpeakingGuard {
    /// Create a guard
    ///
    /// `margin` extends the ignore window past the end of playback; `settle`
    /// is how long to wait before draining stale audio.
    #[must_use]
    pub fn new(
        speaker: Box<dyn Speaker>,
        buffer: FrameBuffer,
        clock: Arc<dyn Clock>,
        margin: Duration,
        settle: Duration,
    ) -> Self {
        Self {
            speaker,
            buffer,
            clock,
            margin,
            settle,
            speaking_until: None,
        }
    }

    /// Speak `text`, then restore `state` to what it was before
    ///
    /// Speaker failures are logged and swallowed; the caller's state is
    /// restored either way.
    pub fn speak(&mut self, state: &mut SessionState, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let prior = std::mem::replace(state, SessionState::Speaking);
        tracing::info!(text, "speaking");

        if let Err(e) = self.speaker.speak(text) {
            tracing::warn!(error = %e, "speech output failed");
        }

        self.speaking_until = Some(self.clock.now() + self.margin);
        self.clock.sleep(self.settle);
        let drained = self.buffer.drain();
        if drained > 0 {
            tracing::debug!(drained, "discarded self-heard audio");
        }

        *state = prior;
    }

    /// Whether a frame captured at `at` falls inside the ignore window
    #[must_use]
    pub fn is_guarded(&self, at: Instant) -> bool {
        self.speaking_until.is_some_and(|until| at < until)
    }

    /// End of the current ignore window, if any speech has happened
    #[must_use]
    pub const fn speaking_until(&self) -> Option<Instant> {
        self.speaking_until
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::clock::ManualClock;
    use crate::voice::AudioFrame;

    struct Recording {
        spoken: Arc<Mutex<Vec<String>>>,
        buffer: FrameBuffer,
        at: Instant,
        fail: bool,
    }

    impl Speaker for Recording {
        fn speak(&mut self, text: &str) -> crate::Result<()> {
            self.spoken.lock().unwrap().push(text.to_string());
            // Simulate the microphone picking up our own voice
            self.buffer.push(AudioFrame::from_samples(&[900; 160], self.at));
            if self.fail {
                return Err(crate::Error::Tts("device busy".to_string()));
            }
            Ok(())
        }
    }

    fn guard(clock: &ManualClock, buffer: &FrameBuffer, fail: bool) -> (SpeakingGuard, Arc<Mutex<Vec<String>>>) {
        let spoken = Arc::new(Mutex::new(Vec::new()));
        let speaker = Recording {
            spoken: Arc::clone(&spoken),
            buffer: buffer.clone(),
            at: clock.now(),
            fail,
        };
        let guard = SpeakingGuard::new(
            Box::new(speaker),
            buffer.clone(),
            Arc::new(clock.clone()),
            Duration::from_millis(500),
            Duration::from_millis(300),
        );
        (guard, spoken)
    }

    #[test]
    fn test_speak_drains_and_restores_state() {
        let clock = ManualClock::new();
        let buffer = FrameBuffer::new(8);
        let (mut guard, spoken) = guard(&clock, &buffer, false);

        let mut state = SessionState::Conversing;
        guard.speak(&mut state, "Hello friend!");

        assert_eq!(state, SessionState::Conversing);
        assert!(buffer.is_empty());
        assert_eq!(spoken.lock().unwrap().as_slice(), ["Hello friend!"]);
    }

    #[test]
    fn test_guard_window_covers_margin() {
        let clock = ManualClock::new();
        let buffer = FrameBuffer::new(8);
        let (mut guard, _) = guard(&clock, &buffer, false);
        let before = clock.now();

        let mut state = SessionState::WakeArmed;
        guard.speak(&mut state, "beep");

        let until = guard.speaking_until().unwrap();
        assert_eq!(until, before + Duration::from_millis(500));
        assert!(guard.is_guarded(before));
        assert!(guard.is_guarded(clock.now()));
        assert!(!guard.is_guarded(until));
    }

    #[test]
    fn test_speaker_failure_still_restores_state() {
        let clock = ManualClock::new();
        let buffer = FrameBuffer::new(8);
        let (mut guard, _) = guard(&clock, &buffer, true);

        let mut state = SessionState::CapturingCommand;
        guard.speak(&mut state, "beep");
        assert_eq!(state, SessionState::CapturingCommand);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_blank_text_is_not_spoken() {
        let clock = ManualClock::new();
        let buffer = FrameBuffer::new(8);
        let (mut guard, spoken) = guard(&clock, &buffer, false);

        let mut state = SessionState::WakeArmed;
        guard.speak(&mut state, "   ");
        assert!(spoken.lock().unwrap().is_empty());
        assert!(guard.speaking_until().is_none());
    }
}
