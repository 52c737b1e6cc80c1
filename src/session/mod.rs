//! Voice session state machine
//!
//! A single control loop pops frames from the [`FrameBuffer`], feeds the
//! listening recognition context, and moves between listening for the wake
//! phrase, capturing a command or holding a conversation. Only audio capture
//! runs on another thread.

mod conversation;
mod guard;
mod utterance;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub use conversation::{ConversationEvent, ConversationSession};
pub use guard::SpeakingGuard;
pub use utterance::{CaptureLimits, UtteranceCapture};

pub use crate::config::SessionMode;
use crate::clock::Clock;
use crate::config::{Personality, Settings};
use crate::reply::{IntentRouter, RateGate, ReplyService, ResponseGenerator, pick_phrase};
use crate::voice::{
    AudioFrame, AudioSource, EnergyVad, FrameBuffer, RecognitionContext, Recognizer, Speaker,
    WakeWordMatcher,
};
use crate::Result;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not yet listening
    Idle,
    /// Listening for the wake phrase only
    WakeArmed,
    /// Capturing a single command
    CapturingCommand,
    /// Holding a multi-turn conversation
    Conversing,
    /// Our own speech is playing
    Speaking,
    /// Control loop has exited
    Shutdown,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::WakeArmed => "wake-armed",
            Self::CapturingCommand => "capturing-command",
            Self::Conversing => "conversing",
            Self::Speaking => "speaking",
            Self::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

/// Cooperative stop flag checked once per loop iteration
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the control loop to exit
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Collaborators the engine drives
pub struct SessionParts {
    /// Speech recognizer
    pub recognizer: Box<dyn Recognizer>,
    /// Speech output
    pub speaker: Box<dyn Speaker>,
    /// Reply generator used when no built-in intent matches
    pub responder: Box<dyn ResponseGenerator>,
}

/// Fallbacks for empty phrase lists
const FALLBACK_GREETING: &str = "Hello! How can I help?";
const FALLBACK_FAREWELL: &str = "Goodbye!";
const FALLBACK_NOT_HEARD: &str = "I'm sorry, I didn't catch that.";

/// The wake, command and conversation state machine
pub struct SessionEngine {
    mode: SessionMode,
    state: SessionState,
    sample_rate: u32,
    poll_timeout: Duration,
    buffer: FrameBuffer,
    clock: Arc<dyn Clock>,
    matcher: WakeWordMatcher,
    recognizer: Box<dyn Recognizer>,
    listener: Box<dyn RecognitionContext>,
    guard: SpeakingGuard,
    capture: UtteranceCapture,
    conversation: ConversationSession,
    replies: ReplyService,
    personality: Personality,
    shutdown: ShutdownSignal,
}

impl SessionEngine {
    /// Build an engine from settings and collaborators
    ///
    /// # Errors
    ///
    /// Returns error if the wake vocabulary is empty or the recognizer
    /// cannot create a listening context
    pub fn new(
        settings: &Settings,
        parts: SessionParts,
        buffer: FrameBuffer,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let SessionParts {
            recognizer,
            speaker,
            responder,
        } = parts;

        let matcher = WakeWordMatcher::new(
            settings.wake.triggers.clone(),
            settings.wake.lead_words.clone(),
            settings.wake.variants.clone(),
        )?;
        let listener = recognizer.new_context(settings.audio.sample_rate)?;

        let session = &settings.session;
        let guard = SpeakingGuard::new(
            speaker,
            buffer.clone(),
            Arc::clone(&clock),
            session.guard_margin,
            session.settle_delay,
        );
        let capture = UtteranceCapture::new(
            buffer.clone(),
            Arc::clone(&clock),
            EnergyVad::new(settings.audio.vad_threshold),
            CaptureLimits {
                max_duration: session.command_timeout,
                silence_window: session.silence_window,
                poll_timeout: settings.audio.poll_timeout,
            },
        );
        let conversation =
            ConversationSession::new(session.debounce, session.idle_timeout, &session.goodbye_phrases);
        let replies = ReplyService::new(
            IntentRouter::with_builtins()?,
            responder,
            RateGate::new(settings.llm.min_interval, settings.llm.backoff),
            Arc::clone(&clock),
            settings.personality.clone(),
        );

        tracing::debug!(mode = ?session.mode, "session engine initialized");

        Ok(Self {
            mode: session.mode,
            state: SessionState::Idle,
            sample_rate: settings.audio.sample_rate,
            poll_timeout: settings.audio.poll_timeout,
            buffer,
            clock,
            matcher,
            recognizer,
            listener,
            guard,
            capture,
            conversation,
            replies,
            personality: settings.personality.clone(),
            shutdown: ShutdownSignal::new(),
        })
    }

    /// Run the control loop until `shutdown` is triggered
    ///
    /// # Errors
    ///
    /// Returns error if the audio source cannot be opened
    pub fn run(&mut self, source: &mut dyn AudioSource, shutdown: &ShutdownSignal) -> Result<()> {
        self.shutdown = shutdown.clone();
        source.open(self.buffer.clone())?;
        self.state = SessionState::WakeArmed;
        tracing::info!(mode = ?self.mode, "listening for wake phrase");

        while !self.shutdown.is_triggered() {
            if let Some(frame) = self.buffer.pop(self.poll_timeout) {
                self.handle_frame(frame);
            }
            self.tick();
        }

        source.close();
        self.state = SessionState::Shutdown;
        tracing::info!(dropped = self.buffer.dropped(), "session engine stopped");
        Ok(())
    }

    /// Process one captured frame
    pub fn handle_frame(&mut self, frame: AudioFrame) {
        if self.guard.is_guarded(frame.captured_at()) {
            tracing::trace!("frame inside speaking window, ignored");
            return;
        }

        let len = frame.as_bytes().len();
        if len == 0 || len % 2 != 0 {
            tracing::warn!(len, "malformed audio frame skipped");
            return;
        }

        // Silent frames still go through so the recognizer can close its segment
        let event = match self.listener.accept(&frame) {
            Ok(Some(event)) if event.is_final => event,
            Ok(_) => return,
            Err(e) => {
                tracing::debug!(error = %e, "recognizer error, frame skipped");
                return;
            }
        };

        let text = event.text.trim();
        if text.is_empty() {
            return;
        }

        match self.state {
            SessionState::Conversing => {
                let now = self.clock.now();
                self.conversation.append(text, now);
            }
            SessionState::Idle | SessionState::WakeArmed => self.on_transcript(text),
            SessionState::CapturingCommand | SessionState::Speaking | SessionState::Shutdown => {}
        }
    }

    /// Run the timer checks that do not depend on incoming audio
    pub fn tick(&mut self) {
        if self.state != SessionState::Conversing {
            return;
        }

        let now = self.clock.now();
        match self.conversation.poll(now) {
            Some(ConversationEvent::Turn(turn)) => self.respond_turn(&turn),
            Some(ConversationEvent::Goodbye(turn)) => {
                tracing::info!(turn = %turn, "goodbye heard");
                let farewell = pick_phrase(&self.personality.farewells, FALLBACK_FAREWELL);
                self.end_conversation(&farewell);
            }
            Some(ConversationEvent::IdleTimeout) => {
                tracing::info!("conversation idle, ending session");
                let farewell = pick_phrase(&self.personality.timeout_farewells, FALLBACK_FAREWELL);
                self.end_conversation(&farewell);
            }
            None => {}
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Configured session mode
    #[must_use]
    pub const fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Text buffered for the current conversation turn
    #[must_use]
    pub fn conversation_text(&self) -> &str {
        self.conversation.text()
    }

    fn on_transcript(&mut self, text: &str) {
        let Some(wake) = self.matcher.find(text) else {
            tracing::debug!(transcript = %text, "no wake phrase");
            return;
        };

        match self.mode {
            SessionMode::Conversation => self.start_conversation(&wake.remainder),
            SessionMode::Command => self.run_command(&wake.remainder),
        }
    }

    fn start_conversation(&mut self, remainder: &str) {
        self.set_state(SessionState::Conversing);
        let greeting = pick_phrase(&self.personality.greetings, FALLBACK_GREETING);
        self.speak(&greeting);

        self.conversation.begin(self.clock.now());
        if !remainder.is_empty() {
            self.conversation.append(remainder, self.clock.now());
        }
        self.reset_listener();
    }

    fn run_command(&mut self, remainder: &str) {
        self.set_state(SessionState::CapturingCommand);

        let command = if remainder.is_empty() {
            let greeting = pick_phrase(&self.personality.greetings, FALLBACK_GREETING);
            self.speak(&greeting);
            let guard = &self.guard;
            self.capture.capture(
                self.recognizer.as_ref(),
                self.sample_rate,
                |at| guard.is_guarded(at),
                &self.shutdown,
            )
        } else {
            remainder.to_string()
        };

        let reply = if command.is_empty() {
            tracing::info!("no command heard");
            pick_phrase(&self.personality.not_heard, FALLBACK_NOT_HEARD)
        } else {
            self.replies.reply(&command)
        };
        self.speak(&reply);

        self.replies.end_session();
        self.set_state(SessionState::WakeArmed);
        self.reset_listener();
    }

    fn respond_turn(&mut self, turn: &str) {
        let reply = self.replies.reply(turn);
        self.speak(&reply);
        self.conversation.touch(self.clock.now());
        self.reset_listener();
    }

    fn end_conversation(&mut self, farewell: &str) {
        self.conversation.clear();
        self.replies.end_session();
        self.set_state(SessionState::WakeArmed);
        self.speak(farewell);
        self.reset_listener();
    }

    fn speak(&mut self, text: &str) {
        self.guard.speak(&mut self.state, text);
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state != next {
            tracing::debug!(from = %self.state, to = %next, "session state change");
            self.state = next;
        }
    }

    /// Start a fresh listening context so nothing heard before our own
    /// speech leaks into the next transcript
    fn reset_listener(&mut self) {
        match self.recognizer.new_context(self.sample_rate) {
            Ok(context) => self.listener = context,
            Err(e) => tracing::warn!(error = %e, "could not reset recognition context"),
        }
    }
}
