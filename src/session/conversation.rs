//! Multi-turn conversation buffer
//!
//! Two independent timers run here. The debounce window decides when the
//! user has finished a turn; the idle timeout decides when the user has left.

use std::time::{Duration, Instant};

use crate::voice::tokenize;

/// Something the conversation needs the engine to act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEvent {
    /// A complete user turn
    Turn(String),
    /// The user said a closing phrase
    Goodbye(String),
    /// Nobody has spoken for the idle timeout
    IdleTimeout,
}

/// Accumulates transcript fragments into user turns
#[derive(Debug)]
pub struct ConversationSession {
    debounce: Duration,
    idle_timeout: Duration,
    goodbyes: Vec<Vec<String>>,
    text: String,
    last_update: Option<Instant>,
    last_speech: Option<Instant>,
}

impl ConversationSession {
    /// Create a session with the given timers and closing phrases
    #[must_use]
    pub fn new(debounce: Duration, idle_timeout: Duration, goodbye_phrases: &[String]) -> Self {
        let goodbyes = goodbye_phrases
            .iter()
            .map(|p| tokenize(p))
            .filter(|p| !p.is_empty())
            .collect();

        Self {
            debounce,
            idle_timeout,
            goodbyes,
            text: String::new(),
            last_update: None,
            last_speech: None,
        }
    }

    /// Start a conversation at `now` with an empty buffer
    pub fn begin(&mut self, now: Instant) {
        self.clear();
        self.last_speech = Some(now);
    }

    /// Add a finalized fragment
    pub fn append(&mut self, fragment: &str, now: Instant) {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return;
        }

        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(fragment);
        self.last_update = Some(now);
        self.last_speech = Some(now);
        tracing::debug!(buffer = %self.text, "conversation fragment added");
    }

    /// Check both timers
    ///
    /// A pending turn is flushed once `debounce` has passed since the last
    /// fragment. Otherwise, the idle timeout is checked against the last
    /// speech. Flushing empties the buffer.
    pub fn poll(&mut self, now: Instant) -> Option<ConversationEvent> {
        if let Some(updated) = self.last_update
            && !self.text.is_empty()
            && now.saturating_duration_since(updated) >= self.debounce
        {
            let turn = std::mem::take(&mut self.text);
            self.last_update = None;
            if self.is_goodbye(&turn) {
                return Some(ConversationEvent::Goodbye(turn));
            }
            return Some(ConversationEvent::Turn(turn));
        }

        let last_speech = self.last_speech?;
        if now.saturating_duration_since(last_speech) >= self.idle_timeout {
            self.clear();
            return Some(ConversationEvent::IdleTimeout);
        }
        None
    }

    /// Treat `now` as recent activity for the idle timer
    pub fn touch(&mut self, now: Instant) {
        if self.last_speech.is_some() {
            self.last_speech = Some(now);
        }
    }

    /// Drop buffered text and stop both timers
    pub fn clear(&mut self) {
        self.text.clear();
        self.last_update = None;
        self.last_speech = None;
    }

    /// Text accumulated for the current turn
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether no text is buffered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Whether `text` is, as a whole, one of the closing phrases
    #[must_use]
    pub fn is_goodbye(&self, text: &str) -> bool {
        let tokens = tokenize(text);
        !tokens.is_empty() && self.goodbyes.iter().any(|g| *g == tokens)
    }
}
