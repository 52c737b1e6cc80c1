//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use neptr::config::Settings;
use neptr::voice::{AudioFrame, RecognitionContext, Recognizer, Speaker, TranscriptEvent};
use neptr::{ProviderError, ResponseGenerator, SessionMode};

/// Recognizer whose contexts answer from one shared script
///
/// Every `accept` call on any context pops the next entry: `Some(text)` is a
/// final transcript, `None` means nothing recognized for that frame. An
/// exhausted script recognizes nothing.
#[derive(Clone, Default)]
pub struct ScriptedRecognizer {
    script: Arc<Mutex<VecDeque<Option<String>>>>,
    contexts: Arc<Mutex<usize>>,
}

impl ScriptedRecognizer {
    pub fn new(entries: &[Option<&str>]) -> Self {
        let recognizer = Self::default();
        recognizer.extend(entries);
        recognizer
    }

    /// Append more script entries
    pub fn extend(&self, entries: &[Option<&str>]) {
        let mut script = self.script.lock().unwrap();
        script.extend(entries.iter().map(|e| e.map(ToString::to_string)));
    }

    /// Script entries not consumed yet
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }

    /// Contexts created so far
    pub fn contexts_created(&self) -> usize {
        *self.contexts.lock().unwrap()
    }
}

impl Recognizer for ScriptedRecognizer {
    fn new_context(&self, _sample_rate: u32) -> neptr::Result<Box<dyn RecognitionContext>> {
        *self.contexts.lock().unwrap() += 1;
        Ok(Box::new(ScriptedContext {
            script: Arc::clone(&self.script),
        }))
    }
}

struct ScriptedContext {
    script: Arc<Mutex<VecDeque<Option<String>>>>,
}

impl RecognitionContext for ScriptedContext {
    fn accept(&mut self, frame: &AudioFrame) -> neptr::Result<Option<TranscriptEvent>> {
        let next = self.script.lock().unwrap().pop_front().flatten();
        Ok(next.map(|text| TranscriptEvent::final_text(text, frame.captured_at())))
    }

    fn flush(&mut self) -> neptr::Result<String> {
        Ok(String::new())
    }
}

/// Recognizer that fails on chosen frames
///
/// Each `accept` pops one step: `Ok(Some(text))` is a final transcript,
/// `Ok(None)` recognizes nothing, `Err(message)` is a recognizer failure.
#[derive(Clone, Default)]
pub struct FlakyRecognizer {
    steps: Arc<Mutex<VecDeque<Result<Option<String>, String>>>>,
}

impl FlakyRecognizer {
    pub fn new(steps: &[Result<Option<&str>, &str>]) -> Self {
        let steps = steps
            .iter()
            .map(|step| match step {
                Ok(text) => Ok(text.map(ToString::to_string)),
                Err(message) => Err((*message).to_string()),
            })
            .collect();
        Self {
            steps: Arc::new(Mutex::new(steps)),
        }
    }

    pub fn remaining(&self) -> usize {
        self.steps.lock().unwrap().len()
    }
}

impl Recognizer for FlakyRecognizer {
    fn new_context(&self, _sample_rate: u32) -> neptr::Result<Box<dyn RecognitionContext>> {
        Ok(Box::new(FlakyContext {
            steps: Arc::clone(&self.steps),
        }))
    }
}

struct FlakyContext {
    steps: Arc<Mutex<VecDeque<Result<Option<String>, String>>>>,
}

impl RecognitionContext for FlakyContext {
    fn accept(&mut self, frame: &AudioFrame) -> neptr::Result<Option<TranscriptEvent>> {
        match self.steps.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text.map(|t| TranscriptEvent::final_text(t, frame.captured_at()))),
            Some(Err(message)) => Err(neptr::Error::Recognizer(message)),
            None => Ok(None),
        }
    }

    fn flush(&mut self) -> neptr::Result<String> {
        Ok(String::new())
    }
}

/// Speaker that records what it was asked to say
#[derive(Clone, Default)]
pub struct RecordingSpeaker {
    spoken: Arc<Mutex<Vec<String>>>,
    notify: Option<Sender<String>>,
}

impl RecordingSpeaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also send every phrase down `notify` as it is spoken
    pub fn with_notify(notify: Sender<String>) -> Self {
        Self {
            spoken: Arc::default(),
            notify: Some(notify),
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

impl Speaker for RecordingSpeaker {
    fn speak(&mut self, text: &str) -> neptr::Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        if let Some(notify) = &self.notify {
            let _ = notify.send(text.to_string());
        }
        Ok(())
    }
}

/// Responder that always gives the same answer and records what it was asked
#[derive(Clone)]
pub struct ScriptedResponder {
    reply: Result<String, u16>,
    asked: Arc<Mutex<Vec<String>>>,
}

impl ScriptedResponder {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            asked: Arc::default(),
        }
    }

    /// Fail every call with the given HTTP status
    pub fn failing(status: u16) -> Self {
        Self {
            reply: Err(status),
            asked: Arc::default(),
        }
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

impl ResponseGenerator for ScriptedResponder {
    fn respond(&mut self, utterance: &str) -> Result<String, ProviderError> {
        self.asked.lock().unwrap().push(utterance.to_string());
        match &self.reply {
            Ok(reply) => Ok(reply.clone()),
            Err(status) => Err(neptr::reply::classify_status(*status, "scripted failure".to_string(), None)),
        }
    }
}

/// A loud 10ms frame
pub fn voiced(at: Instant) -> AudioFrame {
    let samples: Vec<i16> = (0..160).map(|i| if i % 2 == 0 { 3000 } else { -3000 }).collect();
    AudioFrame::from_samples(&samples, at)
}

/// A silent 10ms frame
pub fn silent(at: Instant) -> AudioFrame {
    AudioFrame::from_samples(&[0; 160], at)
}

/// Default settings with single-word phrase lists so assertions are exact
pub fn test_settings(mode: SessionMode) -> Settings {
    let mut settings = Settings::default();
    settings.session.mode = mode;
    settings.audio.poll_timeout = Duration::from_millis(20);
    settings.personality.greetings = vec!["Greetings!".to_string()];
    settings.personality.farewells = vec!["Farewell!".to_string()];
    settings.personality.timeout_farewells = vec!["Anyone there?".to_string()];
    settings.personality.apologies = vec!["Sorry!".to_string()];
    settings.personality.not_heard = vec!["I didn't hear anything.".to_string()];
    settings
}
