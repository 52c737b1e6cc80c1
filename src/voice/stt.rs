//! Speech-to-text (STT) processing
//!
//! The session engine consumes recognition through [`Recognizer`] and
//! [`RecognitionContext`]. [`CloudRecognizer`] is the bundled implementation:
//! it endpoints speech locally with an [`EnergyVad`] and transcribes each
//! completed segment through a hosted API.

use std::sync::Arc;
use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};

use super::{AudioFrame, EnergyVad, samples_to_wav};
use crate::{Error, Result};

/// Text produced by feeding frames into a recognition context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEvent {
    /// Recognized text
    pub text: String,
    /// Whether the recognizer considers this segment complete
    pub is_final: bool,
    /// Capture time of the frame that produced the event
    pub timestamp: Instant,
}

impl TranscriptEvent {
    /// Build a finalized transcript event
    #[must_use]
    pub fn final_text(text: impl Into<String>, timestamp: Instant) -> Self {
        Self {
            text: text.into(),
            is_final: true,
            timestamp,
        }
    }
}

/// Stateful recognizer bound to one capture pass
pub trait RecognitionContext {
    /// Feed one frame; returns an event once the recognizer has something to say
    ///
    /// # Errors
    ///
    /// Returns error if the frame could not be recognized
    fn accept(&mut self, frame: &AudioFrame) -> Result<Option<TranscriptEvent>>;

    /// Finalize any buffered audio and return its text
    ///
    /// # Errors
    ///
    /// Returns error if the trailing audio could not be recognized
    fn flush(&mut self) -> Result<String>;
}

/// Factory for isolated recognition contexts
pub trait Recognizer {
    /// Create a fresh context for audio at `sample_rate`
    ///
    /// # Errors
    ///
    /// Returns error if the context cannot be created
    fn new_context(&self, sample_rate: u32) -> Result<Box<dyn RecognitionContext>>;
}

/// Response from OpenAI Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// STT provider backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SttProvider {
    /// `OpenAI` Whisper
    Whisper,
    /// Deepgram
    Deepgram,
}

/// Transcribes WAV audio to text over HTTP
pub struct SpeechToText {
    client: reqwest::blocking::Client,
    api_key: SecretString,
    model: String,
    provider: SttProvider,
}

impl SpeechToText {
    /// Create a new STT client for `provider`
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or the HTTP client cannot be built
    pub fn new(provider: SttProvider, api_key: SecretString, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(format!("{provider:?} API key required for STT")));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model,
            provider,
        })
    }

    /// Transcribe WAV bytes to text
    ///
    /// # Errors
    ///
    /// Returns error if transcription fails
    pub fn transcribe(&self, audio: &[u8]) -> Result<String> {
        match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(audio),
            SttProvider::Deepgram => self.transcribe_deepgram(audio),
        }
    }

    fn transcribe_whisper(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let form = reqwest::blocking::multipart::Form::new()
            .part(
                "file",
                reqwest::blocking::multipart::Part::bytes(audio.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/transcriptions")
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json()?;
        tracing::debug!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }

    fn transcribe_deepgram(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Deepgram transcription");

        let url = format!(
            "https://api.deepgram.com/v1/listen?model={}&punctuate=true",
            self.model
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.api_key.expose_secret()))
            .header("Content-Type", "audio/wav")
            .body(audio.to_vec())
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(Error::Stt(format!("Deepgram API error {status}: {body}")));
        }

        let result: DeepgramResponse = response.json()?;
        let transcript = result
            .results
            .channels
            .first()
            .and_then(|c| c.alternatives.first())
            .map(|a| a.transcript.clone())
            .unwrap_or_default();

        tracing::debug!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }
}

/// Segmenting recognizer backed by a hosted STT API
pub struct CloudRecognizer {
    stt: Arc<SpeechToText>,
    vad: EnergyVad,
    segment_silence_frames: usize,
    max_segment_frames: usize,
}

impl CloudRecognizer {
    /// Create a recognizer
    ///
    /// A segment is sent for transcription after `segment_silence_frames`
    /// consecutive silent frames, or once it reaches `max_segment_frames`.
    #[must_use]
    pub fn new(
        stt: SpeechToText,
        vad: EnergyVad,
        segment_silence_frames: usize,
        max_segment_frames: usize,
    ) -> Self {
        Self {
            stt: Arc::new(stt),
            vad,
            segment_silence_frames: segment_silence_frames.max(1),
            max_segment_frames: max_segment_frames.max(1),
        }
    }
}

impl Recognizer for CloudRecognizer {
    fn new_context(&self, sample_rate: u32) -> Result<Box<dyn RecognitionContext>> {
        if sample_rate == 0 {
            return Err(Error::Config("sample rate must be positive".to_string()));
        }

        Ok(Box::new(CloudContext {
            transcriber: Box::new(Arc::clone(&self.stt)),
            segmenter: Segmenter::new(
                self.vad,
                self.segment_silence_frames,
                self.max_segment_frames,
            ),
            sample_rate,
        }))
    }
}

/// Something that turns WAV bytes into text
trait Transcribe {
    fn transcribe(&self, wav: &[u8]) -> Result<String>;
}

impl Transcribe for Arc<SpeechToText> {
    fn transcribe(&self, wav: &[u8]) -> Result<String> {
        SpeechToText::transcribe(self, wav)
    }
}

struct CloudContext {
    transcriber: Box<dyn Transcribe>,
    segmenter: Segmenter,
    sample_rate: u32,
}

impl CloudContext {
    fn transcribe(&self, samples: &[i16]) -> Result<String> {
        let wav = samples_to_wav(samples, self.sample_rate)?;
        let text = self.transcriber.transcribe(&wav)?;
        Ok(text.trim().to_string())
    }
}

impl RecognitionContext for CloudContext {
    fn accept(&mut self, frame: &AudioFrame) -> Result<Option<TranscriptEvent>> {
        let Some(segment) = self.segmenter.push(frame) else {
            return Ok(None);
        };

        let text = self.transcribe(&segment)?;
        if text.is_empty() {
            return Ok(None);
        }
        Ok(Some(TranscriptEvent::final_text(text, frame.captured_at())))
    }

    fn flush(&mut self) -> Result<String> {
        match self.segmenter.take() {
            Some(segment) => self.transcribe(&segment),
            None => Ok(String::new()),
        }
    }
}

/// Splits a frame stream into voiced segments
struct Segmenter {
    vad: EnergyVad,
    silence_frames: usize,
    max_frames: usize,
    pre_roll: Vec<i16>,
    segment: Vec<i16>,
    in_speech: bool,
    trailing_silence: usize,
    frames: usize,
}

impl Segmenter {
    const fn new(vad: EnergyVad, silence_frames: usize, max_frames: usize) -> Self {
        Self {
            vad,
            silence_frames,
            max_frames,
            pre_roll: Vec::new(),
            segment: Vec::new(),
            in_speech: false,
            trailing_silence: 0,
            frames: 0,
        }
    }

    /// Add a frame; returns a finished segment when speech has ended
    fn push(&mut self, frame: &AudioFrame) -> Option<Vec<i16>> {
        let decision = self.vad.classify(frame);

        if !self.in_speech {
            if !decision.is_voice {
                // Keep one frame of lead-in so word onsets aren't clipped
                self.pre_roll.clear();
                self.pre_roll.extend(frame.samples());
                return None;
            }
            self.in_speech = true;
            self.segment.append(&mut self.pre_roll);
            self.trailing_silence = 0;
            self.frames = 0;
        }

        self.segment.extend(frame.samples());
        self.frames += 1;
        if decision.is_voice {
            self.trailing_silence = 0;
        } else {
            self.trailing_silence += 1;
        }

        tracing::trace!(
            energy = decision.energy,
            frames = self.frames,
            silence = self.trailing_silence,
            "segmenting"
        );

        if self.trailing_silence >= self.silence_frames || self.frames >= self.max_frames {
            return self.take();
        }
        None
    }

    /// Take the in-progress segment, if speech was heard
    fn take(&mut self) -> Option<Vec<i16>> {
        self.pre_roll.clear();
        if !self.in_speech {
            return None;
        }
        self.in_speech = false;
        self.trailing_silence = 0;
        self.frames = 0;
        Some(std::mem::take(&mut self.segment))
    }
}
