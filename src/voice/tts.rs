//! Text-to-speech (TTS) processing
//!
//! [`Speaker`] is what the speaking guard drives. Every implementation
//! blocks until audio output has finished.

use std::process::Command;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use super::AudioPlayback;
use crate::{Error, Result};

/// Renders text as audible speech
pub trait Speaker {
    /// Speak `text`, returning once output completes
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or playback fails
    fn speak(&mut self, text: &str) -> Result<()>;
}

/// Local espeak-ng voice settings
#[derive(Debug, Clone)]
pub struct EspeakVoice {
    /// Words per minute
    pub speed: u32,
    /// Pitch (0-99, lower is deeper)
    pub pitch: u32,
    /// Gap between words in 10ms units
    pub word_gap: u32,
    /// Voice name (e.g. "en-us")
    pub voice: String,
}

/// Speaks through the `espeak-ng` command
pub struct EspeakSpeaker {
    voice: EspeakVoice,
    program: String,
}

impl EspeakSpeaker {
    /// Create a speaker using `espeak-ng` from `PATH`
    #[must_use]
    pub fn new(voice: EspeakVoice) -> Self {
        Self::with_program(voice, "espeak-ng")
    }

    /// Create a speaker using a specific espeak-compatible binary
    #[must_use]
    pub fn with_program(voice: EspeakVoice, program: impl Into<String>) -> Self {
        Self {
            voice,
            program: program.into(),
        }
    }
}

impl Speaker for EspeakSpeaker {
    fn speak(&mut self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }

        tracing::debug!(text, "speaking via espeak");
        let status = Command::new(&self.program)
            .arg("-s")
            .arg(self.voice.speed.to_string())
            .arg("-p")
            .arg(self.voice.pitch.to_string())
            .arg("-g")
            .arg(self.voice.word_gap.to_string())
            .arg("-v")
            .arg(&self.voice.voice)
            .arg(text)
            .status()
            .map_err(|e| Error::Tts(format!("failed to run {}: {e}", self.program)))?;

        if !status.success() {
            return Err(Error::Tts(format!("{} exited with {status}", self.program)));
        }
        Ok(())
    }
}

/// TTS provider backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TtsProvider {
    /// `OpenAI` speech API
    OpenAI,
    /// `ElevenLabs` speech API
    ElevenLabs,
}

/// Synthesizes speech from text over HTTP
pub struct TextToSpeech {
    client: reqwest::blocking::Client,
    api_key: SecretString,
    voice: String,
    speed: f32,
    model: String,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a new TTS client
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or the HTTP client cannot be built
    pub fn new(
        provider: TtsProvider,
        api_key: SecretString,
        voice: String,
        speed: f32,
        model: String,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(format!("{provider:?} API key required for TTS")));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key,
            voice,
            speed,
            model,
            provider,
        })
    }

    /// Synthesize text to MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        match self.provider {
            TtsProvider::OpenAI => self.synthesize_openai(text),
            TtsProvider::ElevenLabs => self.synthesize_elevenlabs(text),
        }
    }

    fn synthesize_openai(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        Ok(response.bytes()?.to_vec())
    }

    fn synthesize_elevenlabs(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!("https://api.elevenlabs.io/v1/text-to-speech/{}", self.voice);
        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(Error::Tts(format!("ElevenLabs TTS error {status}: {body}")));
        }

        Ok(response.bytes()?.to_vec())
    }
}

/// Speaks through a hosted TTS API and the default output device
pub struct CloudSpeaker {
    tts: TextToSpeech,
    playback: AudioPlayback,
}

impl CloudSpeaker {
    /// Pair a TTS client with a playback device
    #[must_use]
    pub const fn new(tts: TextToSpeech, playback: AudioPlayback) -> Self {
        Self { tts, playback }
    }
}

impl Speaker for CloudSpeaker {
    fn speak(&mut self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }

        tracing::debug!(text, "speaking via cloud TTS");
        let audio = self.tts.synthesize(text)?;
        self.playback.play_mp3(&audio)
    }
}
