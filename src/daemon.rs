//! Daemon - wires collaborators and runs the session engine
//!
//! The engine and every HTTP collaborator are blocking, so they run on a
//! dedicated blocking task. Ctrl-C only flips the shutdown flag; the control
//! loop notices it on its next iteration.

use std::sync::Arc;

use secrecy::SecretString;

use crate::clock::{Clock, SystemClock};
use crate::config::{Settings, TtsEngine};
use crate::reply::{ChatOptions, IntentRouter, OpenAiResponder, RateGate, ReplyService};
use crate::session::{SessionEngine, SessionParts, ShutdownSignal};
use crate::voice::{
    AudioPlayback, CloudRecognizer, CloudSpeaker, EnergyVad, EspeakSpeaker, FrameBuffer,
    MicrophoneSource, Speaker, SpeechToText, SttProvider, TextToSpeech, TtsProvider,
};
use crate::{Error, Result};

/// The NEPTR daemon
pub struct Daemon {
    settings: Settings,
}

impl Daemon {
    /// Create a daemon from resolved settings
    #[must_use]
    pub const fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Run until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if a required key, the audio device or any other
    /// startup resource is missing
    pub async fn run(self) -> Result<()> {
        let shutdown = ShutdownSignal::new();

        let signal = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
                signal.trigger();
            }
        });

        let settings = self.settings;
        tokio::task::spawn_blocking(move || run_session(&settings, &shutdown))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(format!("session task failed: {e}"))))?
    }
}

/// Build everything and drive the engine on the current thread
fn run_session(settings: &Settings, shutdown: &ShutdownSignal) -> Result<()> {
    let buffer = FrameBuffer::new(settings.audio.queue_capacity);
    let mut source = MicrophoneSource::new(settings.audio.sample_rate, settings.audio.frame_size)?;
    let parts = build_parts(settings)?;

    let mut engine = SessionEngine::new(settings, parts, buffer, Arc::new(SystemClock))?;
    tracing::info!(mode = ?settings.session.mode, "neptr ready - say \"hey neptr\"");
    engine.run(&mut source, shutdown)
}

/// Build the recognizer, speaker and responder named by `settings`
///
/// # Errors
///
/// Returns error if a collaborator's API key is missing or its client
/// cannot be created
pub fn build_parts(settings: &Settings) -> Result<SessionParts> {
    Ok(SessionParts {
        recognizer: Box::new(build_recognizer(settings)?),
        speaker: build_speaker(settings)?,
        responder: Box::new(build_responder(settings)?),
    })
}

/// Build the hosted speech recognizer
///
/// # Errors
///
/// Returns error if the provider's API key is missing
pub fn build_recognizer(settings: &Settings) -> Result<CloudRecognizer> {
    let key = match settings.stt.provider {
        SttProvider::Whisper => require(settings.api_keys.openai.as_ref(), "OPENAI_API_KEY")?,
        SttProvider::Deepgram => require(settings.api_keys.deepgram.as_ref(), "DEEPGRAM_API_KEY")?,
    };
    let stt = SpeechToText::new(settings.stt.provider, key, settings.stt.model.clone())?;
    tracing::debug!(provider = ?settings.stt.provider, model = %settings.stt.model, "recognizer ready");

    Ok(CloudRecognizer::new(
        stt,
        EnergyVad::new(settings.audio.vad_threshold),
        settings.stt.segment_silence_frames,
        settings.stt.max_segment_frames,
    ))
}

/// Build the configured speech output engine
///
/// # Errors
///
/// Returns error if a cloud engine's API key is missing or no output
/// device is available
pub fn build_speaker(settings: &Settings) -> Result<Box<dyn Speaker>> {
    let tts = &settings.tts;
    let (provider, key) = match tts.engine {
        TtsEngine::Espeak => {
            tracing::debug!(voice = %tts.espeak.voice, "using espeak-ng");
            return Ok(Box::new(EspeakSpeaker::new(tts.espeak.clone())));
        }
        TtsEngine::OpenAI => (
            TtsProvider::OpenAI,
            require(settings.api_keys.openai.as_ref(), "OPENAI_API_KEY")?,
        ),
        TtsEngine::ElevenLabs => (
            TtsProvider::ElevenLabs,
            require(settings.api_keys.elevenlabs.as_ref(), "ELEVENLABS_API_KEY")?,
        ),
    };

    let client = TextToSpeech::new(provider, key, tts.voice.clone(), tts.speed, tts.model.clone())?;
    let playback = AudioPlayback::new()?;
    tracing::debug!(?provider, voice = %tts.voice, "using cloud TTS");
    Ok(Box::new(CloudSpeaker::new(client, playback)))
}

/// Build the chat completions responder
///
/// # Errors
///
/// Returns error if the `OpenAI` key is missing
pub fn build_responder(settings: &Settings) -> Result<OpenAiResponder> {
    let key = require(settings.api_keys.openai.as_ref(), "OPENAI_API_KEY")?;
    let llm = &settings.llm;
    OpenAiResponder::new(
        key,
        ChatOptions {
            model: llm.model.clone(),
            max_tokens: llm.max_tokens,
            temperature: llm.temperature,
            system_prompt: llm.system_prompt.clone(),
            history_turns: llm.history_turns,
        },
    )
}

/// Build a standalone reply service, as used by typed chat
///
/// # Errors
///
/// Returns error if the responder cannot be built
pub fn build_reply_service(settings: &Settings, clock: Arc<dyn Clock>) -> Result<ReplyService> {
    Ok(ReplyService::new(
        IntentRouter::with_builtins()?,
        Box::new(build_responder(settings)?),
        RateGate::new(settings.llm.min_interval, settings.llm.backoff),
        clock,
        settings.personality.clone(),
    ))
}

fn require(key: Option<&SecretString>, name: &str) -> Result<SecretString> {
    key.cloned()
        .ok_or_else(|| Error::Config(format!("{name} is not set")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_openai_key_is_fatal() {
        let settings = Settings::default();
        let err = build_responder(&settings).err().unwrap();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
        assert!(build_recognizer(&settings).is_err());
    }

    #[test]
    fn test_deepgram_needs_its_own_key() {
        let mut settings = Settings::default();
        settings.stt.provider = SttProvider::Deepgram;
        settings.api_keys.openai = Some(SecretString::from("sk-test".to_string()));
        let err = build_recognizer(&settings).err().unwrap();
        assert!(err.to_string().contains("DEEPGRAM_API_KEY"));
    }

    #[test]
    fn test_espeak_needs_no_key() {
        let mut settings = Settings::default();
        settings.tts.engine = TtsEngine::Espeak;
        assert!(build_speaker(&settings).is_ok());
    }
}
