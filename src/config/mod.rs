//! Configuration management for NEPTR
//!
//! Settings are resolved once at startup: built-in defaults, then the TOML
//! file, then environment variables.

pub mod file;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use self::file::NeptrConfigFile;
use crate::voice::{DEFAULT_CAPACITY, DEFAULT_THRESHOLD, EspeakVoice, FRAME_SIZE, SAMPLE_RATE, SttProvider};
use crate::{Error, Result};

/// What happens after the wake phrase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionMode {
    /// Multi-turn conversation until goodbye or idle timeout
    #[default]
    Conversation,
    /// One command, one reply, back to listening
    Command,
}

impl FromStr for SessionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "conversation" | "conversing" | "multi" => Ok(Self::Conversation),
            "command" | "single" | "single-shot" => Ok(Self::Command),
            other => Err(Error::Config(format!("unknown session mode: {other}"))),
        }
    }
}

/// Which speech output engine to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TtsEngine {
    /// Local `espeak-ng` binary
    Espeak,
    /// `OpenAI` speech API
    #[default]
    OpenAI,
    /// `ElevenLabs` speech API
    ElevenLabs,
}

impl FromStr for TtsEngine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "espeak" | "espeak-ng" => Ok(Self::Espeak),
            "openai" => Ok(Self::OpenAI),
            "elevenlabs" => Ok(Self::ElevenLabs),
            other => Err(Error::Config(format!("unknown TTS engine: {other}"))),
        }
    }
}

fn parse_stt_provider(s: &str) -> Result<SttProvider> {
    match s.trim().to_lowercase().as_str() {
        "whisper" | "openai" => Ok(SttProvider::Whisper),
        "deepgram" => Ok(SttProvider::Deepgram),
        other => Err(Error::Config(format!("unknown STT provider: {other}"))),
    }
}

/// NEPTR configuration
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Audio capture
    pub audio: AudioSettings,

    /// Session timing and mode
    pub session: SessionSettings,

    /// Wake phrase vocabulary
    pub wake: WakeSettings,

    /// Speech recognition
    pub stt: SttSettings,

    /// Speech output
    pub tts: TtsSettings,

    /// Response generator
    pub llm: LlmSettings,

    /// Canned phrases and name
    pub personality: Personality,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Audio capture configuration
#[derive(Debug, Clone)]
pub struct AudioSettings {
    pub sample_rate: u32,
    /// Samples per frame
    pub frame_size: usize,
    pub queue_capacity: usize,
    /// RMS energy above which a frame counts as voice
    pub vad_threshold: f32,
    /// How long a single buffer read waits before the loop re-checks timers
    pub poll_timeout: Duration,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            frame_size: FRAME_SIZE,
            queue_capacity: DEFAULT_CAPACITY,
            vad_threshold: DEFAULT_THRESHOLD,
            poll_timeout: Duration::from_millis(100),
        }
    }
}

/// Session timing configuration
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub mode: SessionMode,
    /// Longest a single-shot command capture may run
    pub command_timeout: Duration,
    /// Trailing silence that ends a single-shot command
    pub silence_window: Duration,
    /// Quiet time after the last fragment before a conversation turn is flushed
    pub debounce: Duration,
    /// Silence that abandons a conversation
    pub idle_timeout: Duration,
    /// How long after speech ends frames are still ignored
    pub guard_margin: Duration,
    /// Pause after speech before stale audio is drained
    pub settle_delay: Duration,
    /// Whole-phrase closings that end a conversation
    pub goodbye_phrases: Vec<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            mode: SessionMode::default(),
            command_timeout: Duration::from_secs(8),
            silence_window: Duration::from_millis(1200),
            debounce: Duration::from_millis(800),
            idle_timeout: Duration::from_secs(30),
            guard_margin: Duration::from_millis(500),
            settle_delay: Duration::from_millis(300),
            goodbye_phrases: strings(&[
                "goodbye",
                "good bye",
                "bye",
                "bye bye",
                "bye neptr",
                "goodbye neptr",
                "see you later",
                "that's all",
                "that is all",
                "stop listening",
                "go to sleep",
            ]),
        }
    }
}

/// Wake phrase vocabulary
#[derive(Debug, Clone)]
pub struct WakeSettings {
    /// Phrases matched by substring containment
    pub triggers: Vec<String>,
    /// Greeting words that can precede a misheard name
    pub lead_words: Vec<String>,
    /// Mishearings of the assistant's name
    pub variants: Vec<String>,
}

impl Default for WakeSettings {
    fn default() -> Self {
        // Greeting plus name pairs are left to the token-bounded fuzzy pass
        Self {
            triggers: strings(&[
                "neptr",
                "nepter",
                "nectar",
                "wake up neptr",
                "neptr wake up",
                "activate neptr",
                "start neptr",
                "robot assistant",
                "neptar",
                "neptor",
                "neptur",
                "nefter",
                "nefther",
                "nepther",
                "neptir",
            ]),
            lead_words: strings(&["hello", "hey", "hi"]),
            variants: strings(&[
                "neptr", "nepter", "nectar", "after", "nefter", "nefther", "nepther", "neptar",
                "neptor", "neptur", "neptir", "robot", "assistant",
            ]),
        }
    }
}

/// Speech recognition configuration
#[derive(Debug, Clone)]
pub struct SttSettings {
    pub provider: SttProvider,
    pub model: String,
    /// Silent frames that close a recognizer segment
    pub segment_silence_frames: usize,
    /// Longest segment before it is transcribed regardless of silence
    pub max_segment_frames: usize,
}

impl Default for SttSettings {
    fn default() -> Self {
        Self {
            provider: SttProvider::Whisper,
            model: "whisper-1".to_string(),
            segment_silence_frames: 2,
            max_segment_frames: 60,
        }
    }
}

/// Speech output configuration
#[derive(Debug, Clone)]
pub struct TtsSettings {
    pub engine: TtsEngine,
    /// Cloud TTS model
    pub model: String,
    /// Cloud TTS voice
    pub voice: String,
    pub speed: f32,
    /// Local `espeak-ng` voice
    pub espeak: EspeakVoice,
}

impl Default for TtsSettings {
    fn default() -> Self {
        Self {
            engine: TtsEngine::default(),
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            speed: 1.0,
            espeak: EspeakVoice {
                speed: 175,
                pitch: 35,
                word_gap: 5,
                voice: "en-us".to_string(),
            },
        }
    }
}

/// Response generator configuration
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Minimum time between provider calls
    pub min_interval: Duration,
    /// Wait after a rate-limited response without `Retry-After`
    pub backoff: Duration,
    /// Exchanges remembered within one conversation
    pub history_turns: usize,
    pub system_prompt: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            max_tokens: 300,
            temperature: 0.8,
            min_interval: Duration::from_secs(1),
            backoff: Duration::from_secs(5),
            history_turns: 5,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are NEPTR (Not Evil Pie-Throwing Robot), a cheerful, \
loyal robot who loves throwing pies and the number pi. Speak with enthusiastic robot charm, \
keep answers short enough to say out loud in a few sentences, and never use markdown or lists. \
You can answer any question and help with any task.";

/// Name and canned phrases
#[derive(Debug, Clone)]
pub struct Personality {
    pub name: String,
    /// Spoken after the wake phrase
    pub greetings: Vec<String>,
    /// Spoken when the user says goodbye
    pub farewells: Vec<String>,
    /// Spoken when a conversation is abandoned
    pub timeout_farewells: Vec<String>,
    /// Spoken when a reply could not be produced
    pub apologies: Vec<String>,
    /// Spoken when a command capture heard nothing
    pub not_heard: Vec<String>,
    pub jokes: Vec<String>,
}

impl Default for Personality {
    fn default() -> Self {
        Self {
            name: "NEPTR".to_string(),
            greetings: strings(&[
                "Hello! I am N.E.P.T.R., your friendly pie-throwing robot!",
                "Greetings! N.E.P.T.R. at your service!",
                "Hello there! Ready to help with whatever you need!",
                "Hi! I'm Neptr, your robot companion!",
                "Greetings, friend! How can I assist you today?",
            ]),
            farewells: strings(&[
                "Goodbye! It was great chatting with you!",
                "Farewell, friend! Call me if you need a pie!",
                "Powering down my listening circuits. Goodbye!",
            ]),
            timeout_farewells: strings(&[
                "I haven't heard from you in a while. Going back to standby!",
                "Nobody there? I'll be waiting right here. Beep boop!",
            ]),
            apologies: strings(&[
                "I'm having trouble processing that. One more time?",
                "Sorry, my circuits are a bit fuzzy. Can you repeat?",
                "My thinking circuits hit a snag. Please try again!",
            ]),
            not_heard: strings(&[
                "I'm sorry, I didn't catch that. Could you repeat it?",
                "I didn't quite understand. Can you say that again?",
                "My audio receptors might be malfunctioning. Could you repeat?",
            ]),
            jokes: strings(&[
                "Why did the robot cross the road? Because it was programmed by a chicken!",
                "What do you call a robot that likes to throw pies? A Neptr!",
                "What's a robot's favorite type of music? Heavy metal!",
                "Why did the robot go to the doctor? Because it had a byte!",
                "Why did the robot go to the library? To check out some bytes!",
                "What's a robot's favorite dessert? Pi!",
            ]),
        }
    }
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` key (chat, Whisper and TTS)
    pub openai: Option<SecretString>,
    /// `ElevenLabs` key
    pub elevenlabs: Option<SecretString>,
    /// Deepgram key
    pub deepgram: Option<SecretString>,
}

impl Settings {
    /// Load configuration from the config file and environment
    ///
    /// With `path`, that file must exist and parse. Without it, the standard
    /// config path is used when present.
    ///
    /// # Errors
    ///
    /// Returns error if an explicit config file is unreadable or any value is invalid
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => file::read_config_file(path)?,
            None => file::load_config_file(),
        };

        let settings = Self::from_sources(file, |key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Resolve settings from a parsed config file and an environment lookup
    ///
    /// Environment values win over file values, which win over defaults.
    ///
    /// # Errors
    ///
    /// Returns error if an enumerated value (mode, engine, provider) is unknown
    pub fn from_sources(file: NeptrConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let mut s = Self::default();

        let audio = file.audio;
        set(&mut s.audio.sample_rate, audio.sample_rate);
        set(&mut s.audio.frame_size, audio.block_size);
        set(&mut s.audio.queue_capacity, audio.queue_capacity);
        set(&mut s.audio.vad_threshold, audio.rms_silence_threshold);
        set(&mut s.audio.poll_timeout, audio.poll_timeout_ms.map(Duration::from_millis));

        let session = file.session;
        if let Some(mode) = env("NEPTR_MODE").or(session.mode) {
            s.session.mode = mode.parse()?;
        }
        set(&mut s.session.command_timeout, session.command_timeout_ms.map(Duration::from_millis));
        set(&mut s.session.silence_window, session.silence_window_ms.map(Duration::from_millis));
        set(&mut s.session.debounce, session.debounce_window_ms.map(Duration::from_millis));
        set(&mut s.session.idle_timeout, session.idle_timeout_ms.map(Duration::from_millis));
        set(&mut s.session.guard_margin, session.guard_margin_ms.map(Duration::from_millis));
        set(&mut s.session.settle_delay, session.settle_delay_ms.map(Duration::from_millis));
        set(&mut s.session.goodbye_phrases, session.goodbye_phrases);

        let wake = file.wake;
        set(&mut s.wake.triggers, wake.triggers);
        set(&mut s.wake.lead_words, wake.lead_words);
        set(&mut s.wake.variants, wake.variants);
        s.wake.triggers = dedup(std::mem::take(&mut s.wake.triggers));

        let stt = file.stt;
        if let Some(provider) = env("NEPTR_STT_PROVIDER").or(stt.provider) {
            s.stt.provider = parse_stt_provider(&provider)?;
        }
        if s.stt.provider == SttProvider::Deepgram && stt.model.is_none() {
            s.stt.model = "nova-2".to_string();
        }
        set(&mut s.stt.model, stt.model);
        set(&mut s.stt.segment_silence_frames, stt.segment_silence_frames);
        set(&mut s.stt.max_segment_frames, stt.max_segment_frames);

        let tts = file.tts;
        if let Some(engine) = env("NEPTR_TTS_ENGINE").or(tts.engine) {
            s.tts.engine = engine.parse()?;
        }
        if s.tts.engine == TtsEngine::ElevenLabs {
            if tts.model.is_none() {
                s.tts.model = "eleven_monolingual_v1".to_string();
            }
            if tts.voice.is_none() {
                s.tts.voice = "21m00Tcm4TlvDq8ikWAM".to_string();
            }
        }
        set(&mut s.tts.model, tts.model);
        set(&mut s.tts.voice, tts.voice);
        set(&mut s.tts.speed, tts.speed);
        set(&mut s.tts.espeak.speed, tts.espeak_speed);
        set(&mut s.tts.espeak.pitch, tts.espeak_pitch);
        set(&mut s.tts.espeak.word_gap, tts.espeak_gap);
        set(&mut s.tts.espeak.voice, tts.espeak_voice);

        let llm = file.llm;
        set(&mut s.llm.model, env("NEPTR_LLM_MODEL").or(llm.model));
        set(&mut s.llm.max_tokens, llm.max_tokens);
        set(&mut s.llm.temperature, llm.temperature);
        set(&mut s.llm.min_interval, seconds(llm.rate_limit_seconds)?);
        set(&mut s.llm.backoff, seconds(llm.rate_limit_backoff_seconds)?);
        set(&mut s.llm.history_turns, llm.history_turns);
        set(&mut s.llm.system_prompt, llm.system_prompt);

        let personality = file.personality;
        set(&mut s.personality.name, personality.name);
        set(&mut s.personality.greetings, personality.greetings);
        set(&mut s.personality.farewells, personality.farewells);
        set(&mut s.personality.timeout_farewells, personality.timeout_farewells);
        set(&mut s.personality.apologies, personality.apologies);
        set(&mut s.personality.not_heard, personality.not_heard);
        set(&mut s.personality.jokes, personality.jokes);

        let keys = file.api_keys;
        s.api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY").or(keys.openai).map(SecretString::from),
            elevenlabs: env("ELEVENLABS_API_KEY")
                .or(keys.elevenlabs)
                .map(SecretString::from),
            deepgram: env("DEEPGRAM_API_KEY").or(keys.deepgram).map(SecretString::from),
        };

        Ok(s)
    }

    /// Check settings for values the engine cannot run with
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(Error::Config("audio.sample_rate must be positive".to_string()));
        }
        if self.audio.frame_size == 0 {
            return Err(Error::Config("audio.block_size must be positive".to_string()));
        }
        if self.audio.queue_capacity == 0 {
            return Err(Error::Config("audio.queue_capacity must be positive".to_string()));
        }
        if self.wake.triggers.iter().all(|t| t.trim().is_empty()) {
            return Err(Error::Config("wake.triggers must not be empty".to_string()));
        }
        if self.session.debounce >= self.session.idle_timeout {
            return Err(Error::Config(format!(
                "session debounce ({:?}) must be shorter than idle timeout ({:?})",
                self.session.debounce, self.session.idle_timeout
            )));
        }
        if self.session.settle_delay > self.session.guard_margin {
            return Err(Error::Config(format!(
                "session settle delay ({:?}) must not exceed guard margin ({:?})",
                self.session.settle_delay, self.session.guard_margin
            )));
        }
        if self.session.debounce > self.session.silence_window {
            tracing::warn!(
                debounce_ms = self.session.debounce.as_millis(),
                silence_window_ms = self.session.silence_window.as_millis(),
                "conversation debounce is longer than the command silence window"
            );
        }
        Ok(())
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn seconds(value: Option<f64>) -> Result<Option<Duration>> {
    value
        .map(|secs| {
            Duration::try_from_secs_f64(secs)
                .map_err(|_| Error::Config(format!("invalid duration in seconds: {secs}")))
        })
        .transpose()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Lowercase, trim and drop repeats, keeping first occurrences in order
fn dedup(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let item = item.trim().to_lowercase();
        if !item.is_empty() && !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::from_sources(NeptrConfigFile::default(), |_| None).unwrap();
        settings.validate().unwrap();
        assert_eq!(settings.audio.sample_rate, 16000);
        assert_eq!(settings.audio.frame_size, 8000);
        assert_eq!(settings.session.command_timeout, Duration::from_secs(8));
        assert_eq!(settings.session.silence_window, Duration::from_millis(1200));
        assert_eq!(settings.llm.model, "gpt-4o");
        assert!(settings.api_keys.openai.is_none());
    }

    #[test]
    fn test_default_triggers_deduplicated() {
        let triggers = WakeSettings::default().triggers;
        let deduped = dedup(triggers.clone());
        assert_eq!(triggers, deduped);
        assert!(triggers.contains(&"neptr".to_string()));
        let wake = WakeSettings::default();
        for trigger in &triggers {
            let first = trigger.split_whitespace().next().unwrap_or_default();
            assert!(!wake.lead_words.iter().any(|lead| lead == first), "{trigger}");
        }
    }

    #[test]
    fn test_env_overrides_file() {
        let file: NeptrConfigFile = toml::from_str(
            r#"
            [session]
            mode = "conversation"
            [llm]
            model = "gpt-4o-mini"
            [api_keys]
            openai = "from-file"
            "#,
        )
        .unwrap();

        let settings = Settings::from_sources(
            file,
            env_from(&[("NEPTR_MODE", "command"), ("OPENAI_API_KEY", "from-env")]),
        )
        .unwrap();

        assert_eq!(settings.session.mode, SessionMode::Command);
        assert_eq!(settings.llm.model, "gpt-4o-mini");
        assert_eq!(
            settings.api_keys.openai.as_ref().map(|k| k.expose_secret()),
            Some("from-env")
        );
    }

    #[test]
    fn test_unknown_engine_rejected() {
        let result = Settings::from_sources(
            NeptrConfigFile::default(),
            env_from(&[("NEPTR_TTS_ENGINE", "piper")]),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_debounce_past_idle() {
        let mut settings = Settings::default();
        settings.session.debounce = Duration::from_secs(30);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_settle_past_margin() {
        let mut settings = Settings::default();
        settings.session.settle_delay = Duration::from_secs(1);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_triggers() {
        let mut settings = Settings::default();
        settings.wake.triggers.clear();
        assert!(settings.validate().is_err());
    }
}
