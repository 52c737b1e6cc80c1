//! TOML configuration file loading
//!
//! Supports `~/.config/neptr/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NeptrConfigFile {
    /// Audio capture configuration
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// Session timing and mode
    #[serde(default)]
    pub session: SessionFileConfig,

    /// Wake phrase vocabulary
    #[serde(default)]
    pub wake: WakeFileConfig,

    /// Speech recognition
    #[serde(default)]
    pub stt: SttFileConfig,

    /// Speech output
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// Response generator
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Personality phrases
    #[serde(default)]
    pub personality: PersonalityFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Audio capture configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    pub sample_rate: Option<u32>,
    /// Samples per frame
    pub block_size: Option<usize>,
    /// Frames the hand-off queue holds before dropping the oldest
    pub queue_capacity: Option<usize>,
    /// RMS threshold separating voice from silence
    pub rms_silence_threshold: Option<f32>,
    pub poll_timeout_ms: Option<u64>,
}

/// Session timing and mode
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    /// "conversation" or "command"
    pub mode: Option<String>,
    pub command_timeout_ms: Option<u64>,
    pub silence_window_ms: Option<u64>,
    pub debounce_window_ms: Option<u64>,
    pub idle_timeout_ms: Option<u64>,
    pub guard_margin_ms: Option<u64>,
    pub settle_delay_ms: Option<u64>,
    pub goodbye_phrases: Option<Vec<String>>,
}

/// Wake phrase vocabulary
#[derive(Debug, Default, Deserialize)]
pub struct WakeFileConfig {
    pub triggers: Option<Vec<String>>,
    pub lead_words: Option<Vec<String>>,
    pub variants: Option<Vec<String>>,
}

/// Speech recognition
#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    /// "whisper" or "deepgram"
    pub provider: Option<String>,
    pub model: Option<String>,
    pub segment_silence_frames: Option<usize>,
    pub max_segment_frames: Option<usize>,
}

/// Speech output
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    /// "espeak", "openai" or "elevenlabs"
    pub engine: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub speed: Option<f32>,
    pub espeak_speed: Option<u32>,
    pub espeak_pitch: Option<u32>,
    pub espeak_gap: Option<u32>,
    pub espeak_voice: Option<String>,
}

/// Response generator
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub rate_limit_seconds: Option<f64>,
    pub rate_limit_backoff_seconds: Option<f64>,
    pub history_turns: Option<usize>,
    pub system_prompt: Option<String>,
}

/// Personality phrases
#[derive(Debug, Default, Deserialize)]
pub struct PersonalityFileConfig {
    pub name: Option<String>,
    pub greetings: Option<Vec<String>>,
    pub farewells: Option<Vec<String>>,
    pub timeout_farewells: Option<Vec<String>>,
    pub apologies: Option<Vec<String>>,
    pub not_heard: Option<Vec<String>>,
    pub jokes: Option<Vec<String>>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub elevenlabs: Option<String>,
    pub deepgram: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `NeptrConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> NeptrConfigFile {
    let Some(path) = config_file_path() else {
        return NeptrConfigFile::default();
    };

    if !path.exists() {
        return NeptrConfigFile::default();
    }

    match read_config_file(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            NeptrConfigFile::default()
        }
    }
}

/// Read and parse a specific config file
///
/// # Errors
///
/// Returns error if the file cannot be read or parsed
pub fn read_config_file(path: &Path) -> Result<NeptrConfigFile> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Return the config file path: `~/.config/neptr/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("neptr").join("config.toml"))
}
