//! Error types for Neptr

use thiserror::Error;

/// Result type alias for Neptr operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice session engine and its collaborators
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device or stream error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Recognition context error (a single frame could not be recognized)
    #[error("recognizer error: {0}")]
    Recognizer(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid intent pattern
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}
