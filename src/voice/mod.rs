//! Voice processing module
//!
//! Audio capture and frame hand-off, voice activity detection, wake phrase
//! matching, and the STT/TTS collaborators the session engine drives.

mod buffer;
mod capture;
mod frame;
mod playback;
mod stt;
mod tts;
mod vad;
mod wake_word;

pub use buffer::{DEFAULT_CAPACITY, FrameBuffer};
pub use capture::{AudioSource, FRAME_SIZE, MicrophoneSource, SAMPLE_RATE, samples_to_wav};
pub use frame::AudioFrame;
pub use playback::{AudioPlayback, DecodedAudio};
pub use stt::{
    CloudRecognizer, RecognitionContext, Recognizer, SpeechToText, SttProvider, TranscriptEvent,
};
pub use tts::{CloudSpeaker, EspeakSpeaker, EspeakVoice, Speaker, TextToSpeech, TtsProvider};
pub use vad::{DEFAULT_THRESHOLD, EnergyVad, VadDecision};
pub(crate) use wake_word::tokenize;
pub use wake_word::{WakeMatch, WakeWordMatcher};
