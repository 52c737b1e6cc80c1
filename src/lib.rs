//! NEPTR - voice interaction session engine
//!
//! This library provides the pieces of a wake-word voice assistant:
//! - Audio capture into a bounded frame buffer
//! - Energy-based voice activity detection and wake phrase matching
//! - Single-shot command capture and multi-turn conversation sessions
//! - Self-hearing suppression while the assistant speaks
//! - Replies from built-in intents or a rate-gated LLM
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  push   ┌─────────────┐  pop   ┌──────────────────────┐
//! │ Audio source ├────────►│ FrameBuffer ├───────►│    SessionEngine     │
//! │  (callback)  │         │ drop-oldest │        │ VAD · wake · capture │
//! └──────────────┘         └─────────────┘        │ conversation · guard │
//!                                                 └──────────┬───────────┘
//!                                                            │
//!                          ┌─────────────────────────────────┼──────────┐
//!                          ▼                                 ▼          ▼
//!                     Recognizer                       ReplyService   Speaker
//!                 (Whisper / Deepgram)               (intents + LLM)  (TTS)
//! ```

pub mod clock;
pub mod config;
pub mod daemon;
pub mod error;
pub mod reply;
pub mod session;
pub mod voice;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Settings;
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use reply::{ProviderError, ReplyService, ResponseGenerator};
pub use session::{SessionEngine, SessionMode, SessionParts, SessionState, ShutdownSignal};
