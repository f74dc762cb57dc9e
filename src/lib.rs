//! Tutor Assistant - a voice-capable teaching assistant
//!
//! This library provides the turn pipeline behind the `tutor` binary:
//! - Input normalization (typed text or recognized speech)
//! - Streaming chat completions with a per-session remote context
//! - Per-user transcript persistence
//! - Language detection and spoken replies
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                   Front end (CLI)                      │
//! │        text  │  microphone  │  audio file              │
//! └──────────────────────────┬────────────────────────────┘
//!                            │ TurnInput
//! ┌──────────────────────────▼────────────────────────────┐
//! │                  TurnOrchestrator                      │
//! │  normalize → detect → send → aggregate → persist → tts │
//! └───────┬──────────────┬──────────────┬─────────────────┘
//!         │              │              │
//!   SpeechRecognizer  RemoteChat   TranscriptStore  SpeechSynthesizer
//! ```

pub mod assistant;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod input;
pub mod orchestrator;
pub mod session;
pub mod transcript;
pub mod voice;

pub use assistant::Assistant;
pub use chat::{CompletionProvider, FragmentStream, RemoteChat, aggregate};
pub use config::Config;
pub use db::{DbConn, DbPool, HistoryRepo, TranscriptStore};
pub use error::{Error, Result};
pub use input::{InputNormalizer, Normalized, TurnInput, Utterance};
pub use orchestrator::{TurnEvent, TurnOrchestrator, TurnOutcome, TurnReport, TurnState};
pub use session::{Session, UserIdentity};
pub use transcript::{PendingTurn, Role, Transcript, Turn};
