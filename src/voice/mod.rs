//! Voice processing module
//!
//! Handles microphone capture with end-of-utterance detection, hosted
//! speech recognition and synthesis, language identification, and playback.

mod capture;
mod clip;
mod endpoint;
pub mod language;
mod playback;
mod stt;
mod tts;

pub use capture::{AudioCapture, MicrophoneCapture, SAMPLE_RATE, SpeechCapture, samples_to_wav};
pub use clip::{AudioClip, AudioFormat};
pub use endpoint::{EndpointDetector, EndpointState, calculate_energy};
pub use language::{LanguageDetector, WhatlangDetector, detect_or_default};
pub use playback::AudioPlayback;
pub use stt::{SpeechRecognizer, SpeechToText, SttProvider};
pub use tts::{SpeechSynthesizer, TextToSpeech, TtsProvider};
