//! Configuration management for the tutor assistant
//!
//! Precedence is environment > TOML file > defaults. A `.env` file in the
//! working directory is loaded into the environment first.

pub mod file;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::chat::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::input::{DEFAULT_CAPTURE_TIMEOUT, DEFAULT_RECOGNITION_LOCALE};
use crate::voice::language::DEFAULT_LANGUAGE;
use crate::voice::{SttProvider, TtsProvider};
use crate::{Error, Result};

use file::TutorConfigFile;

/// Prompt that frames the remote chat as a tutor
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a patient teaching assistant. \
    Answer questions clearly and concisely, and reply in the language the question was asked in.";

/// Tutor assistant configuration
#[derive(Debug)]
pub struct Config {
    /// Completion provider settings
    pub completion: CompletionConfig,

    /// Persistence connection string
    pub database_url: SecretString,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// API keys for speech services
    pub api_keys: ApiKeys,

    /// Synthesis language when detection fails
    pub default_language: String,
}

/// Streaming completion settings
#[derive(Debug)]
pub struct CompletionConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub model: String,
    pub system_prompt: Option<String>,
}

/// Voice processing configuration
#[derive(Debug)]
pub struct VoiceConfig {
    /// Enable voice input and spoken replies
    pub enabled: bool,

    pub stt_provider: SttProvider,

    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: String,

    /// Locale hinted to recognition
    pub recognition_locale: String,

    /// Bound on waiting for a spoken utterance
    pub capture_timeout: Duration,

    pub tts_provider: TtsProvider,

    /// TTS model (e.g. "tts-1", "eleven_multilingual_v2")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f64,
}

/// API keys for speech services
#[derive(Debug, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper and TTS)
    pub openai: Option<SecretString>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<SecretString>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<SecretString>,
}

impl Config {
    /// Load configuration from `.env`, the environment, and the config file
    ///
    /// # Errors
    ///
    /// Returns `Error::StartupConfigMissing` if a required credential is absent
    pub fn load() -> Result<Self> {
        Self::load_with_options(false)
    }

    /// Load configuration with explicit voice disable option
    ///
    /// # Errors
    ///
    /// Returns `Error::StartupConfigMissing` if a required credential is absent
    pub fn load_with_options(disable_voice: bool) -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "failed to read .env"),
        }

        let fc = file::load_config_file();
        Self::from_sources(|name| std::env::var(name).ok(), fc, disable_voice)
    }

    /// Build configuration from an environment lookup and a parsed file
    ///
    /// # Errors
    ///
    /// Returns `Error::StartupConfigMissing` if a required credential is
    /// absent, or `Error::Config` if a setting cannot be parsed
    pub fn from_sources<F>(env: F, fc: TutorConfigFile, disable_voice: bool) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        // Required credentials (env > toml)
        let api_key = non_empty("TUTOR_API_KEY")
            .or_else(|| non_empty("OPENAI_API_KEY"))
            .or(fc.completion.api_key)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                Error::StartupConfigMissing(
                    "completion API key (set TUTOR_API_KEY or OPENAI_API_KEY)".to_string(),
                )
            })?;

        let database_url = non_empty("TUTOR_DATABASE_URL")
            .or(fc.storage.database_url)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                Error::StartupConfigMissing(
                    "persistence connection string (set TUTOR_DATABASE_URL)".to_string(),
                )
            })?;

        let completion = CompletionConfig {
            base_url: non_empty("TUTOR_BASE_URL")
                .or(fc.completion.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: non_empty("TUTOR_MODEL")
                .or(fc.completion.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            system_prompt: Some(
                non_empty("TUTOR_SYSTEM_PROMPT")
                    .or(fc.completion.system_prompt)
                    .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            ),
            api_key: SecretString::from(api_key),
        };

        // Whisper and OpenAI TTS share the completion key unless overridden
        let api_keys = ApiKeys {
            openai: non_empty("OPENAI_API_KEY")
                .or(fc.api_keys.openai)
                .map(SecretString::from)
                .or_else(|| {
                    Some(SecretString::from(
                        completion.api_key.expose_secret().to_string(),
                    ))
                }),
            elevenlabs: non_empty("ELEVENLABS_API_KEY")
                .or(fc.api_keys.elevenlabs)
                .map(SecretString::from),
            deepgram: non_empty("DEEPGRAM_API_KEY")
                .or(fc.api_keys.deepgram)
                .map(SecretString::from),
        };

        let stt_name = non_empty("TUTOR_STT_PROVIDER")
            .or(fc.voice.stt_provider)
            .unwrap_or_else(|| "whisper".to_string());
        let stt_provider = SttProvider::from_name(&stt_name)
            .ok_or_else(|| Error::Config(format!("unknown STT provider: {stt_name}")))?;

        let tts_name = non_empty("TUTOR_TTS_PROVIDER")
            .or(fc.voice.tts_provider)
            .unwrap_or_else(|| "openai".to_string());
        let tts_provider = TtsProvider::from_name(&tts_name)
            .ok_or_else(|| Error::Config(format!("unknown TTS provider: {tts_name}")))?;

        let capture_timeout = match non_empty("TUTOR_CAPTURE_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map(Duration::from_secs).map_err(|e| {
                Error::Config(format!("invalid TUTOR_CAPTURE_TIMEOUT_SECS '{raw}': {e}"))
            })?,
            None => fc
                .voice
                .capture_timeout_secs
                .map_or(DEFAULT_CAPTURE_TIMEOUT, Duration::from_secs),
        };

        let tts_speed = match non_empty("TUTOR_TTS_SPEED") {
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .map_err(|e| Error::Config(format!("invalid TUTOR_TTS_SPEED '{raw}': {e}")))?,
            None => fc.voice.tts_speed.unwrap_or(1.0),
        };

        let (default_stt_model, default_tts_model, default_tts_voice) =
            provider_defaults(stt_provider, tts_provider);

        let mut voice = VoiceConfig {
            enabled: !disable_voice && fc.voice.enabled.unwrap_or(true),
            stt_provider,
            stt_model: non_empty("TUTOR_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| default_stt_model.to_string()),
            recognition_locale: non_empty("TUTOR_RECOGNITION_LOCALE")
                .or(fc.voice.recognition_locale)
                .unwrap_or_else(|| DEFAULT_RECOGNITION_LOCALE.to_string()),
            capture_timeout,
            tts_provider,
            tts_model: non_empty("TUTOR_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| default_tts_model.to_string()),
            tts_voice: non_empty("TUTOR_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or_else(|| default_tts_voice.to_string()),
            tts_speed: tts_speed.clamp(0.25, 4.0),
        };

        if disable_voice {
            tracing::info!("voice explicitly disabled via --disable-voice");
        } else if voice.enabled {
            if let Some(missing) = missing_voice_key(&voice, &api_keys) {
                tracing::warn!(missing, "voice disabled: speech API key not configured");
                voice.enabled = false;
            }
        }

        let default_language = non_empty("TUTOR_DEFAULT_LANGUAGE")
            .or(fc.default_language)
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        Ok(Self {
            completion,
            database_url: SecretString::from(database_url),
            voice,
            api_keys,
            default_language,
        })
    }
}

const fn provider_defaults(
    stt: SttProvider,
    tts: TtsProvider,
) -> (&'static str, &'static str, &'static str) {
    let stt_model = match stt {
        SttProvider::Whisper => "whisper-1",
        SttProvider::Deepgram => "nova-2",
    };
    let (tts_model, tts_voice) = match tts {
        TtsProvider::OpenAI => ("tts-1", "alloy"),
        // "Rachel", a stock multilingual voice
        TtsProvider::ElevenLabs => ("eleven_multilingual_v2", "21m00Tcm4TlvDq8ikWAM"),
    };
    (stt_model, tts_model, tts_voice)
}

/// Name of the first key the configured voice providers lack
fn missing_voice_key(voice: &VoiceConfig, keys: &ApiKeys) -> Option<&'static str> {
    let stt_missing = match voice.stt_provider {
        SttProvider::Whisper => keys.openai.is_none().then_some("OPENAI_API_KEY"),
        SttProvider::Deepgram => keys.deepgram.is_none().then_some("DEEPGRAM_API_KEY"),
    };
    let tts_missing = match voice.tts_provider {
        TtsProvider::OpenAI => keys.openai.is_none().then_some("OPENAI_API_KEY"),
        TtsProvider::ElevenLabs => keys.elevenlabs.is_none().then_some("ELEVENLABS_API_KEY"),
    };
    stt_missing.or(tts_missing)
}
