//! TOML configuration file loading
//!
//! Supports `~/.config/tutor/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct TutorConfigFile {
    /// Completion provider configuration
    #[serde(default)]
    pub completion: CompletionFileConfig,

    /// Persistence configuration
    #[serde(default)]
    pub storage: StorageFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for speech services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Fallback language code for synthesis
    pub default_language: Option<String>,
}

/// Completion-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct CompletionFileConfig {
    pub api_key: Option<String>,

    /// OpenAI-compatible base URL (e.g. "https://api.openai.com/v1")
    pub base_url: Option<String>,

    /// Model identifier (e.g. "gpt-4o-mini")
    pub model: Option<String>,

    pub system_prompt: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StorageFileConfig {
    /// `sqlite://<path>`, `sqlite::memory:`, or a bare path
    pub database_url: Option<String>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable voice input/output
    pub enabled: Option<bool>,

    /// STT provider ("whisper" or "deepgram")
    pub stt_provider: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// Locale hinted to recognition (e.g. "en-US")
    pub recognition_locale: Option<String>,

    /// Seconds to wait for a spoken utterance
    pub capture_timeout_secs: Option<u64>,

    /// TTS provider ("openai" or "elevenlabs")
    pub tts_provider: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f64>,
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
/// Returns `TutorConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> TutorConfigFile {
    config_file_path().map_or_else(TutorConfigFile::default, |path| load_from(&path))
}

/// Load a config file from `path`, falling back to defaults
pub fn load_from(path: &Path) -> TutorConfigFile {
    if !path.exists() {
        return TutorConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                TutorConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            TutorConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/tutor/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("tutor").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_partial_file() {
        let file: TutorConfigFile = toml::from_str(
            r#"
            default_language = "de"

            [completion]
            model = "gpt-4o"

            [voice]
            tts_provider = "elevenlabs"
            capture_timeout_secs = 12
            "#,
        )
        .unwrap();

        assert_eq!(file.default_language.as_deref(), Some("de"));
        assert_eq!(file.completion.model.as_deref(), Some("gpt-4o"));
        assert_eq!(file.voice.capture_timeout_secs, Some(12));
        assert!(file.storage.database_url.is_none());
    }

    #[test]
    fn test_missing_or_broken_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let missing = load_from(&dir.path().join("nope.toml"));
        assert!(missing.completion.model.is_none());

        let broken = dir.path().join("config.toml");
        std::fs::write(&broken, "this is = = not toml").unwrap();
        assert!(load_from(&broken).voice.enabled.is_none());
    }
}
