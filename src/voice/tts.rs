//! Text-to-speech (TTS) processing

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::AudioClip;
use crate::{Error, Result};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io/v1";

/// Languages the `OpenAI` speech models pronounce (ISO 639-1)
const OPENAI_LANGUAGES: &[&str] = &[
    "af", "ar", "az", "be", "bg", "bs", "ca", "cs", "cy", "da", "de", "el", "en", "es", "et",
    "fa", "fi", "fr", "gl", "he", "hi", "hr", "hu", "hy", "id", "is", "it", "ja", "kk", "kn",
    "ko", "lt", "lv", "mi", "mk", "mr", "ms", "nb", "ne", "nl", "no", "pl", "pt", "ro", "ru",
    "sk", "sl", "sr", "sv", "sw", "ta", "th", "tl", "tr", "uk", "ur", "vi", "zh",
];

/// Languages of the `ElevenLabs` multilingual model (ISO 639-1)
const ELEVENLABS_LANGUAGES: &[&str] = &[
    "ar", "bg", "cs", "da", "de", "el", "en", "es", "fi", "fr", "hi", "hr", "id", "it", "ja",
    "ko", "ms", "nl", "pl", "pt", "ro", "ru", "sk", "sv", "ta", "tl", "tr", "uk", "zh",
];

/// Renders reply text as speech
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` spoken in `language` (ISO 639-1)
    ///
    /// Empty text yields a silent clip.
    ///
    /// # Errors
    ///
    /// Returns `Error::SynthesisUnsupportedLocale` if no voice exists for the
    /// language, or a transport error if the backend fails
    async fn synthesize(&self, text: &str, language: &str) -> Result<AudioClip>;
}

/// TTS provider backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TtsProvider {
    OpenAI,
    ElevenLabs,
}

impl TtsProvider {
    /// Parse a provider name ("openai" or "elevenlabs")
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAI),
            "elevenlabs" => Some(Self::ElevenLabs),
            _ => None,
        }
    }

    const fn languages(self) -> &'static [&'static str] {
        match self {
            Self::OpenAI => OPENAI_LANGUAGES,
            Self::ElevenLabs => ELEVENLABS_LANGUAGES,
        }
    }

    /// Whether the backend has a voice for `language`
    #[must_use]
    pub fn supports(self, language: &str) -> bool {
        self.languages().contains(&normalize_language(language).as_str())
    }
}

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    voice: String,
    speed: f64,
    model: String,
    provider: TtsProvider,
    base_url: String,
}

impl TextToSpeech {
    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai(api_key: SecretString, voice: String, speed: f64, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice,
            speed,
            model,
            provider: TtsProvider::OpenAI,
            base_url: OPENAI_BASE_URL.to_string(),
        })
    }

    /// Create a new TTS instance using ElevenLabs
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_elevenlabs(api_key: SecretString, voice_id: String, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice: voice_id,
            speed: 1.0, // ElevenLabs doesn't use speed in the same way
            model,
            provider: TtsProvider::ElevenLabs,
            base_url: ELEVENLABS_BASE_URL.to_string(),
        })
    }

    /// Point the synthesizer at a different API host
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Synthesize using OpenAI TTS
    async fn synthesize_openai(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f64,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Audio(format!("OpenAI TTS error {status}: {body}")));
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Synthesize using ElevenLabs TTS
    async fn synthesize_elevenlabs(&self, text: &str, language: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
            language_code: &'a str,
        }

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
            language_code: language,
        };

        let response = self
            .client
            .post(format!("{}/text-to-speech/{}", self.base_url, self.voice))
            .header("xi-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Audio(format!("ElevenLabs TTS error {status}: {body}")));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str, language: &str) -> Result<AudioClip> {
        let language = normalize_language(language);

        if text.trim().is_empty() {
            return Ok(AudioClip::silent(&language));
        }

        if !self.provider.supports(&language) {
            tracing::warn!(language = %language, provider = ?self.provider, "no voice for language");
            return Err(Error::SynthesisUnsupportedLocale(language));
        }

        tracing::debug!(chars = text.len(), language = %language, "synthesizing reply");

        let audio = match self.provider {
            TtsProvider::OpenAI => self.synthesize_openai(text).await?,
            TtsProvider::ElevenLabs => self.synthesize_elevenlabs(text, &language).await?,
        };

        Ok(AudioClip::mp3(audio).with_language(&language))
    }
}

/// "zh-CN" -> "zh", "EN" -> "en"
fn normalize_language(language: &str) -> String {
    language
        .trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_normalized_codes() {
        assert!(TtsProvider::OpenAI.supports("en"));
        assert!(TtsProvider::OpenAI.supports("zh-CN"));
        assert!(TtsProvider::ElevenLabs.supports("DE"));
        assert!(!TtsProvider::OpenAI.supports("xx"));
        assert!(!TtsProvider::ElevenLabs.supports(""));
    }

    #[tokio::test]
    async fn test_empty_text_is_silent_without_backend_call() {
        // Unroutable base URL: any request would fail
        let tts = TextToSpeech::new_openai(
            SecretString::from("key".to_string()),
            "alloy".to_string(),
            1.0,
            "tts-1".to_string(),
        )
        .unwrap()
        .with_base_url("http://127.0.0.1:9");

        let clip = tts.synthesize("   ", "en").await.unwrap();
        assert!(clip.is_silent());
        assert_eq!(clip.language(), Some("en"));
    }

    #[tokio::test]
    async fn test_unsupported_language_is_rejected() {
        let tts = TextToSpeech::new_openai(
            SecretString::from("key".to_string()),
            "alloy".to_string(),
            1.0,
            "tts-1".to_string(),
        )
        .unwrap()
        .with_base_url("http://127.0.0.1:9");

        let err = tts.synthesize("Bonjour", "xx").await.unwrap_err();
        assert!(matches!(err, Error::SynthesisUnsupportedLocale(lang) if lang == "xx"));
    }
}
