//! Speech-to-text (STT) processing

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};

use super::AudioClip;
use crate::{Error, Result};

const WHISPER_BASE_URL: &str = "https://api.openai.com/v1";
const DEEPGRAM_BASE_URL: &str = "https://api.deepgram.com/v1";

/// Turns recorded speech into text
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Recognize `clip`, hinting the spoken `locale` (e.g. "en-US")
    ///
    /// # Errors
    ///
    /// Returns `Error::RecognitionAmbiguous` when nothing intelligible was
    /// heard and `Error::RecognitionUnavailable` when the service cannot be used
    async fn recognize(&self, clip: &AudioClip, locale: &str) -> Result<String>;
}

/// Response from OpenAI Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// STT provider backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SttProvider {
    Whisper,
    Deepgram,
}

impl SttProvider {
    /// Parse a provider name ("whisper" or "deepgram")
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "whisper" | "openai" => Some(Self::Whisper),
            "deepgram" => Some(Self::Deepgram),
            _ => None,
        }
    }
}

/// Transcribes speech through a hosted STT API
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    provider: SttProvider,
    base_url: String,
}

impl SpeechToText {
    /// Create a recognizer for `provider`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(provider: SttProvider, api_key: SecretString, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(format!("{provider:?} API key required for STT")));
        }

        let base_url = match provider {
            SttProvider::Whisper => WHISPER_BASE_URL,
            SttProvider::Deepgram => DEEPGRAM_BASE_URL,
        };

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            provider,
            base_url: base_url.to_string(),
        })
    }

    /// Point the recognizer at a different API host
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Transcribe using OpenAI Whisper
    async fn transcribe_whisper(&self, clip: &AudioClip, locale: &str) -> Result<String> {
        tracing::debug!(audio_bytes = clip.bytes().len(), locale, "starting Whisper transcription");

        let format = clip.format();
        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(clip.bytes().to_vec())
                    .file_name(format.file_name())
                    .mime_str(format.mime_type())
                    .map_err(|e| Error::RecognitionUnavailable(e.to_string()))?,
            )
            .text("model", self.model.clone())
            .text("language", primary_language(locale));

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                Error::RecognitionUnavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(classify_failure(status, &body));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            Error::RecognitionUnavailable(e.to_string())
        })?;

        Ok(result.text)
    }

    /// Transcribe using Deepgram
    async fn transcribe_deepgram(&self, clip: &AudioClip, locale: &str) -> Result<String> {
        tracing::debug!(audio_bytes = clip.bytes().len(), locale, "starting Deepgram transcription");

        let response = self
            .client
            .post(format!("{}/listen", self.base_url))
            .query(&[
                ("model", self.model.as_str()),
                ("language", locale),
                ("punctuate", "true"),
            ])
            .header("Authorization", format!("Token {}", self.api_key.expose_secret()))
            .header("Content-Type", clip.format().mime_type())
            .body(clip.bytes().to_vec())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Deepgram request failed");
                Error::RecognitionUnavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(classify_failure(status, &body));
        }

        let result: DeepgramResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse Deepgram response");
            Error::RecognitionUnavailable(e.to_string())
        })?;

        Ok(result
            .results
            .channels
            .first()
            .and_then(|c| c.alternatives.first())
            .map(|a| a.transcript.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl SpeechRecognizer for SpeechToText {
    async fn recognize(&self, clip: &AudioClip, locale: &str) -> Result<String> {
        if clip.is_silent() {
            return Err(Error::RecognitionAmbiguous);
        }

        let transcript = match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(clip, locale).await?,
            SttProvider::Deepgram => self.transcribe_deepgram(clip, locale).await?,
        };

        if transcript.trim().is_empty() {
            tracing::warn!("transcription came back empty");
            return Err(Error::RecognitionAmbiguous);
        }

        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }
}

/// Unreadable audio is the caller's problem; anything else is the service's
fn classify_failure(status: StatusCode, body: &str) -> Error {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Error::RecognitionAmbiguous,
        _ => Error::RecognitionUnavailable(format!("STT API error {status}: {body}")),
    }
}

/// "en-US" -> "en"
fn primary_language(locale: &str) -> String {
    locale
        .split(['-', '_'])
        .next()
        .unwrap_or(locale)
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_language() {
        assert_eq!(primary_language("en-US"), "en");
        assert_eq!(primary_language("pt_BR"), "pt");
        assert_eq!(primary_language("de"), "de");
    }

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            classify_failure(StatusCode::BAD_REQUEST, "invalid file"),
            Error::RecognitionAmbiguous
        ));
        assert!(matches!(
            classify_failure(StatusCode::SERVICE_UNAVAILABLE, ""),
            Error::RecognitionUnavailable(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::UNAUTHORIZED, "bad key"),
            Error::RecognitionUnavailable(_)
        ));
    }

    #[test]
    fn test_provider_names() {
        assert_eq!(SttProvider::from_name("Whisper"), Some(SttProvider::Whisper));
        assert_eq!(SttProvider::from_name("deepgram"), Some(SttProvider::Deepgram));
        assert_eq!(SttProvider::from_name("vosk"), None);
    }
}
