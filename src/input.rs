//! Turn input normalization
//!
//! Every turn starts as typed text, a recorded clip, or a request to listen
//! on the microphone. [`InputNormalizer`] reduces all three to a single
//! [`Utterance`] string.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::voice::{AudioClip, SpeechCapture, SpeechRecognizer};
use crate::{Error, Result};

/// Default time allowed for a spoken utterance
pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(8);

/// Default locale hinted to speech recognition
pub const DEFAULT_RECOGNITION_LOCALE: &str = "en-US";

/// Normalized user input for one turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance(String);

impl Utterance {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Utterance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw input as it arrives from the user
#[derive(Debug, Clone)]
pub enum TurnInput {
    /// Typed text, used verbatim
    Text(String),
    /// Pre-recorded speech
    Voice(AudioClip),
    /// Listen on the capture device
    Microphone,
}

/// Outcome of normalizing input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Utterance(Utterance),
    /// Blank text; the turn is skipped silently
    Empty,
}

/// Converts [`TurnInput`] into an [`Utterance`]
pub struct InputNormalizer {
    recognizer: Arc<dyn SpeechRecognizer>,
    capture: Option<Arc<dyn SpeechCapture>>,
    locale: String,
    capture_timeout: Duration,
}

impl InputNormalizer {
    /// Create a normalizer without a capture device
    #[must_use]
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        Self {
            recognizer,
            capture: None,
            locale: DEFAULT_RECOGNITION_LOCALE.to_string(),
            capture_timeout: DEFAULT_CAPTURE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_capture(mut self, capture: Arc<dyn SpeechCapture>) -> Self {
        self.capture = Some(capture);
        self
    }

    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    #[must_use]
    pub const fn with_capture_timeout(mut self, timeout: Duration) -> Self {
        self.capture_timeout = timeout;
        self
    }

    /// Normalize one input
    ///
    /// Text is passed through unchanged unless it is blank. Speech is
    /// recognized with the configured locale hint.
    ///
    /// # Errors
    ///
    /// Returns `Error::RecognitionAmbiguous` when speech is unintelligible
    /// and `Error::RecognitionUnavailable` when recognition or capture fails
    pub async fn normalize(&self, input: TurnInput) -> Result<Normalized> {
        match input {
            TurnInput::Text(text) => {
                if text.trim().is_empty() {
                    tracing::debug!("blank text input");
                    return Ok(Normalized::Empty);
                }
                Ok(Normalized::Utterance(Utterance(text)))
            }
            TurnInput::Voice(clip) => self.recognize(&clip).await,
            TurnInput::Microphone => {
                let capture = self.capture.as_ref().ok_or_else(|| {
                    Error::RecognitionUnavailable("no capture device configured".to_string())
                })?;
                let clip = capture.capture(self.capture_timeout).await?;
                self.recognize(&clip).await
            }
        }
    }

    async fn recognize(&self, clip: &AudioClip) -> Result<Normalized> {
        let text = self.recognizer.recognize(clip, &self.locale).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::RecognitionAmbiguous);
        }
        Ok(Normalized::Utterance(Utterance(text.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    struct EchoRecognizer {
        reply: Result<String>,
        locales: Mutex<Vec<String>>,
    }

    impl EchoRecognizer {
        fn new(reply: Result<String>) -> Self {
            Self {
                reply,
                locales: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SpeechRecognizer for EchoRecognizer {
        async fn recognize(&self, _clip: &AudioClip, locale: &str) -> Result<String> {
            self.locales.lock().unwrap().push(locale.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(Error::RecognitionAmbiguous) => Err(Error::RecognitionAmbiguous),
                Err(e) => Err(Error::RecognitionUnavailable(e.to_string())),
            }
        }
    }

    struct NoSpeech;

    #[async_trait]
    impl SpeechCapture for NoSpeech {
        async fn capture(&self, _timeout: Duration) -> Result<AudioClip> {
            Err(Error::RecognitionUnavailable("timed out".to_string()))
        }
    }

    fn utterance(n: Normalized) -> String {
        match n {
            Normalized::Utterance(u) => u.into_string(),
            Normalized::Empty => panic!("expected utterance"),
        }
    }

    #[tokio::test]
    async fn test_text_passes_through_unchanged() {
        let normalizer = InputNormalizer::new(Arc::new(EchoRecognizer::new(Ok(String::new()))));
        let out = normalizer
            .normalize(TurnInput::Text("  What is gravity?".to_string()))
            .await
            .unwrap();
        assert_eq!(utterance(out), "  What is gravity?");
    }

    #[tokio::test]
    async fn test_blank_text_is_empty() {
        let normalizer = InputNormalizer::new(Arc::new(EchoRecognizer::new(Ok(String::new()))));
        let out = normalizer
            .normalize(TurnInput::Text(" \n\t".to_string()))
            .await
            .unwrap();
        assert_eq!(out, Normalized::Empty);
    }

    #[tokio::test]
    async fn test_voice_uses_locale_hint() {
        let recognizer = Arc::new(EchoRecognizer::new(Ok("hola".to_string())));
        let normalizer = InputNormalizer::new(recognizer.clone()).with_locale("es-ES");

        let out = normalizer
            .normalize(TurnInput::Voice(AudioClip::wav(vec![1, 2, 3])))
            .await
            .unwrap();

        assert_eq!(utterance(out), "hola");
        assert_eq!(recognizer.locales.lock().unwrap().as_slice(), ["es-ES"]);
    }

    #[tokio::test]
    async fn test_ambiguous_speech_surfaces() {
        let normalizer =
            InputNormalizer::new(Arc::new(EchoRecognizer::new(Err(Error::RecognitionAmbiguous))));
        let err = normalizer
            .normalize(TurnInput::Voice(AudioClip::wav(vec![0])))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RecognitionAmbiguous));
    }

    #[tokio::test]
    async fn test_blank_transcript_is_ambiguous() {
        let normalizer = InputNormalizer::new(Arc::new(EchoRecognizer::new(Ok("  ".to_string()))));
        let err = normalizer
            .normalize(TurnInput::Voice(AudioClip::wav(vec![0])))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RecognitionAmbiguous));
    }

    #[tokio::test]
    async fn test_microphone_without_device_is_unavailable() {
        let normalizer = InputNormalizer::new(Arc::new(EchoRecognizer::new(Ok("x".to_string()))));
        let err = normalizer.normalize(TurnInput::Microphone).await.unwrap_err();
        assert!(matches!(err, Error::RecognitionUnavailable(_)));
    }

    #[tokio::test]
    async fn test_capture_timeout_is_unavailable() {
        let normalizer = InputNormalizer::new(Arc::new(EchoRecognizer::new(Ok("x".to_string()))))
            .with_capture(Arc::new(NoSpeech));
        let err = normalizer.normalize(TurnInput::Microphone).await.unwrap_err();
        assert!(matches!(err, Error::RecognitionUnavailable(_)));
    }
}
