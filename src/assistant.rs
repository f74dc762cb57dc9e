//! Assistant - wires configuration into a ready-to-run turn pipeline
//!
//! Owns the process-wide resources: the completion provider, the transcript
//! store, and the speech capabilities. Sessions are started from it and each
//! turn is run through its [`TurnOrchestrator`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;

use crate::chat::{CompletionProvider, OpenAiCompletions};
use crate::config::{ApiKeys, VoiceConfig};
use crate::db::{HistoryRepo, StoredHistory, TranscriptStore};
use crate::input::{InputNormalizer, TurnInput};
use crate::orchestrator::{TurnEvent, TurnOrchestrator, TurnOutcome};
use crate::session::{Session, UserIdentity};
use crate::voice::{
    AudioClip, MicrophoneCapture, SpeechRecognizer, SpeechSynthesizer, SpeechToText,
    SttProvider, TextToSpeech, TtsProvider, WhatlangDetector,
};
use crate::{Config, Error, Result};

/// The tutor assistant
pub struct Assistant {
    provider: Arc<dyn CompletionProvider>,
    history: Arc<HistoryRepo>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    orchestrator: TurnOrchestrator,
    capture_timeout: Duration,
}

impl Assistant {
    /// Build the assistant from configuration
    ///
    /// Opens the persistence store once; it is released when the assistant
    /// is dropped.
    ///
    /// # Errors
    ///
    /// Returns error if the completion provider or the store cannot be set up
    pub fn new(config: Config) -> Result<Self> {
        let Config {
            completion,
            database_url,
            voice,
            api_keys,
            default_language,
        } = config;

        let provider: Arc<dyn CompletionProvider> = Arc::new(OpenAiCompletions::new(
            completion.api_key,
            completion.base_url,
            completion.model,
            completion.system_prompt,
        )?);

        let history = Arc::new(HistoryRepo::open(database_url.expose_secret())?);
        tracing::info!("transcript store opened");

        let (recognizer, synthesizer) = if voice.enabled {
            build_speech(&voice, &api_keys)?
        } else {
            tracing::info!("voice disabled, text input only");
            (Arc::new(VoiceDisabled) as Arc<dyn SpeechRecognizer>, None)
        };

        let mut normalizer = InputNormalizer::new(recognizer)
            .with_locale(voice.recognition_locale.clone())
            .with_capture_timeout(voice.capture_timeout);
        if voice.enabled {
            normalizer = normalizer.with_capture(Arc::new(MicrophoneCapture));
        }

        let store: Arc<dyn TranscriptStore> = history.clone();
        let mut orchestrator = TurnOrchestrator::new(normalizer, Arc::new(WhatlangDetector), store)
            .with_default_language(default_language);
        if let Some(synthesizer) = &synthesizer {
            orchestrator = orchestrator.with_synthesizer(Arc::clone(synthesizer));
        }

        Ok(Self {
            provider,
            history,
            synthesizer,
            orchestrator,
            capture_timeout: voice.capture_timeout,
        })
    }

    /// Report turn progress on `events`
    #[must_use]
    pub fn with_events(mut self, events: mpsc::UnboundedSender<TurnEvent>) -> Self {
        self.orchestrator = self.orchestrator.with_events(events);
        self
    }

    /// Start a session with a fresh identity and remote chat
    #[must_use]
    pub fn start_session(&self) -> Session {
        Session::start(self.provider.as_ref())
    }

    /// Run one turn for `session`
    pub async fn run_turn(&self, session: &mut Session, input: TurnInput) -> TurnOutcome {
        self.orchestrator.run_turn(session, input).await
    }

    /// Stored history for `user`
    ///
    /// # Errors
    ///
    /// Returns `Error::PersistenceUnavailable` if the store cannot be read
    pub fn history(&self, user: &UserIdentity) -> Result<Option<StoredHistory>> {
        self.history.load(user)
    }

    /// All users with stored history
    ///
    /// # Errors
    ///
    /// Returns `Error::PersistenceUnavailable` if the store cannot be read
    pub fn users(&self) -> Result<Vec<String>> {
        self.history.list_users()
    }

    /// Whether spoken input and replies are available
    #[must_use]
    pub const fn voice_enabled(&self) -> bool {
        self.synthesizer.is_some()
    }

    #[must_use]
    pub fn synthesizer(&self) -> Option<&Arc<dyn SpeechSynthesizer>> {
        self.synthesizer.as_ref()
    }

    #[must_use]
    pub const fn capture_timeout(&self) -> Duration {
        self.capture_timeout
    }
}

type SpeechPair = (Arc<dyn SpeechRecognizer>, Option<Arc<dyn SpeechSynthesizer>>);

fn build_speech(voice: &VoiceConfig, keys: &ApiKeys) -> Result<SpeechPair> {
    let key = |secret: Option<&SecretString>, name: &str| {
        secret.map(|k| SecretString::from(k.expose_secret().to_string()))
            .ok_or_else(|| Error::Config(format!("{name} required for voice")))
    };

    let stt_key = match voice.stt_provider {
        SttProvider::Whisper => key(keys.openai.as_ref(), "OPENAI_API_KEY")?,
        SttProvider::Deepgram => key(keys.deepgram.as_ref(), "DEEPGRAM_API_KEY")?,
    };
    let recognizer = SpeechToText::new(voice.stt_provider, stt_key, voice.stt_model.clone())?;

    let synthesizer = match voice.tts_provider {
        TtsProvider::OpenAI => TextToSpeech::new_openai(
            key(keys.openai.as_ref(), "OPENAI_API_KEY")?,
            voice.tts_voice.clone(),
            voice.tts_speed,
            voice.tts_model.clone(),
        )?,
        TtsProvider::ElevenLabs => TextToSpeech::new_elevenlabs(
            key(keys.elevenlabs.as_ref(), "ELEVENLABS_API_KEY")?,
            voice.tts_voice.clone(),
            voice.tts_model.clone(),
        )?,
    };

    tracing::info!(
        stt = ?voice.stt_provider,
        tts = ?voice.tts_provider,
        locale = %voice.recognition_locale,
        "voice enabled"
    );

    Ok((Arc::new(recognizer), Some(Arc::new(synthesizer))))
}

/// Recognizer used when voice is switched off
struct VoiceDisabled;

#[async_trait]
impl SpeechRecognizer for VoiceDisabled {
    async fn recognize(&self, _clip: &AudioClip, _locale: &str) -> Result<String> {
        Err(Error::RecognitionUnavailable("voice is disabled".to_string()))
    }
}
