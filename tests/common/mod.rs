//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;

use tutor_assistant::db::{self, HistoryRepo, StoredHistory};
use tutor_assistant::voice::{AudioClip, LanguageDetector, SpeechRecognizer, SpeechSynthesizer};
use tutor_assistant::{
    CompletionProvider, Error, FragmentStream, InputNormalizer, RemoteChat, Result, Transcript,
    TranscriptStore, TurnOrchestrator, UserIdentity,
};

/// What the scripted completion provider does for one `send`
#[derive(Debug, Clone)]
pub enum Reply {
    /// Stream these fragments, then end
    Fragments(Vec<&'static str>),
    /// Fail the request outright
    Unavailable,
    /// Stream these fragments, then fail
    BreaksAfter(Vec<&'static str>),
}

/// Completion provider that replays scripted replies in order
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProvider {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().collect())),
            sent: Arc::default(),
        }
    }

    /// Utterances that reached the remote chat
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

impl CompletionProvider for ScriptedProvider {
    fn start_chat(&self) -> Box<dyn RemoteChat> {
        Box::new(self.clone())
    }
}

#[async_trait]
impl RemoteChat for ScriptedProvider {
    async fn send<'a>(&'a mut self, utterance: &str) -> Result<FragmentStream<'a>> {
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::Fragments(Vec::new()));

        match reply {
            Reply::Unavailable => Err(Error::CompletionUnavailable("quota exceeded".to_string())),
            Reply::Fragments(fragments) => {
                self.sent.lock().unwrap().push(utterance.to_string());
                let items: Vec<Result<String>> =
                    fragments.into_iter().map(|f| Ok(f.to_string())).collect();
                Ok(Box::pin(stream::iter(items)))
            }
            Reply::BreaksAfter(fragments) => {
                self.sent.lock().unwrap().push(utterance.to_string());
                let mut items: Vec<Result<String>> =
                    fragments.into_iter().map(|f| Ok(f.to_string())).collect();
                items.push(Err(Error::CompletionUnavailable(
                    "connection reset".to_string(),
                )));
                Ok(Box::pin(stream::iter(items)))
            }
        }
    }
}

/// What the fake recognizer hears
#[derive(Debug, Clone)]
pub enum Hears {
    Text(&'static str),
    Mumbling,
    Offline,
}

pub struct FakeRecognizer {
    hears: Hears,
    calls: AtomicUsize,
}

impl FakeRecognizer {
    pub fn new(hears: Hears) -> Self {
        Self {
            hears,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechRecognizer for FakeRecognizer {
    async fn recognize(&self, _clip: &AudioClip, _locale: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.hears {
            Hears::Text(text) => Ok(text.to_string()),
            Hears::Mumbling => Err(Error::RecognitionAmbiguous),
            Hears::Offline => Err(Error::RecognitionUnavailable("no network".to_string())),
        }
    }
}

/// Synthesizer with a voice for every language except "xx"
#[derive(Default)]
pub struct FakeSynthesizer {
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeSynthesizer {
    /// `(text, language)` pairs it was asked to speak
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str, language: &str) -> Result<AudioClip> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), language.to_string()));

        if text.is_empty() {
            return Ok(AudioClip::silent(language));
        }
        if language == "xx" {
            return Err(Error::SynthesisUnsupportedLocale(language.to_string()));
        }
        Ok(AudioClip::mp3(text.as_bytes().to_vec()).with_language(language))
    }
}

/// Detector that always answers the same, or always fails
pub struct FixedDetector(pub Option<&'static str>);

impl LanguageDetector for FixedDetector {
    fn detect(&self, _text: &str) -> Result<String> {
        self.0
            .map(str::to_string)
            .ok_or_else(|| Error::LanguageUndetected("fixed failure".to_string()))
    }
}

/// In-memory `SQLite` store that counts persist calls
pub struct CountingStore {
    inner: HistoryRepo,
    persists: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Self {
        Self {
            inner: HistoryRepo::new(db::init_memory().expect("failed to init test db")),
            persists: AtomicUsize::new(0),
        }
    }

    pub fn persists(&self) -> usize {
        self.persists.load(Ordering::SeqCst)
    }

    pub fn stored(&self, user: &UserIdentity) -> Option<StoredHistory> {
        self.inner.load(user).expect("failed to load history")
    }
}

impl TranscriptStore for CountingStore {
    fn persist(&self, user: &UserIdentity, transcript: &Transcript) -> Result<()> {
        self.persists.fetch_add(1, Ordering::SeqCst);
        self.inner.persist(user, transcript)
    }

    fn load(&self, user: &UserIdentity) -> Result<Option<StoredHistory>> {
        self.inner.load(user)
    }
}

/// Store whose connection is gone
pub struct FailingStore;

impl TranscriptStore for FailingStore {
    fn persist(&self, _user: &UserIdentity, _transcript: &Transcript) -> Result<()> {
        Err(Error::PersistenceUnavailable("connection lost".to_string()))
    }

    fn load(&self, _user: &UserIdentity) -> Result<Option<StoredHistory>> {
        Err(Error::PersistenceUnavailable("connection lost".to_string()))
    }
}

/// Orchestrator over fakes, speaking every reply
pub fn orchestrator(
    recognizer: Arc<FakeRecognizer>,
    detector: FixedDetector,
    store: Arc<dyn TranscriptStore>,
    synthesizer: Arc<FakeSynthesizer>,
) -> TurnOrchestrator {
    TurnOrchestrator::new(InputNormalizer::new(recognizer), Arc::new(detector), store)
        .with_synthesizer(synthesizer)
}
