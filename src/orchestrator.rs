//! Turn orchestration
//!
//! [`TurnOrchestrator`] runs one user turn through the pipeline:
//!
//! ```text
//! Idle -> AwaitingInput -> Normalizing -> Detecting -> Completing
//!      -> Aggregating -> Persisting -> Synthesizing -> Idle
//! ```
//!
//! A failure before the reply is fully aggregated returns to `Idle` with the
//! transcript exactly as it was. Once the assistant turn is appended, later
//! failures (persistence, synthesis) only add warnings to the report.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::chat::aggregate_with;
use crate::db::TranscriptStore;
use crate::input::{InputNormalizer, Normalized, TurnInput};
use crate::session::Session;
use crate::voice::{AudioClip, LanguageDetector, SpeechSynthesizer, detect_or_default};
use crate::voice::language::DEFAULT_LANGUAGE;
use crate::Error;

/// Stage of the per-session turn state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingInput,
    Normalizing,
    Detecting,
    Completing,
    Aggregating,
    Persisting,
    Synthesizing,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::AwaitingInput => "awaiting_input",
            Self::Normalizing => "normalizing",
            Self::Detecting => "detecting",
            Self::Completing => "completing",
            Self::Aggregating => "aggregating",
            Self::Persisting => "persisting",
            Self::Synthesizing => "synthesizing",
        };
        f.write_str(name)
    }
}

/// Progress notifications emitted while a turn runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    State(TurnState),
    /// Text recognized from spoken input
    Transcribed(String),
    /// One streamed piece of the reply
    Fragment(String),
    /// User-visible, non-fatal problem
    Warning(String),
}

/// Everything a completed turn produced
#[derive(Debug)]
pub struct TurnReport {
    pub utterance: String,
    pub reply: String,
    /// Language used for synthesis
    pub language: String,
    /// `None` when synthesis is disabled or failed
    pub audio: Option<AudioClip>,
    /// Non-fatal failures after the reply was produced
    pub warnings: Vec<Error>,
}

/// Result of [`TurnOrchestrator::run_turn`]
#[derive(Debug)]
pub enum TurnOutcome {
    /// The user and assistant turns were appended
    Completed(TurnReport),
    /// No utterance was produced; carries the recognition error, if any
    Skipped(Option<Error>),
    /// The turn aborted and the transcript is unchanged
    Failed(Error),
}

impl TurnOutcome {
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    #[must_use]
    pub const fn report(&self) -> Option<&TurnReport> {
        match self {
            Self::Completed(report) => Some(report),
            _ => None,
        }
    }

    /// The error that stopped the turn, if any
    #[must_use]
    pub const fn error(&self) -> Option<&Error> {
        match self {
            Self::Skipped(err) => err.as_ref(),
            Self::Failed(err) => Some(err),
            Self::Completed(_) => None,
        }
    }
}

/// Sequences one turn at a time for a [`Session`]
pub struct TurnOrchestrator {
    normalizer: InputNormalizer,
    detector: Arc<dyn LanguageDetector>,
    store: Arc<dyn TranscriptStore>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    default_language: String,
    events: Option<mpsc::UnboundedSender<TurnEvent>>,
}

impl TurnOrchestrator {
    /// Create an orchestrator without synthesis or event reporting
    #[must_use]
    pub fn new(
        normalizer: InputNormalizer,
        detector: Arc<dyn LanguageDetector>,
        store: Arc<dyn TranscriptStore>,
    ) -> Self {
        Self {
            normalizer,
            detector,
            store,
            synthesizer: None,
            default_language: DEFAULT_LANGUAGE.to_string(),
            events: None,
        }
    }

    #[must_use]
    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Language used when detection fails on both utterance and reply
    #[must_use]
    pub fn with_default_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = language.into();
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: mpsc::UnboundedSender<TurnEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Run a full turn against `session`
    ///
    /// Never panics on capability failures; every error is reported through
    /// the returned [`TurnOutcome`] and the session stays usable.
    pub async fn run_turn(&self, session: &mut Session, input: TurnInput) -> TurnOutcome {
        let Session {
            identity,
            transcript,
            chat,
            state,
            ..
        } = session;

        self.enter(state, TurnState::AwaitingInput);
        let spoken = !matches!(input, TurnInput::Text(_));

        self.enter(state, TurnState::Normalizing);
        let utterance = match self.normalizer.normalize(input).await {
            Ok(Normalized::Utterance(utterance)) => utterance,
            Ok(Normalized::Empty) => {
                tracing::debug!("empty input, nothing to do");
                self.enter(state, TurnState::Idle);
                return TurnOutcome::Skipped(None);
            }
            Err(e) => {
                tracing::warn!(error = %e, "input not recognized");
                self.emit(TurnEvent::Warning(e.user_message()));
                self.enter(state, TurnState::Idle);
                return TurnOutcome::Skipped(Some(e));
            }
        };

        if spoken {
            self.emit(TurnEvent::Transcribed(utterance.to_string()));
        }

        self.enter(state, TurnState::Detecting);
        let input_language = match self.detector.detect(utterance.as_str()) {
            Ok(language) => Some(language),
            Err(e) => {
                tracing::debug!(error = %e, "could not detect utterance language");
                None
            }
        };

        self.enter(state, TurnState::Completing);
        let pending = transcript.begin_turn(utterance.as_str());
        let fragments = match chat.send(utterance.as_str()).await {
            Ok(fragments) => fragments,
            Err(e) => {
                drop(pending);
                return self.abort(state, e);
            }
        };

        self.enter(state, TurnState::Aggregating);
        let reply = match aggregate_with(fragments, |fragment| {
            self.emit(TurnEvent::Fragment(fragment.to_string()));
        })
        .await
        {
            Ok(reply) => reply,
            Err(e) => {
                drop(pending);
                return self.abort(state, e);
            }
        };
        pending.commit(&reply);

        let mut warnings = Vec::new();

        self.enter(state, TurnState::Persisting);
        if let Err(e) = self.store.persist(identity, transcript) {
            let e = match e {
                Error::PersistenceUnavailable(_) => e,
                other => Error::PersistenceUnavailable(other.to_string()),
            };
            tracing::warn!(user = %identity, error = %e, "transcript not persisted");
            self.emit(TurnEvent::Warning(e.user_message()));
            warnings.push(e);
        }

        let language = self.reply_language(input_language, &reply);

        let mut audio = None;
        if let Some(synthesizer) = &self.synthesizer {
            self.enter(state, TurnState::Synthesizing);
            match synthesizer.synthesize(&reply, &language).await {
                Ok(clip) => audio = Some(clip),
                Err(e) => {
                    tracing::warn!(language = %language, error = %e, "reply not synthesized");
                    self.emit(TurnEvent::Warning(e.user_message()));
                    warnings.push(e);
                }
            }
        }

        self.enter(state, TurnState::Idle);
        tracing::info!(
            user = %identity,
            turns = transcript.len(),
            language = %language,
            warnings = warnings.len(),
            "turn completed"
        );

        TurnOutcome::Completed(TurnReport {
            utterance: utterance.into_string(),
            reply,
            language,
            audio,
            warnings,
        })
    }

    /// Utterance language if known, else the reply's, else the default
    fn reply_language(&self, known: Option<String>, reply: &str) -> String {
        known.unwrap_or_else(|| {
            detect_or_default(self.detector.as_ref(), reply, &self.default_language)
        })
    }

    fn abort(&self, state: &mut TurnState, error: Error) -> TurnOutcome {
        tracing::warn!(stage = %state, error = %error, "turn aborted");
        self.emit(TurnEvent::Warning(error.user_message()));
        self.enter(state, TurnState::Idle);
        TurnOutcome::Failed(error)
    }

    fn enter(&self, state: &mut TurnState, next: TurnState) {
        tracing::debug!(from = %state, to = %next, "turn state");
        *state = next;
        self.emit(TurnEvent::State(next));
    }

    fn emit(&self, event: TurnEvent) {
        if let Some(events) = &self.events {
            // Receiver gone means nobody is watching
            let _ = events.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(TurnState::AwaitingInput.to_string(), "awaiting_input");
        assert_eq!(TurnState::Idle.to_string(), "idle");
    }

    #[test]
    fn test_outcome_accessors() {
        let skipped = TurnOutcome::Skipped(Some(Error::RecognitionAmbiguous));
        assert!(!skipped.is_completed());
        assert!(matches!(skipped.error(), Some(Error::RecognitionAmbiguous)));
        assert!(skipped.report().is_none());

        assert!(TurnOutcome::Skipped(None).error().is_none());
    }
}
