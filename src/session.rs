//! Per-user conversation session

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::chat::{CompletionProvider, RemoteChat};
use crate::orchestrator::TurnState;
use crate::transcript::Transcript;

/// Anonymous identity for one session, used as the persistence key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserIdentity(String);

impl UserIdentity {
    /// Generate a fresh random identity
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an identity previously handed out (e.g. to look up stored history)
    #[must_use]
    pub fn from_existing(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State owned by one conversation
///
/// Created on first contact and dropped when the user leaves. The remote
/// chat is never persisted; a new session always starts a fresh one.
pub struct Session {
    pub(crate) identity: UserIdentity,
    pub(crate) transcript: Transcript,
    pub(crate) chat: Box<dyn RemoteChat>,
    pub(crate) state: TurnState,
    created_at: DateTime<Utc>,
}

impl Session {
    /// Start a session with a new identity and an empty remote chat
    #[must_use]
    pub fn start(provider: &dyn CompletionProvider) -> Self {
        let identity = UserIdentity::generate();
        tracing::info!(user = %identity, "session started");

        Self {
            identity,
            transcript: Transcript::new(),
            chat: provider.start_chat(),
            state: TurnState::Idle,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub const fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    #[must_use]
    pub const fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Current stage of the turn state machine
    #[must_use]
    pub const fn state(&self) -> TurnState {
        self.state
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("turns", &self.transcript.len())
            .field("state", &self.state)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}
