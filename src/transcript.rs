//! Conversation transcript: ordered, role-tagged turns

use serde::{Deserialize, Serialize};

/// Who authored a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Wire name of the role
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One `{role, content}` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered conversation history for one session
///
/// Turns are only ever appended. The single exception is a user turn opened
/// with [`Transcript::begin_turn`] whose reply never arrives: dropping the
/// [`PendingTurn`] without committing removes it again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    #[must_use]
    pub const fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Rebuild a transcript from stored turns
    #[must_use]
    pub const fn from_turns(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Last turn, if any
    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Append the user half of a turn; the assistant half is added on commit
    pub fn begin_turn(&mut self, utterance: &str) -> PendingTurn<'_> {
        self.turns.push(Turn::user(utterance));
        PendingTurn {
            transcript: self,
            committed: false,
        }
    }
}

/// A user turn awaiting its assistant reply
///
/// Dropping it uncommitted rolls the transcript back to its length before
/// [`Transcript::begin_turn`].
#[must_use = "an uncommitted turn is removed when dropped"]
pub struct PendingTurn<'a> {
    transcript: &'a mut Transcript,
    committed: bool,
}

impl PendingTurn<'_> {
    /// Append the assistant reply, completing the pair
    pub fn commit(mut self, reply: &str) {
        self.transcript.turns.push(Turn::assistant(reply));
        self.committed = true;
    }

    /// Transcript length including the pending user turn
    #[must_use]
    pub fn len(&self) -> usize {
        self.transcript.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transcript.is_empty()
    }
}

impl Drop for PendingTurn<'_> {
    fn drop(&mut self) {
        if !self.committed {
            let removed = self.transcript.turns.pop();
            tracing::debug!(
                removed = removed.is_some(),
                len = self.transcript.len(),
                "rolled back uncommitted user turn"
            );
        }
    }
}
