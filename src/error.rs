//! Error types for the tutor assistant

use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the assistant
#[derive(Debug, Error)]
pub enum Error {
    /// Speech was captured but could not be understood
    #[error("speech recognition could not understand audio")]
    RecognitionAmbiguous,

    /// Recognition service (or the microphone) could not be reached in time
    #[error("speech recognition unavailable: {0}")]
    RecognitionUnavailable(String),

    /// Completion provider rejected or failed the request
    #[error("completion unavailable: {0}")]
    CompletionUnavailable(String),

    /// Transcript could not be written to the store
    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    /// Synthesis backend has no voice for the language
    #[error("no synthesis voice for language: {0}")]
    SynthesisUnsupportedLocale(String),

    /// A required credential was not configured
    #[error("missing startup configuration: {0}")]
    StartupConfigMissing(String),

    /// Language of a text could not be identified
    #[error("language detection failed: {0}")]
    LanguageUndetected(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device or encoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl Error {
    /// Whether the error belongs to a single turn and leaves the session usable
    #[must_use]
    pub const fn is_turn_scoped(&self) -> bool {
        matches!(
            self,
            Self::RecognitionAmbiguous
                | Self::RecognitionUnavailable(_)
                | Self::CompletionUnavailable(_)
                | Self::PersistenceUnavailable(_)
                | Self::SynthesisUnsupportedLocale(_)
        )
    }

    /// Short warning suitable for showing to the user
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::RecognitionAmbiguous => {
                "Speech recognition could not understand audio".to_string()
            }
            Self::RecognitionUnavailable(reason) => {
                format!("Could not request results from the speech recognition service; {reason}")
            }
            Self::CompletionUnavailable(reason) => {
                format!("The assistant could not answer right now; {reason}")
            }
            Self::PersistenceUnavailable(_) => {
                "Your conversation could not be saved; it is still available in this session"
                    .to_string()
            }
            Self::SynthesisUnsupportedLocale(lang) => {
                format!("Spoken replies are not available for language '{lang}'")
            }
            other => format!("An error occurred: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_scoped_classification() {
        assert!(Error::RecognitionAmbiguous.is_turn_scoped());
        assert!(Error::CompletionUnavailable("quota".into()).is_turn_scoped());
        assert!(Error::PersistenceUnavailable("down".into()).is_turn_scoped());
        assert!(!Error::StartupConfigMissing("TUTOR_API_KEY".into()).is_turn_scoped());
        assert!(!Error::Audio("no device".into()).is_turn_scoped());
    }

    #[test]
    fn test_user_message_mentions_language() {
        let msg = Error::SynthesisUnsupportedLocale("xx".into()).user_message();
        assert!(msg.contains("'xx'"));
    }
}
