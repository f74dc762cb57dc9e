//! Per-user chat history repository

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;

use super::{DbConn, DbPool, TranscriptStore};
use crate::session::UserIdentity;
use crate::transcript::Transcript;
use crate::{Error, Result};

/// A transcript as stored for one user
#[derive(Debug, Clone)]
pub struct StoredHistory {
    pub user_id: String,
    pub transcript: Transcript,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `SQLite`-backed [`TranscriptStore`]
///
/// Owns the connection pool; dropping the repository releases it.
pub struct HistoryRepo {
    pool: DbPool,
}

impl HistoryRepo {
    /// Create a new history repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Open the store named by a connection string
    ///
    /// # Errors
    ///
    /// Returns `Error::PersistenceUnavailable` if the store cannot be reached
    pub fn open(conn_str: &str) -> Result<Self> {
        super::open(conn_str).map(Self::new)
    }

    fn conn(&self) -> Result<DbConn> {
        self.pool
            .get()
            .map_err(|e| Error::PersistenceUnavailable(e.to_string()))
    }

    /// All user ids with stored history, most recently updated first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_users(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT user_id FROM users ORDER BY updated_at DESC, user_id")
            .map_err(unavailable)?;

        let ids = stmt
            .query_map([], |row| row.get(0))
            .map_err(unavailable)?
            .collect::<std::result::Result<Vec<String>, _>>()
            .map_err(unavailable)?;

        Ok(ids)
    }
}

impl TranscriptStore for HistoryRepo {
    fn persist(&self, user: &UserIdentity, transcript: &Transcript) -> Result<()> {
        let history = serde_json::to_string(transcript)?;
        let now = Utc::now().to_rfc3339();
        let conn = self.conn()?;

        let changed = conn
            .execute(
                "INSERT INTO users (user_id, chat_history, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET
                     chat_history = excluded.chat_history,
                     updated_at = excluded.updated_at
                 WHERE users.chat_history IS NOT excluded.chat_history",
                [user.as_str(), history.as_str(), now.as_str()],
            )
            .map_err(unavailable)?;

        tracing::debug!(
            user = %user,
            turns = transcript.len(),
            changed = changed > 0,
            "transcript persisted"
        );
        Ok(())
    }

    fn load(&self, user: &UserIdentity) -> Result<Option<StoredHistory>> {
        let conn = self.conn()?;

        let row: Option<(String, String, String)> = conn
            .query_row(
                "SELECT chat_history, created_at, updated_at FROM users WHERE user_id = ?1",
                [user.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(unavailable)?;

        let Some((history, created_at, updated_at)) = row else {
            return Ok(None);
        };

        let transcript: Transcript = serde_json::from_str(&history).map_err(|e| {
            Error::PersistenceUnavailable(format!("stored history for {user} is corrupt: {e}"))
        })?;

        Ok(Some(StoredHistory {
            user_id: user.to_string(),
            transcript,
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        }))
    }
}

impl Drop for HistoryRepo {
    fn drop(&mut self) {
        let state = self.pool.state();
        tracing::debug!(
            connections = state.connections,
            idle = state.idle_connections,
            "persistence connection released"
        );
    }
}

fn unavailable(e: rusqlite::Error) -> Error {
    Error::PersistenceUnavailable(e.to_string())
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
