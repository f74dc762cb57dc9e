//! Database module for transcript persistence

pub mod history;
mod schema;

use std::path::{Path, PathBuf};
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

use crate::session::UserIdentity;
use crate::transcript::Transcript;
use crate::{Error, Result};

pub use history::{HistoryRepo, StoredHistory};
pub use schema::SCHEMA_VERSION;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Pooled database connection
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// How long a caller waits for a pooled connection
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable per-user transcript storage
pub trait TranscriptStore: Send + Sync {
    /// Write the full transcript for `user`, replacing any earlier copy
    ///
    /// Persisting an unchanged transcript leaves the stored record as it was.
    ///
    /// # Errors
    ///
    /// Returns `Error::PersistenceUnavailable` if the store cannot be written
    fn persist(&self, user: &UserIdentity, transcript: &Transcript) -> Result<()>;

    /// Read back the stored transcript for `user`
    ///
    /// # Errors
    ///
    /// Returns `Error::PersistenceUnavailable` if the store cannot be read
    fn load(&self, user: &UserIdentity) -> Result<Option<StoredHistory>>;
}

/// Where a connection string points
#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Memory,
    File(PathBuf),
}

/// Parse `sqlite://<path>`, `sqlite::memory:`, `:memory:`, or a bare path
fn parse_location(conn_str: &str) -> Result<Location> {
    let trimmed = conn_str.trim();
    if trimmed.is_empty() {
        return Err(Error::StartupConfigMissing(
            "persistence connection string is empty".to_string(),
        ));
    }

    if matches!(trimmed, "sqlite::memory:" | ":memory:" | "sqlite://:memory:") {
        return Ok(Location::Memory);
    }

    let path = trimmed
        .strip_prefix("sqlite://")
        .or_else(|| trimmed.strip_prefix("sqlite:"))
        .unwrap_or(trimmed);

    if path.is_empty() {
        return Err(Error::PersistenceUnavailable(format!(
            "connection string has no path: {trimmed}"
        )));
    }

    Ok(Location::File(PathBuf::from(path)))
}

/// Open the store named by a connection string
///
/// # Errors
///
/// Returns `Error::PersistenceUnavailable` if the store cannot be reached
pub fn open(conn_str: &str) -> Result<DbPool> {
    match parse_location(conn_str)? {
        Location::Memory => init_memory(),
        Location::File(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::PersistenceUnavailable(format!(
                        "cannot create {}: {e}",
                        parent.display()
                    ))
                })?;
            }
            init(path)
        }
    }
}

/// Initialize the database
///
/// # Errors
///
/// Returns error if database cannot be opened or initialized
pub fn init<P: AsRef<Path>>(path: P) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(path);
    let pool = Pool::builder()
        .max_size(4)
        .connection_timeout(CONNECTION_TIMEOUT)
        .build(manager)
        .map_err(|e| Error::PersistenceUnavailable(e.to_string()))?;

    migrate(&pool)?;
    tracing::info!(version = SCHEMA_VERSION, "database initialized");
    Ok(pool)
}

/// Initialize an in-memory database
///
/// Backs the `sqlite::memory:` connection string. The data lives as long as
/// the pool's single connection, so that connection is never reaped.
///
/// # Errors
///
/// Returns error if database cannot be initialized
pub fn init_memory() -> Result<DbPool> {
    let pool = Pool::builder()
        .max_size(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connection_timeout(CONNECTION_TIMEOUT)
        .build(memory_manager())
        .map_err(|e| Error::PersistenceUnavailable(e.to_string()))?;

    migrate(&pool)?;
    Ok(pool)
}

/// Every in-memory connection is a separate empty database; give each one the schema
pub(crate) fn memory_manager() -> SqliteConnectionManager {
    SqliteConnectionManager::memory().with_init(|conn| schema::init(conn))
}

fn migrate(pool: &DbPool) -> Result<()> {
    let conn = pool
        .get()
        .map_err(|e| Error::PersistenceUnavailable(e.to_string()))?;
    schema::init(&conn).map_err(|e| Error::PersistenceUnavailable(e.to_string()))
}

#[cfg(test)]
mod tests {
    use r2d2::ManageConnection;

    use super::*;

    #[test]
    fn test_init_memory() {
        let pool = init_memory().unwrap();
        let _conn = pool.get().unwrap();
    }

    #[test]
    fn test_replacement_memory_connection_has_schema() {
        let manager = memory_manager();
        let _first = manager.connect().unwrap();
        let second = manager.connect().unwrap();

        let tables: i64 = second
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'users'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 1);
    }

    #[test]
    fn test_parse_location() {
        assert_eq!(parse_location("sqlite::memory:").unwrap(), Location::Memory);
        assert_eq!(parse_location(":memory:").unwrap(), Location::Memory);
        assert_eq!(
            parse_location("sqlite:///var/lib/tutor/history.db").unwrap(),
            Location::File(PathBuf::from("/var/lib/tutor/history.db"))
        );
        assert_eq!(
            parse_location("history.db").unwrap(),
            Location::File(PathBuf::from("history.db"))
        );
    }

    #[test]
    fn test_empty_connection_string_is_missing_config() {
        assert!(matches!(
            parse_location("  "),
            Err(Error::StartupConfigMissing(_))
        ));
        assert!(matches!(
            parse_location("sqlite://"),
            Err(Error::PersistenceUnavailable(_))
        ));
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.db");

        let pool = open(&format!("sqlite://{}", path.display())).unwrap();
        drop(pool);

        assert!(path.exists());
    }
}
