//! Database schema and migrations

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Bring a connection's schema up to [`SCHEMA_VERSION`]
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> rusqlite::Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r"
        -- One row per user; chat_history is the JSON array of turns
        CREATE TABLE IF NOT EXISTS users (
            user_id TEXT PRIMARY KEY,
            chat_history TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_users_updated ON users(updated_at);

        PRAGMA user_version = 1;
        ",
    )?;

    tracing::info!("migrated database to v1");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_repeatable() {
        let conn = Connection::open_in_memory().unwrap();
        init(&conn).unwrap();
        init(&conn).unwrap();

        let version: i32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }
}
