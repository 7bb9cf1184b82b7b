//! SQLite connection and schema management

use std::time::Duration;

use anyhow::{Error, Result};
use rusqlite::Connection as SyncConnection;
use tokio_rusqlite::Connection;

pub const DB_FILE_NAME: &str = "agenda.sqlite3";

/// Open the database stored in the `db_path` directory.
pub async fn async_db(db_path: &str) -> Result<Connection, Error> {
    let path = format!("{}/{}", db_path.trim_end_matches('/'), DB_FILE_NAME);
    let db = Connection::open(path).await?;
    db.call(|conn| {
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(())
    })
    .await?;
    Ok(db)
}

/// Create all tables. Safe to run against an existing database.
pub fn initialize_db(conn: &SyncConnection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS calendar_event (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            location TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            client_ref INTEGER,
            property_ref INTEGER,
            confirmation_ref INTEGER,
            dedupe_key TEXT NOT NULL,
            sync_status TEXT NOT NULL DEFAULT 'pending',
            external_event_id TEXT,
            sync_error TEXT,
            last_sync_at TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS oauth_token (
            service TEXT PRIMARY KEY,
            refresh_token TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        "#,
    )?;
    migrate_db(conn)
}

/// Apply schema changes on top of `initialize_db`. Every statement
/// must be idempotent.
pub fn migrate_db(conn: &SyncConnection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS calendar_event_dedupe_key_idx
            ON calendar_event(dedupe_key);
        CREATE UNIQUE INDEX IF NOT EXISTS calendar_event_confirmation_ref_idx
            ON calendar_event(confirmation_ref)
            WHERE confirmation_ref IS NOT NULL;
        CREATE INDEX IF NOT EXISTS calendar_event_sync_status_idx
            ON calendar_event(sync_status);
        "#,
    )
}

/// In-memory database with the schema applied, for tests.
#[cfg(test)]
pub async fn memory_db() -> Result<Connection, Error> {
    let db = Connection::open_in_memory().await?;
    db.call(|conn| {
        initialize_db(conn)?;
        Ok(())
    })
    .await?;
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let db = memory_db().await.unwrap();
        db.call(|conn| {
            initialize_db(conn)?;
            migrate_db(conn)?;
            Ok(())
        })
        .await
        .unwrap();

        let tables: Vec<String> = db
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
                )?;
                let rows = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(rows)
            })
            .await
            .unwrap();
        assert_eq!(tables, vec!["calendar_event", "oauth_token"]);
    }

    #[tokio::test]
    async fn test_async_db_opens_file_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        let db = async_db(dir.path().to_str().unwrap()).await.unwrap();
        db.call(|conn| {
            initialize_db(conn)?;
            Ok(())
        })
        .await
        .unwrap();
        assert!(dir.path().join(DB_FILE_NAME).exists());
    }
}
