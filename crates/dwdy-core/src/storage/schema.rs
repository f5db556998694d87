//! SQLite schema for diaries, entries, and attachments
//!
//! Diaries are stored as whole JSON documents with the indexed fields
//! duplicated into columns. Entries keep their link pointers, timestamp, and
//! location as columns so the layouts can range-scan them; content is JSON.

use rusqlite::{Connection, Result};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Diaries (full document, overwritten on every save)
        CREATE TABLE IF NOT EXISTS diaries (
            diary_id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            last_entry_id TEXT,
            document TEXT NOT NULL
        );

        -- Entries, linked per diary through prev/next keys
        CREATE TABLE IF NOT EXISTS entries (
            diary_id TEXT NOT NULL,
            entry_key TEXT NOT NULL,
            prev_entry_key TEXT,
            next_entry_key TEXT,
            timestamp INTEGER,
            longitude REAL,
            latitude REAL,
            title TEXT,
            content TEXT NOT NULL DEFAULT '{}',
            PRIMARY KEY (diary_id, entry_key),
            FOREIGN KEY (diary_id) REFERENCES diaries(diary_id) ON DELETE CASCADE
        );

        -- Binary payloads referenced by image/sound content
        CREATE TABLE IF NOT EXISTS attachments (
            diary_id TEXT NOT NULL,
            entry_key TEXT NOT NULL,
            attachment_id TEXT NOT NULL,
            file_name TEXT NOT NULL,
            file_type TEXT NOT NULL,
            size INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            data BLOB NOT NULL,
            PRIMARY KEY (diary_id, entry_key, attachment_id),
            FOREIGN KEY (diary_id) REFERENCES diaries(diary_id) ON DELETE CASCADE
        );

        -- Application settings (first row wins)
        CREATE TABLE IF NOT EXISTS app_config (
            config_id TEXT PRIMARY KEY,
            document TEXT NOT NULL
        );

        -- Session restore record
        CREATE TABLE IF NOT EXISTS dwdy_config (
            config_id TEXT PRIMARY KEY,
            document TEXT NOT NULL
        );

        -- Indexes for the fixed access patterns

        CREATE INDEX IF NOT EXISTS idx_diaries_title ON diaries(title);
        CREATE INDEX IF NOT EXISTS idx_diaries_last_entry_id ON diaries(last_entry_id);

        -- Chronological windows
        CREATE INDEX IF NOT EXISTS idx_entries_timestamp ON entries(diary_id, timestamp);

        -- Geographic windows (longitude narrowed by index, latitude filtered)
        CREATE INDEX IF NOT EXISTS idx_entries_location
            ON entries(diary_id, longitude, latitude);
        "#,
    )?;

    // Set schema version
    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_info WHERE key = 'version'")?;
    let result: Result<String> = stmt.query_row([], |row| row.get(0));

    match result {
        Ok(version_str) => Ok(version_str.parse().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check if schema needs initialization or migration
pub fn needs_init(conn: &Connection) -> bool {
    let table_exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_info'")
        .and_then(|mut stmt| stmt.exists([]))
        .unwrap_or(false);

    if !table_exists {
        return true;
    }

    match get_schema_version(conn) {
        Ok(Some(v)) => v < SCHEMA_VERSION,
        _ => true,
    }
}
