//! Diary documents
//!
//! A diary is saved as one JSON document; `title` and `last_entry_id` are
//! copied into indexed columns. Every save overwrites the whole document.

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Diary, EntryKey};

/// Overwrite the stored document of a persisted diary
pub fn save(conn: &Connection, diary: &Diary) -> Result<()> {
    let diary_id = diary.require_id()?;
    let document = serde_json::to_string(diary)?;

    conn.execute(
        r#"
        INSERT INTO diaries (diary_id, title, last_entry_id, document)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(diary_id) DO UPDATE SET
            title = excluded.title,
            last_entry_id = excluded.last_entry_id,
            document = excluded.document
        "#,
        params![
            diary_id.to_string(),
            diary.title,
            diary.last_entry_id.as_ref().map(EntryKey::as_str),
            document,
        ],
    )?;
    Ok(())
}

/// Load a diary by id
pub fn load(conn: &Connection, diary_id: Uuid) -> Result<Option<Diary>> {
    let document: Option<String> = conn
        .query_row(
            "SELECT document FROM diaries WHERE diary_id = ?1",
            params![diary_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    match document {
        Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
        None => Ok(None),
    }
}

/// All diaries, sorted by title
pub fn list(conn: &Connection) -> Result<Vec<Diary>> {
    let mut stmt = conn.prepare("SELECT document FROM diaries ORDER BY title, diary_id")?;
    let documents = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    documents
        .iter()
        .map(|doc| serde_json::from_str(doc).map_err(Into::into))
        .collect()
}

/// Delete a diary; entries and attachments go with it via cascade
pub fn delete(conn: &Connection, diary_id: Uuid) -> Result<bool> {
    let removed = conn.execute(
        "DELETE FROM diaries WHERE diary_id = ?1",
        params![diary_id.to_string()],
    )?;
    Ok(removed > 0)
}
