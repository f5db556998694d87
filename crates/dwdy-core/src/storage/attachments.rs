//! Attachment rows (the upload sink)

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DwdyError, Result};
use crate::models::{Attachment, EntryKey, UploadFile};

/// Store `file` for the entry and return the new attachment
pub fn upload(
    conn: &Connection,
    diary_id: Uuid,
    entry_key: &EntryKey,
    file: &UploadFile,
) -> Result<Attachment> {
    if file.name.trim().is_empty() {
        return Err(DwdyError::invalid("attachment file name is required"));
    }

    let attachment = Attachment {
        diary_id,
        entry_key: entry_key.clone(),
        attachment_id: Uuid::new_v4(),
        file_name: file.name.clone(),
        file_type: file.file_type.clone(),
        size: file.size(),
        created_at: Utc::now(),
        data: file.data.clone(),
    };

    conn.execute(
        r#"
        INSERT INTO attachments (diary_id, entry_key, attachment_id, file_name, file_type,
                                 size, created_at, data)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        params![
            diary_id.to_string(),
            entry_key.as_str(),
            attachment.attachment_id.to_string(),
            attachment.file_name,
            attachment.file_type,
            attachment.size as i64,
            attachment.created_at.timestamp_millis(),
            attachment.data,
        ],
    )?;

    debug!(
        "Uploaded attachment {} ({} bytes) for entry {}",
        attachment.attachment_id, attachment.size, entry_key
    );
    Ok(attachment)
}

/// Fetch an attachment with its payload
pub fn get(
    conn: &Connection,
    diary_id: Uuid,
    entry_key: &EntryKey,
    attachment_id: Uuid,
) -> Result<Option<Attachment>> {
    let row = conn
        .query_row(
            r#"
            SELECT file_name, file_type, size, created_at, data
            FROM attachments
            WHERE diary_id = ?1 AND entry_key = ?2 AND attachment_id = ?3
            "#,
            params![
                diary_id.to_string(),
                entry_key.as_str(),
                attachment_id.to_string()
            ],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, Vec<u8>>(4)?,
                ))
            },
        )
        .optional()?;

    Ok(row.map(|(file_name, file_type, size, created_at, data)| Attachment {
        diary_id,
        entry_key: entry_key.clone(),
        attachment_id,
        file_name,
        file_type,
        size: size as u64,
        created_at: DateTime::from_timestamp_millis(created_at).unwrap_or_default(),
        data,
    }))
}

/// Delete one attachment
pub fn delete(
    conn: &Connection,
    diary_id: Uuid,
    entry_key: &EntryKey,
    attachment_id: Uuid,
) -> Result<()> {
    let removed = conn.execute(
        "DELETE FROM attachments WHERE diary_id = ?1 AND entry_key = ?2 AND attachment_id = ?3",
        params![
            diary_id.to_string(),
            entry_key.as_str(),
            attachment_id.to_string()
        ],
    )?;
    debug!("Deleted {} attachment row(s) for {}", removed, attachment_id);
    Ok(())
}

/// Delete every attachment owned by an entry
pub fn delete_for_entry(conn: &Connection, diary_id: Uuid, entry_key: &EntryKey) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM attachments WHERE diary_id = ?1 AND entry_key = ?2",
        params![diary_id.to_string(), entry_key.as_str()],
    )?)
}

/// Number of attachments owned by an entry
pub fn count_for_entry(conn: &Connection, diary_id: Uuid, entry_key: &EntryKey) -> Result<u64> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM attachments WHERE diary_id = ?1 AND entry_key = ?2",
        params![diary_id.to_string(), entry_key.as_str()],
        |row| row.get(0),
    )?;
    Ok(n as u64)
}
