//! Entry rows
//!
//! Plain reads and writes against the `entries` table. Link maintenance
//! lives in the repository; these helpers never touch neighbours.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::{DwdyError, Result};
use crate::models::{ContentMap, Entry, EntryKey, GeoBox, GeoPoint};

const COLUMNS: &str = "diary_id, entry_key, prev_entry_key, next_entry_key, timestamp, \
                       longitude, latitude, title, content";

struct EntryRow {
    diary_id: String,
    entry_key: String,
    prev_entry_key: Option<String>,
    next_entry_key: Option<String>,
    timestamp: Option<i64>,
    longitude: Option<f64>,
    latitude: Option<f64>,
    title: Option<String>,
    content: String,
}

impl EntryRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            diary_id: row.get(0)?,
            entry_key: row.get(1)?,
            prev_entry_key: row.get(2)?,
            next_entry_key: row.get(3)?,
            timestamp: row.get(4)?,
            longitude: row.get(5)?,
            latitude: row.get(6)?,
            title: row.get(7)?,
            content: row.get(8)?,
        })
    }

    fn hydrate(self) -> Result<Entry> {
        let diary_id = Uuid::parse_str(&self.diary_id)
            .map_err(|e| DwdyError::invalid(format!("invalid diary id '{}': {e}", self.diary_id)))?;
        let content: ContentMap = serde_json::from_str(&self.content)?;

        let mut entry = Entry::transient(diary_id, EntryKey::from(self.entry_key));
        entry.prev_key = self.prev_entry_key.map(EntryKey::from);
        entry.next_key = self.next_entry_key.map(EntryKey::from);
        entry.timestamp = self.timestamp.and_then(DateTime::from_timestamp_millis);
        entry.location = match (self.longitude, self.latitude) {
            (Some(lon), Some(lat)) => Some(GeoPoint::new(lon, lat)),
            _ => None,
        };
        entry.title = self.title;
        entry.content = content;
        entry.mark_stored();
        Ok(entry)
    }
}

fn collect(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Entry>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, EntryRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(EntryRow::hydrate).collect()
}

/// Get an entry by composite key
pub fn get(conn: &Connection, diary_id: Uuid, key: &EntryKey) -> Result<Option<Entry>> {
    let sql = format!("SELECT {COLUMNS} FROM entries WHERE diary_id = ?1 AND entry_key = ?2");
    let row = conn
        .query_row(&sql, params![diary_id.to_string(), key.as_str()], EntryRow::from_row)
        .optional()?;
    row.map(EntryRow::hydrate).transpose()
}

/// Whether an entry exists at the composite key
pub fn exists(conn: &Connection, diary_id: Uuid, key: &EntryKey) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT 1 FROM entries WHERE diary_id = ?1 AND entry_key = ?2")?;
    Ok(stmt.exists(params![diary_id.to_string(), key.as_str()])?)
}

/// Insert or overwrite an entry row
pub fn put(conn: &Connection, entry: &Entry) -> Result<()> {
    if entry.key.is_empty() {
        return Err(DwdyError::invalid("entry key is required"));
    }

    let content = serde_json::to_string(&entry.content)?;
    conn.execute(
        r#"
        INSERT INTO entries (diary_id, entry_key, prev_entry_key, next_entry_key, timestamp,
                             longitude, latitude, title, content)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(diary_id, entry_key) DO UPDATE SET
            prev_entry_key = excluded.prev_entry_key,
            next_entry_key = excluded.next_entry_key,
            timestamp = excluded.timestamp,
            longitude = excluded.longitude,
            latitude = excluded.latitude,
            title = excluded.title,
            content = excluded.content
        "#,
        params![
            entry.diary_id.to_string(),
            entry.key.as_str(),
            entry.prev_key.as_ref().map(EntryKey::as_str),
            entry.next_key.as_ref().map(EntryKey::as_str),
            entry.timestamp.map(|t| t.timestamp_millis()),
            entry.location.map(|p| p.longitude),
            entry.location.map(|p| p.latitude),
            entry.title,
            content,
        ],
    )?;
    Ok(())
}

/// Delete an entry row
pub fn delete(conn: &Connection, diary_id: Uuid, key: &EntryKey) -> Result<()> {
    conn.execute(
        "DELETE FROM entries WHERE diary_id = ?1 AND entry_key = ?2",
        params![diary_id.to_string(), key.as_str()],
    )?;
    Ok(())
}

/// Key of an entry without a predecessor
pub fn head_key(conn: &Connection, diary_id: Uuid) -> Result<Option<EntryKey>> {
    let key: Option<String> = conn
        .query_row(
            "SELECT entry_key FROM entries WHERE diary_id = ?1 AND prev_entry_key IS NULL \
             ORDER BY entry_key LIMIT 1",
            params![diary_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(key.map(EntryKey::from))
}

/// Largest integer key in the diary (non-numeric keys count as 0)
pub fn max_numeric_key(conn: &Connection, diary_id: Uuid) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(CAST(entry_key AS INTEGER)), 0) FROM entries WHERE diary_id = ?1",
        params![diary_id.to_string()],
        |row| row.get(0),
    )?)
}

/// Entry stored at exactly `timestamp`
pub fn at_timestamp(
    conn: &Connection,
    diary_id: Uuid,
    timestamp: DateTime<Utc>,
) -> Result<Option<Entry>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM entries WHERE diary_id = ?1 AND timestamp = ?2 \
         ORDER BY entry_key LIMIT 1"
    );
    let row = conn
        .query_row(
            &sql,
            params![diary_id.to_string(), timestamp.timestamp_millis()],
            EntryRow::from_row,
        )
        .optional()?;
    row.map(EntryRow::hydrate).transpose()
}

/// Earliest entry strictly later than `timestamp`
pub fn first_after(
    conn: &Connection,
    diary_id: Uuid,
    timestamp: DateTime<Utc>,
) -> Result<Option<Entry>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM entries WHERE diary_id = ?1 AND timestamp > ?2 \
         ORDER BY timestamp ASC, entry_key ASC LIMIT 1"
    );
    let row = conn
        .query_row(
            &sql,
            params![diary_id.to_string(), timestamp.timestamp_millis()],
            EntryRow::from_row,
        )
        .optional()?;
    row.map(EntryRow::hydrate).transpose()
}

/// Entries with `start <= timestamp <= end`, sorted by timestamp
pub fn in_time_range(
    conn: &Connection,
    diary_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Entry>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM entries WHERE diary_id = ?1 AND timestamp BETWEEN ?2 AND ?3 \
         ORDER BY timestamp ASC, entry_key ASC"
    );
    collect(
        conn,
        &sql,
        params![
            diary_id.to_string(),
            start.timestamp_millis(),
            end.timestamp_millis()
        ],
    )
}

/// Entries inside `bounds`
///
/// The longitude range is narrowed by the index; latitude is filtered here.
pub fn in_geo_box(conn: &Connection, diary_id: Uuid, bounds: &GeoBox) -> Result<Vec<Entry>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM entries WHERE diary_id = ?1 AND longitude BETWEEN ?2 AND ?3 \
         ORDER BY longitude ASC, latitude ASC"
    );
    let entries = collect(
        conn,
        &sql,
        params![
            diary_id.to_string(),
            bounds.min_longitude,
            bounds.max_longitude
        ],
    )?;
    Ok(entries
        .into_iter()
        .filter(|e| e.location.is_some_and(|p| bounds.contains_point(p)))
        .collect())
}

/// Entry stored at exactly `point`
pub fn at_location(conn: &Connection, diary_id: Uuid, point: GeoPoint) -> Result<Option<Entry>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM entries WHERE diary_id = ?1 AND longitude = ?2 AND latitude = ?3 \
         ORDER BY entry_key LIMIT 1"
    );
    let row = conn
        .query_row(
            &sql,
            params![diary_id.to_string(), point.longitude, point.latitude],
            EntryRow::from_row,
        )
        .optional()?;
    row.map(EntryRow::hydrate).transpose()
}

/// Every entry of a diary, in key order (maintenance scans only)
pub fn all(conn: &Connection, diary_id: Uuid) -> Result<Vec<Entry>> {
    let sql = format!("SELECT {COLUMNS} FROM entries WHERE diary_id = ?1 ORDER BY entry_key");
    collect(conn, &sql, params![diary_id.to_string()])
}

/// Number of stored entries in a diary
pub fn count(conn: &Connection, diary_id: Uuid) -> Result<u64> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM entries WHERE diary_id = ?1",
        params![diary_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(n as u64)
}
