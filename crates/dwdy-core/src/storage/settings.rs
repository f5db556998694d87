//! Settings documents (`app_config`, `dwdy_config`)
//!
//! Both tables hold JSON documents keyed by a generated id. Reads take the
//! first row; saves overwrite that row or create it.

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::feature::{deserialize_known_list, Feature};
use crate::models::{EntryKey, LayoutKind};

/// Application-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Features available to every diary
    #[serde(default = "all_features", deserialize_with = "deserialize_known_list")]
    pub enabled_features: Vec<Feature>,
    /// Layout given to newly created diaries
    #[serde(default)]
    pub default_layout: LayoutKind,
}

fn all_features() -> Vec<Feature> {
    Feature::ALL.to_vec()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            enabled_features: all_features(),
            default_layout: LayoutKind::default(),
        }
    }
}

/// What to reopen on the next start
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DwdyConfig {
    pub last_diary_id: Option<Uuid>,
    pub last_entry_key: Option<EntryKey>,
}

trait SettingsTable: Serialize + DeserializeOwned + Default {
    const TABLE: &'static str;
}

impl SettingsTable for AppConfig {
    const TABLE: &'static str = "app_config";
}

impl SettingsTable for DwdyConfig {
    const TABLE: &'static str = "dwdy_config";
}

fn first_row(conn: &Connection, table: &str) -> Result<Option<(String, String)>> {
    let sql = format!("SELECT config_id, document FROM {table} ORDER BY rowid LIMIT 1");
    Ok(conn
        .query_row(&sql, [], |row| Ok((row.get(0)?, row.get(1)?)))
        .optional()?)
}

fn load<T: SettingsTable>(conn: &Connection) -> Result<T> {
    match first_row(conn, T::TABLE)? {
        Some((_, document)) => Ok(serde_json::from_str(&document)?),
        None => Ok(T::default()),
    }
}

fn save<T: SettingsTable>(conn: &Connection, value: &T) -> Result<()> {
    let document = serde_json::to_string(value)?;
    let config_id = match first_row(conn, T::TABLE)? {
        Some((id, _)) => id,
        None => Uuid::new_v4().to_string(),
    };

    let sql = format!(
        "INSERT INTO {} (config_id, document) VALUES (?1, ?2) \
         ON CONFLICT(config_id) DO UPDATE SET document = excluded.document",
        T::TABLE
    );
    conn.execute(&sql, params![config_id, document])?;
    Ok(())
}

/// Load application settings (defaults when none are stored)
pub fn load_app_config(conn: &Connection) -> Result<AppConfig> {
    load(conn)
}

pub fn save_app_config(conn: &Connection, config: &AppConfig) -> Result<()> {
    save(conn, config)
}

/// Load the session restore record
pub fn load_dwdy_config(conn: &Connection) -> Result<DwdyConfig> {
    load(conn)
}

pub fn save_dwdy_config(conn: &Connection, config: &DwdyConfig) -> Result<()> {
    save(conn, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    #[test]
    fn test_defaults_when_empty() {
        let db = Database::open_in_memory().unwrap();
        let app = load_app_config(db.connection()).unwrap();
        assert_eq!(app.enabled_features, Feature::ALL.to_vec());
        assert_eq!(app.default_layout, LayoutKind::Calendar);
        assert_eq!(load_dwdy_config(db.connection()).unwrap(), DwdyConfig::default());
    }

    #[test]
    fn test_save_overwrites_first_row() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();

        let mut app = AppConfig {
            enabled_features: vec![Feature::Text],
            default_layout: LayoutKind::Notebook,
        };
        save_app_config(conn, &app).unwrap();
        app.enabled_features.push(Feature::Tag);
        save_app_config(conn, &app).unwrap();

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM app_config", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(load_app_config(conn).unwrap(), app);
    }

    #[test]
    fn test_first_row_wins() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        conn.execute(
            "INSERT INTO dwdy_config (config_id, document) VALUES ('a', ?1)",
            [r#"{"last_diary_id":null,"last_entry_key":"20220110"}"#],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO dwdy_config (config_id, document) VALUES ('b', ?1)",
            [r#"{"last_diary_id":null,"last_entry_key":"other"}"#],
        )
        .unwrap();

        let loaded = load_dwdy_config(conn).unwrap();
        assert_eq!(loaded.last_entry_key, Some(EntryKey::from("20220110")));
    }

    #[test]
    fn test_unknown_features_dropped() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        conn.execute(
            "INSERT INTO app_config (config_id, document) VALUES ('a', ?1)",
            [r#"{"enabled_features":["text","video"],"default_layout":"map"}"#],
        )
        .unwrap();

        let app = load_app_config(conn).unwrap();
        assert_eq!(app.enabled_features, vec![Feature::Text]);
        assert_eq!(app.default_layout, LayoutKind::Map);
    }
}
