//! SQLite connection and transaction wrapper
//!
//! Every write in the core goes through [`Database::transaction`]: the
//! closure's `Ok` commits, an `Err` drops the transaction, which rolls back
//! all writes made inside it. Lower layers receive a `&Connection` and never
//! commit on their own.

use std::path::Path;

use rusqlite::{Connection, Transaction};
use tracing::debug;

use super::schema::{init_schema, needs_init};
use crate::config::Config;
use crate::error::{DwdyError, Result};

/// Owned SQLite connection holding the dwdy tables
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create the database under the configured data directory
    pub fn open(config: &Config) -> Result<Self> {
        Self::open_path(&config.sqlite_path())
    }

    /// Open or create the database at `path`
    pub fn open_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        debug!("Opened database at {:?}", path);
        Self::init(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        if needs_init(&conn) {
            init_schema(&conn)?;
        }

        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (reads only)
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` in one transaction, committing only if it succeeds
    pub fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let tx = self.conn.transaction()?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                debug!("Rolling back transaction: {}", err);
                tx.rollback().map_err(DwdyError::from)?;
                Err(err)
            }
        }
    }
}
