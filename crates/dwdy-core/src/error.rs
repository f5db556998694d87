//! Error handling
//!
//! Every failure the core raises is typed and carries a stable code, so the
//! CLI (or any other front end) can map it without string matching.
//! Nothing here is retried automatically: a local store has no transient
//! failure classes.

use std::io;
use thiserror::Error;

use crate::models::EntryKey;

/// Errors raised by diary, entry, and content operations
#[derive(Error, Debug)]
pub enum DwdyError {
    /// The operation needs a persisted diary id but the diary is transient
    #[error("Diary has not been saved yet")]
    DiaryNotStored,

    /// A chronological layout operation was called without a timestamp
    #[error("A timestamp is required for this layout")]
    MissingTimestamp,

    /// A manual layout insert was called without an anchor key
    #[error("An anchor entry key is required for this layout")]
    MissingAfterKey,

    /// Append at a key that already holds an entry
    #[error("Entry '{0}' already exists")]
    DuplicateEntry(EntryKey),

    /// A link operation referenced a key that does not exist
    #[error("Entry '{0}' not found")]
    EntryNotFound(EntryKey),

    /// Content index outside `[0, len)`
    #[error("Index {index} is out of bounds for {len} item(s)")]
    InvalidIndex { index: usize, len: usize },

    /// A required field is missing or a parameter is malformed
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Link pointers form a cycle or point at the wrong entry
    #[error("Broken entry links at '{0}'")]
    BrokenLink(EntryKey),

    /// A background worker failed or went away before finishing
    #[error("Worker error: {0}")]
    Worker(String),

    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON document could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DwdyError {
    /// Stable, machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            DwdyError::DiaryNotStored => "diary-not-stored",
            DwdyError::MissingTimestamp => "missing-timestamp",
            DwdyError::MissingAfterKey => "missing-after-key",
            DwdyError::DuplicateEntry(_) => "duplicate-entry",
            DwdyError::EntryNotFound(_) => "entry-not-found",
            DwdyError::InvalidIndex { .. } => "invalid-index",
            DwdyError::InvalidParams(_) => "invalid-params",
            DwdyError::BrokenLink(_) => "broken-link",
            DwdyError::Worker(_) => "worker",
            DwdyError::Database(_) => "database",
            DwdyError::Serialization(_) => "serialization",
            DwdyError::Io(_) => "io",
        }
    }

    /// Whether this error signals a corrupted entry list rather than bad input
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, DwdyError::EntryNotFound(_) | DwdyError::BrokenLink(_))
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        DwdyError::InvalidParams(msg.into())
    }
}

/// Check `index` against a list of `len` items
pub fn check_index(index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(DwdyError::InvalidIndex { index, len })
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, DwdyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            DwdyError::DiaryNotStored,
            DwdyError::MissingTimestamp,
            DwdyError::MissingAfterKey,
            DwdyError::DuplicateEntry(EntryKey::from("a")),
            DwdyError::EntryNotFound(EntryKey::from("a")),
            DwdyError::InvalidIndex { index: 1, len: 0 },
            DwdyError::invalid("x"),
            DwdyError::BrokenLink(EntryKey::from("a")),
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_check_index() {
        assert!(check_index(0, 1).is_ok());
        let err = check_index(1, 1).unwrap_err();
        assert!(matches!(err, DwdyError::InvalidIndex { index: 1, len: 1 }));
        assert!(check_index(0, 0).is_err());
    }

    #[test]
    fn test_invariant_violation_classification() {
        assert!(DwdyError::EntryNotFound(EntryKey::from("x")).is_invariant_violation());
        assert!(!DwdyError::MissingTimestamp.is_invariant_violation());
    }

    #[test]
    fn test_error_display() {
        let err = DwdyError::DuplicateEntry(EntryKey::from("20220110"));
        assert!(err.to_string().contains("20220110"));

        let err = DwdyError::InvalidIndex { index: 3, len: 2 };
        assert_eq!(err.to_string(), "Index 3 is out of bounds for 2 item(s)");
    }
}
