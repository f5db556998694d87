use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::entry::EntryKey;

/// A file handed to the upload sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    /// MIME type
    pub file_type: String,
    pub data: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, file_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            file_type: file_type.into(),
            data,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// A stored binary payload owned by one entry
///
/// Identity is `(diary_id, entry_key, attachment_id)`. Attachments are
/// deleted together with the content item that references them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub diary_id: Uuid,
    pub entry_key: EntryKey,
    pub attachment_id: Uuid,
    pub file_name: String,
    pub file_type: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub data: Vec<u8>,
}
