//! Data models for dwdy
//!
//! Defines the core data structures: diaries, entries, content items, and
//! attachments. Diaries and entries are plain values; persistence state is
//! tracked explicitly (`is_stored`) rather than inferred from identity.

mod attachment;
mod content;
mod diary;
mod entry;

pub use attachment::{Attachment, UploadFile};
pub use content::{
    ContentDraft, ContentItem, ContentMap, ImageContent, ImageDraft, SoundContent, SoundDraft,
    TextContent,
};
pub use diary::{Diary, DiaryConfig, LayoutKind, Template, SEARCH_HISTORY_LIMIT};
pub use entry::{Entry, EntryKey, EntryState, GeoBox, GeoPoint};
