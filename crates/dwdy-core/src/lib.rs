//! dwdy Core Library
//!
//! This crate provides the core of dwdy, a local-first journaling system:
//! diaries whose entries form a doubly linked list, typed content with
//! per-feature statistics, and layouts that decide where new entries go and
//! which window of entries is loaded.
//!
//! # Architecture
//!
//! - **SQLite**: the only store; every write is one transaction
//! - **Journal**: the write path; publishes events after each commit
//! - **Session**: explicit navigation context holding the cached window
//!
//! # Quick Start
//!
//! ```text
//! let mut journal = Journal::open(Config::load()?)?;
//! let mut diary = journal.create_diary("Daily", None)?;
//!
//! let entry = journal.insert_entry(&mut diary, &Selector::at_time(Utc::now()))?;
//! journal.add_content(&mut diary, &entry.key, ContentDraft::text("hello"))?;
//!
//! let mut session = Session::new(diary);
//! let window = session.open(&journal, &Selector::at_time(Utc::now()))?;
//! ```
//!
//! # Modules
//!
//! - `journal`: transactional operations and events (main entry point)
//! - `models`: diaries, entries, content, and attachments
//! - `repository`: linked-list maintenance over stored entries
//! - `layout`: chronological, manual, and geographic strategies
//! - `bunch`: loaded entry windows and their cache
//! - `feature`: feature registry and stats
//! - `media`: image thumbnailing and sound recording workers
//! - `storage`: SQLite tables
//! - `config`: application configuration

pub mod bunch;
pub mod config;
pub mod error;
pub mod feature;
pub mod journal;
pub mod layout;
pub mod media;
pub mod models;
pub mod repository;
pub mod session;
pub mod storage;

pub use bunch::{Bunch, BunchCache, TimeRange};
pub use config::Config;
pub use error::{DwdyError, Result};
pub use feature::{Feature, FeatureBehavior, FeatureStat, StatDelta};
pub use journal::{fetch_content, FeatureDrift, Journal, JournalEvent, StatDrift};
pub use layout::{strategy_for, LayoutStrategy, Selector};
pub use models::{
    Attachment, ContentDraft, ContentItem, Diary, Entry, EntryKey, GeoPoint, LayoutKind,
    UploadFile,
};
pub use repository::{EntryRepository, LinkReport, Order};
pub use session::Session;
pub use storage::{AppConfig, Database, DwdyConfig};
