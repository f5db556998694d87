//! Storage layer
//!
//! Embedded SQLite is the only store. Each submodule covers one table and
//! exposes free functions over a borrowed `&Connection`, so the same code runs
//! against a plain connection (reads) or an open transaction (writes).
//!
//! ## Tables
//!
//! - `diaries` - Full diary documents
//! - `entries` - Entry rows with link pointers
//! - `attachments` - Binary payloads owned by content items
//! - `app_config` / `dwdy_config` - Settings documents

pub mod attachments;
pub mod db;
pub mod diaries;
pub mod entries;
pub mod schema;
pub mod settings;

pub use db::Database;
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
pub use settings::{AppConfig, DwdyConfig};
