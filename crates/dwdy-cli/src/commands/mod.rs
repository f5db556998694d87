pub mod config;
pub mod content;
pub mod diary;
pub mod entry;
pub mod maintenance;
