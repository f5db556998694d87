//! Bunch cache
//!
//! A bunch is the window of entries currently loaded for navigation: a few
//! months around a date, a whole notebook, or a map box. The cache keeps one
//! bunch and only goes back to the store when the layout says the requested
//! selector falls outside it.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::layout::{strategy_for, Selector};
use crate::models::{Diary, Entry, EntryKey, GeoBox};
use crate::repository::EntryRepository;

/// Inclusive time range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

/// A loaded window of entries
#[derive(Debug, Clone, Default)]
pub struct Bunch {
    pub diary_id: Uuid,
    /// Keys in window order
    pub entry_keys: Vec<EntryKey>,
    pub entry_map: HashMap<EntryKey, Entry>,
    /// Time span actually loaded (chronological windows)
    pub ts_range: Option<TimeRange>,
    /// Month the window was fetched for; the window stays valid inside it
    pub anchor_month: Option<TimeRange>,
    /// Timestamp index of the loaded entries
    pub ts_key_map: BTreeMap<DateTime<Utc>, EntryKey>,
    /// Box actually loaded (map windows)
    pub geo_range: Option<GeoBox>,
}

impl Bunch {
    pub fn new(diary_id: Uuid) -> Self {
        Self {
            diary_id,
            ..Self::default()
        }
    }

    /// Build a bunch from entries already in window order
    pub fn from_entries(diary_id: Uuid, entries: Vec<Entry>) -> Self {
        let mut bunch = Self::new(diary_id);
        for entry in entries {
            bunch.push(entry);
        }
        bunch
    }

    /// Append an entry at the end of the window
    pub fn push(&mut self, entry: Entry) {
        self.insert_at(self.entry_keys.len(), entry);
    }

    /// Insert a new key at `index`, or refresh the stored entry if present
    pub fn insert_at(&mut self, index: usize, entry: Entry) {
        if !self.entry_map.contains_key(&entry.key) {
            let index = index.min(self.entry_keys.len());
            self.entry_keys.insert(index, entry.key.clone());
        }
        self.index_timestamp(&entry);
        self.entry_map.insert(entry.key.clone(), entry);
    }

    /// Drop `key` from the window
    pub fn remove(&mut self, key: &EntryKey) -> Option<Entry> {
        let entry = self.entry_map.remove(key)?;
        self.entry_keys.retain(|k| k != key);
        self.ts_key_map.retain(|_, k| k != key);
        Some(entry)
    }

    fn index_timestamp(&mut self, entry: &Entry) {
        self.ts_key_map.retain(|_, key| key != &entry.key);
        if let Some(ts) = entry.timestamp {
            self.ts_key_map.insert(ts, entry.key.clone());
        }
    }

    pub fn contains(&self, key: &EntryKey) -> bool {
        self.entry_map.contains_key(key)
    }

    pub fn get(&self, key: &EntryKey) -> Option<&Entry> {
        self.entry_map.get(key)
    }

    pub fn len(&self) -> usize {
        self.entry_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry_keys.is_empty()
    }

    /// Entries in window order
    pub fn entries(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.entry_keys.iter().filter_map(|k| self.entry_map.get(k))
    }

    pub fn position(&self, key: &EntryKey) -> Option<usize> {
        self.entry_keys.iter().position(|k| k == key)
    }
}

/// Holds the current bunch and counts how often the store was scanned
#[derive(Debug, Default)]
pub struct BunchCache {
    bunch: Option<Bunch>,
    fetches: usize,
}

impl BunchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The window containing `selector`, fetched only when the cached one
    /// is no longer valid
    pub fn window(
        &mut self,
        repo: &EntryRepository<'_>,
        diary: &Diary,
        selector: &Selector,
    ) -> Result<&Bunch> {
        let strategy = strategy_for(diary.layout);

        let bunch = match self.bunch.take() {
            Some(cached) if strategy.is_window_valid(&cached, diary, selector) => {
                debug!("Reusing cached bunch of {} entries", cached.len());
                cached
            }
            _ => {
                let fresh = strategy.fetch_window(repo, diary, selector)?;
                self.fetches += 1;
                debug!("Fetched bunch of {} entries", fresh.len());
                fresh
            }
        };

        Ok(self.bunch.insert(bunch))
    }

    /// Merge a changed entry into the cached bunch, if it belongs there
    pub fn upsert(&mut self, diary: &Diary, entry: &Entry) {
        if let Some(bunch) = self.bunch.as_mut() {
            if bunch.diary_id == entry.diary_id {
                strategy_for(diary.layout).upsert(bunch, entry);
            }
        }
    }

    /// Drop the cached bunch so the next lookup refetches
    pub fn invalidate(&mut self) {
        self.bunch = None;
    }

    pub fn current(&self) -> Option<&Bunch> {
        self.bunch.as_ref()
    }

    /// Number of window fetches that went to the store
    pub fn store_fetches(&self) -> usize {
        self.fetches
    }
}
