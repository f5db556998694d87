//! Navigation context: the open diary, the cursor entry, and the window
//!
//! A `Session` is passed explicitly to whatever drives navigation; nothing
//! in the core keeps a "current diary" of its own. It never listens on its
//! own either: feed it the journal's events with [`Session::observe`] (or
//! drain a subscription with [`Session::sync`]) to keep the cached window
//! and diary in step with committed writes.

use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::debug;

use crate::bunch::{Bunch, BunchCache};
use crate::error::Result;
use crate::journal::{Journal, JournalEvent};
use crate::layout::Selector;
use crate::models::{Diary, Entry, EntryKey};
use crate::repository::Order;
use crate::storage::DwdyConfig;

pub struct Session {
    diary: Diary,
    cursor: Option<Entry>,
    cache: BunchCache,
}

impl Session {
    pub fn new(diary: Diary) -> Self {
        Self {
            diary,
            cursor: None,
            cache: BunchCache::new(),
        }
    }

    /// Reopen the diary and entry remembered by [`Session::remember`]
    pub fn restore(journal: &Journal) -> Result<Option<Session>> {
        let saved = journal.dwdy_config()?;
        let Some(diary_id) = saved.last_diary_id else {
            return Ok(None);
        };
        let Some(diary) = journal.load_diary(diary_id)? else {
            debug!("Remembered diary {} no longer exists", diary_id);
            return Ok(None);
        };

        let mut session = Session::new(diary);
        if let Some(key) = saved.last_entry_key {
            let entry = journal.entry(&session.diary, &key)?;
            if entry.is_stored() {
                session.cursor = Some(entry);
            }
        }
        Ok(Some(session))
    }

    /// Persist the diary id and cursor key for the next start
    pub fn remember(&self, journal: &mut Journal) -> Result<()> {
        journal.save_dwdy_config(&DwdyConfig {
            last_diary_id: Some(self.diary.require_id()?),
            last_entry_key: self.cursor_key().cloned(),
        })
    }

    pub fn diary(&self) -> &Diary {
        &self.diary
    }

    /// The diary to hand to `Journal` write operations
    pub fn diary_mut(&mut self) -> &mut Diary {
        &mut self.diary
    }

    /// Entry under the cursor; may be transient (an empty day)
    pub fn cursor(&self) -> Option<&Entry> {
        self.cursor.as_ref()
    }

    pub fn cursor_key(&self) -> Option<&EntryKey> {
        self.cursor
            .as_ref()
            .map(|entry| &entry.key)
            .filter(|key| !key.is_empty())
    }

    pub fn cache(&self) -> &BunchCache {
        &self.cache
    }

    /// Put the cursor on `selector` and return the window around it
    pub fn open(&mut self, journal: &Journal, selector: &Selector) -> Result<&Bunch> {
        let entry = journal.fetch_entry(&self.diary, selector)?;
        self.cursor = Some(entry);
        let repo = journal.repository();
        self.cache.window(&repo, &self.diary, selector)
    }

    /// Move the cursor to the nearest non-empty entry in `order`
    ///
    /// The cursor stays put when there is none.
    pub fn step(&mut self, journal: &Journal, order: Order) -> Result<Option<&Entry>> {
        let Some(from) = self.cursor.as_ref() else {
            return Ok(None);
        };

        let found = match order {
            Order::Asc => journal.find_next_non_empty(&self.diary, from)?,
            Order::Desc => journal.find_prev_non_empty(&self.diary, from)?,
        };
        match found {
            Some(entry) => {
                self.cursor = Some(entry);
                Ok(self.cursor.as_ref())
            }
            None => Ok(None),
        }
    }

    /// Apply one committed change
    pub fn observe(&mut self, event: &JournalEvent) {
        match event {
            JournalEvent::EntryChanged(entry) if Some(entry.diary_id) == self.diary.id => {
                self.cache.upsert(&self.diary, entry);
                if self.cursor_key() == Some(&entry.key) {
                    self.cursor = Some(entry.clone());
                }
            }
            JournalEvent::EntryRemoved { diary_id, key } if Some(*diary_id) == self.diary.id => {
                // Neighbour links changed too
                self.cache.invalidate();
                if self.cursor_key() == Some(key) {
                    self.cursor = None;
                }
            }
            JournalEvent::DiaryChanged(diary) if diary.id == self.diary.id => {
                self.diary = diary.clone();
            }
            _ => {}
        }
    }

    /// Apply every pending event from `events`; returns how many were applied
    pub fn sync(&mut self, events: &mut broadcast::Receiver<JournalEvent>) -> usize {
        let mut applied = 0;
        loop {
            match events.try_recv() {
                Ok(event) => {
                    self.observe(&event);
                    applied += 1;
                }
                Err(TryRecvError::Lagged(missed)) => {
                    debug!("Session missed {} events; dropping cached window", missed);
                    self.cache.invalidate();
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentDraft, LayoutKind};
    use chrono::{TimeZone, Utc};

    fn calendar() -> (Journal, Session) {
        let mut journal = Journal::open_in_memory().unwrap();
        let diary = journal.create_diary("Days", Some(LayoutKind::Calendar)).unwrap();
        (journal, Session::new(diary))
    }

    fn day(d: u32) -> Selector {
        Selector::at_time(Utc.with_ymd_and_hms(2022, 3, d, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_open_on_empty_day_gives_transient_cursor() {
        let (journal, mut session) = calendar();
        let bunch = session.open(&journal, &day(5)).unwrap();
        assert!(bunch.is_empty());
        let cursor = session.cursor().unwrap();
        assert!(!cursor.is_stored());
        assert_eq!(cursor.key.as_str(), "20220305");
    }

    #[test]
    fn test_observe_keeps_window_and_cursor_current() {
        let (mut journal, mut session) = calendar();
        let mut events = journal.subscribe();
        session.open(&journal, &day(5)).unwrap();

        let key = EntryKey::new("20220305");
        journal
            .add_content(session.diary_mut(), &key, ContentDraft::text("spring"))
            .unwrap();
        let applied = session.sync(&mut events);
        assert_eq!(applied, 2);

        assert!(session.cursor().unwrap().is_stored());
        assert_eq!(session.cache().current().unwrap().entry_keys, vec![key.clone()]);
        assert_eq!(session.diary().entry_count, 1);

        // Still inside the anchor month: no refetch
        session.open(&journal, &day(20)).unwrap();
        assert_eq!(session.cache().store_fetches(), 1);

        journal.delete_entry(session.diary_mut(), &key).unwrap();
        session.sync(&mut events);
        assert!(session.cache().current().is_none());
    }

    #[test]
    fn test_step_skips_empty_days() {
        let (mut journal, mut session) = calendar();
        for (d, text) in [(1, Some("a")), (2, None), (3, Some("c"))] {
            let entry = journal.insert_entry(session.diary_mut(), &day(d)).unwrap();
            if let Some(text) = text {
                journal
                    .add_content(session.diary_mut(), &entry.key, ContentDraft::text(text))
                    .unwrap();
            }
        }

        session.open(&journal, &day(1)).unwrap();
        let next = session.step(&journal, Order::Asc).unwrap().unwrap();
        assert_eq!(next.key.as_str(), "20220303");
        assert!(session.step(&journal, Order::Asc).unwrap().is_none());
        assert_eq!(session.cursor_key().unwrap().as_str(), "20220303");

        let prev = session.step(&journal, Order::Desc).unwrap().unwrap();
        assert_eq!(prev.key.as_str(), "20220301");
    }

    fn keys(entries: impl Iterator<Item = EntryKey>) -> Vec<String> {
        entries.map(|key| key.to_string()).collect()
    }

    #[test]
    fn test_notebook_window_follows_moves() {
        let mut journal = Journal::open_in_memory().unwrap();
        let diary = journal.create_diary("Pages", Some(LayoutKind::Notebook)).unwrap();
        let mut session = Session::new(diary);
        for key in ["A", "B", "C"] {
            journal
                .append_entry(session.diary_mut(), Some(EntryKey::new(key)))
                .unwrap();
        }
        let mut events = journal.subscribe();
        let at_a = Selector::at_key("A");
        session.open(&journal, &at_a).unwrap();

        journal
            .move_before(session.diary_mut(), &EntryKey::new("C"), &EntryKey::new("A"))
            .unwrap();
        session.sync(&mut events);
        let cached = keys(session.open(&journal, &at_a).unwrap().entry_keys.iter().cloned());
        let stored = keys(journal.entries(session.diary(), Order::Asc).unwrap().into_iter().map(|e| e.key));
        assert_eq!(cached, stored);
        assert_eq!(cached, vec!["C", "A", "B"]);

        journal
            .move_to_last(session.diary_mut(), &EntryKey::new("A"))
            .unwrap();
        let at_b = Selector::at_key("B");
        journal.insert_entry(session.diary_mut(), &at_b).unwrap();
        session.sync(&mut events);

        let stored = journal.entries(session.diary(), Order::Asc).unwrap();
        let bunch = session.open(&journal, &at_b).unwrap();
        let cached = keys(bunch.entry_keys.iter().cloned());
        assert_eq!(cached, keys(stored.iter().map(|e| e.key.clone())));
        for entry in &stored {
            let cached = bunch.get(&entry.key).unwrap();
            assert_eq!((&cached.prev_key, &cached.next_key), (&entry.prev_key, &entry.next_key));
        }
        assert_eq!(session.cache().store_fetches(), 1);
    }

    #[test]
    fn test_remember_and_restore() {
        let (mut journal, mut session) = calendar();
        assert!(Session::restore(&journal).unwrap().is_none());

        let entry = journal.insert_entry(session.diary_mut(), &day(7)).unwrap();
        session.open(&journal, &day(7)).unwrap();
        session.remember(&mut journal).unwrap();

        let restored = Session::restore(&journal).unwrap().unwrap();
        assert_eq!(restored.diary().id, session.diary().id);
        assert_eq!(restored.cursor_key(), Some(&entry.key));
    }
}
