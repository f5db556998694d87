//! Entry repository
//!
//! Persists entries and keeps each diary's doubly linked list intact. Link
//! pointers are entry keys; every step re-reads the neighbour it is about to
//! rewrite, so no stale copy of a row is ever written back.
//!
//! All methods run against the borrowed connection. Callers wrap mutating
//! calls in [`Database::transaction`](crate::storage::Database::transaction);
//! a failure midway leaves nothing behind once the transaction rolls back.

use std::collections::HashSet;

use rusqlite::Connection;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DwdyError, Result};
use crate::models::{Diary, Entry, EntryKey};
use crate::storage::{attachments, diaries, entries};

/// Direction of a traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// First to last, following `next` pointers
    Asc,
    /// Last to first, following `prev` pointers
    Desc,
}

/// Result of a full link check
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LinkReport {
    /// Rows stored for the diary
    pub stored: u64,
    /// Keys without a predecessor
    pub heads: Vec<EntryKey>,
    /// Keys without a successor
    pub tails: Vec<EntryKey>,
    /// Whether the diary's `last_entry_id` names the single tail
    pub last_entry_matches: bool,
    /// Entries reached by walking forward from the head
    pub reachable: u64,
    /// Entries whose neighbour does not point back at them
    pub mismatched: Vec<EntryKey>,
    /// First key visited twice on the forward walk
    pub cycle_at: Option<EntryKey>,
}

impl LinkReport {
    pub fn is_consistent(&self) -> bool {
        if self.stored == 0 {
            return self.heads.is_empty() && self.tails.is_empty() && self.last_entry_matches;
        }
        self.heads.len() == 1
            && self.tails.len() == 1
            && self.last_entry_matches
            && self.reachable == self.stored
            && self.mismatched.is_empty()
            && self.cycle_at.is_none()
    }
}

/// Linked-list operations over the entries table
pub struct EntryRepository<'c> {
    conn: &'c Connection,
}

impl<'c> EntryRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &'c Connection {
        self.conn
    }

    /// Entry at `key`, or a transient entry holding that identity
    pub fn fetch(&self, diary_id: Uuid, key: &EntryKey) -> Result<Entry> {
        match entries::get(self.conn, diary_id, key)? {
            Some(entry) => Ok(entry),
            None => Ok(Entry::transient(diary_id, key.clone())),
        }
    }

    /// Stored entry at `key`; a missing row is a broken list
    fn require(&self, diary_id: Uuid, key: &EntryKey) -> Result<Entry> {
        entries::get(self.conn, diary_id, key)?
            .ok_or_else(|| DwdyError::EntryNotFound(key.clone()))
    }

    /// Key of the entry without a predecessor
    pub fn first_key(&self, diary_id: Uuid) -> Result<Option<EntryKey>> {
        entries::head_key(self.conn, diary_id)
    }

    /// Key for an append without an explicit key
    pub fn next_key(&self, diary_id: Uuid) -> Result<EntryKey> {
        let max = entries::max_numeric_key(self.conn, diary_id)?;
        let next = max.checked_add(1).ok_or_else(|| {
            DwdyError::invalid(format!(
                "no numeric key left after {max} in diary {diary_id}; append with an explicit key"
            ))
        })?;
        Ok(EntryKey::new(next.to_string()))
    }

    /// Persist an entry's own fields without touching its links
    ///
    /// The stored link pointers win over whatever `entry` carries.
    pub fn save(&self, entry: &mut Entry) -> Result<()> {
        if let Some(stored) = entries::get(self.conn, entry.diary_id, &entry.key)? {
            entry.prev_key = stored.prev_key;
            entry.next_key = stored.next_key;
        }
        entries::put(self.conn, entry)?;
        entry.mark_stored();
        Ok(())
    }

    /// Append `entry` after the diary's current last entry
    ///
    /// An empty key is replaced by [`next_key`](Self::next_key); an explicit
    /// key that already holds an entry fails with `DuplicateEntry`.
    pub fn append(&self, diary: &mut Diary, mut entry: Entry) -> Result<Entry> {
        let diary_id = diary.require_id()?;

        if entry.key.is_empty() {
            entry.key = self.next_key(diary_id)?;
        } else if entries::exists(self.conn, diary_id, &entry.key)? {
            return Err(DwdyError::DuplicateEntry(entry.key));
        }

        let previous_last = diary.last_entry_id.clone();
        if let Some(last_key) = &previous_last {
            let mut last = self.require(diary_id, last_key)?;
            last.next_key = Some(entry.key.clone());
            entries::put(self.conn, &last)?;
        }

        entry.diary_id = diary_id;
        entry.prev_key = previous_last;
        entry.next_key = None;
        entries::put(self.conn, &entry)?;
        entry.mark_stored();

        diary.last_entry_id = Some(entry.key.clone());
        diary.entry_count += 1;
        diaries::save(self.conn, diary)?;

        debug!(
            "Appended entry {} after {:?}",
            entry.key,
            entry.prev_key.as_ref().map(EntryKey::as_str)
        );
        Ok(entry)
    }

    /// Splice `source` out and reinsert it immediately before `target`
    pub fn move_before(&self, diary: &mut Diary, source: &EntryKey, target: &EntryKey) -> Result<()> {
        if source == target {
            return Ok(());
        }
        let diary_id = diary.require_id()?;

        let src = self.require(diary_id, source)?;
        // Fail before writing anything when the target is missing
        self.require(diary_id, target)?;
        if src.next_key.as_ref() == Some(target) {
            return Ok(());
        }

        self.detach(diary, &src)?;

        let tgt = self.require(diary_id, target)?;
        let new_prev = tgt.prev_key.clone();
        if let Some(prev_key) = &new_prev {
            let mut prev = self.require(diary_id, prev_key)?;
            prev.next_key = Some(source.clone());
            entries::put(self.conn, &prev)?;
        }

        let mut src = self.require(diary_id, source)?;
        src.prev_key = new_prev;
        src.next_key = Some(target.clone());
        entries::put(self.conn, &src)?;

        let mut tgt = self.require(diary_id, target)?;
        tgt.prev_key = Some(source.clone());
        entries::put(self.conn, &tgt)?;

        diaries::save(self.conn, diary)?;
        debug!("Moved entry {} before {}", source, target);
        Ok(())
    }

    /// Move `key` to the end of the list (no-op when already last)
    pub fn move_to_last(&self, diary: &mut Diary, key: &EntryKey) -> Result<()> {
        let diary_id = diary.require_id()?;
        let src = self.require(diary_id, key)?;
        if src.next_key.is_none() {
            return Ok(());
        }

        self.detach(diary, &src)?;

        let last_key = diary
            .last_entry_id
            .clone()
            .ok_or_else(|| DwdyError::BrokenLink(key.clone()))?;
        let mut last = self.require(diary_id, &last_key)?;
        last.next_key = Some(key.clone());
        entries::put(self.conn, &last)?;

        let mut src = self.require(diary_id, key)?;
        src.prev_key = Some(last_key);
        src.next_key = None;
        entries::put(self.conn, &src)?;

        diary.last_entry_id = Some(key.clone());
        diaries::save(self.conn, diary)?;
        debug!("Moved entry {} to the end", key);
        Ok(())
    }

    /// Detach `key` from its neighbours and save the diary
    ///
    /// The entry row stays, with both pointers cleared.
    pub fn unlink(&self, diary: &mut Diary, key: &EntryKey) -> Result<()> {
        let diary_id = diary.require_id()?;
        let entry = self.require(diary_id, key)?;
        self.detach(diary, &entry)?;
        diaries::save(self.conn, diary)
    }

    /// Unlink and delete an entry together with its attachments
    pub fn remove(&self, diary: &mut Diary, key: &EntryKey) -> Result<()> {
        let diary_id = diary.require_id()?;
        let entry = self.require(diary_id, key)?;
        self.detach(diary, &entry)?;

        let removed = attachments::delete_for_entry(self.conn, diary_id, key)?;
        if removed > 0 {
            debug!("Removed {} leftover attachment(s) of entry {}", removed, key);
        }
        entries::delete(self.conn, diary_id, key)?;

        diary.entry_count = diary.entry_count.saturating_sub(1);
        diaries::save(self.conn, diary)?;
        debug!("Removed entry {}", key);
        Ok(())
    }

    /// Bridge the neighbours of `entry` and clear its own pointers
    ///
    /// Updates `last_entry_id` in memory when `entry` was the tail; the
    /// caller saves the diary.
    fn detach(&self, diary: &mut Diary, entry: &Entry) -> Result<()> {
        let diary_id = entry.diary_id;

        if let Some(prev_key) = &entry.prev_key {
            let mut prev = self.require(diary_id, prev_key)?;
            prev.next_key = entry.next_key.clone();
            entries::put(self.conn, &prev)?;
        }

        match &entry.next_key {
            Some(next_key) => {
                let mut next = self.require(diary_id, next_key)?;
                next.prev_key = entry.prev_key.clone();
                entries::put(self.conn, &next)?;
            }
            None => diary.last_entry_id = entry.prev_key.clone(),
        }

        let mut detached = self.require(diary_id, &entry.key)?;
        detached.prev_key = None;
        detached.next_key = None;
        entries::put(self.conn, &detached)?;

        debug!(
            "Detached entry {} (prev {:?}, next {:?})",
            entry.key,
            entry.prev_key.as_ref().map(EntryKey::as_str),
            entry.next_key.as_ref().map(EntryKey::as_str)
        );
        Ok(())
    }

    /// Lazily walk the diary's list in `order`
    pub fn traverse(&self, diary: &Diary, order: Order) -> Result<Traverse<'c>> {
        let diary_id = diary.require_id()?;
        let start = match order {
            Order::Asc => self.first_key(diary_id)?,
            Order::Desc => diary.last_entry_id.clone(),
        };
        Ok(Traverse {
            conn: self.conn,
            diary_id,
            order,
            cursor: start,
            visited: HashSet::new(),
            done: false,
        })
    }

    /// Check every link of a diary against its stored rows
    pub fn verify_links(&self, diary: &Diary) -> Result<LinkReport> {
        let diary_id = diary.require_id()?;
        let rows = entries::all(self.conn, diary_id)?;

        let mut report = LinkReport {
            stored: rows.len() as u64,
            ..LinkReport::default()
        };

        for entry in &rows {
            if entry.prev_key.is_none() {
                report.heads.push(entry.key.clone());
            }
            if entry.next_key.is_none() {
                report.tails.push(entry.key.clone());
            }
            let back_ok = match &entry.next_key {
                Some(next_key) => rows
                    .iter()
                    .find(|e| &e.key == next_key)
                    .is_some_and(|next| next.prev_key.as_ref() == Some(&entry.key)),
                None => true,
            };
            if !back_ok {
                report.mismatched.push(entry.key.clone());
            }
        }

        report.last_entry_matches = match report.tails.as_slice() {
            [] => diary.last_entry_id.is_none(),
            [tail] => diary.last_entry_id.as_ref() == Some(tail),
            _ => false,
        };

        for step in self.traverse(diary, Order::Asc)? {
            match step {
                Ok(_) => report.reachable += 1,
                Err(DwdyError::BrokenLink(key)) => {
                    report.cycle_at = Some(key);
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }
}

/// Lazy walk over a diary's linked entries
///
/// Ends at the first pointer that resolves to no entry. A key reached twice
/// yields one `BrokenLink` error and ends the walk. Call
/// [`EntryRepository::traverse`] again to restart.
pub struct Traverse<'c> {
    conn: &'c Connection,
    diary_id: Uuid,
    order: Order,
    cursor: Option<EntryKey>,
    visited: HashSet<EntryKey>,
    done: bool,
}

impl Iterator for Traverse<'_> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let key = self.cursor.take()?;

        if !self.visited.insert(key.clone()) {
            self.done = true;
            return Some(Err(DwdyError::BrokenLink(key)));
        }

        match entries::get(self.conn, self.diary_id, &key) {
            Ok(Some(entry)) => {
                self.cursor = match self.order {
                    Order::Asc => entry.next_key.clone(),
                    Order::Desc => entry.prev_key.clone(),
                };
                Some(Ok(entry))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LayoutKind;
    use crate::storage::Database;

    fn setup() -> (Database, Diary) {
        let db = Database::open_in_memory().unwrap();
        let mut diary = Diary::new("Notebook", LayoutKind::Notebook);
        diary.id = Some(Uuid::new_v4());
        diaries::save(db.connection(), &diary).unwrap();
        (db, diary)
    }

    fn append_keys(repo: &EntryRepository<'_>, diary: &mut Diary, keys: &[&str]) {
        let diary_id = diary.id.unwrap();
        for key in keys {
            repo.append(diary, Entry::transient(diary_id, EntryKey::from(*key)))
                .unwrap();
        }
    }

    fn keys(repo: &EntryRepository<'_>, diary: &Diary, order: Order) -> Vec<String> {
        repo.traverse(diary, order)
            .unwrap()
            .map(|e| e.unwrap().key.to_string())
            .collect()
    }

    #[test]
    fn test_fetch_missing_is_transient() {
        let (db, diary) = setup();
        let repo = EntryRepository::new(db.connection());
        let entry = repo.fetch(diary.id.unwrap(), &EntryKey::from("x")).unwrap();
        assert!(!entry.is_stored());
        assert_eq!(entry.key, EntryKey::from("x"));
    }

    #[test]
    fn test_append_links_and_counts() {
        let (db, mut diary) = setup();
        let repo = EntryRepository::new(db.connection());
        append_keys(&repo, &mut diary, &["A", "B", "C"]);

        assert_eq!(keys(&repo, &diary, Order::Asc), vec!["A", "B", "C"]);
        assert_eq!(keys(&repo, &diary, Order::Desc), vec!["C", "B", "A"]);
        assert_eq!(diary.last_entry_id, Some(EntryKey::from("C")));
        assert_eq!(diary.entry_count, 3);

        let stored = diaries::load(db.connection(), diary.id.unwrap()).unwrap().unwrap();
        assert_eq!(stored.last_entry_id, Some(EntryKey::from("C")));
    }

    #[test]
    fn test_append_generates_numeric_keys() {
        let (db, mut diary) = setup();
        let repo = EntryRepository::new(db.connection());
        let diary_id = diary.id.unwrap();

        let first = repo.append(&mut diary, Entry::transient(diary_id, EntryKey::new(""))).unwrap();
        let second = repo.append(&mut diary, Entry::transient(diary_id, EntryKey::new(""))).unwrap();
        assert_eq!(first.key, EntryKey::from("1"));
        assert_eq!(second.key, EntryKey::from("2"));
        assert!(second.is_stored());
    }

    #[test]
    fn test_append_after_largest_numeric_key() {
        let (db, mut diary) = setup();
        let repo = EntryRepository::new(db.connection());
        let diary_id = diary.id.unwrap();
        append_keys(&repo, &mut diary, &["99999999999999999999"]);

        let err = repo
            .append(&mut diary, Entry::transient(diary_id, EntryKey::new("")))
            .unwrap_err();
        assert_eq!(err.code(), "invalid-params");
        assert_eq!(diary.entry_count, 1);
        assert_eq!(keys(&repo, &diary, Order::Asc), vec!["99999999999999999999"]);

        // Explicit keys still work
        append_keys(&repo, &mut diary, &["next"]);
        assert_eq!(diary.last_entry_id, Some(EntryKey::from("next")));
    }

    #[test]
    fn test_append_duplicate_key() {
        let (db, mut diary) = setup();
        let repo = EntryRepository::new(db.connection());
        append_keys(&repo, &mut diary, &["A"]);

        let diary_id = diary.id.unwrap();
        let err = repo
            .append(&mut diary, Entry::transient(diary_id, EntryKey::from("A")))
            .unwrap_err();
        assert!(matches!(err, DwdyError::DuplicateEntry(k) if k.as_str() == "A"));
        assert_eq!(diary.entry_count, 1);
    }

    #[test]
    fn test_append_requires_stored_diary() {
        let db = Database::open_in_memory().unwrap();
        let repo = EntryRepository::new(db.connection());
        let mut diary = Diary::new("Transient", LayoutKind::Notebook);
        let err = repo
            .append(&mut diary, Entry::transient(Uuid::new_v4(), EntryKey::from("A")))
            .unwrap_err();
        assert!(matches!(err, DwdyError::DiaryNotStored));
    }

    #[test]
    fn test_move_before_scenario() {
        let (db, mut diary) = setup();
        let repo = EntryRepository::new(db.connection());
        append_keys(&repo, &mut diary, &["A", "B", "C", "D", "E"]);

        repo.move_before(&mut diary, &EntryKey::from("B"), &EntryKey::from("D")).unwrap();
        repo.move_before(&mut diary, &EntryKey::from("C"), &EntryKey::from("A")).unwrap();

        assert_eq!(keys(&repo, &diary, Order::Asc), vec!["C", "A", "B", "D", "E"]);
        assert_eq!(keys(&repo, &diary, Order::Desc), vec!["E", "D", "B", "A", "C"]);
        assert!(repo.verify_links(&diary).unwrap().is_consistent());
    }

    #[test]
    fn test_move_before_self_and_repeat() {
        let (db, mut diary) = setup();
        let repo = EntryRepository::new(db.connection());
        append_keys(&repo, &mut diary, &["A", "B", "C"]);

        repo.move_before(&mut diary, &EntryKey::from("B"), &EntryKey::from("B")).unwrap();
        assert_eq!(keys(&repo, &diary, Order::Asc), vec!["A", "B", "C"]);

        repo.move_before(&mut diary, &EntryKey::from("C"), &EntryKey::from("A")).unwrap();
        repo.move_before(&mut diary, &EntryKey::from("C"), &EntryKey::from("A")).unwrap();
        assert_eq!(keys(&repo, &diary, Order::Asc), vec!["C", "A", "B"]);
        assert_eq!(diary.last_entry_id, Some(EntryKey::from("B")));
    }

    #[test]
    fn test_move_last_entry_updates_tail() {
        let (db, mut diary) = setup();
        let repo = EntryRepository::new(db.connection());
        append_keys(&repo, &mut diary, &["A", "B", "C"]);

        repo.move_before(&mut diary, &EntryKey::from("C"), &EntryKey::from("B")).unwrap();
        assert_eq!(keys(&repo, &diary, Order::Asc), vec!["A", "C", "B"]);
        assert_eq!(diary.last_entry_id, Some(EntryKey::from("B")));
        assert!(repo.verify_links(&diary).unwrap().is_consistent());
    }

    #[test]
    fn test_move_to_last() {
        let (db, mut diary) = setup();
        let repo = EntryRepository::new(db.connection());
        append_keys(&repo, &mut diary, &["A", "B", "C"]);

        repo.move_to_last(&mut diary, &EntryKey::from("A")).unwrap();
        assert_eq!(keys(&repo, &diary, Order::Asc), vec!["B", "C", "A"]);
        assert_eq!(diary.last_entry_id, Some(EntryKey::from("A")));

        repo.move_to_last(&mut diary, &EntryKey::from("A")).unwrap();
        assert_eq!(keys(&repo, &diary, Order::Asc), vec!["B", "C", "A"]);
    }

    #[test]
    fn test_move_missing_entry() {
        let (db, mut diary) = setup();
        let repo = EntryRepository::new(db.connection());
        append_keys(&repo, &mut diary, &["A", "B"]);

        let err = repo
            .move_before(&mut diary, &EntryKey::from("A"), &EntryKey::from("Z"))
            .unwrap_err();
        assert!(err.is_invariant_violation());
        assert_eq!(keys(&repo, &diary, Order::Asc), vec!["A", "B"]);
    }

    #[test]
    fn test_remove_head_middle_tail() {
        let (db, mut diary) = setup();
        let repo = EntryRepository::new(db.connection());
        append_keys(&repo, &mut diary, &["A", "B", "C", "D"]);

        repo.remove(&mut diary, &EntryKey::from("B")).unwrap();
        repo.remove(&mut diary, &EntryKey::from("A")).unwrap();
        repo.remove(&mut diary, &EntryKey::from("D")).unwrap();

        assert_eq!(keys(&repo, &diary, Order::Asc), vec!["C"]);
        assert_eq!(diary.last_entry_id, Some(EntryKey::from("C")));
        assert_eq!(diary.entry_count, 1);

        repo.remove(&mut diary, &EntryKey::from("C")).unwrap();
        assert_eq!(diary.last_entry_id, None);
        assert!(repo.verify_links(&diary).unwrap().is_consistent());
    }

    #[test]
    fn test_traverse_detects_cycle() {
        let (db, mut diary) = setup();
        let repo = EntryRepository::new(db.connection());
        append_keys(&repo, &mut diary, &["A", "B", "C"]);

        // Point C back at A
        let mut c = repo.fetch(diary.id.unwrap(), &EntryKey::from("C")).unwrap();
        c.next_key = Some(EntryKey::from("A"));
        entries::put(db.connection(), &c).unwrap();

        let steps: Vec<_> = repo.traverse(&diary, Order::Asc).unwrap().collect();
        assert_eq!(steps.len(), 4);
        assert!(matches!(&steps[3], Err(DwdyError::BrokenLink(k)) if k.as_str() == "A"));

        let report = repo.verify_links(&diary).unwrap();
        assert!(!report.is_consistent());
        assert_eq!(report.cycle_at, Some(EntryKey::from("A")));
        assert!(report.tails.is_empty());
    }

    #[test]
    fn test_save_keeps_stored_links() {
        let (db, mut diary) = setup();
        let repo = EntryRepository::new(db.connection());
        append_keys(&repo, &mut diary, &["A", "B"]);

        let mut stale = Entry::transient(diary.id.unwrap(), EntryKey::from("A")).with_title("Renamed");
        repo.save(&mut stale).unwrap();
        assert_eq!(stale.next_key, Some(EntryKey::from("B")));
        assert_eq!(keys(&repo, &diary, Order::Asc), vec!["A", "B"]);
    }
}
