use tracing::{info, warn};

use super::{LayoutStrategy, Selector};
use crate::bunch::Bunch;
use crate::error::{DwdyError, Result};
use crate::models::{Diary, Entry, EntryKey};
use crate::repository::{EntryRepository, Order};

/// Notebook diaries: entries kept in the order the user arranged them
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualLayout;

impl ManualLayout {
    fn walk(repo: &EntryRepository<'_>, diary: &Diary, order: Order) -> Result<Vec<Entry>> {
        repo.traverse(diary, order)?.collect()
    }
}

impl LayoutStrategy for ManualLayout {
    /// Insert a new page right after the anchor key
    fn insert_new_entry(
        &self,
        repo: &EntryRepository<'_>,
        diary: &mut Diary,
        selector: &Selector,
    ) -> Result<Entry> {
        let anchor_key = selector.require_key()?.clone();
        let diary_id = diary.require_id()?;

        let anchor = repo.fetch(diary_id, &anchor_key)?;
        if !anchor.is_stored() {
            return Err(DwdyError::EntryNotFound(anchor_key));
        }

        let entry = repo.append(diary, Entry::transient(diary_id, EntryKey::new("")))?;
        if let Some(successor) = anchor.next_key {
            repo.move_before(diary, &entry.key, &successor)?;
        }

        info!(
            "Created entry {} after {} in diary {}",
            entry.key, anchor_key, diary_id
        );
        repo.fetch(diary_id, &entry.key)
    }

    fn fetch_entry(
        &self,
        repo: &EntryRepository<'_>,
        diary: &Diary,
        selector: &Selector,
    ) -> Result<Entry> {
        let key = selector.require_key()?;
        repo.fetch(diary.require_id()?, key)
    }

    /// The whole list, from whichever end is reachable
    fn fetch_window(
        &self,
        repo: &EntryRepository<'_>,
        diary: &Diary,
        _selector: &Selector,
    ) -> Result<Bunch> {
        let diary_id = diary.require_id()?;

        let mut found = Self::walk(repo, diary, Order::Asc)?;
        if found.is_empty() && diary.last_entry_id.is_some() {
            warn!("No head entry in diary {}; walking back from the tail", diary_id);
            found = Self::walk(repo, diary, Order::Desc)?;
            found.reverse();
        }

        Ok(Bunch::from_entries(diary_id, found))
    }

    fn is_window_valid(&self, bunch: &Bunch, diary: &Diary, selector: &Selector) -> bool {
        diary.id == Some(bunch.diary_id)
            && selector.key.as_ref().is_some_and(|key| bunch.contains(key))
    }

    /// Place the key by its links: after its predecessor, at the head when it
    /// has none, else before its successor
    ///
    /// Keys already loaded are re-placed too, so a moved entry follows its links.
    fn upsert(&self, bunch: &mut Bunch, entry: &Entry) {
        bunch.remove(&entry.key);

        let index = match &entry.prev_key {
            None => 0,
            Some(prev) => bunch
                .position(prev)
                .map(|i| i + 1)
                .or_else(|| entry.next_key.as_ref().and_then(|next| bunch.position(next)))
                .unwrap_or(bunch.len()),
        };
        bunch.insert_at(index, entry.clone());
    }
}
