//! Layout strategies
//!
//! A diary's [`LayoutKind`] picks the strategy that decides where a new
//! entry goes, how a selector resolves to an entry, and which window of
//! entries is loaded around it.
//!
//! - [`ChronologicalLayout`]: calendar and timeline diaries, keyed by day
//! - [`ManualLayout`]: notebooks, ordered by hand
//! - [`GeographicLayout`]: map diaries, windowed by bounding box

mod chronological;
mod geographic;
mod manual;

pub use chronological::{day_start, month_range, window_range, ChronologicalLayout};
pub use geographic::GeographicLayout;
pub use manual::ManualLayout;

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::bunch::Bunch;
use crate::error::{DwdyError, Result};
use crate::feature::Feature;
use crate::models::{Diary, Entry, EntryKey, GeoPoint, LayoutKind};
use crate::repository::{EntryRepository, Order};

/// Where in a diary an operation is aimed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selector {
    pub timestamp: Option<DateTime<Utc>>,
    pub key: Option<EntryKey>,
    pub location: Option<GeoPoint>,
}

impl Selector {
    pub fn at_time(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: Some(timestamp),
            ..Self::default()
        }
    }

    pub fn at_key(key: impl Into<EntryKey>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::default()
        }
    }

    pub fn at_location(location: GeoPoint) -> Self {
        Self {
            location: Some(location),
            ..Self::default()
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_key(mut self, key: impl Into<EntryKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    pub fn require_timestamp(&self) -> Result<DateTime<Utc>> {
        self.timestamp.ok_or(DwdyError::MissingTimestamp)
    }

    pub fn require_key(&self) -> Result<&EntryKey> {
        self.key
            .as_ref()
            .filter(|k| !k.is_empty())
            .ok_or(DwdyError::MissingAfterKey)
    }

    pub fn require_location(&self) -> Result<GeoPoint> {
        self.location
            .ok_or_else(|| DwdyError::invalid("a location is required for this layout"))
    }
}

/// Ordering and windowing rules of one layout
pub trait LayoutStrategy: Send + Sync {
    /// Create (or return the existing) entry at `selector`
    fn insert_new_entry(
        &self,
        repo: &EntryRepository<'_>,
        diary: &mut Diary,
        selector: &Selector,
    ) -> Result<Entry>;

    /// Entry at `selector`; a transient entry when nothing is stored there
    fn fetch_entry(
        &self,
        repo: &EntryRepository<'_>,
        diary: &Diary,
        selector: &Selector,
    ) -> Result<Entry>;

    /// Load the window around `selector`
    fn fetch_window(
        &self,
        repo: &EntryRepository<'_>,
        diary: &Diary,
        selector: &Selector,
    ) -> Result<Bunch>;

    /// Whether `bunch` already covers `selector`
    fn is_window_valid(&self, bunch: &Bunch, diary: &Diary, selector: &Selector) -> bool;

    /// Merge a changed entry into `bunch`, keeping window order
    fn upsert(&self, bunch: &mut Bunch, entry: &Entry);

    /// First key to visit when stepping away from `from`
    fn neighbor_start(
        &self,
        _repo: &EntryRepository<'_>,
        _diary: &Diary,
        from: &Entry,
        order: Order,
    ) -> Result<Option<EntryKey>> {
        Ok(match order {
            Order::Asc => from.next_key.clone(),
            Order::Desc => from.prev_key.clone(),
        })
    }

    /// Nearest earlier entry holding content in `features`
    fn find_prev_non_empty(
        &self,
        repo: &EntryRepository<'_>,
        diary: &Diary,
        from: &Entry,
        features: &[Feature],
        limit: usize,
    ) -> Result<Option<Entry>> {
        let start = self.neighbor_start(repo, diary, from, Order::Desc)?;
        scan_non_empty(repo, diary.require_id()?, start, Order::Desc, features, limit)
    }

    /// Nearest later entry holding content in `features`
    fn find_next_non_empty(
        &self,
        repo: &EntryRepository<'_>,
        diary: &Diary,
        from: &Entry,
        features: &[Feature],
        limit: usize,
    ) -> Result<Option<Entry>> {
        let start = self.neighbor_start(repo, diary, from, Order::Asc)?;
        scan_non_empty(repo, diary.require_id()?, start, Order::Asc, features, limit)
    }
}

/// Follow links from `start` until an entry with content in `features`
///
/// Gives up with `None` at either end of the list or after `limit` steps.
fn scan_non_empty(
    repo: &EntryRepository<'_>,
    diary_id: Uuid,
    start: Option<EntryKey>,
    order: Order,
    features: &[Feature],
    limit: usize,
) -> Result<Option<Entry>> {
    let mut cursor = start;
    let mut steps = 0usize;

    while let Some(key) = cursor {
        if steps >= limit {
            warn!("Neighbour scan stopped after {} empty entries at {}", steps, key);
            return Ok(None);
        }
        steps += 1;

        let entry = repo.fetch(diary_id, &key)?;
        if !entry.is_stored() {
            return Ok(None);
        }
        if entry.has_content_in(features) {
            return Ok(Some(entry));
        }
        cursor = match order {
            Order::Asc => entry.next_key,
            Order::Desc => entry.prev_key,
        };
    }

    Ok(None)
}

static CHRONOLOGICAL: ChronologicalLayout = ChronologicalLayout;
static MANUAL: ManualLayout = ManualLayout;
static GEOGRAPHIC: GeographicLayout = GeographicLayout;

/// The strategy for a layout kind
pub fn strategy_for(kind: LayoutKind) -> &'static dyn LayoutStrategy {
    match kind {
        LayoutKind::Calendar | LayoutKind::Timeline => &CHRONOLOGICAL,
        LayoutKind::Notebook => &MANUAL,
        LayoutKind::Map => &GEOGRAPHIC,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentItem, TextContent};
    use crate::storage::{diaries, Database};

    fn setup() -> (Database, Diary) {
        let db = Database::open_in_memory().unwrap();
        let mut diary = Diary::new("Notebook", LayoutKind::Notebook);
        diary.id = Some(Uuid::new_v4());
        diaries::save(db.connection(), &diary).unwrap();
        (db, diary)
    }

    fn append(repo: &EntryRepository<'_>, diary: &mut Diary, key: &str, text: Option<&str>) {
        let mut entry = Entry::transient(diary.id.unwrap(), EntryKey::from(key));
        if let Some(text) = text {
            entry.content.push(ContentItem::Text(TextContent::new(text)));
        }
        repo.append(diary, entry).unwrap();
    }

    #[test]
    fn test_selector_requirements() {
        let empty = Selector::default();
        assert!(matches!(empty.require_timestamp(), Err(DwdyError::MissingTimestamp)));
        assert!(matches!(empty.require_key(), Err(DwdyError::MissingAfterKey)));
        assert!(matches!(empty.require_location(), Err(DwdyError::InvalidParams(_))));
        assert!(matches!(
            Selector::at_key("").require_key(),
            Err(DwdyError::MissingAfterKey)
        ));
    }

    #[test]
    fn test_strategy_for_kinds() {
        for kind in LayoutKind::ALL {
            // Every kind resolves to a strategy
            let _ = strategy_for(kind);
        }
    }

    #[test]
    fn test_neighbour_skips_empty_entries() {
        let (db, mut diary) = setup();
        let repo = EntryRepository::new(db.connection());
        append(&repo, &mut diary, "A", Some("first"));
        append(&repo, &mut diary, "B", None);
        append(&repo, &mut diary, "C", None);
        append(&repo, &mut diary, "D", Some("last"));

        let strategy = strategy_for(diary.layout);
        let features = [Feature::Text];
        let a = repo.fetch(diary.id.unwrap(), &EntryKey::from("A")).unwrap();
        let d = repo.fetch(diary.id.unwrap(), &EntryKey::from("D")).unwrap();

        let next = strategy
            .find_next_non_empty(&repo, &diary, &a, &features, 100)
            .unwrap()
            .unwrap();
        assert_eq!(next.key, EntryKey::from("D"));

        let prev = strategy
            .find_prev_non_empty(&repo, &diary, &d, &features, 100)
            .unwrap()
            .unwrap();
        assert_eq!(prev.key, EntryKey::from("A"));

        assert!(strategy
            .find_next_non_empty(&repo, &diary, &d, &features, 100)
            .unwrap()
            .is_none());
        assert!(strategy
            .find_next_non_empty(&repo, &diary, &a, &[Feature::Tag], 100)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_neighbour_scan_is_bounded() {
        let (db, mut diary) = setup();
        let repo = EntryRepository::new(db.connection());
        append(&repo, &mut diary, "A", Some("start"));
        for key in ["B", "C", "D"] {
            append(&repo, &mut diary, key, None);
        }
        append(&repo, &mut diary, "E", Some("end"));

        let strategy = strategy_for(diary.layout);
        let a = repo.fetch(diary.id.unwrap(), &EntryKey::from("A")).unwrap();
        let features = [Feature::Text];

        assert!(strategy
            .find_next_non_empty(&repo, &diary, &a, &features, 3)
            .unwrap()
            .is_none());
        assert!(strategy
            .find_next_non_empty(&repo, &diary, &a, &features, 4)
            .unwrap()
            .is_some());
    }
}
