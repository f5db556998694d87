use tracing::info;

use super::{LayoutStrategy, Selector};
use crate::bunch::Bunch;
use crate::error::Result;
use crate::models::{Diary, Entry, EntryKey, GeoBox, GeoPoint, LayoutKind};
use crate::repository::EntryRepository;
use crate::storage::entries;

const DEFAULT_SPAN_DEGREES: f64 = 1.0;

/// Map diaries: entries placed at a location, windowed by bounding box
#[derive(Debug, Clone, Copy, Default)]
pub struct GeographicLayout;

impl GeographicLayout {
    /// Box of the map layout's `span_degrees` centred on `center`
    pub fn window_box(diary: &Diary, center: GeoPoint) -> GeoBox {
        let span = diary
            .fetch_layout_config(LayoutKind::Map)
            .get("span_degrees")
            .and_then(|v| v.as_f64())
            .unwrap_or(DEFAULT_SPAN_DEGREES);
        GeoBox::around(center, span)
    }
}

fn location_order(a: &Entry, b: &Entry) -> std::cmp::Ordering {
    let key = |e: &Entry| e.location.map(|p| (p.longitude, p.latitude));
    key(a)
        .partial_cmp(&key(b))
        .unwrap_or(std::cmp::Ordering::Equal)
}

impl LayoutStrategy for GeographicLayout {
    /// Return the entry at the exact location, or append one there
    fn insert_new_entry(
        &self,
        repo: &EntryRepository<'_>,
        diary: &mut Diary,
        selector: &Selector,
    ) -> Result<Entry> {
        let location = selector.require_location()?;
        let diary_id = diary.require_id()?;

        if let Some(existing) = entries::at_location(repo.connection(), diary_id, location)? {
            return Ok(existing);
        }

        let entry = Entry::transient(diary_id, EntryKey::new("")).with_location(location);
        let entry = repo.append(diary, entry)?;
        info!(
            "Created entry {} at ({}, {}) in diary {}",
            entry.key, location.longitude, location.latitude, diary_id
        );
        Ok(entry)
    }

    fn fetch_entry(
        &self,
        repo: &EntryRepository<'_>,
        diary: &Diary,
        selector: &Selector,
    ) -> Result<Entry> {
        let location = selector.require_location()?;
        let diary_id = diary.require_id()?;

        match entries::at_location(repo.connection(), diary_id, location)? {
            Some(entry) => Ok(entry),
            None => Ok(Entry::transient(diary_id, EntryKey::new("")).with_location(location)),
        }
    }

    fn fetch_window(
        &self,
        repo: &EntryRepository<'_>,
        diary: &Diary,
        selector: &Selector,
    ) -> Result<Bunch> {
        let center = selector.require_location()?;
        let diary_id = diary.require_id()?;
        let bounds = Self::window_box(diary, center);

        let found = entries::in_geo_box(repo.connection(), diary_id, &bounds)?;
        let mut bunch = Bunch::from_entries(diary_id, found);
        bunch.geo_range = Some(bounds);
        Ok(bunch)
    }

    fn is_window_valid(&self, bunch: &Bunch, diary: &Diary, selector: &Selector) -> bool {
        if diary.id != Some(bunch.diary_id) {
            return false;
        }
        match (selector.location, bunch.geo_range) {
            (Some(center), Some(cached)) => cached.contains_box(&Self::window_box(diary, center)),
            _ => false,
        }
    }

    fn upsert(&self, bunch: &mut Bunch, entry: &Entry) {
        if bunch.contains(&entry.key) {
            bunch.insert_at(0, entry.clone());
            return;
        }

        let Some(location) = entry.location else {
            return;
        };
        if !bunch.geo_range.is_some_and(|range| range.contains_point(location)) {
            return;
        }

        let index = bunch
            .entries()
            .position(|e| location_order(e, entry).is_gt())
            .unwrap_or(bunch.len());
        bunch.insert_at(index, entry.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bunch::BunchCache;
    use crate::storage::{diaries, Database};
    use serde_json::json;
    use uuid::Uuid;

    fn setup() -> (Database, Diary) {
        let db = Database::open_in_memory().unwrap();
        let mut diary = Diary::new("Trips", LayoutKind::Map);
        diary.id = Some(Uuid::new_v4());
        let mut span = crate::feature::ConfigMap::new();
        span.insert("span_degrees".to_string(), json!(4.0));
        diary.patch_layout_config(LayoutKind::Map, &span);
        diaries::save(db.connection(), &diary).unwrap();
        (db, diary)
    }

    fn place(repo: &EntryRepository<'_>, diary: &mut Diary, lon: f64, lat: f64) -> Entry {
        GeographicLayout
            .insert_new_entry(repo, diary, &Selector::at_location(GeoPoint::new(lon, lat)))
            .unwrap()
    }

    #[test]
    fn test_insert_returns_existing_location() {
        let (db, mut diary) = setup();
        let repo = EntryRepository::new(db.connection());

        let first = place(&repo, &mut diary, 13.4, 52.5);
        let again = place(&repo, &mut diary, 13.4, 52.5);
        assert_eq!(first.key, again.key);
        assert_eq!(diary.entry_count, 1);
        assert_eq!(diary.last_entry_id, Some(first.key));
    }

    #[test]
    fn test_window_and_containment() {
        let (db, mut diary) = setup();
        let repo = EntryRepository::new(db.connection());
        place(&repo, &mut diary, 10.0, 50.0);
        place(&repo, &mut diary, 11.5, 51.0);
        place(&repo, &mut diary, 20.0, 50.0);

        let mut cache = BunchCache::new();
        let bunch = cache
            .window(&repo, &diary, &Selector::at_location(GeoPoint::new(10.0, 50.0)))
            .unwrap();
        assert_eq!(bunch.len(), 2);
        assert_eq!(
            bunch.geo_range,
            Some(GeoBox::around(GeoPoint::new(10.0, 50.0), 4.0))
        );

        // Identical box is contained
        cache
            .window(&repo, &diary, &Selector::at_location(GeoPoint::new(10.0, 50.0)))
            .unwrap();
        assert_eq!(cache.store_fetches(), 1);

        // Shifted box leaves the cached one
        cache
            .window(&repo, &diary, &Selector::at_location(GeoPoint::new(11.0, 50.0)))
            .unwrap();
        assert_eq!(cache.store_fetches(), 2);
    }

    #[test]
    fn test_location_required() {
        let (db, mut diary) = setup();
        let repo = EntryRepository::new(db.connection());
        let err = GeographicLayout
            .insert_new_entry(&repo, &mut diary, &Selector::at_key("1"))
            .unwrap_err();
        assert_eq!(err.code(), "invalid-params");
    }
}
