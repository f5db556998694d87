use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Utc};
use tracing::info;

use super::{LayoutStrategy, Selector};
use crate::bunch::{Bunch, TimeRange};
use crate::error::{DwdyError, Result};
use crate::models::{Diary, Entry, EntryKey};
use crate::repository::{EntryRepository, Order};
use crate::storage::entries;

/// Calendar and timeline diaries: one entry per UTC day, linked in date order
#[derive(Debug, Clone, Copy, Default)]
pub struct ChronologicalLayout;

/// Start of the UTC day containing `instant`
pub fn day_start(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.date_naive().and_time(NaiveTime::MIN).and_utc()
}

fn month_start(instant: DateTime<Utc>, offset: i32) -> Result<DateTime<Utc>> {
    let date = instant.date_naive();
    let first = NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
        .ok_or_else(|| DwdyError::invalid(format!("no month start for {instant}")))?;
    let months = Months::new(offset.unsigned_abs());
    let shifted = if offset >= 0 {
        first.checked_add_months(months)
    } else {
        first.checked_sub_months(months)
    }
    .ok_or_else(|| DwdyError::invalid(format!("month offset {offset} out of range")))?;
    Ok(shifted.and_time(NaiveTime::MIN).and_utc())
}

/// The calendar month containing `instant`
pub fn month_range(instant: DateTime<Utc>) -> Result<TimeRange> {
    Ok(TimeRange::new(
        month_start(instant, 0)?,
        month_start(instant, 1)? - Duration::milliseconds(1),
    ))
}

/// From the start of the previous month to the end of the next one
pub fn window_range(instant: DateTime<Utc>) -> Result<TimeRange> {
    Ok(TimeRange::new(
        month_start(instant, -1)?,
        month_start(instant, 2)? - Duration::milliseconds(1),
    ))
}

impl LayoutStrategy for ChronologicalLayout {
    fn insert_new_entry(
        &self,
        repo: &EntryRepository<'_>,
        diary: &mut Diary,
        selector: &Selector,
    ) -> Result<Entry> {
        let timestamp = day_start(selector.require_timestamp()?);
        let diary_id = diary.require_id()?;
        let conn = repo.connection();

        if let Some(existing) = entries::at_timestamp(conn, diary_id, timestamp)? {
            return Ok(existing);
        }

        let later = entries::first_after(conn, diary_id, timestamp)?;
        let key = EntryKey::from_date(timestamp.date_naive());
        let entry = repo.append(diary, Entry::transient(diary_id, key).with_timestamp(timestamp))?;

        if let Some(later) = later {
            repo.move_before(diary, &entry.key, &later.key)?;
        }

        info!("Created entry {} in diary {}", entry.key, diary_id);
        repo.fetch(diary_id, &entry.key)
    }

    fn fetch_entry(
        &self,
        repo: &EntryRepository<'_>,
        diary: &Diary,
        selector: &Selector,
    ) -> Result<Entry> {
        let timestamp = day_start(selector.require_timestamp()?);
        let diary_id = diary.require_id()?;

        match entries::at_timestamp(repo.connection(), diary_id, timestamp)? {
            Some(entry) => Ok(entry),
            None => Ok(
                Entry::transient(diary_id, EntryKey::from_date(timestamp.date_naive()))
                    .with_timestamp(timestamp),
            ),
        }
    }

    fn fetch_window(
        &self,
        repo: &EntryRepository<'_>,
        diary: &Diary,
        selector: &Selector,
    ) -> Result<Bunch> {
        let timestamp = selector.require_timestamp()?;
        let diary_id = diary.require_id()?;
        let range = window_range(timestamp)?;

        let found = entries::in_time_range(repo.connection(), diary_id, range.start, range.end)?;
        let mut bunch = Bunch::from_entries(diary_id, found);
        bunch.ts_range = Some(range);
        bunch.anchor_month = Some(month_range(timestamp)?);
        Ok(bunch)
    }

    fn is_window_valid(&self, bunch: &Bunch, diary: &Diary, selector: &Selector) -> bool {
        diary.id == Some(bunch.diary_id)
            && match (selector.timestamp, bunch.anchor_month) {
                (Some(ts), Some(month)) => month.contains(ts),
                _ => false,
            }
    }

    fn upsert(&self, bunch: &mut Bunch, entry: &Entry) {
        if bunch.contains(&entry.key) {
            bunch.insert_at(0, entry.clone());
            return;
        }

        let Some(ts) = entry.timestamp else {
            return;
        };
        if !bunch.ts_range.is_some_and(|range| range.contains(ts)) {
            return;
        }

        let index = bunch
            .entries()
            .position(|e| e.timestamp.is_some_and(|t| t > ts))
            .unwrap_or(bunch.len());
        bunch.insert_at(index, entry.clone());
    }

    /// Empty days have no links; start from the nearest stored day instead
    fn neighbor_start(
        &self,
        repo: &EntryRepository<'_>,
        diary: &Diary,
        from: &Entry,
        order: Order,
    ) -> Result<Option<EntryKey>> {
        let Some(ts) = from.timestamp.filter(|_| !from.is_stored()) else {
            return Ok(match order {
                Order::Asc => from.next_key.clone(),
                Order::Desc => from.prev_key.clone(),
            });
        };

        let later = entries::first_after(repo.connection(), diary.require_id()?, day_start(ts))?;
        Ok(match order {
            Order::Asc => later.map(|e| e.key),
            Order::Desc => match later {
                Some(e) => e.prev_key,
                None => diary.last_entry_id.clone(),
            },
        })
    }
}
