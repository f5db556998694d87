use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::content::{ContentItem, ContentMap};
use crate::feature::Feature;

/// Key of an entry within its diary
///
/// Chronological diaries use the `YYYYMMDD` form of the entry's day;
/// notebooks use generated integer keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryKey(String);

impl EntryKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key for a calendar day
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.format("%Y%m%d").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntryKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A longitude/latitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }
}

/// An axis-aligned bounding box in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBox {
    pub min_longitude: f64,
    pub max_longitude: f64,
    pub min_latitude: f64,
    pub max_latitude: f64,
}

impl GeoBox {
    /// Box centred on `center`, `span` degrees wide and tall
    pub fn around(center: GeoPoint, span: f64) -> Self {
        let half = span.abs() / 2.0;
        Self {
            min_longitude: center.longitude - half,
            max_longitude: center.longitude + half,
            min_latitude: center.latitude - half,
            max_latitude: center.latitude + half,
        }
    }

    pub fn contains_point(&self, point: GeoPoint) -> bool {
        (self.min_longitude..=self.max_longitude).contains(&point.longitude)
            && (self.min_latitude..=self.max_latitude).contains(&point.latitude)
    }

    /// Whether `other` lies entirely inside this box
    pub fn contains_box(&self, other: &GeoBox) -> bool {
        other.min_longitude >= self.min_longitude
            && other.max_longitude <= self.max_longitude
            && other.min_latitude >= self.min_latitude
            && other.max_latitude <= self.max_latitude
    }
}

/// Persistence state of an entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EntryState {
    /// Built in memory (or returned for a missing key); not in the store
    #[default]
    Transient,
    /// Loaded from or written to the store
    Persisted,
}

/// A diary entry
///
/// `prev_key`/`next_key` link the entries of one diary into a doubly linked
/// list. The pointers are keys, dereferenced through the repository; they
/// are never followed as in-memory references.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub diary_id: Uuid,
    pub key: EntryKey,
    pub prev_key: Option<EntryKey>,
    pub next_key: Option<EntryKey>,
    pub timestamp: Option<DateTime<Utc>>,
    pub location: Option<GeoPoint>,
    pub title: Option<String>,
    pub content: ContentMap,
    #[serde(skip)]
    state: EntryState,
}

impl Entry {
    /// A transient entry holding the given identity
    pub fn transient(diary_id: Uuid, key: EntryKey) -> Self {
        Self {
            diary_id,
            key,
            prev_key: None,
            next_key: None,
            timestamp: None,
            location: None,
            title: None,
            content: ContentMap::default(),
            state: EntryState::Transient,
        }
    }

    /// Whether this entry exists in the store
    ///
    /// Having a key is not enough: a constructed entry is transient until
    /// it has been saved.
    pub fn is_stored(&self) -> bool {
        self.state == EntryState::Persisted && !self.key.is_empty()
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub(crate) fn mark_stored(&mut self) {
        self.state = EntryState::Persisted;
    }

    pub(crate) fn mark_transient(&mut self) {
        self.state = EntryState::Transient;
    }

    /// Items of one feature (empty when the entry has none)
    pub fn items(&self, feature: Feature) -> &[ContentItem] {
        self.content.items(feature)
    }

    /// Whether the entry holds content for any of `features`
    pub fn has_content_in(&self, features: &[Feature]) -> bool {
        features.iter().any(|f| !self.items(*f).is_empty())
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}
