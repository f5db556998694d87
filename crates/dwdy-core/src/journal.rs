//! Journal: the write path for diaries, entries, and content
//!
//! The `Journal` owns the database and runs every mutation in one
//! transaction. Content mutations follow a fixed order inside that
//! transaction:
//!
//! 1. bounds-check the index (before anything is touched)
//! 2. mutate the entry's content list, running delete hooks
//! 3. save the entry
//! 4. apply the signed stat delta to the diary
//! 5. save the diary
//!
//! and, once committed, (6) publish a [`JournalEvent`]. Callers pass their
//! `Diary` by `&mut`; it is only updated after the commit succeeds.
//!
//! ## Usage
//!
//! ```ignore
//! let mut journal = Journal::open(Config::load()?)?;
//! let mut diary = journal.create_diary("Daily", None)?;
//!
//! let today = journal.insert_entry(&mut diary, &Selector::at_time(Utc::now()))?;
//! journal.add_content(&mut diary, &today.key, ContentDraft::text("hello world"))?;
//! ```

use chrono::NaiveDate;
use rusqlite::{Connection, Transaction};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{check_index, DwdyError, Result};
use crate::feature::{ContentOwner, Feature, FeatureStat, Sign};
use crate::layout::{strategy_for, Selector};
use crate::models::{
    ContentDraft, ContentItem, Diary, Entry, EntryKey, ImageContent, LayoutKind, SoundContent,
};
use crate::repository::{EntryRepository, LinkReport, Order};
use crate::storage::{attachments, diaries, entries, settings, AppConfig, Database, DwdyConfig};

const EVENT_CAPACITY: usize = 64;

/// Published after each committed write
#[derive(Debug, Clone, PartialEq)]
pub enum JournalEvent {
    /// An entry was created or its content/links changed
    EntryChanged(Entry),
    EntryRemoved { diary_id: Uuid, key: EntryKey },
    DiaryChanged(Diary),
}

/// Stat mismatch found by [`Journal::reconcile_stats`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureDrift {
    pub feature: Feature,
    pub stored: FeatureStat,
    pub actual: FeatureStat,
}

/// Result of a stat reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatDrift {
    pub features: Vec<FeatureDrift>,
    /// `(stored, actual)` when the entry count was wrong
    pub entry_count: Option<(u64, u64)>,
}

impl StatDrift {
    pub fn is_clean(&self) -> bool {
        self.features.is_empty() && self.entry_count.is_none()
    }
}

/// Transactional front door to one dwdy database
pub struct Journal {
    db: Database,
    config: Config,
    app_config: AppConfig,
    events: broadcast::Sender<JournalEvent>,
}

impl Journal {
    /// Open the journal stored under `config.data_dir`
    pub fn open(config: Config) -> Result<Self> {
        let db = Database::open(&config)?;
        Self::with_database(db, config)
    }

    /// Open a journal on an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::with_database(Database::open_in_memory()?, Config::default())
    }

    pub fn with_database(db: Database, config: Config) -> Result<Self> {
        let app_config = settings::load_app_config(db.connection())?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            db,
            config,
            app_config,
            events,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Receive an event for every committed write from now on
    pub fn subscribe(&self) -> broadcast::Receiver<JournalEvent> {
        self.events.subscribe()
    }

    /// Read-only repository over the current state
    pub fn repository(&self) -> EntryRepository<'_> {
        EntryRepository::new(self.db.connection())
    }

    fn publish(&self, event: JournalEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    fn publish_entry(&self, entry: Entry, diary: &Diary) {
        self.publish(JournalEvent::EntryChanged(entry));
        self.publish(JournalEvent::DiaryChanged(diary.clone()));
    }

    // ==================== Settings ====================

    pub fn app_config(&self) -> &AppConfig {
        &self.app_config
    }

    pub fn save_app_config(&mut self, app_config: AppConfig) -> Result<()> {
        self.db
            .transaction(|tx| settings::save_app_config(tx, &app_config))?;
        self.app_config = app_config;
        Ok(())
    }

    pub fn dwdy_config(&self) -> Result<DwdyConfig> {
        settings::load_dwdy_config(self.db.connection())
    }

    pub fn save_dwdy_config(&mut self, dwdy_config: &DwdyConfig) -> Result<()> {
        self.db
            .transaction(|tx| settings::save_dwdy_config(tx, dwdy_config))
    }

    // ==================== Diary Operations ====================

    /// Create and save a diary; `None` uses the app's default layout
    pub fn create_diary(&mut self, title: &str, layout: Option<LayoutKind>) -> Result<Diary> {
        if title.trim().is_empty() {
            return Err(DwdyError::invalid("diary title is required"));
        }
        let mut diary = Diary::new(title.trim(), layout.unwrap_or(self.app_config.default_layout));
        self.save_diary(&mut diary)?;
        Ok(diary)
    }

    /// Save a diary, assigning its id on first save
    pub fn save_diary(&mut self, diary: &mut Diary) -> Result<()> {
        let mut working = diary.clone();
        let created = working.id.is_none();
        if created {
            working.id = Some(Uuid::new_v4());
        }

        self.db.transaction(|tx| diaries::save(tx, &working))?;

        if created {
            info!("Created diary '{}' ({})", working.title, working.layout);
        }
        *diary = working;
        self.publish(JournalEvent::DiaryChanged(diary.clone()));
        Ok(())
    }

    /// Apply `change` to a copy of the diary and save it
    pub fn update_diary<F>(&mut self, diary: &mut Diary, change: F) -> Result<()>
    where
        F: FnOnce(&mut Diary),
    {
        diary.require_id()?;
        let mut working = diary.clone();
        change(&mut working);
        if working.id != diary.id {
            return Err(DwdyError::invalid("a diary's id cannot change"));
        }
        self.save_diary(&mut working)?;
        *diary = working;
        Ok(())
    }

    pub fn load_diary(&self, diary_id: Uuid) -> Result<Option<Diary>> {
        diaries::load(self.db.connection(), diary_id)
    }

    pub fn list_diaries(&self) -> Result<Vec<Diary>> {
        diaries::list(self.db.connection())
    }

    /// Delete a diary with all of its entries and attachments
    pub fn delete_diary(&mut self, diary_id: Uuid) -> Result<bool> {
        let removed = self.db.transaction(|tx| {
            let session = settings::load_dwdy_config(tx)?;
            if session.last_diary_id == Some(diary_id) {
                settings::save_dwdy_config(tx, &DwdyConfig::default())?;
            }
            diaries::delete(tx, diary_id)
        })?;
        if removed {
            info!("Deleted diary {}", diary_id);
        }
        Ok(removed)
    }

    // ==================== Entry Operations ====================

    /// The entry the diary's layout finds for `selector` (transient if none)
    pub fn fetch_entry(&self, diary: &Diary, selector: &Selector) -> Result<Entry> {
        strategy_for(diary.layout).fetch_entry(&self.repository(), diary, selector)
    }

    /// Entry at `key` (transient if missing)
    pub fn entry(&self, diary: &Diary, key: &EntryKey) -> Result<Entry> {
        self.repository().fetch(diary.require_id()?, key)
    }

    /// Entries in link order
    pub fn entries(&self, diary: &Diary, order: Order) -> Result<Vec<Entry>> {
        self.repository().traverse(diary, order)?.collect()
    }

    /// Insert (or find) the entry for `selector` using the diary's layout
    pub fn insert_entry(&mut self, diary: &mut Diary, selector: &Selector) -> Result<Entry> {
        let strategy = strategy_for(diary.layout);
        let entry = write(&mut self.db, diary, |tx, working| {
            strategy.insert_new_entry(&EntryRepository::new(tx), working, selector)
        })?;
        self.publish_relinked(diary, &entry.key, Vec::new())?;
        Ok(entry)
    }

    /// Append an entry at the end of the list, at `key` or a generated key
    pub fn append_entry(&mut self, diary: &mut Diary, key: Option<EntryKey>) -> Result<Entry> {
        let entry = write(&mut self.db, diary, |tx, working| {
            let diary_id = working.require_id()?;
            let entry = Entry::transient(diary_id, key.unwrap_or_else(|| EntryKey::new("")));
            EntryRepository::new(tx).append(working, entry)
        })?;
        self.publish_relinked(diary, &entry.key, Vec::new())?;
        Ok(entry)
    }

    /// Set or clear an entry's title
    pub fn set_entry_title(
        &mut self,
        diary: &mut Diary,
        key: &EntryKey,
        title: Option<String>,
    ) -> Result<Entry> {
        let entry = write(&mut self.db, diary, |tx, working| {
            let repo = EntryRepository::new(tx);
            let mut entry = require_stored(&repo, working, key)?;
            entry.title = title.filter(|t| !t.trim().is_empty());
            repo.save(&mut entry)?;
            Ok(entry)
        })?;
        self.publish(JournalEvent::EntryChanged(entry.clone()));
        Ok(entry)
    }

    /// Move `source` directly before `target`
    pub fn move_before(&mut self, diary: &mut Diary, source: &EntryKey, target: &EntryKey) -> Result<()> {
        let detached_from = self.neighbours(diary, source)?;
        write(&mut self.db, diary, |tx, working| {
            EntryRepository::new(tx).move_before(working, source, target)
        })?;
        self.publish_relinked(diary, source, detached_from)
    }

    /// Move `key` to the end of the list
    pub fn move_to_last(&mut self, diary: &mut Diary, key: &EntryKey) -> Result<()> {
        let detached_from = self.neighbours(diary, key)?;
        write(&mut self.db, diary, |tx, working| {
            EntryRepository::new(tx).move_to_last(working, key)
        })?;
        self.publish_relinked(diary, key, detached_from)
    }

    /// Current predecessor and successor keys of `key`
    fn neighbours(&self, diary: &Diary, key: &EntryKey) -> Result<Vec<EntryKey>> {
        let entry = self.repository().fetch(diary.require_id()?, key)?;
        Ok(entry.prev_key.into_iter().chain(entry.next_key).collect())
    }

    /// Publish `key`, then every entry whose links changed around it
    ///
    /// `key` goes first so observers can re-place the rewired entries after it.
    fn publish_relinked(&self, diary: &Diary, key: &EntryKey, mut touched: Vec<EntryKey>) -> Result<()> {
        let repo = self.repository();
        let diary_id = diary.require_id()?;

        let entry = repo.fetch(diary_id, key)?;
        if entry.is_stored() {
            touched.extend(entry.prev_key.iter().chain(&entry.next_key).cloned());
            self.publish(JournalEvent::EntryChanged(entry));
        }

        let mut published = vec![key.clone()];
        for neighbour in touched {
            if published.contains(&neighbour) {
                continue;
            }
            let entry = repo.fetch(diary_id, &neighbour)?;
            if entry.is_stored() {
                self.publish(JournalEvent::EntryChanged(entry));
            }
            published.push(neighbour);
        }

        self.publish(JournalEvent::DiaryChanged(diary.clone()));
        Ok(())
    }

    /// Delete an entry, its content, and its attachments
    pub fn delete_entry(&mut self, diary: &mut Diary, key: &EntryKey) -> Result<()> {
        write(&mut self.db, diary, |tx, working| {
            let repo = EntryRepository::new(tx);
            let entry = require_stored(&repo, working, key)?;
            let owner = ContentOwner {
                diary_id: entry.diary_id,
                entry_key: &entry.key,
            };

            for item in entry.content.iter() {
                let behavior = item.feature().behavior();
                behavior.on_delete(tx, owner, item)?;
                working.apply_stat_delta(item.feature(), &behavior.stat_delta(item), Sign::Remove);
            }

            repo.remove(working, key)
        })?;

        info!("Deleted entry {} from diary {}", key, diary.require_id()?);
        self.publish(JournalEvent::EntryRemoved {
            diary_id: diary.require_id()?,
            key: key.clone(),
        });
        self.publish(JournalEvent::DiaryChanged(diary.clone()));
        Ok(())
    }

    /// Nearest earlier entry with content in the diary's enabled features
    pub fn find_prev_non_empty(&self, diary: &Diary, from: &Entry) -> Result<Option<Entry>> {
        let features = self.visible_features(diary);
        strategy_for(diary.layout).find_prev_non_empty(
            &self.repository(),
            diary,
            from,
            &features,
            self.config.neighbor_scan_limit,
        )
    }

    /// Nearest later entry with content in the diary's enabled features
    pub fn find_next_non_empty(&self, diary: &Diary, from: &Entry) -> Result<Option<Entry>> {
        let features = self.visible_features(diary);
        strategy_for(diary.layout).find_next_non_empty(
            &self.repository(),
            diary,
            from,
            &features,
            self.config.neighbor_scan_limit,
        )
    }

    /// Features shown for the diary given what the app enables
    pub fn visible_features(&self, diary: &Diary) -> Vec<Feature> {
        diary
            .resolved_template(&self.app_config.enabled_features)
            .union()
    }

    /// Check the diary's link structure
    pub fn verify_links(&self, diary: &Diary) -> Result<LinkReport> {
        self.repository().verify_links(diary)
    }

    // ==================== Content Operations ====================

    /// Add a content item to the entry at `key`
    ///
    /// A missing entry is created first: chronological diaries read the day
    /// from the `YYYYMMDD` key and insert it in time order, other layouts
    /// append it at `key`.
    pub fn add_content(&mut self, diary: &mut Diary, key: &EntryKey, draft: ContentDraft) -> Result<Entry> {
        let entry = write(&mut self.db, diary, |tx, working| {
            let repo = EntryRepository::new(tx);
            let diary_id = working.require_id()?;
            let mut entry = repo.fetch(diary_id, key)?;
            if !entry.is_stored() {
                entry = persist_transient(&repo, working, entry)?;
            }

            let feature = draft.feature();
            let behavior = feature.behavior();

            if behavior.reorders_duplicates() {
                if let Some(value) = label_value(&draft) {
                    let items = entry.content.items_mut(feature);
                    if let Some(pos) = items.iter().position(|i| label_of(i) == Some(value.as_str())) {
                        let existing = items.remove(pos);
                        items.push(existing);
                        repo.save(&mut entry)?;
                        debug!("Moved existing {} '{}' to the end of {}", feature, value, entry.key);
                        return Ok(entry);
                    }
                }
            }

            let item = materialize(tx, diary_id, &entry.key, draft)?;
            let delta = behavior.stat_delta(&item);
            entry.content.push(item);
            repo.save(&mut entry)?;

            working.apply_stat_delta(feature, &delta, Sign::Add);
            diaries::save(tx, working)?;
            Ok(entry)
        })?;

        self.publish_entry(entry.clone(), diary);
        Ok(entry)
    }

    /// Replace the item at `index` of `feature`
    pub fn replace_content(
        &mut self,
        diary: &mut Diary,
        key: &EntryKey,
        feature: Feature,
        index: usize,
        draft: ContentDraft,
    ) -> Result<Entry> {
        if draft.feature() != feature {
            return Err(DwdyError::invalid(format!(
                "cannot put {} content into the {} list",
                draft.feature(),
                feature
            )));
        }

        let entry = write(&mut self.db, diary, |tx, working| {
            let repo = EntryRepository::new(tx);
            let mut entry = require_stored(&repo, working, key)?;
            check_index(index, entry.items(feature).len())?;

            let behavior = feature.behavior();
            if behavior.reorders_duplicates() {
                if let Some(value) = label_value(&draft) {
                    let clash = entry
                        .items(feature)
                        .iter()
                        .enumerate()
                        .any(|(i, item)| i != index && label_of(item) == Some(value.as_str()));
                    if clash {
                        return Err(DwdyError::invalid(format!(
                            "{} '{}' is already on entry {}",
                            feature, value, entry.key
                        )));
                    }
                }
            }

            let item = materialize(tx, entry.diary_id, &entry.key, draft)?;
            let new_delta = behavior.stat_delta(&item);
            let old = std::mem::replace(&mut entry.content.items_mut(feature)[index], item);
            let owner = ContentOwner {
                diary_id: entry.diary_id,
                entry_key: &entry.key,
            };
            behavior.on_delete(tx, owner, &old)?;
            repo.save(&mut entry)?;

            working.apply_stat_delta(feature, &behavior.stat_delta(&old), Sign::Remove);
            working.apply_stat_delta(feature, &new_delta, Sign::Add);
            diaries::save(tx, working)?;
            Ok(entry)
        })?;

        self.publish_entry(entry.clone(), diary);
        Ok(entry)
    }

    /// Delete the item at `index` of `feature`
    pub fn delete_content(
        &mut self,
        diary: &mut Diary,
        key: &EntryKey,
        feature: Feature,
        index: usize,
    ) -> Result<Entry> {
        let entry = write(&mut self.db, diary, |tx, working| {
            let repo = EntryRepository::new(tx);
            let mut entry = require_stored(&repo, working, key)?;
            check_index(index, entry.items(feature).len())?;

            let behavior = feature.behavior();
            let old = entry.content.items_mut(feature).remove(index);
            entry.content.prune();
            let owner = ContentOwner {
                diary_id: entry.diary_id,
                entry_key: &entry.key,
            };
            behavior.on_delete(tx, owner, &old)?;
            repo.save(&mut entry)?;

            working.apply_stat_delta(feature, &behavior.stat_delta(&old), Sign::Remove);
            diaries::save(tx, working)?;
            Ok(entry)
        })?;

        self.publish_entry(entry.clone(), diary);
        Ok(entry)
    }

    /// Move an item within its feature list
    pub fn move_content(
        &mut self,
        diary: &mut Diary,
        key: &EntryKey,
        feature: Feature,
        from: usize,
        to: usize,
    ) -> Result<Entry> {
        let entry = write(&mut self.db, diary, |tx, working| {
            let repo = EntryRepository::new(tx);
            let mut entry = require_stored(&repo, working, key)?;
            let len = entry.items(feature).len();
            check_index(from, len)?;
            check_index(to, len)?;

            if from != to {
                let items = entry.content.items_mut(feature);
                let item = items.remove(from);
                items.insert(to, item);
                repo.save(&mut entry)?;
            }
            Ok(entry)
        })?;

        self.publish(JournalEvent::EntryChanged(entry.clone()));
        Ok(entry)
    }

    // ==================== Search & Maintenance ====================

    /// Entries whose visible content matches `keyword`, in link order
    ///
    /// The keyword is recorded in the diary's search history.
    pub fn search(&mut self, diary: &mut Diary, keyword: &str) -> Result<Vec<Entry>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(DwdyError::invalid("search keyword is required"));
        }

        let features = self.visible_features(diary);
        let mut found = Vec::new();
        for entry in self.repository().traverse(diary, Order::Asc)? {
            let entry = entry?;
            let hit = features.iter().any(|feature| {
                let behavior = feature.behavior();
                entry
                    .items(*feature)
                    .iter()
                    .any(|item| behavior.matches_keyword(item, keyword))
            });
            if hit {
                found.push(entry);
            }
        }
        debug!("Search '{}' matched {} entries", keyword, found.len());

        self.update_diary(diary, |d| d.record_search(keyword))?;
        Ok(found)
    }

    /// Recompute every feature stat and the entry count from stored content
    pub fn reconcile_stats(&mut self, diary: &mut Diary) -> Result<StatDrift> {
        let drift = write(&mut self.db, diary, |tx, working| {
            let diary_id = working.require_id()?;
            let stored_entries = entries::all(tx, diary_id)?;

            let mut drift = StatDrift::default();
            for feature in Feature::ALL {
                let behavior = feature.behavior();
                let mut actual = behavior.default_stat();
                for entry in &stored_entries {
                    for item in entry.items(feature) {
                        actual.apply(&behavior.stat_delta(item), Sign::Add);
                    }
                }

                let stored = working.fetch_stat(feature);
                if stored != actual {
                    warn!(
                        "Stat drift in diary {} for {}: stored count {}, actual {}",
                        diary_id, feature, stored.count, actual.count
                    );
                    working.assign_stat(feature, &actual);
                    drift.features.push(FeatureDrift {
                        feature,
                        stored,
                        actual,
                    });
                }
            }

            let actual_count = stored_entries.len() as u64;
            if working.entry_count != actual_count {
                warn!(
                    "Entry count drift in diary {}: stored {}, actual {}",
                    diary_id, working.entry_count, actual_count
                );
                drift.entry_count = Some((working.entry_count, actual_count));
                working.entry_count = actual_count;
            }

            if !drift.is_clean() {
                diaries::save(tx, working)?;
            }
            Ok(drift)
        })?;

        if !drift.is_clean() {
            self.publish(JournalEvent::DiaryChanged(diary.clone()));
        }
        Ok(drift)
    }
}

/// Bounds-checked read of one content item
pub fn fetch_content(entry: &Entry, feature: Feature, index: usize) -> Result<&ContentItem> {
    let items = entry.items(feature);
    check_index(index, items.len())?;
    Ok(&items[index])
}

/// Run `f` on a copy of `diary` in one transaction; the copy replaces
/// `diary` only after commit
fn write<T, F>(db: &mut Database, diary: &mut Diary, f: F) -> Result<T>
where
    F: FnOnce(&Transaction<'_>, &mut Diary) -> Result<T>,
{
    let mut working = diary.clone();
    let value = db.transaction(|tx| f(tx, &mut working))?;
    *diary = working;
    Ok(value)
}

fn require_stored(repo: &EntryRepository<'_>, diary: &Diary, key: &EntryKey) -> Result<Entry> {
    let entry = repo.fetch(diary.require_id()?, key)?;
    if entry.is_stored() {
        Ok(entry)
    } else {
        Err(DwdyError::EntryNotFound(key.clone()))
    }
}

/// Store a transient entry so content can be attached to it
fn persist_transient(repo: &EntryRepository<'_>, diary: &mut Diary, entry: Entry) -> Result<Entry> {
    if diary.layout.is_chronological() {
        let day = NaiveDate::parse_from_str(entry.key.as_str(), "%Y%m%d").map_err(|_| {
            DwdyError::invalid(format!("'{}' is not a YYYYMMDD day key", entry.key))
        })?;
        let timestamp = day.and_hms_opt(0, 0, 0).map(|t| t.and_utc()).ok_or_else(|| {
            DwdyError::invalid(format!("'{}' is not a valid day", entry.key))
        })?;
        return strategy_for(diary.layout).insert_new_entry(repo, diary, &Selector::at_time(timestamp));
    }

    repo.append(diary, entry)
}

/// Upload attachments and turn a draft into a stored content item
fn materialize(conn: &Connection, diary_id: Uuid, key: &EntryKey, draft: ContentDraft) -> Result<ContentItem> {
    Ok(match draft {
        ContentDraft::Text(text) => ContentItem::Text(text),
        ContentDraft::Image(image) => {
            let attachment = attachments::upload(conn, diary_id, key, &image.file)?;
            ContentItem::Image(ImageContent {
                attachment_id: attachment.attachment_id,
                file_name: attachment.file_name,
                file_type: attachment.file_type,
                size: attachment.size,
                width: image.width,
                height: image.height,
                thumbnail: image.thumbnail,
            })
        }
        ContentDraft::Sound(sound) => {
            if !sound.duration.is_finite() || sound.duration < 0.0 {
                return Err(DwdyError::invalid("sound duration must be a positive number"));
            }
            let attachment = attachments::upload(conn, diary_id, key, &sound.file)?;
            ContentItem::Sound(SoundContent {
                attachment_id: attachment.attachment_id,
                file_name: attachment.file_name,
                file_type: attachment.file_type,
                size: attachment.size,
                duration: sound.duration,
            })
        }
        ContentDraft::Sticker(value) => ContentItem::Sticker(label(value)?),
        ContentDraft::Tag(value) => ContentItem::Tag(label(value)?),
    })
}

fn label(value: String) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DwdyError::invalid("label value is required"));
    }
    Ok(value.to_string())
}

fn label_value(draft: &ContentDraft) -> Option<String> {
    match draft {
        ContentDraft::Sticker(value) | ContentDraft::Tag(value) => Some(value.trim().to_string()),
        _ => None,
    }
}

fn label_of(item: &ContentItem) -> Option<&str> {
    match item {
        ContentItem::Sticker(value) | ContentItem::Tag(value) => Some(value),
        _ => None,
    }
}
