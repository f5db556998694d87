//! The diary aggregate
//!
//! A diary owns its configuration, per-feature statistics, and the feature
//! template. It holds no linked-list logic; entry ordering is delegated to
//! the repository and layout strategies. All mutators here are in-memory; the
//! journal persists the whole document (full overwrite) in the same
//! transaction as the change that caused it.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entry::EntryKey;
use crate::error::{DwdyError, Result};
use crate::feature::{
    deserialize_known_list, deserialize_known_map, ConfigMap, Feature, FeatureStat, Sign,
    StatDelta,
};

/// Maximum number of remembered search keywords
pub const SEARCH_HISTORY_LIMIT: usize = 10;

/// How a diary orders and windows its entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    /// Month grid, one entry per day
    #[default]
    Calendar,
    /// Chronological list
    Timeline,
    /// Manually ordered pages
    Notebook,
    /// Entries placed by location
    Map,
}

impl LayoutKind {
    pub const ALL: [LayoutKind; 4] = [
        LayoutKind::Calendar,
        LayoutKind::Timeline,
        LayoutKind::Notebook,
        LayoutKind::Map,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LayoutKind::Calendar => "calendar",
            LayoutKind::Timeline => "timeline",
            LayoutKind::Notebook => "notebook",
            LayoutKind::Map => "map",
        }
    }

    /// Whether entries are ordered by date
    pub fn is_chronological(self) -> bool {
        matches!(self, LayoutKind::Calendar | LayoutKind::Timeline)
    }

    /// Config shape merged under a diary's stored layout config
    pub fn default_config(self) -> ConfigMap {
        let mut config = ConfigMap::new();
        match self {
            LayoutKind::Calendar => {
                config.insert("week_starts_on".into(), 0.into());
            }
            LayoutKind::Timeline => {
                config.insert("descending".into(), true.into());
            }
            LayoutKind::Notebook => {
                config.insert("show_index".into(), true.into());
            }
            LayoutKind::Map => {
                config.insert("span_degrees".into(), 1.0.into());
            }
        }
        config
    }
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutKind {
    type Err = DwdyError;

    fn from_str(s: &str) -> Result<Self> {
        LayoutKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DwdyError::invalid(format!("unknown layout '{s}'")))
    }
}

/// Which features a diary shows, per screen slot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    #[serde(default, deserialize_with = "deserialize_known_list")]
    pub mobile: Vec<Feature>,
    #[serde(default, deserialize_with = "deserialize_known_list")]
    pub desktop_left: Vec<Feature>,
    #[serde(default, deserialize_with = "deserialize_known_list")]
    pub desktop_right: Vec<Feature>,
}

impl Template {
    /// The template used when a diary has none
    pub fn standard() -> Self {
        Self {
            mobile: Feature::ALL.to_vec(),
            desktop_left: vec![Feature::Text, Feature::Image, Feature::Sound],
            desktop_right: vec![Feature::Sticker, Feature::Tag],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mobile.is_empty() && self.desktop_left.is_empty() && self.desktop_right.is_empty()
    }

    /// Deduplicated union of all slots, in first-seen order
    pub fn union(&self) -> Vec<Feature> {
        let mut out = Vec::new();
        for feature in self
            .mobile
            .iter()
            .chain(&self.desktop_left)
            .chain(&self.desktop_right)
        {
            if !out.contains(feature) {
                out.push(*feature);
            }
        }
        out
    }

    /// Keep only features in `enabled`
    pub fn filtered(&self, enabled: &[Feature]) -> Self {
        let keep = |slot: &[Feature]| -> Vec<Feature> {
            slot.iter().copied().filter(|f| enabled.contains(f)).collect()
        };
        Self {
            mobile: keep(&self.mobile),
            desktop_left: keep(&self.desktop_left),
            desktop_right: keep(&self.desktop_right),
        }
    }
}

/// Diary-wide, per-feature, and per-layout settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiaryConfig {
    #[serde(default)]
    pub diary: ConfigMap,
    #[serde(default, deserialize_with = "deserialize_known_map")]
    pub per_feature: BTreeMap<Feature, ConfigMap>,
    #[serde(default)]
    pub per_layout: BTreeMap<LayoutKind, ConfigMap>,
}

/// A diary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diary {
    /// Assigned on first save
    pub id: Option<Uuid>,
    pub title: String,
    /// Key of the entry with no successor
    pub last_entry_id: Option<EntryKey>,
    pub entry_count: u64,
    pub layout: LayoutKind,
    #[serde(default)]
    pub template: Template,
    #[serde(default, deserialize_with = "deserialize_known_map")]
    pub stat: BTreeMap<Feature, FeatureStat>,
    #[serde(default)]
    pub config: DiaryConfig,
    #[serde(default)]
    pub search_history: Vec<String>,
}

impl Diary {
    /// A transient diary; it gets an id when the journal first saves it
    pub fn new(title: impl Into<String>, layout: LayoutKind) -> Self {
        Self {
            id: None,
            title: title.into(),
            last_entry_id: None,
            entry_count: 0,
            layout,
            template: Template::default(),
            stat: BTreeMap::new(),
            config: DiaryConfig::default(),
            search_history: Vec::new(),
        }
    }

    pub fn is_stored(&self) -> bool {
        self.id.is_some()
    }

    /// The persisted id, or `DiaryNotStored`
    pub fn require_id(&self) -> Result<Uuid> {
        self.id.ok_or(DwdyError::DiaryNotStored)
    }

    // ==================== Stats ====================

    /// Stored stat for `feature`, with the registry default filled in
    pub fn fetch_stat(&self, feature: Feature) -> FeatureStat {
        self.stat
            .get(&feature)
            .cloned()
            .unwrap_or_else(|| feature.behavior().default_stat())
    }

    /// Replace the stat for `feature` with a copy of `stat`
    pub fn assign_stat(&mut self, feature: Feature, stat: &FeatureStat) {
        self.stat.insert(feature, stat.clone());
    }

    /// Apply a signed stat delta to `feature`
    pub fn apply_stat_delta(&mut self, feature: Feature, delta: &StatDelta, sign: Sign) {
        let mut stat = self.fetch_stat(feature);
        stat.apply(delta, sign);
        self.assign_stat(feature, &stat);
    }

    // ==================== Config ====================

    /// Feature config with registry defaults merged under stored values
    pub fn fetch_feature_config(&self, feature: Feature) -> ConfigMap {
        let mut config = feature.behavior().default_config();
        if let Some(stored) = self.config.per_feature.get(&feature) {
            for (k, v) in stored {
                config.insert(k.clone(), v.clone());
            }
        }
        config
    }

    /// Shallow-merge `partial` onto the feature config
    pub fn patch_feature_config(&mut self, feature: Feature, partial: &ConfigMap) {
        let mut config = self.fetch_feature_config(feature);
        for (k, v) in partial.clone() {
            config.insert(k, v);
        }
        self.config.per_feature.insert(feature, config);
    }

    /// Layout config with layout defaults merged under stored values
    pub fn fetch_layout_config(&self, layout: LayoutKind) -> ConfigMap {
        let mut config = layout.default_config();
        if let Some(stored) = self.config.per_layout.get(&layout) {
            for (k, v) in stored {
                config.insert(k.clone(), v.clone());
            }
        }
        config
    }

    /// Shallow-merge `partial` onto the layout config
    pub fn patch_layout_config(&mut self, layout: LayoutKind, partial: &ConfigMap) {
        let mut config = self.fetch_layout_config(layout);
        for (k, v) in partial.clone() {
            config.insert(k, v);
        }
        self.config.per_layout.insert(layout, config);
    }

    // ==================== Template ====================

    /// The diary's template, or the standard one when empty
    pub fn template(&self) -> Template {
        if self.template.is_empty() {
            Template::standard()
        } else {
            self.template.clone()
        }
    }

    /// Template restricted to features the application has enabled
    pub fn resolved_template(&self, app_enabled: &[Feature]) -> Template {
        self.template().filtered(app_enabled)
    }

    /// Features present in any template slot
    pub fn enabled_features(&self) -> Vec<Feature> {
        self.template().union()
    }

    /// Registered features absent from every template slot
    pub fn disabled_features(&self) -> Vec<Feature> {
        let enabled = self.enabled_features();
        Feature::ALL
            .into_iter()
            .filter(|f| !enabled.contains(f))
            .collect()
    }

    // ==================== Search ====================

    /// Remember a search keyword (most recent first, deduplicated)
    pub fn record_search(&mut self, keyword: &str) {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return;
        }
        self.search_history.retain(|k| k != keyword);
        self.search_history.insert(0, keyword.to_string());
        self.search_history.truncate(SEARCH_HISTORY_LIMIT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_diary_is_transient() {
        let diary = Diary::new("Travel", LayoutKind::Calendar);
        assert!(!diary.is_stored());
        assert!(matches!(diary.require_id(), Err(DwdyError::DiaryNotStored)));
    }

    #[test]
    fn test_fetch_stat_defaults() {
        let diary = Diary::new("d", LayoutKind::Notebook);
        assert_eq!(diary.fetch_stat(Feature::Image), FeatureStat::default());
    }

    #[test]
    fn test_assign_stat_copies() {
        let mut diary = Diary::new("d", LayoutKind::Notebook);
        let mut stat = FeatureStat {
            count: 1,
            file_size: 500,
            ..FeatureStat::default()
        };
        diary.assign_stat(Feature::Image, &stat);

        // Mutating the caller's value does not reach the diary
        stat.count = 99;
        assert_eq!(diary.fetch_stat(Feature::Image).count, 1);
    }

    #[test]
    fn test_patch_feature_config_merges() {
        let mut diary = Diary::new("d", LayoutKind::Notebook);
        let mut partial = ConfigMap::new();
        partial.insert("thumbnail_width".into(), json!(200));
        partial.insert("grid".into(), json!(true));
        diary.patch_feature_config(Feature::Image, &partial);

        // Caller keeps ownership of its map
        partial.insert("grid".into(), json!(false));

        let config = diary.fetch_feature_config(Feature::Image);
        assert_eq!(config.get("thumbnail_width"), Some(&json!(200)));
        assert_eq!(config.get("grid"), Some(&json!(true)));
    }

    #[test]
    fn test_layout_config_defaults_and_patch() {
        let mut diary = Diary::new("d", LayoutKind::Map);
        assert_eq!(
            diary.fetch_layout_config(LayoutKind::Map).get("span_degrees"),
            Some(&json!(1.0))
        );

        let mut partial = ConfigMap::new();
        partial.insert("span_degrees".into(), json!(4.0));
        diary.patch_layout_config(LayoutKind::Map, &partial);
        assert_eq!(
            diary.fetch_layout_config(LayoutKind::Map).get("span_degrees"),
            Some(&json!(4.0))
        );
    }

    #[test]
    fn test_enabled_and_disabled_features() {
        let mut diary = Diary::new("d", LayoutKind::Calendar);
        assert_eq!(diary.enabled_features(), Feature::ALL.to_vec());
        assert!(diary.disabled_features().is_empty());

        diary.template = Template {
            mobile: vec![Feature::Text, Feature::Tag],
            desktop_left: vec![Feature::Text],
            desktop_right: vec![Feature::Tag, Feature::Image],
        };
        assert_eq!(
            diary.enabled_features(),
            vec![Feature::Text, Feature::Tag, Feature::Image]
        );
        assert_eq!(
            diary.disabled_features(),
            vec![Feature::Sound, Feature::Sticker]
        );
    }

    #[test]
    fn test_resolved_template_filters_by_app() {
        let diary = Diary::new("d", LayoutKind::Calendar);
        let template = diary.resolved_template(&[Feature::Text, Feature::Sticker]);
        assert_eq!(template.mobile, vec![Feature::Text, Feature::Sticker]);
        assert_eq!(template.desktop_left, vec![Feature::Text]);
        assert_eq!(template.desktop_right, vec![Feature::Sticker]);
    }

    #[test]
    fn test_template_drops_unknown_tags() {
        let json = r#"{"mobile": ["text", "video"], "desktop_left": [], "desktop_right": ["tag"]}"#;
        let template: Template = serde_json::from_str(json).unwrap();
        assert_eq!(template.mobile, vec![Feature::Text]);
        assert_eq!(template.desktop_right, vec![Feature::Tag]);
    }

    #[test]
    fn test_search_history() {
        let mut diary = Diary::new("d", LayoutKind::Calendar);
        for i in 0..12 {
            diary.record_search(&format!("k{i}"));
        }
        diary.record_search("k5");
        diary.record_search("   ");

        assert_eq!(diary.search_history.len(), SEARCH_HISTORY_LIMIT);
        assert_eq!(diary.search_history[0], "k5");
        assert_eq!(
            diary.search_history.iter().filter(|k| *k == "k5").count(),
            1
        );
    }

    #[test]
    fn test_document_round_trip() {
        let mut diary = Diary::new("Notes", LayoutKind::Notebook);
        diary.id = Some(Uuid::new_v4());
        diary.apply_stat_delta(Feature::Tag, &StatDelta {
            value: Some("x".into()),
            ..StatDelta::item(1)
        }, Sign::Add);

        let json = serde_json::to_string(&diary).unwrap();
        let parsed: Diary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, diary);
    }

    #[test]
    fn test_layout_parse() {
        assert_eq!("Notebook".parse::<LayoutKind>().unwrap(), LayoutKind::Notebook);
        assert!("grid".parse::<LayoutKind>().is_err());
        assert!(LayoutKind::Timeline.is_chronological());
        assert!(!LayoutKind::Map.is_chronological());
    }
}
