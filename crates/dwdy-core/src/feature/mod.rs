//! Feature registry
//!
//! A diary entry holds typed content blocks, one list per feature. Each
//! feature is described by a [`FeatureBehavior`]: its default stat and config
//! shapes, the stat contribution of one content item, the cleanup to run
//! when an item is deleted, and its keyword predicate.
//!
//! The set of features is closed ([`Feature`]), but lookups by tag string go
//! through [`lookup`], which falls back to [`UnknownFeature`] so that data
//! written by a newer version (or a disabled feature) degrades to a no-op
//! instead of failing.

mod labels;
mod media;
pub mod stat;
mod text;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{DwdyError, Result};
use crate::models::{ContentItem, EntryKey};

pub use labels::{StickerFeature, TagFeature};
pub use media::{ImageFeature, SoundFeature, DEFAULT_THUMBNAIL_WIDTH};
pub use stat::{FeatureStat, Sign, StatDelta};
pub use text::{count_letters, count_words, TextFeature};

/// Free-form JSON object used for feature, layout, and diary settings
pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

/// Content feature tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Text,
    Image,
    Sound,
    Sticker,
    Tag,
}

impl Feature {
    /// Every registered feature, in display order
    pub const ALL: [Feature; 5] = [
        Feature::Text,
        Feature::Image,
        Feature::Sound,
        Feature::Sticker,
        Feature::Tag,
    ];

    /// The lowercase tag used in stored documents
    pub fn tag(self) -> &'static str {
        match self {
            Feature::Text => "text",
            Feature::Image => "image",
            Feature::Sound => "sound",
            Feature::Sticker => "sticker",
            Feature::Tag => "tag",
        }
    }

    /// Parse a stored tag; unknown tags yield `None`
    pub fn from_tag(tag: &str) -> Option<Feature> {
        Feature::ALL.into_iter().find(|f| f.tag() == tag)
    }

    /// The behaviour registered for this feature
    pub fn behavior(self) -> &'static dyn FeatureBehavior {
        match self {
            Feature::Text => &TextFeature,
            Feature::Image => &ImageFeature,
            Feature::Sound => &SoundFeature,
            Feature::Sticker => &StickerFeature,
            Feature::Tag => &TagFeature,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Feature {
    type Err = DwdyError;

    fn from_str(s: &str) -> Result<Self> {
        Feature::from_tag(s).ok_or_else(|| DwdyError::invalid(format!("unknown feature '{s}'")))
    }
}

/// Identity of the entry that owns a content item, handed to delete hooks
#[derive(Debug, Clone, Copy)]
pub struct ContentOwner<'a> {
    pub diary_id: Uuid,
    pub entry_key: &'a EntryKey,
}

/// Per-feature behaviour consumed by the feature-generic code paths
pub trait FeatureBehavior: Send + Sync {
    /// The feature this behaviour is registered for (`None` for the fallback)
    fn feature(&self) -> Option<Feature>;

    /// Stat shape for a diary that has never held this feature
    fn default_stat(&self) -> FeatureStat {
        FeatureStat::default()
    }

    /// Config shape merged under a diary's stored feature config
    fn default_config(&self) -> ConfigMap {
        ConfigMap::new()
    }

    /// The stat contribution of a single content item
    fn stat_delta(&self, item: &ContentItem) -> StatDelta;

    /// Cleanup run inside the deleting transaction (attachments etc.)
    fn on_delete(&self, _conn: &Connection, _owner: ContentOwner<'_>, _item: &ContentItem) -> Result<()> {
        Ok(())
    }

    /// Whether `item` matches a search keyword
    fn matches_keyword(&self, _item: &ContentItem, _keyword: &str) -> bool {
        false
    }

    /// Re-adding an equal item on the same entry moves it to the end instead
    /// of duplicating it
    fn reorders_duplicates(&self) -> bool {
        false
    }

    /// Icon name for display; never used for control flow
    fn icon(&self) -> &'static str {
        "help-circle"
    }
}

/// Fallback behaviour for unrecognised feature tags
pub struct UnknownFeature;

impl FeatureBehavior for UnknownFeature {
    fn feature(&self) -> Option<Feature> {
        None
    }

    fn stat_delta(&self, _item: &ContentItem) -> StatDelta {
        StatDelta::default()
    }
}

/// Look up a behaviour by stored tag, falling back to [`UnknownFeature`]
pub fn lookup(tag: &str) -> &'static dyn FeatureBehavior {
    match Feature::from_tag(tag) {
        Some(feature) => feature.behavior(),
        None => &UnknownFeature,
    }
}

/// Default stat for a tag (unknown tags get an empty stat)
pub fn default_feature_stat(tag: &str) -> FeatureStat {
    lookup(tag).default_stat()
}

/// Default config for a tag (unknown tags get an empty object)
pub fn default_feature_config(tag: &str) -> ConfigMap {
    lookup(tag).default_config()
}

/// Icon name for a tag
pub fn feature_icon(tag: &str) -> &'static str {
    lookup(tag).icon()
}

/// Deserialize a feature-keyed map, dropping entries with unknown tags
pub(crate) fn deserialize_known_map<'de, D, T>(
    deserializer: D,
) -> std::result::Result<BTreeMap<Feature, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    let mut out = BTreeMap::new();
    for (tag, value) in raw {
        match Feature::from_tag(&tag) {
            Some(feature) => {
                let parsed = serde_json::from_value(value).map_err(serde::de::Error::custom)?;
                out.insert(feature, parsed);
            }
            None => tracing::warn!("Skipping unknown feature '{}' in stored document", tag),
        }
    }
    Ok(out)
}

/// Deserialize a list of feature tags, dropping unknown ones
pub(crate) fn deserialize_known_list<'de, D>(
    deserializer: D,
) -> std::result::Result<Vec<Feature>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<String>::deserialize(deserializer)?;
    Ok(raw.iter().filter_map(|tag| Feature::from_tag(tag)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TextContent;

    #[test]
    fn test_tag_round_trip() {
        for feature in Feature::ALL {
            assert_eq!(Feature::from_tag(feature.tag()), Some(feature));
            assert_eq!(feature.behavior().feature(), Some(feature));
        }
        assert_eq!(Feature::from_tag("video"), None);
    }

    #[test]
    fn test_unknown_tag_falls_back() {
        let behavior = lookup("video");
        assert!(behavior.feature().is_none());
        assert_eq!(default_feature_stat("video"), FeatureStat::default());
        assert!(default_feature_config("video").is_empty());
        assert_eq!(feature_icon("video"), "help-circle");

        let item = ContentItem::Text(TextContent::new("hello"));
        assert_eq!(behavior.stat_delta(&item), StatDelta::default());
    }

    #[test]
    fn test_known_defaults() {
        assert_eq!(
            default_feature_config("image").get("thumbnail_width"),
            Some(&serde_json::json!(120))
        );
        assert_eq!(feature_icon("tag"), "tag");
    }

    #[test]
    fn test_parse_feature() {
        assert_eq!("sticker".parse::<Feature>().unwrap(), Feature::Sticker);
        assert!("video".parse::<Feature>().is_err());
    }

    #[test]
    fn test_known_map_skips_unknown_tags() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(deserialize_with = "deserialize_known_map")]
            stat: BTreeMap<Feature, FeatureStat>,
        }

        let json = r#"{"stat": {"text": {"count": 2}, "video": {"count": 9}}}"#;
        let holder: Holder = serde_json::from_str(json).unwrap();
        assert_eq!(holder.stat.len(), 1);
        assert_eq!(holder.stat[&Feature::Text].count, 2);
    }
}
