//! Typed content blocks held by entries

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use super::attachment::UploadFile;
use crate::feature::Feature;

/// Text block: the raw input plus its rendered HTML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    pub raw: String,
    #[serde(default)]
    pub html: String,
}

impl TextContent {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            html: String::new(),
        }
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = html.into();
        self
    }

    /// UTF-8 bytes of raw and html combined
    pub fn byte_size(&self) -> i64 {
        (self.raw.len() + self.html.len()) as i64
    }
}

/// Image block referencing an attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageContent {
    pub attachment_id: Uuid,
    pub file_name: String,
    pub file_type: String,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    /// Down-scaled copy as a data URI in the source format
    pub thumbnail: String,
}

/// Sound block referencing an attachment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundContent {
    pub attachment_id: Uuid,
    pub file_name: String,
    pub file_type: String,
    pub size: u64,
    /// Seconds
    pub duration: f64,
}

impl SoundContent {
    pub fn duration_ms(&self) -> i64 {
        (self.duration * 1000.0).round() as i64
    }
}

/// One content item of an entry
#[derive(Debug, Clone, PartialEq)]
pub enum ContentItem {
    Text(TextContent),
    Image(ImageContent),
    Sound(SoundContent),
    Sticker(String),
    Tag(String),
}

impl ContentItem {
    pub fn feature(&self) -> Feature {
        match self {
            ContentItem::Text(_) => Feature::Text,
            ContentItem::Image(_) => Feature::Image,
            ContentItem::Sound(_) => Feature::Sound,
            ContentItem::Sticker(_) => Feature::Sticker,
            ContentItem::Tag(_) => Feature::Tag,
        }
    }

    /// Attachment owned by this item, if any
    pub fn attachment_id(&self) -> Option<Uuid> {
        match self {
            ContentItem::Image(image) => Some(image.attachment_id),
            ContentItem::Sound(sound) => Some(sound.attachment_id),
            _ => None,
        }
    }

    fn decode(feature: Feature, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match feature {
            Feature::Text => ContentItem::Text(serde_json::from_value(value)?),
            Feature::Image => ContentItem::Image(serde_json::from_value(value)?),
            Feature::Sound => ContentItem::Sound(serde_json::from_value(value)?),
            Feature::Sticker => ContentItem::Sticker(serde_json::from_value(value)?),
            Feature::Tag => ContentItem::Tag(serde_json::from_value(value)?),
        })
    }
}

impl Serialize for ContentItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ContentItem::Text(text) => text.serialize(serializer),
            ContentItem::Image(image) => image.serialize(serializer),
            ContentItem::Sound(sound) => sound.serialize(serializer),
            ContentItem::Sticker(value) | ContentItem::Tag(value) => value.serialize(serializer),
        }
    }
}

/// Content of an entry, one ordered list per feature
///
/// Stored as a JSON object keyed by feature tag. Lists for unknown tags are
/// dropped on load; empty lists are never stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentMap(BTreeMap<Feature, Vec<ContentItem>>);

impl ContentMap {
    pub fn items(&self, feature: Feature) -> &[ContentItem] {
        self.0.get(&feature).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn items_mut(&mut self, feature: Feature) -> &mut Vec<ContentItem> {
        self.0.entry(feature).or_default()
    }

    /// Append an item to its feature list
    pub fn push(&mut self, item: ContentItem) {
        self.items_mut(item.feature()).push(item);
    }

    /// Drop feature lists that became empty
    pub(crate) fn prune(&mut self) {
        self.0.retain(|_, items| !items.is_empty());
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    pub fn features(&self) -> impl Iterator<Item = Feature> + '_ {
        self.0
            .iter()
            .filter(|(_, items)| !items.is_empty())
            .map(|(feature, _)| *feature)
    }

    /// Every item with its feature
    pub fn iter(&self) -> impl Iterator<Item = &ContentItem> + '_ {
        self.0.values().flatten()
    }
}

impl Serialize for ContentMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let non_empty: Vec<_> = self.0.iter().filter(|(_, v)| !v.is_empty()).collect();
        let mut map = serializer.serialize_map(Some(non_empty.len()))?;
        for (feature, items) in non_empty {
            map.serialize_entry(feature.tag(), items)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ContentMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, Vec<serde_json::Value>>::deserialize(deserializer)?;
        let mut map = BTreeMap::new();
        for (tag, values) in raw {
            let Some(feature) = Feature::from_tag(&tag) else {
                tracing::warn!("Skipping content for unknown feature '{}'", tag);
                continue;
            };
            let items = values
                .into_iter()
                .map(|v| ContentItem::decode(feature, v))
                .collect::<serde_json::Result<Vec<_>>>()
                .map_err(serde::de::Error::custom)?;
            if !items.is_empty() {
                map.insert(feature, items);
            }
        }
        Ok(ContentMap(map))
    }
}

/// Processed image ready to be uploaded
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDraft {
    pub file: UploadFile,
    pub width: u32,
    pub height: u32,
    pub thumbnail: String,
}

/// Finished recording ready to be uploaded
#[derive(Debug, Clone, PartialEq)]
pub struct SoundDraft {
    pub file: UploadFile,
    /// Seconds
    pub duration: f64,
}

/// Content as supplied by a caller, before attachments are uploaded
#[derive(Debug, Clone, PartialEq)]
pub enum ContentDraft {
    Text(TextContent),
    Image(ImageDraft),
    Sound(SoundDraft),
    Sticker(String),
    Tag(String),
}

impl ContentDraft {
    pub fn feature(&self) -> Feature {
        match self {
            ContentDraft::Text(_) => Feature::Text,
            ContentDraft::Image(_) => Feature::Image,
            ContentDraft::Sound(_) => Feature::Sound,
            ContentDraft::Sticker(_) => Feature::Sticker,
            ContentDraft::Tag(_) => Feature::Tag,
        }
    }

    pub fn text(raw: impl Into<String>) -> Self {
        ContentDraft::Text(TextContent::new(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_map_json_shape() {
        let mut map = ContentMap::default();
        map.push(ContentItem::Text(TextContent::new("hi")));
        map.push(ContentItem::Tag("work".into()));
        map.push(ContentItem::Tag("home".into()));

        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "text": [{"raw": "hi", "html": ""}],
                "tag": ["work", "home"]
            })
        );

        let parsed: ContentMap = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, map);
    }

    #[test]
    fn test_unknown_feature_content_is_dropped() {
        let json = serde_json::json!({
            "sticker": ["sun"],
            "video": [{"url": "x"}]
        });
        let map: ContentMap = serde_json::from_value(json).unwrap();
        assert_eq!(map.features().collect::<Vec<_>>(), vec![Feature::Sticker]);
    }

    #[test]
    fn test_prune_and_empty() {
        let mut map = ContentMap::default();
        map.items_mut(Feature::Image);
        assert!(map.is_empty());
        map.prune();
        assert_eq!(serde_json::to_string(&map).unwrap(), "{}");
    }

    #[test]
    fn test_sound_duration_ms_rounds() {
        let sound = SoundContent {
            attachment_id: Uuid::new_v4(),
            file_name: "a.webm".into(),
            file_type: "audio/webm".into(),
            size: 1,
            duration: 1.0004,
        };
        assert_eq!(sound.duration_ms(), 1000);
    }
}
