//! Image and sound features
//!
//! Both hold their payload in the attachments table; content items only keep
//! the attachment id and metadata. Deleting an item deletes its attachment in
//! the same transaction.

use rusqlite::Connection;

use super::{ConfigMap, ContentOwner, Feature, FeatureBehavior, StatDelta};
use crate::error::Result;
use crate::models::ContentItem;
use crate::storage::attachments;

/// Thumbnail width used when a diary has no image config override
pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 120;

pub struct ImageFeature;

impl FeatureBehavior for ImageFeature {
    fn feature(&self) -> Option<Feature> {
        Some(Feature::Image)
    }

    fn default_config(&self) -> ConfigMap {
        let mut config = ConfigMap::new();
        config.insert("thumbnail_width".into(), DEFAULT_THUMBNAIL_WIDTH.into());
        config
    }

    fn stat_delta(&self, item: &ContentItem) -> StatDelta {
        match item {
            ContentItem::Image(image) => StatDelta::item(image.size as i64),
            _ => StatDelta::default(),
        }
    }

    fn on_delete(&self, conn: &Connection, owner: ContentOwner<'_>, item: &ContentItem) -> Result<()> {
        if let ContentItem::Image(image) = item {
            attachments::delete(conn, owner.diary_id, owner.entry_key, image.attachment_id)?;
        }
        Ok(())
    }

    fn matches_keyword(&self, item: &ContentItem, keyword: &str) -> bool {
        match item {
            ContentItem::Image(image) => image
                .file_name
                .to_lowercase()
                .contains(&keyword.to_lowercase()),
            _ => false,
        }
    }

    fn icon(&self) -> &'static str {
        "image"
    }
}

pub struct SoundFeature;

impl FeatureBehavior for SoundFeature {
    fn feature(&self) -> Option<Feature> {
        Some(Feature::Sound)
    }

    fn default_config(&self) -> ConfigMap {
        let mut config = ConfigMap::new();
        config.insert("max_duration_secs".into(), 600.into());
        config
    }

    fn stat_delta(&self, item: &ContentItem) -> StatDelta {
        match item {
            ContentItem::Sound(sound) => StatDelta {
                duration_ms: sound.duration_ms(),
                ..StatDelta::item(sound.size as i64)
            },
            _ => StatDelta::default(),
        }
    }

    fn on_delete(&self, conn: &Connection, owner: ContentOwner<'_>, item: &ContentItem) -> Result<()> {
        if let ContentItem::Sound(sound) = item {
            attachments::delete(conn, owner.diary_id, owner.entry_key, sound.attachment_id)?;
        }
        Ok(())
    }

    fn matches_keyword(&self, item: &ContentItem, keyword: &str) -> bool {
        match item {
            ContentItem::Sound(sound) => sound
                .file_name
                .to_lowercase()
                .contains(&keyword.to_lowercase()),
            _ => false,
        }
    }

    fn icon(&self) -> &'static str {
        "mic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImageContent, SoundContent};
    use uuid::Uuid;

    #[test]
    fn test_image_delta_counts_bytes_only() {
        let item = ContentItem::Image(ImageContent {
            attachment_id: Uuid::new_v4(),
            file_name: "beach.png".into(),
            file_type: "image/png".into(),
            size: 500,
            width: 640,
            height: 480,
            thumbnail: String::new(),
        });
        let delta = ImageFeature.stat_delta(&item);
        assert_eq!(delta, StatDelta::item(500));
        assert!(ImageFeature.matches_keyword(&item, "BEACH"));
    }

    #[test]
    fn test_sound_delta_tracks_duration() {
        let item = ContentItem::Sound(SoundContent {
            attachment_id: Uuid::new_v4(),
            file_name: "memo.webm".into(),
            file_type: "audio/webm".into(),
            size: 2048,
            duration: 3.25,
        });
        let delta = SoundFeature.stat_delta(&item);
        assert_eq!(delta.count, 1);
        assert_eq!(delta.file_size, 2048);
        assert_eq!(delta.duration_ms, 3250);
    }
}
