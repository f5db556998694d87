//! Sticker and tag features: bare string values counted in a distribution

use super::{ConfigMap, Feature, FeatureBehavior, StatDelta};
use crate::models::ContentItem;

fn label_config() -> ConfigMap {
    let mut config = ConfigMap::new();
    config.insert("recent_limit".into(), 20.into());
    config
}

fn label_delta(value: &str) -> StatDelta {
    StatDelta {
        value: Some(value.to_string()),
        ..StatDelta::item(value.len() as i64)
    }
}

pub struct StickerFeature;

impl FeatureBehavior for StickerFeature {
    fn feature(&self) -> Option<Feature> {
        Some(Feature::Sticker)
    }

    fn default_config(&self) -> ConfigMap {
        label_config()
    }

    fn stat_delta(&self, item: &ContentItem) -> StatDelta {
        match item {
            ContentItem::Sticker(value) => label_delta(value),
            _ => StatDelta::default(),
        }
    }

    fn matches_keyword(&self, item: &ContentItem, keyword: &str) -> bool {
        matches!(item, ContentItem::Sticker(value) if value == keyword)
    }

    fn reorders_duplicates(&self) -> bool {
        true
    }

    fn icon(&self) -> &'static str {
        "smile"
    }
}

pub struct TagFeature;

impl FeatureBehavior for TagFeature {
    fn feature(&self) -> Option<Feature> {
        Some(Feature::Tag)
    }

    fn default_config(&self) -> ConfigMap {
        label_config()
    }

    fn stat_delta(&self, item: &ContentItem) -> StatDelta {
        match item {
            ContentItem::Tag(value) => label_delta(value),
            _ => StatDelta::default(),
        }
    }

    fn matches_keyword(&self, item: &ContentItem, keyword: &str) -> bool {
        matches!(item, ContentItem::Tag(value) if value == keyword)
    }

    fn reorders_duplicates(&self) -> bool {
        true
    }

    fn icon(&self) -> &'static str {
        "tag"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{FeatureStat, Sign};

    #[test]
    fn test_tag_delta_feeds_distribution() {
        let mut stat = FeatureStat::default();
        let item = ContentItem::Tag("travel".into());

        stat.apply(&TagFeature.stat_delta(&item), Sign::Add);
        stat.apply(&TagFeature.stat_delta(&item), Sign::Add);
        assert_eq!(stat.occurrences("travel"), 2);
        assert_eq!(stat.count, 2);

        stat.apply(&TagFeature.stat_delta(&item), Sign::Remove);
        stat.apply(&TagFeature.stat_delta(&item), Sign::Remove);
        assert!(!stat.distribution.contains_key("travel"));
        assert_eq!(stat, FeatureStat::default());
    }

    #[test]
    fn test_sticker_keyword_is_exact() {
        let item = ContentItem::Sticker("sun".into());
        assert!(StickerFeature.matches_keyword(&item, "sun"));
        assert!(!StickerFeature.matches_keyword(&item, "su"));
        assert!(StickerFeature.reorders_duplicates());
    }

    #[test]
    fn test_wrong_item_kind_contributes_nothing() {
        let item = ContentItem::Sticker("sun".into());
        assert_eq!(TagFeature.stat_delta(&item), StatDelta::default());
    }
}
