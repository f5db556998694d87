use once_cell::sync::Lazy;
use regex::Regex;

use super::{ConfigMap, Feature, FeatureBehavior, StatDelta};
use crate::models::ContentItem;

/// A word is a run of non-space characters; each CJK ideograph or kana
/// counts as a word on its own.
static WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{Han}\p{Hiragana}\p{Katakana}]|[^\s\p{Han}\p{Hiragana}\p{Katakana}]+")
        .expect("word pattern is valid")
});

/// Number of words in `text`
pub fn count_words(text: &str) -> i64 {
    WORD_RE.find_iter(text).count() as i64
}

/// Number of characters in `text` once whitespace is removed
pub fn count_letters(text: &str) -> i64 {
    text.chars().filter(|c| !c.is_whitespace()).count() as i64
}

pub struct TextFeature;

impl FeatureBehavior for TextFeature {
    fn feature(&self) -> Option<Feature> {
        Some(Feature::Text)
    }

    fn default_config(&self) -> ConfigMap {
        let mut config = ConfigMap::new();
        config.insert("markdown".into(), true.into());
        config
    }

    fn stat_delta(&self, item: &ContentItem) -> StatDelta {
        match item {
            ContentItem::Text(text) => StatDelta {
                words: count_words(&text.raw),
                letters: count_letters(&text.raw),
                ..StatDelta::item(text.byte_size())
            },
            _ => StatDelta::default(),
        }
    }

    fn matches_keyword(&self, item: &ContentItem, keyword: &str) -> bool {
        match item {
            ContentItem::Text(text) => text.raw.to_lowercase().contains(&keyword.to_lowercase()),
            _ => false,
        }
    }

    fn icon(&self) -> &'static str {
        "file-text"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TextContent;

    #[test]
    fn test_word_count() {
        assert_eq!(count_words("hello world"), 2);
        assert_eq!(count_words("  spaced   out\ttext\n"), 3);
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("今日は"), 3);
        assert_eq!(count_words("day 日記"), 3);
    }

    #[test]
    fn test_letter_count() {
        assert_eq!(count_letters("hello world"), 10);
        assert_eq!(count_letters(" a\tb\nc "), 3);
        assert_eq!(count_letters("日記"), 2);
    }

    #[test]
    fn test_stat_delta_uses_raw_and_html_bytes() {
        let item = ContentItem::Text(TextContent {
            raw: "hello world".into(),
            html: "<p>hello world</p>".into(),
        });
        let delta = TextFeature.stat_delta(&item);
        assert_eq!(delta.count, 1);
        assert_eq!(delta.words, 2);
        assert_eq!(delta.letters, 10);
        assert_eq!(delta.file_size, 11 + 18);
    }

    #[test]
    fn test_keyword_is_case_insensitive() {
        let item = ContentItem::Text(TextContent::new("Went Hiking today"));
        assert!(TextFeature.matches_keyword(&item, "hiking"));
        assert!(!TextFeature.matches_keyword(&item, "swimming"));
    }
}
