//! Content command handlers (text, tags, stickers, search)

use anyhow::{bail, Context, Result};

use dwdy_core::models::TextContent;
use dwdy_core::{ContentDraft, ContentItem, Feature, Journal};

use super::diary;
use super::entry::parse_key;
use crate::editor::edit_text;
use crate::output::Output;

/// Add a text block to an entry, opening $EDITOR when no body is given
pub fn add_text(
    journal: &mut Journal,
    diary_id: String,
    key: String,
    body: Option<String>,
    output: &Output,
) -> Result<()> {
    let mut diary = diary::resolve(journal, &diary_id)?;
    let key = parse_key(&key);

    let body = match body {
        Some(body) => body,
        None => edit_text("")?,
    };
    let body = body.trim_end().to_string();
    if body.trim().is_empty() {
        bail!("Text is empty, nothing added");
    }

    let entry = journal
        .add_content(&mut diary, &key, ContentDraft::Text(TextContent::new(body)))
        .context("Failed to add text")?;

    output.success(&format!(
        "Added text to {} ({} block(s))",
        entry.key,
        entry.items(Feature::Text).len()
    ));
    Ok(())
}

/// Add a tag or sticker to an entry
pub fn add_label(
    journal: &mut Journal,
    feature: Feature,
    diary_id: String,
    key: String,
    value: String,
    output: &Output,
) -> Result<()> {
    let mut diary = diary::resolve(journal, &diary_id)?;
    let key = parse_key(&key);

    let value = value.trim().to_string();
    let draft = match feature {
        Feature::Tag => ContentDraft::Tag(value.clone()),
        Feature::Sticker => ContentDraft::Sticker(value.clone()),
        other => bail!("{} is not a label feature", other),
    };

    journal
        .add_content(&mut diary, &key, draft)
        .with_context(|| format!("Failed to add {}", feature))?;

    output.success(&format!("Added {} '{}' to {}", feature, value, key));
    Ok(())
}

/// Remove a tag or sticker from an entry by value
pub fn remove_label(
    journal: &mut Journal,
    feature: Feature,
    diary_id: String,
    key: String,
    value: String,
    output: &Output,
) -> Result<()> {
    let mut diary = diary::resolve(journal, &diary_id)?;
    let key = parse_key(&key);
    let entry = journal.entry(&diary, &key)?;

    let value = value.trim();
    let Some(index) = entry.items(feature).iter().position(|item| match item {
        ContentItem::Tag(v) | ContentItem::Sticker(v) => v == value,
        _ => false,
    }) else {
        bail!("Entry {} has no {} '{}'", key, feature, value);
    };

    journal
        .delete_content(&mut diary, &key, feature, index)
        .with_context(|| format!("Failed to remove {}", feature))?;

    output.success(&format!("Removed {} '{}' from {}", feature, value, key));
    Ok(())
}

/// Search a diary's visible content for a keyword
pub fn search(journal: &mut Journal, diary_id: String, keyword: String, output: &Output) -> Result<()> {
    let mut diary = diary::resolve(journal, &diary_id)?;
    let entries = journal
        .search(&mut diary, &keyword)
        .context("Search failed")?;
    output.print_entries(&entries);
    Ok(())
}
