//! Entry command handlers

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveTime, Utc};

use dwdy_core::{EntryKey, GeoPoint, Journal, LayoutKind, Order, Selector};

use super::diary;
use crate::editor::confirm;
use crate::output::Output;

/// Where a new entry should go
#[derive(Debug, Default)]
pub struct Placement {
    pub date: Option<NaiveDate>,
    pub after: Option<String>,
    pub at: Option<GeoPoint>,
    pub key: Option<String>,
}

/// Create an entry, placed the way the diary's layout places entries
pub fn add(journal: &mut Journal, diary_id: String, placement: Placement, output: &Output) -> Result<()> {
    let mut diary = diary::resolve(journal, &diary_id)?;

    let entry = match diary.layout {
        LayoutKind::Calendar | LayoutKind::Timeline => {
            let date = placement.date.unwrap_or_else(|| Utc::now().date_naive());
            let timestamp = date.and_time(NaiveTime::MIN).and_utc();
            journal.insert_entry(&mut diary, &Selector::at_time(timestamp))
        }
        LayoutKind::Notebook => match placement.after {
            Some(after) => journal.insert_entry(&mut diary, &Selector::at_key(parse_key(&after))),
            None => journal.append_entry(&mut diary, placement.key.as_deref().map(parse_key)),
        },
        LayoutKind::Map => {
            let Some(point) = placement.at else {
                bail!("Map diaries need a location: --at LON,LAT");
            };
            journal.insert_entry(&mut diary, &Selector::at_location(point))
        }
    }
    .context("Failed to create entry")?;

    output.success(&format!("Created entry: {}", entry.key));
    output.print_entry(&entry);
    Ok(())
}

/// List entries in link order
pub fn list(journal: &Journal, diary_id: String, descending: bool, output: &Output) -> Result<()> {
    let diary = diary::resolve(journal, &diary_id)?;
    let order = if descending { Order::Desc } else { Order::Asc };
    let entries = journal.entries(&diary, order)?;
    output.print_entries(&entries);
    Ok(())
}

/// Show a single entry
pub fn show(journal: &Journal, diary_id: String, key: String, output: &Output) -> Result<()> {
    let diary = diary::resolve(journal, &diary_id)?;
    let entry = journal.entry(&diary, &parse_key(&key))?;
    if !entry.is_stored() {
        bail!("Entry not found: {}", key);
    }
    output.print_entry(&entry);
    Ok(())
}

/// Set or clear an entry's title
pub fn title(
    journal: &mut Journal,
    diary_id: String,
    key: String,
    title: Option<String>,
    output: &Output,
) -> Result<()> {
    let mut diary = diary::resolve(journal, &diary_id)?;
    let key = parse_key(&key);
    journal
        .set_entry_title(&mut diary, &key, title)
        .context("Failed to update entry title")?;

    output.success(&format!("Updated entry: {}", key));
    Ok(())
}

/// Move an entry before another, or to the end of the list
pub fn move_entry(
    journal: &mut Journal,
    diary_id: String,
    key: String,
    before: Option<String>,
    output: &Output,
) -> Result<()> {
    let mut diary = diary::resolve(journal, &diary_id)?;
    let key = parse_key(&key);

    match before {
        Some(target) => {
            let target = parse_key(&target);
            journal
                .move_before(&mut diary, &key, &target)
                .context("Failed to move entry")?;
            output.success(&format!("Moved {} before {}", key, target));
        }
        None => {
            journal
                .move_to_last(&mut diary, &key)
                .context("Failed to move entry")?;
            output.success(&format!("Moved {} to the end", key));
        }
    }
    Ok(())
}

/// Delete an entry and its content
pub fn delete(journal: &mut Journal, diary_id: String, key: String, output: &Output) -> Result<()> {
    let mut diary = diary::resolve(journal, &diary_id)?;
    let key = parse_key(&key);
    let entry = journal.entry(&diary, &key)?;
    if !entry.is_stored() {
        bail!("Entry not found: {}", key);
    }

    // Confirm deletion
    if output.should_prompt() && !entry.content.is_empty() {
        println!("Delete entry: {}", key);
        if !confirm("This entry has content. Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    journal
        .delete_entry(&mut diary, &key)
        .context("Failed to delete entry")?;

    output.success(&format!("Deleted entry: {}", key));
    Ok(())
}

/// Parse an entry key, accepting `YYYY-MM-DD` for day entries
pub fn parse_key(input: &str) -> EntryKey {
    match NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d") {
        Ok(date) => EntryKey::from_date(date),
        Err(_) => EntryKey::new(input.trim()),
    }
}

/// Parse a `LON,LAT` pair
pub fn parse_point(input: &str) -> Result<GeoPoint, String> {
    let (lon, lat) = input
        .split_once(',')
        .ok_or_else(|| format!("expected LON,LAT, got '{}'", input))?;
    let longitude: f64 = lon.trim().parse().map_err(|_| format!("invalid longitude '{}'", lon))?;
    let latitude: f64 = lat.trim().parse().map_err(|_| format!("invalid latitude '{}'", lat))?;

    if !(-180.0..=180.0).contains(&longitude) || !(-90.0..=90.0).contains(&latitude) {
        return Err(format!("location out of range: {}", input));
    }
    Ok(GeoPoint::new(longitude, latitude))
}
