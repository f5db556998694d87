//! Diary command handlers

use anyhow::{bail, Context, Result};
use uuid::Uuid;

use dwdy_core::{Diary, Journal, LayoutKind};

use crate::editor::confirm;
use crate::output::Output;

/// Create a new diary
pub fn create(journal: &mut Journal, title: String, layout: Option<LayoutKind>, output: &Output) -> Result<()> {
    let diary = journal
        .create_diary(&title, layout)
        .context("Failed to create diary")?;

    output.success(&format!("Created diary: {}", title));
    output.print_diary(&diary);
    Ok(())
}

/// List all diaries
pub fn list(journal: &Journal, output: &Output) -> Result<()> {
    let diaries = journal.list_diaries()?;
    output.print_diaries(&diaries);
    Ok(())
}

/// Show a diary with its stats
pub fn show(journal: &Journal, id: String, output: &Output) -> Result<()> {
    let diary = resolve(journal, &id)?;
    output.print_diary(&diary);
    Ok(())
}

/// Delete a diary and everything in it
pub fn delete(journal: &mut Journal, id: String, output: &Output) -> Result<()> {
    let diary = resolve(journal, &id)?;
    let diary_id = diary.require_id()?;

    // Confirm deletion
    if output.should_prompt() {
        println!(
            "Delete diary: {} ({} entries)",
            diary.title, diary.entry_count
        );
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    journal
        .delete_diary(diary_id)
        .context("Failed to delete diary")?;

    output.success(&format!("Deleted diary: {}", diary_id));
    Ok(())
}

/// Find a diary by full UUID, UUID prefix, or exact title
pub fn resolve(journal: &Journal, id: &str) -> Result<Diary> {
    // Try full UUID first
    if let Ok(uuid) = Uuid::parse_str(id) {
        return journal
            .load_diary(uuid)?
            .ok_or_else(|| anyhow::anyhow!("Diary not found: {}", id));
    }

    let diaries = journal.list_diaries()?;
    let matches: Vec<&Diary> = diaries
        .iter()
        .filter(|d| {
            d.title == id
                || d.id
                    .map(|uuid| uuid.to_string().starts_with(&id.to_lowercase()))
                    .unwrap_or(false)
        })
        .collect();

    match matches.len() {
        0 => bail!("No diary found matching: {}", id),
        1 => Ok(matches[0].clone()),
        _ => {
            eprintln!("Multiple diaries match '{}':", id);
            for diary in &matches {
                eprintln!(
                    "  {} - {}",
                    diary.id.map(|u| u.to_string()).unwrap_or_default(),
                    diary.title
                );
            }
            bail!("Ambiguous diary. Please provide more characters.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_by_title_and_prefix() {
        let mut journal = Journal::open_in_memory().unwrap();
        let diary = journal
            .create_diary("Travel", Some(LayoutKind::Map))
            .unwrap();
        journal.create_diary("Work", None).unwrap();

        let id = diary.id.unwrap().to_string();
        assert_eq!(resolve(&journal, "Travel").unwrap().id, diary.id);
        assert_eq!(resolve(&journal, &id).unwrap().id, diary.id);
        assert_eq!(resolve(&journal, &id[..8]).unwrap().id, diary.id);
        assert!(resolve(&journal, "Missing").is_err());
    }
}
