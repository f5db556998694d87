//! Maintenance command handlers (link checks and stat reconciliation)

use anyhow::{bail, Context, Result};

use dwdy_core::Journal;

use super::diary;
use crate::output::Output;

/// Walk the entry list and report link problems
pub fn check(journal: &Journal, diary_id: String, output: &Output) -> Result<()> {
    let diary = diary::resolve(journal, &diary_id)?;
    let report = journal
        .verify_links(&diary)
        .context("Failed to check entry links")?;
    output.print_link_report(&report);

    if !report.is_consistent() {
        bail!("Entry links of '{}' are inconsistent", diary.title);
    }
    Ok(())
}

/// Recompute stats from stored content and fix any drift
pub fn reconcile(journal: &mut Journal, diary_id: String, output: &Output) -> Result<()> {
    let mut diary = diary::resolve(journal, &diary_id)?;
    let drift = journal
        .reconcile_stats(&mut diary)
        .context("Failed to reconcile stats")?;
    output.print_drift(&drift);

    if !drift.is_clean() {
        output.success(&format!("Fixed stats of '{}'", diary.title));
    }
    Ok(())
}
