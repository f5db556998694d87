//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use dwdy_core::{ContentItem, Diary, Entry, Feature, LinkReport, StatDrift};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print a single diary with its stats
    pub fn print_diary(&self, diary: &Diary) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:          {}", diary_id(diary));
                println!("Title:       {}", diary.title);
                println!("Layout:      {}", diary.layout);
                println!("Entries:     {}", diary.entry_count);
                if let Some(ref last) = diary.last_entry_id {
                    println!("Last entry:  {}", last);
                }
                let enabled: Vec<&str> = diary.enabled_features().iter().map(|f| f.tag()).collect();
                println!("Features:    {}", enabled.join(", "));
                if !diary.search_history.is_empty() {
                    println!("Searches:    {}", diary.search_history.join(", "));
                }

                println!();
                println!("── Stats ──");
                for feature in Feature::ALL {
                    let stat = diary.fetch_stat(feature);
                    if stat.count == 0 {
                        continue;
                    }
                    let mut line = format!("{:<8} {} item(s), {} bytes", feature.tag(), stat.count, stat.file_size);
                    match feature {
                        Feature::Text => line.push_str(&format!(", {} words", stat.words)),
                        Feature::Sound => line.push_str(&format!(", {:.1}s", stat.duration_secs())),
                        Feature::Sticker | Feature::Tag => {
                            let top: Vec<String> = stat
                                .distribution
                                .iter()
                                .map(|(value, n)| format!("{value}×{n}"))
                                .collect();
                            line.push_str(&format!(" [{}]", top.join(" ")));
                        }
                        Feature::Image => {}
                    }
                    println!("{}", line);
                }
            }
            OutputFormat::Json => print_json(diary),
            OutputFormat::Quiet => println!("{}", diary_id(diary)),
        }
    }

    /// Print a list of diaries
    pub fn print_diaries(&self, diaries: &[Diary]) {
        match self.format {
            OutputFormat::Human => {
                if diaries.is_empty() {
                    println!("No diaries found.");
                    return;
                }
                for diary in diaries {
                    println!(
                        "{} | {} | {} | {} entries",
                        short_id(diary),
                        truncate(&diary.title, 35),
                        diary.layout,
                        diary.entry_count
                    );
                }
                println!("\n{} diary(s)", diaries.len());
            }
            OutputFormat::Json => print_json(&diaries),
            OutputFormat::Quiet => {
                for diary in diaries {
                    println!("{}", diary_id(diary));
                }
            }
        }
    }

    /// Print a single entry with its content
    pub fn print_entry(&self, entry: &Entry) {
        match self.format {
            OutputFormat::Human => {
                println!("Key:         {}", entry.key);
                if let Some(ref title) = entry.title {
                    println!("Title:       {}", title);
                }
                if let Some(ts) = entry.timestamp {
                    println!("Date:        {}", ts.format("%Y-%m-%d"));
                }
                if let Some(point) = entry.location {
                    println!("Location:    {}, {}", point.longitude, point.latitude);
                }
                println!(
                    "Links:       {} <- -> {}",
                    entry.prev_key.as_ref().map(|k| k.as_str()).unwrap_or("-"),
                    entry.next_key.as_ref().map(|k| k.as_str()).unwrap_or("-")
                );

                for feature in entry.content.features() {
                    println!();
                    println!("── {} ──", feature);
                    for (i, item) in entry.items(feature).iter().enumerate() {
                        println!("[{}] {}", i, describe_item(item));
                    }
                }
            }
            OutputFormat::Json => print_json(entry),
            OutputFormat::Quiet => println!("{}", entry.key),
        }
    }

    /// Print a list of entries, one line each
    pub fn print_entries(&self, entries: &[Entry]) {
        match self.format {
            OutputFormat::Human => {
                if entries.is_empty() {
                    println!("No entries found.");
                    return;
                }
                for entry in entries {
                    println!(
                        "{} | {} | {}",
                        entry.key,
                        truncate(entry.title.as_deref().unwrap_or("-"), 30),
                        content_summary(entry)
                    );
                }
                println!("\n{} entry(s)", entries.len());
            }
            OutputFormat::Json => print_json(&entries),
            OutputFormat::Quiet => {
                for entry in entries {
                    println!("{}", entry.key);
                }
            }
        }
    }

    /// Print the result of a link check
    pub fn print_link_report(&self, report: &LinkReport) {
        match self.format {
            OutputFormat::Human => {
                let status = if report.is_consistent() { "OK" } else { "BROKEN" };
                println!("Links:       {}", status);
                println!("Stored:      {}", report.stored);
                println!("Reachable:   {}", report.reachable);
                println!("Heads:       {}", join_keys(&report.heads));
                println!("Tails:       {}", join_keys(&report.tails));
                println!("Last entry:  {}", if report.last_entry_matches { "matches tail" } else { "mismatch" });
                if !report.mismatched.is_empty() {
                    println!("Mismatched:  {}", join_keys(&report.mismatched));
                }
                if let Some(ref key) = report.cycle_at {
                    println!("Cycle at:    {}", key);
                }
            }
            OutputFormat::Json => print_json(report),
            OutputFormat::Quiet => {
                println!("{}", if report.is_consistent() { "ok" } else { "broken" });
            }
        }
    }

    /// Print the result of a stat reconciliation
    pub fn print_drift(&self, drift: &StatDrift) {
        match self.format {
            OutputFormat::Human => {
                if drift.is_clean() {
                    println!("Stats match content.");
                    return;
                }
                for d in &drift.features {
                    println!(
                        "{:<8} count {} -> {}, bytes {} -> {}",
                        d.feature.tag(),
                        d.stored.count,
                        d.actual.count,
                        d.stored.file_size,
                        d.actual.file_size
                    );
                }
                if let Some((stored, actual)) = drift.entry_count {
                    println!("entries  {} -> {}", stored, actual);
                }
            }
            OutputFormat::Json => print_json(drift),
            OutputFormat::Quiet => {
                for d in &drift.features {
                    println!("{}", d.feature);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to encode output: {}", e),
    }
}

fn diary_id(diary: &Diary) -> String {
    diary.id.map(|id| id.to_string()).unwrap_or_default()
}

fn short_id(diary: &Diary) -> String {
    diary_id(diary).chars().take(8).collect()
}

fn join_keys(keys: &[dwdy_core::EntryKey]) -> String {
    if keys.is_empty() {
        return "-".to_string();
    }
    keys.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
}

/// One-line description of a content item
fn describe_item(item: &ContentItem) -> String {
    match item {
        ContentItem::Text(text) => truncate_line(&text.raw, 60),
        ContentItem::Image(image) => {
            format!("{} ({}x{}, {} bytes)", image.file_name, image.width, image.height, image.size)
        }
        ContentItem::Sound(sound) => {
            format!("{} ({:.1}s, {} bytes)", sound.file_name, sound.duration, sound.size)
        }
        ContentItem::Sticker(value) | ContentItem::Tag(value) => value.clone(),
    }
}

/// Item counts per feature, e.g. "text:2 tag:1"
fn content_summary(entry: &Entry) -> String {
    let parts: Vec<String> = entry
        .content
        .features()
        .map(|f| format!("{}:{}", f.tag(), entry.items(f).len()))
        .collect();
    if parts.is_empty() {
        "(empty)".to_string()
    } else {
        parts.join(" ")
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Truncate to first line and max length
fn truncate_line(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    truncate(first_line, max_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dwdy_core::models::TextContent;
    use dwdy_core::{EntryKey, LayoutKind};
    use uuid::Uuid;

    fn diary_with_id() -> Diary {
        let mut diary = Diary::new("Trips", LayoutKind::Map);
        diary.id = Some(Uuid::parse_str("3f2504e0-4f89-11d3-9a0c-0305e82c3301").unwrap());
        diary
    }

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
        assert_eq!(truncate("日記日記日記日記日記日記", 5), "日記...");
    }

    #[test]
    fn test_truncate_line() {
        assert_eq!(truncate_line("single line", 20), "single line");
        assert_eq!(truncate_line("line one\nline two", 20), "line one");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id(&diary_with_id()), "3f2504e0");
        assert_eq!(short_id(&Diary::new("x", LayoutKind::Notebook)), "");
    }

    #[test]
    fn test_content_summary() {
        let mut entry = Entry::transient(Uuid::new_v4(), EntryKey::new("1"));
        assert_eq!(content_summary(&entry), "(empty)");

        entry.content.push(ContentItem::Text(TextContent::new("a")));
        entry.content.push(ContentItem::Tag("x".into()));
        entry.content.push(ContentItem::Tag("y".into()));
        assert_eq!(content_summary(&entry), "text:1 tag:2");
    }
}
