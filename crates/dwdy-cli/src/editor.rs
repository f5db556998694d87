//! Interactive editing support
//!
//! Opens $EDITOR for writing text blocks, and asks before destructive commands.

use anyhow::{bail, Context, Result};
use std::env;
use std::fs;
use std::io::{self, Write};
use std::process::Command;

/// Fallback editors tried in order when neither $EDITOR nor $VISUAL is set
const FALLBACK_EDITORS: [&str; 3] = ["nano", "vim", "vi"];

/// Open `initial` in the user's editor and return what was saved
pub fn edit_text(initial: &str) -> Result<String> {
    let editor = find_editor()?;
    let path = env::temp_dir().join(format!("dwdy_edit_{}.md", std::process::id()));

    fs::write(&path, initial).with_context(|| format!("Failed to create temp file: {:?}", path))?;

    let status = Command::new(&editor)
        .arg(&path)
        .status()
        .with_context(|| format!("Failed to run editor: {}", editor));
    let text = match status {
        Ok(status) if status.success() => {
            fs::read_to_string(&path).with_context(|| format!("Failed to read edited file: {:?}", path))
        }
        Ok(_) => Err(anyhow::anyhow!("Editor '{}' exited with non-zero status", editor)),
        Err(e) => Err(e),
    };

    let _ = fs::remove_file(&path);
    text
}

fn find_editor() -> Result<String> {
    for var in ["EDITOR", "VISUAL"] {
        if let Some(editor) = env::var(var).ok().filter(|e| !e.trim().is_empty()) {
            return Ok(editor);
        }
    }

    if let Some(editor) = FALLBACK_EDITORS.into_iter().find(|e| on_path(e)) {
        return Ok(editor.to_string());
    }

    bail!("No editor found. Set $EDITOR or pass the text with --body")
}

fn on_path(cmd: &str) -> bool {
    env::var_os("PATH")
        .map(|paths| env::split_paths(&paths).any(|dir| dir.join(cmd).is_file()))
        .unwrap_or(false)
}

/// Ask a yes/no question on the terminal
///
/// Without a TTY on stdin the answer is always no.
pub fn confirm(prompt: &str) -> Result<bool> {
    if !atty::is(atty::Stream::Stdin) {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}
