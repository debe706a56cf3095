use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use parley_session::{EntryKind, Role, TranscriptEntry, TranscriptStore};

/// Plain-text rendering of one transcript entry.
pub fn entry_line(entry: &TranscriptEntry) -> String {
    match (entry.role, entry.kind) {
        (_, EntryKind::Notice) => entry.text.clone(),
        (Role::User, _) => format!("You: {}", entry.text),
        (Role::Assistant, EntryKind::Utterance) => format!("Assistant: {}", entry.text),
        (Role::Assistant, EntryKind::Correction) => {
            format!("Assistant (interrupted): {}", entry.text)
        }
    }
}

pub fn render(store: &TranscriptStore) -> String {
    store
        .entries()
        .iter()
        .map(entry_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Write the transcript to `conversation_log_<YYYYmmdd_HHMMSS>.txt` in `dir`.
///
/// Refuses an empty transcript, which includes one showing only the
/// startup placeholder.
pub fn save(store: &TranscriptStore, dir: &Path, at: NaiveDateTime) -> Result<PathBuf> {
    if store.is_empty() {
        anyhow::bail!("No conversation to save yet.");
    }
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(format!(
        "conversation_log_{}.txt",
        at.format("%Y%m%d_%H%M%S")
    ));
    std::fs::write(&path, render(store))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!("Conversation log saved to {}", path.display());
    Ok(path)
}
