use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::event::SessionId;
use crate::transcript::{EntryKind, TranscriptEntry};

/// Max log size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;
/// Number of rotated files to keep.
const MAX_ROTATED: usize = 3;
const LOG_FILE: &str = "session_log.jsonl";

/// Append-only audit log of transcript entries and lifecycle changes, in
/// JSONL format.
pub struct SessionLog {
    writer: BufWriter<fs::File>,
    path: PathBuf,
}

impl SessionLog {
    /// Open or create the log in `dir`, rotating it first if it has grown
    /// past 10 MB.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(LOG_FILE);

        if let Ok(meta) = fs::metadata(&path) {
            if meta.len() > MAX_LOG_SIZE {
                Self::rotate(&path);
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        tracing::info!("Session log: {}", path.display());
        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    /// .jsonl -> .1.jsonl -> .2.jsonl -> .3.jsonl (oldest deleted).
    fn rotate(path: &Path) {
        let stem = path.with_extension("");
        let _ = fs::remove_file(format!("{}.{MAX_ROTATED}.jsonl", stem.display()));
        for i in (1..MAX_ROTATED).rev() {
            let from = format!("{}.{i}.jsonl", stem.display());
            let to = format!("{}.{}.jsonl", stem.display(), i + 1);
            let _ = fs::rename(&from, &to);
        }
        let _ = fs::rename(path, format!("{}.1.jsonl", stem.display()));
    }

    pub fn log_entry(&mut self, session: Option<SessionId>, entry: &TranscriptEntry) {
        let kind = match entry.kind {
            EntryKind::Utterance => "utterance",
            EntryKind::Correction => "correction",
            EntryKind::Notice => "notice",
        };
        let record = serde_json::json!({
            "ts": Utc::now().to_rfc3339(),
            "type": "transcript",
            "session": session.map(|id| id.to_string()),
            "seq": entry.seq,
            "role": entry.role.as_str(),
            "kind": kind,
            "content": entry.text,
        });
        self.write_line(&record);
    }

    pub fn log_lifecycle(&mut self, action: &str, details: &str) {
        let record = serde_json::json!({
            "ts": Utc::now().to_rfc3339(),
            "type": "lifecycle",
            "action": action,
            "details": details,
        });
        self.write_line(&record);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&mut self, record: &serde_json::Value) {
        if let Err(e) = writeln!(self.writer, "{record}") {
            tracing::error!("Failed to write session log: {e}");
        }
        let _ = self.writer.flush();
    }

    /// The last `max_entries` parseable records. Unreadable lines are skipped
    /// and a missing file yields an empty list.
    pub fn load_recent(dir: &Path, max_entries: usize) -> Vec<LogRecord> {
        let Ok(file) = fs::File::open(dir.join(LOG_FILE)) else {
            return Vec::new();
        };

        let mut records: Vec<LogRecord> = BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(&line).ok())
            .collect();

        if records.len() > max_entries {
            records.drain(..records.len() - max_entries);
        }
        records
    }
}

/// One parsed line of the session log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub ts: String,
    /// "transcript" or "lifecycle".
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(default)]
    pub session: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}
