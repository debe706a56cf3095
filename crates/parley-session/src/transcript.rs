use std::collections::VecDeque;

/// Kept debug lines; older lines are discarded.
const MAX_DEBUG_LINES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Utterance,
    /// Agent text that replaced an interrupted response.
    Correction,
    /// Lifecycle and system notices such as `[ended: completed]`.
    Notice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub seq: u64,
    pub role: Role,
    pub kind: EntryKind,
    pub text: String,
}

/// Foreground-only view state built by folding events.
///
/// Sequence numbers keep increasing across clears so callers can ask for
/// "entries since N".
#[derive(Debug, Default)]
pub struct TranscriptStore {
    entries: Vec<TranscriptEntry>,
    next_seq: u64,
    thinking: bool,
    placeholder: Option<String>,
    debug_log: VecDeque<String>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Entries with a sequence number greater than `seq`.
    pub fn entries_since(&self, seq: Option<u64>) -> &[TranscriptEntry] {
        match seq {
            None => &self.entries,
            Some(seq) => {
                let start = self.entries.partition_point(|e| e.seq <= seq);
                &self.entries[start..]
            }
        }
    }

    /// `(role, text)` pairs in arrival order.
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        self.entries
            .iter()
            .map(|e| (e.role.as_str(), e.text.as_str()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_thinking(&self) -> bool {
        self.thinking
    }

    pub fn set_thinking(&mut self, thinking: bool) {
        self.thinking = thinking;
    }

    /// Text shown until the first real event of a session arrives.
    pub fn placeholder(&self) -> Option<&str> {
        self.placeholder.as_deref()
    }

    /// Reset for a new session and show `placeholder`.
    pub fn begin_session(&mut self, placeholder: &str) {
        self.entries.clear();
        self.thinking = false;
        self.placeholder = Some(placeholder.to_string());
    }

    /// Explicit user clear. The debug log is kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.thinking = false;
        self.placeholder = None;
    }

    /// Append an entry produced by a real event. Replaces the placeholder.
    pub fn push(&mut self, role: Role, kind: EntryKind, text: impl Into<String>) -> u64 {
        self.placeholder = None;
        self.append(role, kind, text.into())
    }

    /// Append a locally generated notice. Leaves the placeholder alone.
    pub fn push_local_notice(&mut self, text: impl Into<String>) -> u64 {
        self.append(Role::Assistant, EntryKind::Notice, text.into())
    }

    fn append(&mut self, role: Role, kind: EntryKind, text: String) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(TranscriptEntry {
            seq,
            role,
            kind,
            text,
        });
        seq
    }

    pub fn debug(&mut self, line: impl Into<String>) {
        if self.debug_log.len() == MAX_DEBUG_LINES {
            self.debug_log.pop_front();
        }
        self.debug_log.push_back(line.into());
    }

    pub fn debug_log(&self) -> impl Iterator<Item = &str> {
        self.debug_log.iter().map(String::as_str)
    }
}
