use std::fmt;

use uuid::Uuid;

/// Reason attached to `SessionEnded` when `run` returns normally.
pub const END_COMPLETED: &str = "completed";
/// Reason attached to the marker the worker pushes as its last action.
pub const END_WORKER_FINISHED: &str = "worker-finished";

/// Identifies one session from start request to terminal event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex digits, for thread names and log lines.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What happened. Every producer in the relay speaks this closed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    UserUtterance(String),
    AgentUtterance(String),
    AgentCorrection { original: String, corrected: String },
    SessionEnded(String),
    SessionError(String),
    ThinkingStateChanged(bool),
    /// Audio captured by a recorder widget rather than the agent's own input.
    UserAudio { bytes: usize },
    SystemNotice(String),
    PlaybackFailed { message: String },
}

impl EventKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::UserUtterance(_) => "user_utterance",
            Self::AgentUtterance(_) => "agent_utterance",
            Self::AgentCorrection { .. } => "agent_correction",
            Self::SessionEnded(_) => "session_ended",
            Self::SessionError(_) => "session_error",
            Self::ThinkingStateChanged(_) => "thinking_state_changed",
            Self::UserAudio { .. } => "user_audio",
            Self::SystemNotice(_) => "system_notice",
            Self::PlaybackFailed { .. } => "playback_failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::SessionEnded(_) | Self::SessionError(_))
    }
}

/// One entry in the event queue.
///
/// Events have no identity beyond their queue position: two events with
/// the same content are still two events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub session: Option<SessionId>,
    pub kind: EventKind,
}

impl Event {
    /// An event produced by a session's hooks or worker.
    pub fn for_session(session: SessionId, kind: EventKind) -> Self {
        Self {
            session: Some(session),
            kind,
        }
    }

    /// An event produced outside any session: manual input, tools, playback.
    pub fn detached(kind: EventKind) -> Self {
        Self {
            session: None,
            kind,
        }
    }
}
