//! Asynchronous event relay and session lifecycle.
//!
//! A voice-agent session runs on its own worker thread and reports through
//! hooks that only enqueue [`Event`]s. The foreground thread owns a
//! [`ConversationRuntime`] and polls it once per redraw; each poll drains the
//! queue into the [`TranscriptStore`] and tells the caller whether the view
//! changed.
//!
//! ```text
//! SDK callbacks ─┐
//! worker thread ─┼─> EventQueue ──drain──> TranscriptStore / SessionHandle
//! tts threads  ──┘
//! ```

pub mod controller;
pub mod drain;
pub mod error;
pub mod event;
pub mod hooks;
pub mod queue;
pub mod runtime;
pub mod scripted;
pub mod session_log;
pub mod speech;
pub mod transcript;
pub mod worker;

pub use controller::{
    SessionController, SessionHandle, SessionStatus, StopOutcome, TerminalObservation,
};
pub use drain::UiEventDrain;
pub use error::{ApplyError, ControllerError, InvalidTransition};
pub use event::{Event, EventKind, SessionId};
pub use queue::{EventQueue, QueueStats};
pub use runtime::{ConversationRuntime, PLACEHOLDER, STOP_NOTICE};
pub use scripted::{Script, ScriptedFactory, ScriptedSession, Step};
pub use session_log::{LogRecord, SessionLog};
pub use transcript::{EntryKind, Role, TranscriptEntry, TranscriptStore};
pub use worker::SessionWorker;
