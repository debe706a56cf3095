//! Error types for the session relay.

use crate::controller::SessionStatus;

/// Why a start request was refused or failed.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// A session is already starting or active. Nothing was changed.
    #[error("a session is already active")]
    AlreadyActive,

    /// The factory needs agent credentials and they are not configured.
    #[error("missing AGENT_ID or API_KEY")]
    MissingCredentials,

    /// The external session object could not be built.
    #[error("failed to construct session: {0}")]
    Construction(String),

    /// The worker thread could not be spawned.
    #[error("failed to spawn session worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// A status change that would move a session backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid session transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: SessionStatus,
    pub to: SessionStatus,
}

/// Failure while folding a single event into foreground state.
///
/// The drain records these as visible notices and moves on to the next
/// event.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("empty {0} payload")]
    EmptyPayload(&'static str),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}
