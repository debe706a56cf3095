//! Single-session lifecycle: start, stop, and terminal bookkeeping.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parley_core::interfaces::{SessionFactory, VoiceAgentSession};
use parley_core::profile::SessionConfig;

use crate::error::{ControllerError, InvalidTransition};
use crate::event::SessionId;
use crate::hooks::QueueHooks;
use crate::queue::EventQueue;
use crate::worker::SessionWorker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    Starting,
    Active,
    Ending,
    Ended,
    Failed,
}

impl SessionStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Starting => 1,
            Self::Active => 2,
            Self::Ending => 3,
            Self::Ended | Self::Failed => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Failed)
    }

    pub fn is_live(self) -> bool {
        matches!(self, Self::Starting | Self::Active | Self::Ending)
    }

    /// Whether a new start may replace a handle in this status.
    pub fn accepts_start(self) -> bool {
        matches!(self, Self::Idle | Self::Ended | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Active => "active",
            Self::Ending => "ending",
            Self::Ended => "ended",
            Self::Failed => "failed",
        }
    }
}

/// What a terminal event meant for the current handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalObservation {
    /// First terminal event for the current session.
    First,
    /// The current session already reported its end.
    Duplicate,
    /// The event belongs to an older session, or there is no session.
    Stale,
}

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Requested(SessionId),
    NoSession,
    AlreadyFinished,
}

/// The one session the controller owns.
pub struct SessionHandle {
    id: SessionId,
    session: Arc<dyn VoiceAgentSession>,
    status: SessionStatus,
    worker: Option<JoinHandle<()>>,
    stop_requested_at: Option<Instant>,
    terminal_observed: bool,
    watchdog_fired: bool,
}

impl SessionHandle {
    fn new(id: SessionId, session: Arc<dyn VoiceAgentSession>) -> Self {
        Self {
            id,
            session,
            status: SessionStatus::Idle,
            worker: None,
            stop_requested_at: None,
            terminal_observed: false,
            watchdog_fired: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Move forward to `next`. Backward moves and moves out of a terminal
    /// status are rejected.
    pub fn transition(&mut self, next: SessionStatus) -> Result<(), InvalidTransition> {
        if self.status.is_terminal() || next.rank() <= self.status.rank() {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        tracing::debug!(
            "Session {} {} -> {}",
            self.id,
            self.status.as_str(),
            next.as_str()
        );
        self.status = next;
        Ok(())
    }

    fn worker_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("stop_requested_at", &self.stop_requested_at)
            .field("terminal_observed", &self.terminal_observed)
            .finish_non_exhaustive()
    }
}

/// Owns at most one live session and enforces the single-session rule.
///
/// Only the foreground thread touches the controller; workers reach the
/// foreground exclusively through the [`EventQueue`].
pub struct SessionController {
    factory: Arc<dyn SessionFactory>,
    queue: EventQueue,
    handle: Option<SessionHandle>,
    stop_grace: Duration,
}

impl SessionController {
    pub fn new(factory: Arc<dyn SessionFactory>, queue: EventQueue, stop_grace: Duration) -> Self {
        Self {
            factory,
            queue,
            handle: None,
            stop_grace,
        }
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn handle(&self) -> Option<&SessionHandle> {
        self.handle.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        self.handle
            .as_ref()
            .map_or(SessionStatus::Idle, SessionHandle::status)
    }

    pub fn current_id(&self) -> Option<SessionId> {
        self.handle.as_ref().map(SessionHandle::id)
    }

    /// Whether an event tagged with `session` belongs to the current handle.
    /// Untagged events always do.
    pub fn is_current(&self, session: Option<SessionId>) -> bool {
        match session {
            None => true,
            Some(id) => self.current_id() == Some(id),
        }
    }

    /// Build a session, dispatch its worker, and mark it active.
    ///
    /// "Active" means the worker was dispatched, not that the remote peer
    /// acknowledged anything.
    pub fn start(&mut self, config: &SessionConfig) -> Result<SessionId, ControllerError> {
        if let Some(handle) = &self.handle {
            if !handle.status.accepts_start() {
                tracing::info!(
                    "Start rejected: session {} is {}",
                    handle.id,
                    handle.status.as_str()
                );
                return Err(ControllerError::AlreadyActive);
            }
        }

        if self.factory.requires_credentials() && !config.has_credentials() {
            return Err(ControllerError::MissingCredentials);
        }

        let id = SessionId::new();
        let hooks = Arc::new(QueueHooks::new(id, self.queue.clone()));
        let session = self
            .factory
            .create(config, hooks)
            .map_err(|e| ControllerError::Construction(format!("{e:#}")))?;

        let mut handle = SessionHandle::new(id, session.clone());
        handle.transition(SessionStatus::Starting).ok();

        match SessionWorker::spawn(id, session, self.queue.clone()) {
            Ok(worker) => {
                handle.worker = Some(worker);
                handle.transition(SessionStatus::Active).ok();
                tracing::info!("Session {id} started");
                self.handle = Some(handle);
                Ok(id)
            }
            Err(e) => {
                tracing::error!("Failed to spawn worker for session {id}: {e}");
                handle.transition(SessionStatus::Failed).ok();
                self.handle = Some(handle);
                Err(ControllerError::Spawn(e))
            }
        }
    }

    /// Ask the live session to end and mark it ended for the UI.
    ///
    /// The worker exits later on its own and reports through the queue.
    pub fn stop(&mut self) -> StopOutcome {
        let Some(handle) = self.handle.as_mut() else {
            tracing::info!("Stop requested but no session exists");
            return StopOutcome::NoSession;
        };
        if !handle.status.is_live() {
            tracing::info!(
                "Stop requested but session {} is already {}",
                handle.id,
                handle.status.as_str()
            );
            return StopOutcome::AlreadyFinished;
        }

        tracing::info!("Requesting end of session {}", handle.id);
        handle.session.request_end();
        handle.stop_requested_at = Some(Instant::now());
        if handle.status != SessionStatus::Ending {
            handle.transition(SessionStatus::Ending).ok();
        }
        handle.transition(SessionStatus::Ended).ok();
        StopOutcome::Requested(handle.id)
    }

    /// Record a terminal event for `session` (untagged means current).
    ///
    /// On the first terminal event the handle is forced to its terminal
    /// status: `Failed` for an error while still live, `Ended` otherwise.
    pub fn observe_terminal(
        &mut self,
        session: Option<SessionId>,
        failed: bool,
    ) -> Result<TerminalObservation, InvalidTransition> {
        if !self.is_current(session) {
            return Ok(TerminalObservation::Stale);
        }
        let Some(handle) = self.handle.as_mut() else {
            return Ok(TerminalObservation::Stale);
        };
        if handle.terminal_observed {
            return Ok(TerminalObservation::Duplicate);
        }
        handle.terminal_observed = true;
        if handle.status.is_live() || handle.status == SessionStatus::Idle {
            let next = if failed {
                SessionStatus::Failed
            } else {
                SessionStatus::Ended
            };
            handle.transition(next)?;
        }
        Ok(TerminalObservation::First)
    }

    /// Report a stopped session whose worker outlived the grace period.
    ///
    /// Fires at most once per session and never interferes with the worker.
    pub fn check_watchdog(&mut self, now: Instant) -> Option<String> {
        let grace = self.stop_grace;
        let handle = self.handle.as_mut()?;
        let requested = handle.stop_requested_at?;
        if handle.watchdog_fired || handle.terminal_observed || handle.worker_finished() {
            return None;
        }
        let waited = now.saturating_duration_since(requested);
        if waited < grace {
            return None;
        }
        handle.watchdog_fired = true;
        let message = format!(
            "session {} worker still running {}s after stop request",
            handle.id,
            waited.as_secs()
        );
        tracing::warn!("{message}");
        Some(message)
    }
}
