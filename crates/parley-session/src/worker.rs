use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

use parley_core::interfaces::VoiceAgentSession;

use crate::event::{Event, EventKind, SessionId, END_COMPLETED, END_WORKER_FINISHED};
use crate::queue::EventQueue;

/// Runs one session's blocking `run` on a dedicated thread.
pub struct SessionWorker;

impl SessionWorker {
    /// Spawn the worker. The thread is never joined; the returned handle is
    /// only used to ask whether it has finished.
    pub fn spawn(
        id: SessionId,
        session: Arc<dyn VoiceAgentSession>,
        queue: EventQueue,
    ) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name(format!("parley-session-{}", id.short()))
            .spawn(move || run_to_completion(id, session.as_ref(), &queue))
    }
}

/// Drive `session` to completion and report how it ended.
///
/// Always pushes `SessionEnded("worker-finished")` last, whichever way `run`
/// exits, including by panic.
pub fn run_to_completion(id: SessionId, session: &dyn VoiceAgentSession, queue: &EventQueue) {
    tracing::info!("Session {id} worker started");

    match panic::catch_unwind(AssertUnwindSafe(|| session.run())) {
        Ok(Ok(())) => {
            tracing::info!("Session {id} run returned");
            queue.push(Event::for_session(
                id,
                EventKind::SessionEnded(END_COMPLETED.into()),
            ));
        }
        Ok(Err(failure)) => {
            tracing::error!("Session {id} failed: {failure}");
            queue.push(Event::for_session(
                id,
                EventKind::SessionError(failure.message),
            ));
        }
        Err(payload) => {
            let message = format!("session panicked: {}", panic_message(payload.as_ref()));
            tracing::error!("Session {id} {message}");
            queue.push(Event::for_session(id, EventKind::SessionError(message)));
        }
    }

    tracing::debug!("Session {id} worker finished");
    queue.push(Event::for_session(
        id,
        EventKind::SessionEnded(END_WORKER_FINISHED.into()),
    ));
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
