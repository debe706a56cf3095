use parley_core::interfaces::SessionCallbacks;
use parley_core::lifecycle::preview;
use tracing::debug;

use crate::event::{Event, EventKind, SessionId};
use crate::queue::EventQueue;

const PREVIEW_CHARS: usize = 50;

/// Session callbacks that do nothing but enqueue tagged events.
#[derive(Debug, Clone)]
pub struct QueueHooks {
    session: SessionId,
    queue: EventQueue,
}

impl QueueHooks {
    pub fn new(session: SessionId, queue: EventQueue) -> Self {
        Self { session, queue }
    }

    fn push(&self, kind: EventKind) {
        self.queue.push(Event::for_session(self.session, kind));
    }
}

impl SessionCallbacks for QueueHooks {
    fn agent_response(&self, text: String) {
        debug!("Callback: agent response: {}", preview(&text, PREVIEW_CHARS));
        self.push(EventKind::AgentUtterance(text));
    }

    fn user_transcript(&self, text: String) {
        debug!("Callback: user transcript: {}", preview(&text, PREVIEW_CHARS));
        self.push(EventKind::UserUtterance(text));
    }

    fn response_corrected(&self, original: String, corrected: String) {
        debug!(
            "Callback: response corrected: {}",
            preview(&corrected, PREVIEW_CHARS)
        );
        self.push(EventKind::AgentCorrection {
            original,
            corrected,
        });
    }

    fn thinking(&self, active: bool) {
        debug!("Callback: thinking={active}");
        self.push(EventKind::ThinkingStateChanged(active));
    }

    fn user_audio(&self, bytes: usize) {
        debug!("Callback: user audio, {bytes} bytes");
        self.push(EventKind::UserAudio { bytes });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_hook_enqueues_one_tagged_event() {
        let queue = EventQueue::new();
        let id = SessionId::new();
        let hooks = QueueHooks::new(id, queue.clone());

        hooks.user_transcript("hi".into());
        hooks.thinking(true);
        hooks.agent_response("hello".into());
        hooks.response_corrected("hel".into(), "hello there".into());
        hooks.user_audio(3200);

        let batch = queue.drain_all();
        assert_eq!(batch.len(), 5);
        assert!(batch.iter().all(|e| e.session == Some(id)));
        assert_eq!(batch[0].kind, EventKind::UserUtterance("hi".into()));
        assert_eq!(batch[1].kind, EventKind::ThinkingStateChanged(true));
        assert_eq!(batch[2].kind, EventKind::AgentUtterance("hello".into()));
        assert_eq!(
            batch[3].kind,
            EventKind::AgentCorrection {
                original: "hel".into(),
                corrected: "hello there".into()
            }
        );
        assert_eq!(batch[4].kind, EventKind::UserAudio { bytes: 3200 });
    }
}
