//! Foreground fold of queued events into the transcript.

use std::sync::Arc;

use parley_core::interfaces::SpeechSynthesizer;
use parley_core::lifecycle::preview;
use tracing::{debug, warn};

use crate::controller::{SessionController, TerminalObservation};
use crate::error::ApplyError;
use crate::event::{Event, EventKind, SessionId};
use crate::speech;
use crate::transcript::{EntryKind, Role, TranscriptStore};

/// Applies queued events, in order, once per refresh cycle.
pub struct UiEventDrain {
    speaker: Option<Arc<dyn SpeechSynthesizer>>,
    voice: String,
}

impl UiEventDrain {
    pub fn new(speaker: Option<Arc<dyn SpeechSynthesizer>>, voice: impl Into<String>) -> Self {
        Self {
            speaker,
            voice: voice.into(),
        }
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }

    /// Voice used for agent text drained from now on.
    pub fn set_voice(&mut self, voice: impl Into<String>) {
        self.voice = voice.into();
    }

    /// Apply every pending event. Returns `false` if the queue was empty.
    ///
    /// A failure on one event becomes a visible notice and the drain moves
    /// on to the next event.
    pub fn drain(&mut self, controller: &mut SessionController, store: &mut TranscriptStore) -> bool {
        let batch = controller.queue().drain_all();
        if batch.is_empty() {
            return false;
        }
        for event in batch {
            let label = event.kind.label();
            debug!("Applying {label} event");
            if let Err(e) = self.apply(controller, store, event) {
                warn!("Failed to apply {label} event: {e}");
                store.push(Role::Assistant, EntryKind::Notice, format!("[system error: {e}]"));
            }
        }
        true
    }

    fn apply(
        &self,
        controller: &mut SessionController,
        store: &mut TranscriptStore,
        event: Event,
    ) -> Result<(), ApplyError> {
        if !controller.is_current(event.session) {
            debug!("Ignoring stale {} event", event.kind.label());
            store.debug(format!("stale {} event ignored", event.kind.label()));
            return Ok(());
        }

        match event.kind {
            EventKind::UserUtterance(text) => {
                store.push(Role::User, EntryKind::Utterance, text);
            }
            EventKind::AgentUtterance(text) => {
                store.set_thinking(false);
                self.speak(controller, store, &text);
                store.push(Role::Assistant, EntryKind::Utterance, text);
            }
            EventKind::AgentCorrection {
                original,
                corrected,
            } => {
                debug!("Correction replaces: {}", preview(&original, 50));
                store.set_thinking(false);
                self.speak(controller, store, &corrected);
                store.push(Role::Assistant, EntryKind::Correction, corrected);
            }
            EventKind::SessionEnded(reason) => {
                store.set_thinking(false);
                let notice = format!("[ended: {reason}]");
                observe_terminal(controller, store, event.session, false, notice)?;
            }
            EventKind::SessionError(message) => {
                store.set_thinking(false);
                let notice = format!("[error: {message}]");
                observe_terminal(controller, store, event.session, true, notice)?;
            }
            EventKind::ThinkingStateChanged(active) => store.set_thinking(active),
            EventKind::UserAudio { bytes } => {
                if bytes == 0 {
                    return Err(ApplyError::EmptyPayload("user audio"));
                }
                store.push(
                    Role::User,
                    EntryKind::Utterance,
                    format!("(Audio bytes captured: {bytes})"),
                );
            }
            EventKind::SystemNotice(text) => store.debug(text),
            EventKind::PlaybackFailed { message } => {
                warn!("Playback failed: {message}");
                store.debug(format!("playback failed: {message}"));
            }
        }
        Ok(())
    }

    fn speak(&self, controller: &SessionController, store: &mut TranscriptStore, text: &str) {
        let Some(speaker) = &self.speaker else {
            return;
        };
        if text.trim().is_empty() {
            return;
        }
        if let Err(e) = speech::spawn_playback(
            speaker.clone(),
            text.to_string(),
            self.voice.clone(),
            controller.queue().clone(),
        ) {
            warn!("Failed to spawn playback thread: {e}");
            store.debug(format!("playback thread failed to start: {e}"));
        }
    }
}

fn observe_terminal(
    controller: &mut SessionController,
    store: &mut TranscriptStore,
    session: Option<SessionId>,
    failed: bool,
    notice: String,
) -> Result<(), ApplyError> {
    match controller.observe_terminal(session, failed)? {
        TerminalObservation::First => {
            store.push(Role::Assistant, EntryKind::Notice, notice);
        }
        TerminalObservation::Duplicate | TerminalObservation::Stale => {
            debug!("Terminal event recorded in debug log: {notice}");
            store.debug(notice);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::SessionStatus;
    use crate::event::{END_COMPLETED, END_WORKER_FINISHED};
    use crate::queue::EventQueue;
    use crate::scripted::ScriptedFactory;
    use parley_core::config::{AgentConfig, ProfileConfig};
    use parley_core::interfaces::PlaybackError;
    use parley_core::profile::SessionConfig;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    /// Records what it was asked to say.
    #[derive(Default)]
    struct RecordingSpeech {
        spoken: Mutex<Vec<(String, String)>>,
    }

    impl SpeechSynthesizer for RecordingSpeech {
        fn synthesize_and_play(&self, text: &str, voice: &str) -> Result<(), PlaybackError> {
            self.spoken
                .lock()
                .unwrap()
                .push((text.to_string(), voice.to_string()));
            Ok(())
        }
    }

    fn session_config() -> SessionConfig {
        SessionConfig::from_profile(
            &AgentConfig::default(),
            &ProfileConfig::default(),
            chrono::NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        )
    }

    /// A controller whose scripted session holds open until stopped, so the
    /// test owns the event stream.
    fn started() -> (SessionController, SessionId) {
        let script: crate::scripted::Script =
            "greet = false\nhold_open = true\n".parse().unwrap();
        let factory = Arc::new(ScriptedFactory::new(script));
        let mut controller =
            SessionController::new(factory, EventQueue::new(), Duration::from_secs(10));
        let id = controller.start(&session_config()).unwrap();
        (controller, id)
    }

    fn push(controller: &SessionController, id: SessionId, kind: EventKind) {
        controller.queue().push(Event::for_session(id, kind));
    }

    #[test]
    fn empty_queue_reports_no_work() {
        let (mut controller, _) = started();
        let mut store = TranscriptStore::new();
        let mut drain = UiEventDrain::new(None, "Rachel");
        assert!(!drain.drain(&mut controller, &mut store));
        controller.stop();
    }

    #[test]
    fn canonical_exchange_produces_expected_transcript() {
        let (mut controller, id) = started();
        let mut store = TranscriptStore::new();
        let mut drain = UiEventDrain::new(None, "Rachel");

        push(&controller, id, EventKind::UserUtterance("hi".into()));
        push(&controller, id, EventKind::AgentUtterance("hello".into()));
        push(&controller, id, EventKind::SessionEnded(END_COMPLETED.into()));
        assert!(drain.drain(&mut controller, &mut store));

        assert_eq!(
            store.pairs(),
            vec![
                ("user", "hi"),
                ("assistant", "hello"),
                ("assistant", "[ended: completed]"),
            ]
        );
        assert!(controller.status().is_terminal());
        controller.stop();
    }

    #[test]
    fn duplicate_terminal_events_append_one_notice() {
        let (mut controller, id) = started();
        let mut store = TranscriptStore::new();
        let mut drain = UiEventDrain::new(None, "Rachel");

        push(&controller, id, EventKind::SessionError("socket closed".into()));
        push(&controller, id, EventKind::SessionEnded(END_WORKER_FINISHED.into()));
        push(&controller, id, EventKind::SessionEnded(END_COMPLETED.into()));
        drain.drain(&mut controller, &mut store);

        assert_eq!(store.pairs(), vec![("assistant", "[error: socket closed]")]);
        assert_eq!(controller.status(), SessionStatus::Failed);
        assert!(store
            .debug_log()
            .any(|line| line == "[ended: worker-finished]"));
        controller.stop();
    }

    #[test]
    fn agent_utterance_clears_thinking() {
        let (mut controller, id) = started();
        let mut store = TranscriptStore::new();
        let mut drain = UiEventDrain::new(None, "Rachel");

        push(&controller, id, EventKind::ThinkingStateChanged(true));
        drain.drain(&mut controller, &mut store);
        assert!(store.is_thinking());
        assert!(store.is_empty());

        push(&controller, id, EventKind::AgentUtterance("done".into()));
        drain.drain(&mut controller, &mut store);
        assert!(!store.is_thinking());
        assert_eq!(store.entries().len(), 1);
        controller.stop();
    }

    #[test]
    fn correction_appends_corrected_text_and_speaks_it() {
        let (mut controller, id) = started();
        let mut store = TranscriptStore::new();
        let speaker = Arc::new(RecordingSpeech::default());
        let mut drain = UiEventDrain::new(Some(speaker.clone() as Arc<dyn SpeechSynthesizer>), "Bella");

        push(
            &controller,
            id,
            EventKind::AgentCorrection {
                original: "The weather is".into(),
                corrected: "Sorry, go ahead".into(),
            },
        );
        drain.drain(&mut controller, &mut store);

        let entry = &store.entries()[0];
        assert_eq!(entry.kind, EntryKind::Correction);
        assert_eq!(entry.text, "Sorry, go ahead");

        let deadline = Instant::now() + Duration::from_secs(5);
        while speaker.spoken.lock().unwrap().is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(
            *speaker.spoken.lock().unwrap(),
            vec![("Sorry, go ahead".to_string(), "Bella".to_string())]
        );
        controller.stop();
    }

    #[test]
    fn stale_events_go_to_debug_log_only() {
        let (mut controller, _) = started();
        let mut store = TranscriptStore::new();
        let mut drain = UiEventDrain::new(None, "Rachel");

        let old = SessionId::new();
        push(&controller, old, EventKind::AgentUtterance("late".into()));
        push(&controller, old, EventKind::SessionEnded(END_WORKER_FINISHED.into()));
        drain.drain(&mut controller, &mut store);

        assert!(store.is_empty());
        assert_eq!(controller.status(), SessionStatus::Active);
        assert_eq!(store.debug_log().count(), 2);
        controller.stop();
    }

    #[test]
    fn malformed_event_becomes_notice_and_drain_continues() {
        let (mut controller, id) = started();
        let mut store = TranscriptStore::new();
        let mut drain = UiEventDrain::new(None, "Rachel");

        push(&controller, id, EventKind::UserAudio { bytes: 0 });
        push(&controller, id, EventKind::UserUtterance("still here".into()));
        drain.drain(&mut controller, &mut store);

        assert_eq!(
            store.pairs(),
            vec![
                ("assistant", "[system error: empty user audio payload]"),
                ("user", "still here"),
            ]
        );
        controller.stop();
    }

    #[test]
    fn blank_utterances_are_appended_as_received() {
        let (mut controller, id) = started();
        let mut store = TranscriptStore::new();
        let speaker = Arc::new(RecordingSpeech::default());
        let mut drain = UiEventDrain::new(Some(speaker.clone() as Arc<dyn SpeechSynthesizer>), "Rachel");

        push(&controller, id, EventKind::UserUtterance("hi".into()));
        push(&controller, id, EventKind::UserUtterance("".into()));
        push(&controller, id, EventKind::AgentUtterance("  ".into()));
        push(&controller, id, EventKind::SessionEnded(END_COMPLETED.into()));
        drain.drain(&mut controller, &mut store);

        assert_eq!(
            store.pairs(),
            vec![
                ("user", "hi"),
                ("user", ""),
                ("assistant", "  "),
                ("assistant", "[ended: completed]"),
            ]
        );
        assert!(!store
            .entries()
            .iter()
            .any(|e| e.text.starts_with("[system error")));
        assert!(speaker.spoken.lock().unwrap().is_empty());
        controller.stop();
    }

    #[test]
    fn untagged_events_apply_to_the_current_view() {
        let (mut controller, _) = started();
        let mut store = TranscriptStore::new();
        let mut drain = UiEventDrain::new(None, "Rachel");

        controller
            .queue()
            .push(Event::detached(EventKind::UserAudio { bytes: 4096 }));
        controller
            .queue()
            .push(Event::detached(EventKind::PlaybackFailed {
                message: "no audio device".into(),
            }));
        controller
            .queue()
            .push(Event::detached(EventKind::SystemNotice("mic muted".into())));
        drain.drain(&mut controller, &mut store);

        assert_eq!(store.pairs(), vec![("user", "(Audio bytes captured: 4096)")]);
        let debug: Vec<_> = store.debug_log().collect();
        assert_eq!(debug, vec!["playback failed: no audio device", "mic muted"]);
        assert_eq!(controller.status(), SessionStatus::Active);
        controller.stop();
    }
}
