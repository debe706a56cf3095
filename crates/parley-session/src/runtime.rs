//! The single-owner object the presentation layer drives.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parley_core::config::{ConfigError, SessionSettings, SpeechConfig, VoiceEntry};
use parley_core::interfaces::SessionFactory;
use parley_core::profile::SessionConfig;

use crate::controller::{SessionController, SessionStatus, StopOutcome};
use crate::drain::UiEventDrain;
use crate::error::ControllerError;
use crate::event::SessionId;
use crate::queue::{EventQueue, QueueStats};
use crate::session_log::SessionLog;
use crate::speech;
use crate::transcript::TranscriptStore;

/// Shown after a start until the first real event arrives.
pub const PLACEHOLDER: &str = "Initializing conversation...";
/// Local notice appended when the user asks a live session to stop.
pub const STOP_NOTICE: &str = "[stop requested]";

/// Controller, transcript and drain bundled for one foreground thread.
///
/// Created once at startup and passed to the front end by value; nothing
/// here is global.
pub struct ConversationRuntime {
    controller: SessionController,
    store: TranscriptStore,
    drain: UiEventDrain,
    speech: SpeechConfig,
    session_log: Option<SessionLog>,
    logged_through: Option<u64>,
    last_status: SessionStatus,
}

impl ConversationRuntime {
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        settings: &SessionSettings,
        speech_config: &SpeechConfig,
    ) -> Self {
        let queue = EventQueue::with_capacity(settings.queue_capacity);
        let controller = SessionController::new(
            factory,
            queue,
            Duration::from_secs(settings.stop_grace_secs),
        );
        let voice = speech_config
            .initial_voice()
            .map(|v| v.name.clone())
            .unwrap_or_else(|e| {
                tracing::warn!("No usable voice: {e}");
                String::new()
            });
        Self {
            controller,
            store: TranscriptStore::new(),
            drain: UiEventDrain::new(speech::from_config(speech_config), voice),
            speech: speech_config.clone(),
            session_log: None,
            logged_through: None,
            last_status: SessionStatus::Idle,
        }
    }

    pub fn with_session_log(mut self, log: SessionLog) -> Self {
        self.session_log = Some(log);
        self
    }

    /// Start a session. On success the transcript is reset and shows
    /// [`PLACEHOLDER`]. On failure nothing visible changes.
    pub fn start(&mut self, config: &SessionConfig) -> Result<SessionId, ControllerError> {
        let id = self.controller.start(config)?;
        self.store.begin_session(PLACEHOLDER);
        self.log_lifecycle("start", &id.to_string());
        Ok(id)
    }

    pub fn stop(&mut self) -> StopOutcome {
        let outcome = self.controller.stop();
        if let StopOutcome::Requested(id) = outcome {
            self.store.push_local_notice(STOP_NOTICE);
            self.log_lifecycle("stop", &id.to_string());
        }
        outcome
    }

    pub fn clear(&mut self) {
        self.store.clear();
        self.log_lifecycle("clear", "");
    }

    /// One refresh cycle: watchdog, drain, then audit log. Returns whether
    /// the view changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        let mut changed = false;
        if let Some(warning) = self.controller.check_watchdog(now) {
            self.store.debug(warning);
            changed = true;
        }
        changed |= self.drain.drain(&mut self.controller, &mut self.store);
        self.flush_log();
        changed
    }

    fn flush_log(&mut self) {
        let status = self.controller.status();
        if status != self.last_status {
            self.log_lifecycle("status", status.as_str());
            self.last_status = status;
        }

        let Some(log) = self.session_log.as_mut() else {
            return;
        };
        let session = self.controller.current_id();
        let pending = self.store.entries_since(self.logged_through);
        for entry in pending {
            log.log_entry(session, entry);
        }
        if let Some(last) = pending.last() {
            self.logged_through = Some(last.seq);
        }
    }

    fn log_lifecycle(&mut self, action: &str, details: &str) {
        tracing::debug!("Lifecycle: {action} {details}");
        if let Some(log) = self.session_log.as_mut() {
            log.log_lifecycle(action, details);
        }
    }

    /// Select the voice used for agent speech from now on.
    pub fn select_voice(&mut self, name: &str) -> Result<(), ConfigError> {
        let entry = self.speech.voice(name)?;
        tracing::info!("Voice selected: {}", entry.name);
        self.drain.set_voice(entry.name.clone());
        Ok(())
    }

    pub fn selected_voice(&self) -> &str {
        self.drain.voice()
    }

    pub fn voices(&self) -> &[VoiceEntry] {
        &self.speech.voices
    }

    /// Mailbox for events produced outside any session.
    pub fn queue(&self) -> &EventQueue {
        self.controller.queue()
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.controller.queue().stats()
    }

    pub fn transcript(&self) -> &TranscriptStore {
        &self.store
    }

    pub fn status(&self) -> SessionStatus {
        self.controller.status()
    }

    pub fn current_session(&self) -> Option<SessionId> {
        self.controller.current_id()
    }
}
