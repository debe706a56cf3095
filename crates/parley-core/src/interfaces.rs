//! Contracts between the session relay and its external collaborators.
//!
//! The voice agent, the speech engine, and the presentation layer are all
//! outside the relay. Only these traits are shared.

use std::sync::Arc;

use crate::profile::SessionConfig;

/// Failure raised by a voice-agent session while running.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SessionFailure {
    pub message: String,
}

impl SessionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure while synthesizing or playing back speech.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("audio player failed: {0}")]
    Player(String),

    #[error("speech backend panicked")]
    Panicked,
}

/// Callback slots handed to a session at construction time.
///
/// Implementations may be invoked from any thread, at any time. They must
/// not block and must not touch foreground state.
pub trait SessionCallbacks: Send + Sync {
    fn agent_response(&self, text: String);
    fn user_transcript(&self, text: String);
    fn response_corrected(&self, original: String, corrected: String);
    fn thinking(&self, _active: bool) {}
    fn user_audio(&self, _bytes: usize) {}
}

/// One connection to a conversational voice agent.
pub trait VoiceAgentSession: Send + Sync {
    /// Run the session. Blocks until it ends naturally, is ended through
    /// [`request_end`](Self::request_end), or fails.
    fn run(&self) -> Result<(), SessionFailure>;

    /// Ask the session to end. Returns immediately; `run` observes it later.
    fn request_end(&self);
}

/// Builds sessions bound to a fresh set of callbacks.
pub trait SessionFactory: Send + Sync {
    fn create(
        &self,
        config: &SessionConfig,
        callbacks: Arc<dyn SessionCallbacks>,
    ) -> anyhow::Result<Arc<dyn VoiceAgentSession>>;

    /// Whether sessions from this factory talk to a remote agent and so
    /// need credentials.
    fn requires_credentials(&self) -> bool {
        true
    }
}

/// Text-to-speech with blocking playback.
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text` with `voice`. Blocks until playback finishes.
    fn synthesize_and_play(&self, text: &str, voice: &str) -> Result<(), PlaybackError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_traits_are_object_safe_and_send() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn VoiceAgentSession>();
        assert_send_sync::<dyn SessionFactory>();
        assert_send_sync::<dyn SpeechSynthesizer>();
        assert_send_sync::<dyn SessionCallbacks>();
    }

    #[test]
    fn session_failure_displays_message() {
        let err = SessionFailure::new("socket closed");
        assert_eq!(err.to_string(), "socket closed");
    }
}
