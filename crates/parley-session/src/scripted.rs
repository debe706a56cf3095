//! A voice-agent session that plays back a dialogue written in TOML.
//!
//! The backend used when `[agent].script` is set, and the session double
//! in tests.
//!
//! ```toml
//! step_delay_ms = 200
//! steps = [
//!   { user = "What's on today?" },
//!   { think = true },
//!   { agent = "You have a meeting at 10." },
//!   { correct = { original = "You have", corrected = "Sorry, go ahead." } },
//!   { pause = 500 },
//! ]
//! ```

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use parley_core::interfaces::{
    SessionCallbacks, SessionFactory, SessionFailure, VoiceAgentSession,
};
use parley_core::profile::SessionConfig;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    User(String),
    Agent(String),
    Think(bool),
    Correct { original: String, corrected: String },
    Audio(usize),
    /// Extra wait in milliseconds.
    Pause(u64),
    Fail(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Script {
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
    /// Speak the configured first message before the steps.
    #[serde(default = "default_greet")]
    pub greet: bool,
    /// Keep `run` blocked after the last step until an end is requested.
    #[serde(default)]
    pub hold_open: bool,
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_step_delay_ms() -> u64 {
    250
}

fn default_greet() -> bool {
    true
}

impl FromStr for Script {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s)
    }
}

impl Script {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        content
            .parse()
            .with_context(|| format!("Failed to parse script {}", path.display()))
    }
}

pub struct ScriptedSession {
    script: Script,
    first_message: String,
    callbacks: Arc<dyn SessionCallbacks>,
    ended: Mutex<bool>,
    wake: Condvar,
}

impl ScriptedSession {
    pub fn new(script: Script, first_message: String, callbacks: Arc<dyn SessionCallbacks>) -> Self {
        Self {
            script,
            first_message,
            callbacks,
            ended: Mutex::new(false),
            wake: Condvar::new(),
        }
    }

    /// Sleep for `millis` unless an end is requested first. Returns whether
    /// the session was ended.
    fn wait(&self, millis: u64) -> bool {
        let guard = self.ended.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .wake
            .wait_timeout_while(guard, Duration::from_millis(millis), |ended| !*ended)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    fn hold_until_ended(&self) {
        let guard = self.ended.lock().unwrap_or_else(PoisonError::into_inner);
        let _guard = self
            .wake
            .wait_while(guard, |ended| !*ended)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

impl VoiceAgentSession for ScriptedSession {
    fn run(&self) -> Result<(), SessionFailure> {
        let delay = self.script.step_delay_ms;

        if self.script.greet && !self.first_message.is_empty() {
            if self.wait(delay) {
                return Ok(());
            }
            self.callbacks.agent_response(self.first_message.clone());
        }

        for step in &self.script.steps {
            if self.wait(delay) {
                tracing::debug!("Scripted session ended early");
                return Ok(());
            }
            match step {
                Step::User(text) => self.callbacks.user_transcript(text.clone()),
                Step::Agent(text) => self.callbacks.agent_response(text.clone()),
                Step::Think(active) => self.callbacks.thinking(*active),
                Step::Correct {
                    original,
                    corrected,
                } => self
                    .callbacks
                    .response_corrected(original.clone(), corrected.clone()),
                Step::Audio(bytes) => self.callbacks.user_audio(*bytes),
                Step::Pause(millis) => {
                    if self.wait(*millis) {
                        return Ok(());
                    }
                }
                Step::Fail(message) => return Err(SessionFailure::new(message.clone())),
            }
        }

        if self.script.hold_open {
            self.hold_until_ended();
        }
        Ok(())
    }

    fn request_end(&self) {
        *self.ended.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.wake.notify_all();
    }
}

/// Builds [`ScriptedSession`]s that all play the same script.
#[derive(Debug, Clone)]
pub struct ScriptedFactory {
    script: Script,
}

impl ScriptedFactory {
    pub fn new(script: Script) -> Self {
        Self { script }
    }
}

impl SessionFactory for ScriptedFactory {
    fn create(
        &self,
        config: &SessionConfig,
        callbacks: Arc<dyn SessionCallbacks>,
    ) -> anyhow::Result<Arc<dyn VoiceAgentSession>> {
        tracing::info!("Creating scripted session ({} steps)", self.script.steps.len());
        Ok(Arc::new(ScriptedSession::new(
            self.script.clone(),
            config.first_message.clone(),
            callbacks,
        )))
    }

    fn requires_credentials(&self) -> bool {
        false
    }
}
