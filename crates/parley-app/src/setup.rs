use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use parley_core::config::{AgentConfig, AppConfig};
use parley_core::interfaces::{SessionCallbacks, SessionFactory, VoiceAgentSession};
use parley_core::profile::SessionConfig;
use parley_session::{ConversationRuntime, Script, ScriptedFactory, SessionLog};

/// Factory for a remote conversational agent.
///
/// No agent client ships with this build, so construction always fails
/// after the credential check. Point `[agent].script` at a dialogue file to
/// run offline instead.
pub struct RemoteAgentFactory {
    requires_auth: bool,
}

impl RemoteAgentFactory {
    pub fn new(agent: &AgentConfig) -> Self {
        Self {
            requires_auth: agent.requires_auth,
        }
    }
}

impl SessionFactory for RemoteAgentFactory {
    fn create(
        &self,
        config: &SessionConfig,
        _callbacks: Arc<dyn SessionCallbacks>,
    ) -> Result<Arc<dyn VoiceAgentSession>> {
        tracing::debug!(
            "Conversation override for agent {}: {}",
            config.agent_id,
            config.conversation_override()
        );
        anyhow::bail!("no voice-agent client is available; set [agent].script to run a scripted session")
    }

    fn requires_credentials(&self) -> bool {
        self.requires_auth
    }
}

/// The scripted backend when `[agent].script` is set, the remote one otherwise.
pub fn session_factory(config: &AppConfig) -> Result<Arc<dyn SessionFactory>> {
    match &config.agent.script {
        Some(path) => scripted_factory(path),
        None => Ok(Arc::new(RemoteAgentFactory::new(&config.agent))),
    }
}

pub fn scripted_factory(path: &Path) -> Result<Arc<dyn SessionFactory>> {
    let script = Script::load(path)?;
    tracing::info!("Using scripted session from {}", path.display());
    Ok(Arc::new(ScriptedFactory::new(script)))
}

/// Session settings composed from the profile for today's date.
pub fn session_config(config: &AppConfig) -> SessionConfig {
    SessionConfig::from_profile(&config.agent, &config.profile, Local::now().date_naive())
}

/// Build the runtime. A session log that cannot be opened is skipped with a
/// warning.
pub fn build_runtime(config: &AppConfig, factory: Arc<dyn SessionFactory>) -> ConversationRuntime {
    let runtime = ConversationRuntime::new(factory, &config.session, &config.speech);
    match SessionLog::open(Path::new(&config.session.log_dir))
        .with_context(|| format!("opening session log in {}", config.session.log_dir))
    {
        Ok(log) => runtime.with_session_log(log),
        Err(e) => {
            tracing::warn!("Session log disabled: {e:#}");
            runtime
        }
    }
}
