use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `[agent].agent_id`.
pub const AGENT_ID_ENV: &str = "AGENT_ID";
/// Environment variable that overrides `[agent].api_key`.
pub const API_KEY_ENV: &str = "API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown voice '{0}'")]
    UnknownVoice(String),

    #[error("no voices configured")]
    NoVoices,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub profile: ProfileConfig,
}

#[derive(Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_requires_auth")]
    pub requires_auth: bool,
    /// Dialogue script for the scripted session backend. When set, the
    /// scripted backend is used instead of a remote agent.
    #[serde(default)]
    pub script: Option<PathBuf>,
}

fn default_requires_auth() -> bool {
    true
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_id: String::new(),
            api_key: String::new(),
            requires_auth: default_requires_auth(),
            script: None,
        }
    }
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("agent_id", &self.agent_id)
            .field("api_key", &"[REDACTED]")
            .field("requires_auth", &self.requires_auth)
            .field("script", &self.script)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechBackend {
    Piper,
    Silent,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VoiceEntry {
    pub name: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub config: String,
}

impl VoiceEntry {
    fn named(name: &str) -> Self {
        Self {
            name: name.into(),
            model: format!("{}.onnx", name.to_lowercase()),
            config: format!("{}.onnx.json", name.to_lowercase()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    #[serde(default = "default_speech_enabled")]
    pub enabled: bool,
    #[serde(default = "default_speech_backend")]
    pub backend: SpeechBackend,
    #[serde(default = "default_piper_binary")]
    pub piper_binary: String,
    #[serde(default = "default_player_binary")]
    pub player_binary: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_voices_dir")]
    pub voices_dir: String,
    #[serde(default = "default_voices")]
    pub voices: Vec<VoiceEntry>,
    #[serde(default = "default_voice")]
    pub default_voice: String,
}

fn default_speech_enabled() -> bool {
    true
}
fn default_speech_backend() -> SpeechBackend {
    SpeechBackend::Piper
}
fn default_piper_binary() -> String {
    "piper".into()
}
fn default_player_binary() -> String {
    "aplay".into()
}
fn default_sample_rate() -> u32 {
    22050
}
fn default_voices_dir() -> String {
    "voices".into()
}
fn default_voices() -> Vec<VoiceEntry> {
    ["Rachel", "Domi", "Bella", "Antoni", "Elli", "Adam", "Arnold"]
        .iter()
        .map(|name| VoiceEntry::named(name))
        .collect()
}
fn default_voice() -> String {
    "Rachel".into()
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: default_speech_enabled(),
            backend: default_speech_backend(),
            piper_binary: default_piper_binary(),
            player_binary: default_player_binary(),
            sample_rate: default_sample_rate(),
            voices_dir: default_voices_dir(),
            voices: default_voices(),
            default_voice: default_voice(),
        }
    }
}

impl SpeechConfig {
    pub fn voice(&self, name: &str) -> Result<&VoiceEntry, ConfigError> {
        self.voices
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| ConfigError::UnknownVoice(name.to_string()))
    }

    /// The voice to select at startup. Falls back to the first configured
    /// voice when `default_voice` is not in the list.
    pub fn initial_voice(&self) -> Result<&VoiceEntry, ConfigError> {
        match self.voice(&self.default_voice) {
            Ok(v) => Ok(v),
            Err(_) => {
                let first = self.voices.first().ok_or(ConfigError::NoVoices)?;
                tracing::warn!(
                    "Default voice '{}' not configured, using '{}'",
                    self.default_voice,
                    first.name
                );
                Ok(first)
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    /// Soft cap for the event queue. 0 means unbounded.
    #[serde(default)]
    pub queue_capacity: usize,
    #[serde(default = "default_stop_grace_secs")]
    pub stop_grace_secs: u64,
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

fn default_stop_grace_secs() -> u64 {
    10
}
fn default_tick_millis() -> u64 {
    100
}
fn default_log_dir() -> String {
    "logs".into()
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 0,
            stop_grace_secs: default_stop_grace_secs(),
            tick_millis: default_tick_millis(),
            log_dir: default_log_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileConfig {
    #[serde(default = "default_user_name")]
    pub user_name: String,
    #[serde(default = "default_schedule")]
    pub schedule: String,
}

fn default_user_name() -> String {
    "Alex".into()
}
fn default_schedule() -> String {
    "Sales Meeting with Taipy at 10:00; Gym with Sophie at 17:00".into()
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            user_name: default_user_name(),
            schedule: default_schedule(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            speech: SpeechConfig::default(),
            session: SessionSettings::default(),
            profile: ProfileConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load config with fallback chain: explicit path → ./config/default.toml → hardcoded defaults.
    /// `AGENT_ID` and `API_KEY` from the environment are applied on top.
    pub fn load_or_default(explicit_path: Option<&Path>) -> Self {
        let mut config = Self::load_file_or_default(explicit_path);
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    fn load_file_or_default(explicit_path: Option<&Path>) -> Self {
        if let Some(path) = explicit_path {
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {e}", path.display());
                }
            }
        }

        let default_path = Path::new("config/default.toml");
        if default_path.exists() {
            match Self::load(default_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    tracing::warn!("Failed to load default config: {e}");
                }
            }
        }

        tracing::info!("Using hardcoded default configuration");
        Self::default()
    }

    /// Replace agent credentials with non-empty values from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup(AGENT_ID_ENV).filter(|v| !v.trim().is_empty()) {
            tracing::debug!("{AGENT_ID_ENV} taken from environment");
            self.agent.agent_id = id;
        }
        if let Some(key) = lookup(API_KEY_ENV).filter(|v| !v.trim().is_empty()) {
            tracing::debug!("{API_KEY_ENV} taken from environment");
            self.agent.api_key = key;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.speech.default_voice, "Rachel");
        assert_eq!(cfg.speech.voices.len(), 7);
        assert_eq!(cfg.session.queue_capacity, 0);
        assert!(cfg.agent.agent_id.is_empty() && cfg.agent.api_key.is_empty());
        assert!(cfg.agent.requires_auth);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [agent]
            agent_id = "agent-123"

            [session]
            queue_capacity = 64
            "#,
        )
        .unwrap();
        assert_eq!(cfg.agent.agent_id, "agent-123");
        assert_eq!(cfg.session.queue_capacity, 64);
        assert_eq!(cfg.session.tick_millis, 100);
        assert_eq!(cfg.profile.user_name, "Alex");
        assert_eq!(cfg.speech.backend, SpeechBackend::Piper);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parley.toml");
        std::fs::write(
            &path,
            "[speech]\nbackend = \"silent\"\ndefault_voice = \"Bella\"\n",
        )
        .unwrap();
        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(cfg.speech.backend, SpeechBackend::Silent);
        assert_eq!(cfg.speech.initial_voice().unwrap().name, "Bella");
    }

    #[test]
    fn missing_explicit_path_falls_back() {
        let cfg = AppConfig::load_file_or_default(Some(Path::new("/nonexistent/parley.toml")));
        assert_eq!(cfg.profile.user_name, "Alex");
    }

    #[test]
    fn overrides_replace_only_non_empty_values() {
        let mut cfg = AppConfig::default();
        cfg.agent.agent_id = "from-file".into();
        cfg.apply_overrides(|key| match key {
            AGENT_ID_ENV => Some("  ".into()),
            API_KEY_ENV => Some("secret".into()),
            _ => None,
        });
        assert_eq!(cfg.agent.agent_id, "from-file");
        assert_eq!(cfg.agent.api_key, "secret");
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut agent = AgentConfig::default();
        agent.api_key = "super-secret".into();
        let rendered = format!("{agent:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn unknown_default_voice_falls_back_to_first() {
        let mut speech = SpeechConfig::default();
        speech.default_voice = "Nobody".into();
        assert_eq!(speech.initial_voice().unwrap().name, "Rachel");

        speech.voices.clear();
        assert!(matches!(speech.initial_voice(), Err(ConfigError::NoVoices)));
    }

    #[test]
    fn voice_lookup_rejects_unknown_names() {
        let speech = SpeechConfig::default();
        assert_eq!(speech.voice("Adam").unwrap().model, "adam.onnx");
        assert!(matches!(
            speech.voice("Zed"),
            Err(ConfigError::UnknownVoice(name)) if name == "Zed"
        ));
    }
}
