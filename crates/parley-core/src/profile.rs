//! Session configuration composed from the user's profile.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;

use crate::config::{AgentConfig, ProfileConfig};

/// Everything a session factory needs to open one conversation.
#[derive(Clone, Serialize)]
pub struct SessionConfig {
    pub agent_id: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub requires_auth: bool,
    pub prompt: String,
    pub first_message: String,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("agent_id", &self.agent_id)
            .field("api_key", &"[REDACTED]")
            .field("requires_auth", &self.requires_auth)
            .field("prompt", &self.prompt)
            .field("first_message", &self.first_message)
            .finish()
    }
}

impl SessionConfig {
    /// Compose the assistant prompt and greeting for `profile` on `today`.
    pub fn from_profile(agent: &AgentConfig, profile: &ProfileConfig, today: NaiveDate) -> Self {
        let name = profile.user_name.trim();
        let schedule = profile.schedule.trim();
        let date = today.format("%A, %B %d, %Y");

        let prompt = format!(
            "You are a helpful and friendly personal assistant for {name}. \
             You manage tasks, your calendar, can search the web for information, and provide recipes. \
             Today's date is {date}. \
             Your interlocutor, {name}, has the following schedule today: {schedule}. \
             Be proactive if appropriate, but always wait for the user to finish speaking."
        );
        let first_message = format!(
            "Hello {name}! According to your schedule, you have: {schedule}. How can I help you today?"
        );

        Self {
            agent_id: agent.agent_id.clone(),
            api_key: agent.api_key.clone(),
            requires_auth: agent.requires_auth,
            prompt,
            first_message,
        }
    }

    /// Both the agent id and the API key are non-blank.
    pub fn has_credentials(&self) -> bool {
        !self.agent_id.trim().is_empty() && !self.api_key.trim().is_empty()
    }

    /// The conversation override sent to the agent when a session opens.
    pub fn conversation_override(&self) -> serde_json::Value {
        json!({
            "agent": {
                "prompt": { "prompt": self.prompt },
                "first_message": self.first_message,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SessionConfig {
        let agent = AgentConfig {
            agent_id: "agent-1".into(),
            api_key: "key".into(),
            ..AgentConfig::default()
        };
        let profile = ProfileConfig {
            user_name: "Sam".into(),
            schedule: "Dentist at 09:00".into(),
        };
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        SessionConfig::from_profile(&agent, &profile, today)
    }

    #[test]
    fn blank_credentials_are_missing() {
        let mut cfg = sample();
        assert!(cfg.has_credentials());
        cfg.api_key = "  ".into();
        assert!(!cfg.has_credentials());
    }

    #[test]
    fn prompt_mentions_name_date_and_schedule() {
        let cfg = sample();
        assert!(cfg.prompt.contains("personal assistant for Sam"));
        assert!(cfg.prompt.contains("Monday, October 19, 2026"));
        assert!(cfg.prompt.contains("Dentist at 09:00"));
        assert_eq!(
            cfg.first_message,
            "Hello Sam! According to your schedule, you have: Dentist at 09:00. How can I help you today?"
        );
    }

    #[test]
    fn override_has_prompt_and_first_message() {
        let cfg = sample();
        let value = cfg.conversation_override();
        assert_eq!(value["agent"]["prompt"]["prompt"], cfg.prompt.as_str());
        assert_eq!(value["agent"]["first_message"], cfg.first_message.as_str());
    }

    #[test]
    fn serialized_config_omits_api_key() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains("agent-1"));
        assert!(!json.contains("\"api_key\""));
    }
}
