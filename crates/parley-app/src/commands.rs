use std::sync::Arc;

use anyhow::{Context, Result};
use parley_core::config::AppConfig;
use parley_session::speech;

use crate::setup;

pub fn voices(config: &AppConfig) -> Result<()> {
    let default = config.speech.initial_voice()?.name.clone();
    for voice in &config.speech.voices {
        let marker = if voice.name == default { "*" } else { " " };
        println!("{marker} {}", voice.name);
    }
    Ok(())
}

pub fn prompt(config: &AppConfig) -> Result<()> {
    let session = setup::session_config(config);
    println!(
        "{}",
        serde_json::to_string_pretty(&session.conversation_override())?
    );
    Ok(())
}

pub async fn say(config: &AppConfig, text: String, voice: Option<String>) -> Result<()> {
    let voice = match voice {
        Some(name) => config.speech.voice(&name)?.name.clone(),
        None => config.speech.initial_voice()?.name.clone(),
    };
    let speaker = speech::from_config(&config.speech)
        .context("Speech is disabled; set [speech].enabled = true")?;

    let handle = tokio::task::spawn_blocking({
        let speaker = Arc::clone(&speaker);
        move || speaker.synthesize_and_play(&text, &voice)
    });
    handle.await.context("Speech task failed")??;
    Ok(())
}
