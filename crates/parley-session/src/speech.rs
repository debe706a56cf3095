use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;

use parley_core::config::{SpeechBackend, SpeechConfig};
use parley_core::interfaces::{PlaybackError, SpeechSynthesizer};
use parley_core::lifecycle::preview;

use crate::event::{Event, EventKind};
use crate::queue::EventQueue;
use crate::worker::panic_message;

/// Text-to-speech using Piper as a subprocess, piped into a raw PCM player.
pub struct PiperSpeech {
    piper_binary: String,
    player_binary: String,
    sample_rate: u32,
    voices_dir: PathBuf,
    config: SpeechConfig,
}

impl PiperSpeech {
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            piper_binary: config.piper_binary.clone(),
            player_binary: config.player_binary.clone(),
            sample_rate: config.sample_rate,
            voices_dir: PathBuf::from(&config.voices_dir),
            config: config.clone(),
        }
    }

    fn resolve(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.voices_dir.join(path)
        }
    }
}

impl SpeechSynthesizer for PiperSpeech {
    fn synthesize_and_play(&self, text: &str, voice: &str) -> Result<(), PlaybackError> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let entry = self
            .config
            .voice(voice)
            .map_err(|e| PlaybackError::Synthesis(e.to_string()))?;
        let model = self.resolve(&entry.model);
        let model_config = self.resolve(&entry.config);

        tracing::debug!("TTS speaking ({voice}): {}", preview(text, 50));

        // piper --model X --config Y --output-raw | aplay -r RATE -f S16_LE -c 1
        let mut piper = Command::new(&self.piper_binary)
            .arg("--model")
            .arg(&model)
            .arg("--config")
            .arg(&model_config)
            .arg("--output-raw")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| PlaybackError::Spawn {
                program: self.piper_binary.clone(),
                source,
            })?;

        if let Some(mut stdin) = piper.stdin.take() {
            if let Err(e) = stdin.write_all(text.as_bytes()) {
                reap(&mut piper);
                return Err(PlaybackError::Synthesis(format!("writing to piper: {e}")));
            }
        }

        let Some(piper_stdout) = piper.stdout.take() else {
            reap(&mut piper);
            return Err(PlaybackError::Synthesis("piper produced no stdout".into()));
        };

        let rate = self.sample_rate.to_string();
        let player = match Command::new(&self.player_binary)
            .args(["-r", &rate, "-f", "S16_LE", "-c", "1", "-q"])
            .stdin(piper_stdout)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(player) => player,
            Err(source) => {
                reap(&mut piper);
                return Err(PlaybackError::Spawn {
                    program: self.player_binary.clone(),
                    source,
                });
            }
        };

        let piper_status = piper
            .wait()
            .map_err(|e| PlaybackError::Synthesis(e.to_string()))?;
        let player_out = player
            .wait_with_output()
            .map_err(|e| PlaybackError::Player(e.to_string()))?;

        if !piper_status.success() {
            return Err(PlaybackError::Synthesis(format!(
                "piper exited with {piper_status}"
            )));
        }
        if !player_out.status.success() {
            return Err(PlaybackError::Player(format!(
                "{} exited with {}",
                self.player_binary, player_out.status
            )));
        }
        Ok(())
    }
}

/// Kill and wait on a child that will not be piped anywhere.
fn reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        tracing::debug!("Failed to kill child {}: {e}", child.id());
    }
    if let Err(e) = child.wait() {
        tracing::debug!("Failed to reap child {}: {e}", child.id());
    }
}

/// Speech backend that discards everything.
#[derive(Debug, Default)]
pub struct SilentSpeech;

impl SpeechSynthesizer for SilentSpeech {
    fn synthesize_and_play(&self, text: &str, voice: &str) -> Result<(), PlaybackError> {
        tracing::trace!("Silent speech ({voice}): {}", preview(text, 50));
        Ok(())
    }
}

/// Build the configured speech backend, or `None` when speech is off.
pub fn from_config(config: &SpeechConfig) -> Option<Arc<dyn SpeechSynthesizer>> {
    if !config.enabled {
        return None;
    }
    let speaker: Arc<dyn SpeechSynthesizer> = match config.backend {
        SpeechBackend::Piper => Arc::new(PiperSpeech::new(config)),
        SpeechBackend::Silent => Arc::new(SilentSpeech),
    };
    Some(speaker)
}

/// Speak `text` on a detached thread.
///
/// The foreground never waits on playback. Failures come back as a
/// `PlaybackFailed` event on `queue`.
pub fn spawn_playback(
    speaker: Arc<dyn SpeechSynthesizer>,
    text: String,
    voice: String,
    queue: EventQueue,
) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("parley-tts".into())
        .spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                speaker.synthesize_and_play(&text, &voice)
            }));
            let error = match result {
                Ok(Ok(())) => return,
                Ok(Err(e)) => e,
                Err(payload) => {
                    tracing::error!("TTS panicked: {}", panic_message(payload.as_ref()));
                    PlaybackError::Panicked
                }
            };
            tracing::warn!("Playback failed: {error}");
            queue.push(Event::detached(EventKind::PlaybackFailed {
                message: error.to_string(),
            }));
        })?;
    Ok(())
}
