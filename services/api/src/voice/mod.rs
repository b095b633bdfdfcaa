//! Speech rendering backend: synthesis, speaker playback and WAV files.

pub mod playback;
pub mod prompt;
pub mod tts;
pub mod wav;

use crate::config::TtsConfig;
use async_trait::async_trait;
use cadence_core::{AudioClip, RenderError, SpeechRenderer};
use std::path::Path;
use tracing::info;

pub use prompt::{SharedLines, TerminalPrompt};
pub use tts::TextToSpeech;

/// The real `SpeechRenderer`: OpenAI speech synthesis, the default speaker
/// and `hound` for files.
pub struct SpeechBackend {
    tts: TextToSpeech,
}

impl SpeechBackend {
    pub fn new(tts: TextToSpeech) -> Self {
        Self { tts }
    }

    pub fn from_config(config: &TtsConfig, api_key: Option<&str>) -> Result<Self, RenderError> {
        let api_key = api_key.ok_or_else(|| {
            RenderError::Unavailable("OpenAI API key required for text-to-speech".to_string())
        })?;
        let tts = TextToSpeech::new(
            api_key.to_string(),
            config.model.clone(),
            config.voice.clone(),
        )?;
        info!(model = %config.model, voice = %config.voice, "speech backend ready");
        Ok(Self::new(tts))
    }
}

#[async_trait]
impl SpeechRenderer for SpeechBackend {
    async fn synthesize(&self, text: &str) -> Result<AudioClip, RenderError> {
        self.tts.synthesize(text).await
    }

    async fn play(&self, clip: &AudioClip) -> Result<(), RenderError> {
        let clip = clip.clone();
        tokio::task::spawn_blocking(move || playback::play_blocking(&clip))
            .await
            .map_err(|e| RenderError::Playback(e.to_string()))?
    }

    async fn save(&self, clip: &AudioClip, path: &Path) -> Result<(), RenderError> {
        let clip = clip.clone();
        let target = path.to_path_buf();
        tokio::task::spawn_blocking(move || wav::write_wav(&clip, &target))
            .await
            .map_err(|e| RenderError::Save {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
    }
}
