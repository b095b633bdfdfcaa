//! Playback Coordinator
//!
//! Optional step after a response is complete: turns its text into speech,
//! plays it (after asking first when interactive) and saves it to disk when
//! asked. Nothing here can fail a conversation; every problem ends up in
//! `RenderOutcome::failure`.

use crate::{error::RenderError, session::ResponseKind};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[cfg(test)]
use mockall::automock;

/// Punctuation that survives speech cleaning.
const SPOKEN_PUNCTUATION: &[char] = &['.', ',', '!', '?', '-', ':', '\''];

#[derive(Debug, Clone, PartialEq)]
pub struct AudioRenderRequest {
    pub text: String,
    pub kind: ResponseKind,
    pub save_to_disk: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOutcome {
    pub played: bool,
    pub saved_path: Option<PathBuf>,
    /// Set when a step failed. Informational only.
    pub failure: Option<String>,
}

/// Mono 16-bit PCM audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// The speech engine behind the coordinator.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpeechRenderer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<AudioClip, RenderError>;

    /// Plays the clip, returning once playback has finished.
    async fn play(&self, clip: &AudioClip) -> Result<(), RenderError>;

    async fn save(&self, clip: &AudioClip, path: &Path) -> Result<(), RenderError>;
}

/// The decision point asked before interactive playback.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PlaybackPrompt: Send + Sync {
    /// Returns true only for an explicit request to play. Declines, end of
    /// input and an unanswered prompt all return false.
    async fn confirm(&self, kind: ResponseKind) -> bool;
}

/// Strips everything a speech engine should not read aloud and collapses
/// whitespace. Keeps letters, digits and basic sentence punctuation.
pub fn speech_text(text: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || SPOKEN_PUNCTUATION.contains(c))
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `<dir>/response_<kind>_<unix-millis>.wav`
pub fn audio_file_path(dir: &Path, kind: ResponseKind, unix_millis: i64) -> PathBuf {
    dir.join(format!("response_{}_{unix_millis}.wav", kind.label()))
}

pub struct PlaybackCoordinator {
    renderer: Arc<dyn SpeechRenderer>,
    prompt: Option<Arc<dyn PlaybackPrompt>>,
    output_dir: PathBuf,
}

impl PlaybackCoordinator {
    pub fn new(renderer: Arc<dyn SpeechRenderer>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            renderer,
            prompt: None,
            output_dir: output_dir.into(),
        }
    }

    /// Sets the decision point used for interactive requests. Without one,
    /// interactive requests are treated as declined.
    pub fn with_prompt(mut self, prompt: Arc<dyn PlaybackPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Renders one response.
    ///
    /// When `interactive` is set the prompt is consulted before anything is
    /// synthesized or played. Saving is independent of playing: a declined
    /// clip is still written when `save_to_disk` is set.
    pub async fn render(&self, request: AudioRenderRequest, interactive: bool) -> RenderOutcome {
        let mut outcome = RenderOutcome::default();

        let text = speech_text(&request.text);
        if text.is_empty() {
            return outcome;
        }

        let play = if interactive {
            match &self.prompt {
                Some(prompt) => prompt.confirm(request.kind).await,
                None => false,
            }
        } else {
            true
        };

        if !play && !request.save_to_disk {
            info!(kind = %request.kind, "Playback skipped");
            return outcome;
        }

        let clip = match self.renderer.synthesize(&text).await {
            Ok(clip) => clip,
            Err(e) => {
                warn!(error = %e, "Speech synthesis failed");
                outcome.failure = Some(e.to_string());
                return outcome;
            }
        };

        if request.save_to_disk {
            let path = audio_file_path(&self.output_dir, request.kind, Utc::now().timestamp_millis());
            match self.save(&clip, &path).await {
                Ok(()) => {
                    info!(path = %path.display(), "Audio saved");
                    outcome.saved_path = Some(path);
                }
                Err(e) => {
                    warn!(error = %e, "Saving audio failed");
                    outcome.failure = Some(e.to_string());
                }
            }
        }

        if play {
            match self.renderer.play(&clip).await {
                Ok(()) => {
                    info!(seconds = clip.duration_secs(), "Audio played");
                    outcome.played = true;
                }
                Err(e) => {
                    warn!(error = %e, "Audio playback failed");
                    outcome.failure = Some(e.to_string());
                }
            }
        }

        outcome
    }

    async fn save(&self, clip: &AudioClip, path: &Path) -> Result<(), RenderError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| RenderError::Save {
                path: self.output_dir.clone(),
                reason: e.to_string(),
            })?;
        self.renderer.save(clip, path).await
    }
}
