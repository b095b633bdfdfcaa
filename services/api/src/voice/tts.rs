//! Text-to-speech over the OpenAI speech endpoint.

use crate::audio_utils::{OPENAI_TTS_PCM16_SAMPLE_RATE, pcm16_from_le_bytes};
use cadence_core::{AudioClip, RenderError};
use serde::Serialize;
use tracing::debug;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

/// Synthesizes speech as raw 24 kHz mono PCM16.
pub struct TextToSpeech {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    voice: String,
}

impl TextToSpeech {
    pub fn new(api_key: String, model: String, voice: String) -> Result<Self, RenderError> {
        if api_key.trim().is_empty() {
            return Err(RenderError::Unavailable(
                "OpenAI API key required for text-to-speech".to_string(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_base: OPENAI_API_BASE.to_string(),
            api_key,
            model,
            voice,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }

    pub async fn synthesize(&self, text: &str) -> Result<AudioClip, RenderError> {
        let request = SpeechRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            response_format: "pcm",
        };

        let response = self
            .client
            .post(format!("{}/audio/speech", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RenderError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RenderError::Synthesis(format!("TTS error {status}: {body}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RenderError::Synthesis(e.to_string()))?;
        let samples = pcm16_from_le_bytes(&bytes);
        if samples.is_empty() {
            return Err(RenderError::Synthesis("TTS returned no audio".to_string()));
        }
        debug!(samples = samples.len(), voice = %self.voice, "speech synthesized");

        Ok(AudioClip {
            samples,
            sample_rate: OPENAI_TTS_PCM16_SAMPLE_RATE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::post};
    use serde_json::Value;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    fn tts(api_base: &str) -> TextToSpeech {
        TextToSpeech::new("test-key".to_string(), "tts-1".to_string(), "alloy".to_string())
            .unwrap()
            .with_api_base(api_base)
    }

    #[test]
    fn test_missing_key_is_unavailable() {
        let result = TextToSpeech::new(" ".to_string(), "tts-1".to_string(), "alloy".to_string());
        assert!(matches!(result, Err(RenderError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_synthesize_decodes_pcm_response() {
        let router = Router::new().route(
            "/v1/audio/speech",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["response_format"], "pcm");
                assert_eq!(body["voice"], "alloy");
                assert_eq!(body["input"], "Play the root.");
                vec![0x00u8, 0x40, 0x00, 0xc0]
            }),
        );
        let base = serve(router).await;

        let clip = tts(&base).synthesize("Play the root.").await.unwrap();
        assert_eq!(clip.samples, vec![16384, -16384]);
        assert_eq!(clip.sample_rate, 24000);
    }

    #[tokio::test]
    async fn test_error_status_is_synthesis_failure() {
        let router = Router::new().route(
            "/v1/audio/speech",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let base = serve(router).await;

        let err = tts(&base).synthesize("Hello").await.unwrap_err();
        match err {
            RenderError::Synthesis(message) => assert!(message.contains("429")),
            other => panic!("expected synthesis error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_engine_is_unavailable() {
        let err = tts("http://127.0.0.1:9").synthesize("Hello").await.unwrap_err();
        assert!(matches!(err, RenderError::Unavailable(_)));
    }
}
