//! Generation Adapter
//!
//! The contract the session uses to obtain a response, plus an implementation
//! for any OpenAI-compatible chat API (hosted OpenAI, Gemini's compatibility
//! endpoint, or a local server such as Ollama) and a scripted double for tests
//! and offline development.

use crate::{
    error::GenerationError,
    session::{Role, Turn},
};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use futures::{Stream, StreamExt, stream};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

/// A stream of response text fragments.
pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

/// Everything the backend receives for one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub instructions: String,
    /// Prior turns, oldest first. Empty in isolated mode and for declines.
    pub history: Vec<Turn>,
    pub user_text: String,
}

/// Sampling parameters shared by every request of a client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 800,
        }
    }
}

impl GenerationSettings {
    /// Short, low-temperature answers.
    pub fn concise(self) -> Self {
        Self {
            temperature: 0.3,
            max_tokens: self.max_tokens.min(300),
        }
    }
}

/// A backend that turns instructions and input into response text.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GenerationAdapter: Send + Sync {
    /// Starts generating a response. Fragments may arrive incrementally; the
    /// response is complete once the stream ends without an error.
    async fn generate(&self, request: GenerationRequest) -> Result<ResponseStream, GenerationError>;
}

/// An implementation of `GenerationAdapter` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
    settings: GenerationSettings,
    timeout: Duration,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - API key and base URL of the service.
    /// * `model` - Model identifier to use for chat completions.
    /// * `settings` - Sampling parameters.
    /// * `timeout` - Limit for opening the stream and for each gap between fragments.
    pub fn new(
        config: OpenAIConfig,
        model: String,
        settings: GenerationSettings,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::with_config(config),
            model,
            settings,
            timeout,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends a one-token request to confirm the backend and model are reachable.
    pub async fn check_connection(&self) -> Result<(), GenerationError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestUserMessageArgs::default()
                    .content("ping")
                    .build()
                    .map_err(request_error)?
                    .into(),
            ])
            .max_completion_tokens(1u32)
            .build()
            .map_err(request_error)?;

        tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| GenerationError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| GenerationError::Unavailable(e.to_string()))?;
        Ok(())
    }

    fn build_messages(
        request: &GenerationRequest,
    ) -> Result<Vec<ChatCompletionRequestMessage>, GenerationError> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.instructions.clone())
                .build()
                .map_err(request_error)?
                .into(),
        ];
        for turn in &request.history {
            messages.push(match turn.role {
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.text.clone())
                    .build()
                    .map_err(request_error)?
                    .into(),
                Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.text.clone())
                    .build()
                    .map_err(request_error)?
                    .into(),
            });
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.user_text.clone())
                .build()
                .map_err(request_error)?
                .into(),
        );
        Ok(messages)
    }
}

fn request_error(e: async_openai::error::OpenAIError) -> GenerationError {
    GenerationError::Request(e.to_string())
}

#[async_trait]
impl GenerationAdapter for OpenAICompatibleClient {
    async fn generate(&self, request: GenerationRequest) -> Result<ResponseStream, GenerationError> {
        let messages = Self::build_messages(&request)?;
        debug!(model = %self.model, messages = messages.len(), "Requesting completion stream");

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.settings.temperature)
            .max_completion_tokens(self.settings.max_tokens)
            .stream(true)
            .build()
            .map_err(request_error)?;

        let idle = self.timeout;
        let upstream = tokio::time::timeout(idle, self.client.chat().create_stream(request))
            .await
            .map_err(|_| GenerationError::Timeout(idle.as_secs()))?
            .map_err(|e| GenerationError::Unavailable(e.to_string()))?;

        // Each fragment must arrive within `idle`; the stream ends after the first error.
        let fragments = stream::unfold(Some(upstream), move |state| async move {
            let Some(mut upstream) = state else {
                return None;
            };
            loop {
                match tokio::time::timeout(idle, upstream.next()).await {
                    Err(_) => return Some((Err(GenerationError::Timeout(idle.as_secs())), None)),
                    Ok(None) => return None,
                    Ok(Some(Err(e))) => {
                        return Some((Err(GenerationError::Stream(e.to_string())), None));
                    }
                    Ok(Some(Ok(response))) => {
                        let text: String = response
                            .choices
                            .into_iter()
                            .filter_map(|choice| choice.delta.content)
                            .collect();
                        if !text.is_empty() {
                            return Some((Ok(text), Some(upstream)));
                        }
                    }
                }
            }
        });

        Ok(Box::pin(fragments))
    }
}

/// One canned outcome for [`ScriptedAdapter`].
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Streams the text word by word.
    Text(String),
    /// Fails before any fragment is produced.
    Unavailable,
    /// Streams the given text, then fails.
    BreaksAfter(String),
}

/// A `GenerationAdapter` that replays scripted outcomes in order and records
/// every request it receives. The last outcome repeats once the script runs out.
///
/// Useful for development and integration testing without a backend.
#[derive(Debug, Default)]
pub struct ScriptedAdapter {
    script: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedAdapter {
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = ScriptedReply>,
    {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with `text`.
    pub fn replying(text: &str) -> Self {
        Self::new([ScriptedReply::Text(text.to_string())])
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn next_reply(&self) -> ScriptedReply {
        let Ok(mut script) = self.script.lock() else {
            return ScriptedReply::Unavailable;
        };
        match script.len() {
            0 => ScriptedReply::Unavailable,
            1 => script[0].clone(),
            _ => script.pop_front().unwrap_or(ScriptedReply::Unavailable),
        }
    }
}

fn word_fragments(text: &str) -> Vec<Result<String, GenerationError>> {
    text.split_inclusive(' ')
        .map(|fragment| Ok(fragment.to_string()))
        .collect()
}

#[async_trait]
impl GenerationAdapter for ScriptedAdapter {
    async fn generate(&self, request: GenerationRequest) -> Result<ResponseStream, GenerationError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        match self.next_reply() {
            ScriptedReply::Text(text) => Ok(Box::pin(stream::iter(word_fragments(&text)))),
            ScriptedReply::Unavailable => Err(GenerationError::Unavailable(
                "scripted backend offline".to_string(),
            )),
            ScriptedReply::BreaksAfter(text) => {
                let mut fragments = word_fragments(&text);
                fragments.push(Err(GenerationError::Stream("scripted disconnect".to_string())));
                Ok(Box::pin(stream::iter(fragments)))
            }
        }
    }
}
