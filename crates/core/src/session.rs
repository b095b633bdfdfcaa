//! Conversation Session
//!
//! Owns the turn history of one conversation and drives the pipeline for each
//! submission: classify, enrich, generate, then commit. History is committed
//! only after the response stream has been fully drained without error, so a
//! failed or interrupted generation never leaves a one-sided turn behind.

use crate::{
    classifier::{ClassificationResult, classify},
    enricher::{ContextEnricher, DEFAULT_SYSTEM_PROMPT},
    error::{GenerationError, SessionError},
    llm_client::{GenerationAdapter, GenerationRequest},
    registry::{PillarStatus, Registry},
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Whether prior turns take part in new requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Each submission stands alone; nothing is read from or added to history.
    Isolated,
    /// Prior turns are sent with each request and new turns are recorded.
    #[default]
    Contextual,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Isolated => write!(f, "isolated"),
            SessionMode::Contextual => write!(f, "contextual"),
        }
    }
}

impl FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "isolated" | "single" => Ok(SessionMode::Isolated),
            "contextual" | "context" => Ok(SessionMode::Contextual),
            other => Err(format!("'{other}' is not a session mode")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message of the conversation. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    fn now(role: Role, text: String) -> Self {
        Self {
            role,
            text,
            timestamp: Utc::now(),
        }
    }
}

/// Whether out-of-domain exchanges are kept in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclinePolicy {
    #[default]
    Skip,
    Record,
}

/// Why a piece of text was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseKind {
    #[serde(rename = "in-domain-response")]
    InDomain,
    #[serde(rename = "out-of-domain-refusal")]
    Decline,
    #[serde(rename = "error")]
    Error,
}

impl ResponseKind {
    pub fn label(&self) -> &'static str {
        match self {
            ResponseKind::InDomain => "in-domain-response",
            ResponseKind::Decline => "out-of-domain-refusal",
            ResponseKind::Error => "error",
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub mode: SessionMode,
    /// Maximum number of turns kept. Eviction removes whole exchanges.
    pub history_limit: usize,
    pub decline_policy: DeclinePolicy,
    /// Treat every non-empty input as in-domain.
    pub allow_all_topics: bool,
    /// Ask the backend for brief answers.
    pub concise: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            mode: SessionMode::Contextual,
            history_limit: 12,
            decline_policy: DeclinePolicy::Skip,
            allow_all_topics: false,
            concise: false,
        }
    }
}

/// Mode and history of a session. Mutated only through append and clear.
#[derive(Debug, Clone)]
pub struct SessionState {
    mode: SessionMode,
    history: Vec<Turn>,
    history_limit: usize,
}

impl SessionState {
    fn new(mode: SessionMode, history_limit: usize) -> Self {
        Self {
            mode,
            history: Vec::new(),
            history_limit,
        }
    }

    /// Appends a complete exchange and evicts the oldest exchanges until the
    /// history fits within the limit.
    fn append_exchange(&mut self, user: Turn, assistant: Turn) {
        self.history.push(user);
        self.history.push(assistant);
        while self.history.len() > self.history_limit {
            let end = self.history.len().min(2);
            self.history.drain(..end);
        }
    }

    fn clear(&mut self) {
        self.history.clear();
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }
}

/// The result of a successful submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub text: String,
    pub kind: ResponseKind,
    pub classification: ClassificationResult,
}

/// Snapshot for `get_status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub mode: SessionMode,
    pub history_len: usize,
    pub history_limit: usize,
    pub pillars: Vec<PillarStatus>,
    pub capabilities: String,
}

/// A single conversation with the tutor.
pub struct Session {
    registry: Arc<Registry>,
    adapter: Arc<dyn GenerationAdapter>,
    enricher: ContextEnricher,
    instructions: Arc<String>,
    decline_policy: DeclinePolicy,
    allow_all_topics: bool,
    state: SessionState,
}

impl Session {
    /// Creates a session using the built-in base instructions.
    pub fn new(
        registry: Arc<Registry>,
        adapter: Arc<dyn GenerationAdapter>,
        options: SessionOptions,
    ) -> Self {
        Self::with_instructions(
            registry,
            adapter,
            Arc::new(DEFAULT_SYSTEM_PROMPT.to_string()),
            options,
        )
    }

    pub fn with_instructions(
        registry: Arc<Registry>,
        adapter: Arc<dyn GenerationAdapter>,
        instructions: Arc<String>,
        options: SessionOptions,
    ) -> Self {
        let enricher = ContextEnricher::new(&registry).with_concise(options.concise);
        Self {
            registry,
            adapter,
            enricher,
            instructions,
            decline_policy: options.decline_policy,
            allow_all_topics: options.allow_all_topics,
            state: SessionState::new(options.mode, options.history_limit),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn mode(&self) -> SessionMode {
        self.state.mode
    }

    pub fn history(&self) -> &[Turn] {
        self.state.history()
    }

    /// Switches mode. History is preserved either way.
    pub fn set_mode(&mut self, mode: SessionMode) {
        if self.state.mode != mode {
            info!(from = %self.state.mode, to = %mode, "Session mode changed");
        }
        self.state.mode = mode;
    }

    /// Empties history without changing mode.
    pub fn clear_history(&mut self) {
        self.state.clear();
        info!("Session history cleared");
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            mode: self.state.mode,
            history_len: self.state.history.len(),
            history_limit: self.state.history_limit,
            pillars: self.registry.statuses(),
            capabilities: self.enricher.capabilities().to_string(),
        }
    }

    /// Submits a message and waits for the complete response.
    pub async fn submit(&mut self, user_text: &str) -> Result<Reply, SessionError> {
        self.submit_streaming(user_text, |_| {}).await
    }

    /// Submits a message, forwarding each response fragment to `on_fragment`
    /// as it arrives. History is updated only once the stream has ended
    /// without error.
    #[instrument(name = "submit", skip_all, fields(mode = %self.state.mode))]
    pub async fn submit_streaming<F>(
        &mut self,
        user_text: &str,
        mut on_fragment: F,
    ) -> Result<Reply, SessionError>
    where
        F: FnMut(&str) + Send,
    {
        let user_text = user_text.trim();
        if user_text.is_empty() {
            return Err(SessionError::EmptyInput);
        }

        let classification = classify(&self.registry, user_text);
        let in_domain = classification.is_in_domain || self.allow_all_topics;
        let kind = if in_domain {
            ResponseKind::InDomain
        } else {
            ResponseKind::Decline
        };
        info!(
            kind = %kind,
            pillars = ?classification.matched_pillars,
            "Input classified"
        );

        let instructions = if in_domain && !classification.is_in_domain {
            let widened = ClassificationResult {
                is_in_domain: true,
                ..classification.clone()
            };
            self.enricher.enrich(&self.instructions, &widened)
        } else {
            self.enricher.enrich(&self.instructions, &classification)
        };

        let history = if in_domain && self.state.mode == SessionMode::Contextual {
            self.state.history.clone()
        } else {
            Vec::new()
        };

        let request = GenerationRequest {
            instructions,
            history,
            user_text: user_text.to_string(),
        };

        let mut fragments = self.adapter.generate(request).await.inspect_err(|e| {
            warn!(error = %e, "Generation failed to start");
        })?;

        let mut response = String::new();
        while let Some(fragment) = fragments.next().await {
            let fragment = fragment.inspect_err(|e| {
                warn!(error = %e, received = response.len(), "Generation failed mid-stream");
            })?;
            on_fragment(&fragment);
            response.push_str(&fragment);
        }

        if response.trim().is_empty() {
            warn!("Generation produced no text");
            return Err(GenerationError::EmptyResponse.into());
        }

        let record = match kind {
            ResponseKind::InDomain => true,
            _ => self.decline_policy == DeclinePolicy::Record,
        };
        if record && self.state.mode == SessionMode::Contextual {
            self.state.append_exchange(
                Turn::now(Role::User, user_text.to_string()),
                Turn::now(Role::Assistant, response.clone()),
            );
        }
        info!(
            history_len = self.state.history.len(),
            chars = response.len(),
            "Submission complete"
        );

        Ok(Reply {
            text: response,
            kind,
            classification,
        })
    }
}
