//! API Models
//!
//! Request and response bodies of the REST and WebSocket surfaces, annotated
//! with `utoipa` for the OpenAPI document. Core types are mirrored here so the
//! core crate stays free of HTTP concerns.

use cadence_core::{
    ClassificationResult, PillarStatus, Reply, ResponseKind, Role, Session, SessionMode, Turn,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Isolated,
    Contextual,
}

impl From<SessionMode> for Mode {
    fn from(mode: SessionMode) -> Self {
        match mode {
            SessionMode::Isolated => Mode::Isolated,
            SessionMode::Contextual => Mode::Contextual,
        }
    }
}

impl From<Mode> for SessionMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Isolated => SessionMode::Isolated,
            Mode::Contextual => SessionMode::Contextual,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    #[serde(rename = "in-domain-response")]
    InDomain,
    #[serde(rename = "out-of-domain-refusal")]
    Decline,
    #[serde(rename = "error")]
    Error,
}

impl From<ResponseKind> for Kind {
    fn from(kind: ResponseKind) -> Self {
        match kind {
            ResponseKind::InDomain => Kind::InDomain,
            ResponseKind::Decline => Kind::Decline,
            ResponseKind::Error => Kind::Error,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Turn> for Message {
    fn from(turn: &Turn) -> Self {
        Self {
            role: match turn.role {
                Role::User => MessageRole::User,
                Role::Assistant => MessageRole::Assistant,
            },
            content: turn.text.clone(),
            created_at: turn.timestamp,
        }
    }
}

/// State of one session.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct SessionView {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    pub mode: Mode,
    pub history_len: usize,
    pub history_limit: usize,
    pub history: Vec<Message>,
}

impl SessionView {
    pub fn new(id: Uuid, session: &Session) -> Self {
        let state = session.state();
        Self {
            id,
            mode: state.mode().into(),
            history_len: state.history().len(),
            history_limit: state.history_limit(),
            history: state.history().iter().map(Message::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
pub struct Classification {
    pub is_in_domain: bool,
    pub matched_pillars: Vec<String>,
    pub matched_terms: Vec<String>,
    pub base_vocabulary_hit: bool,
}

impl From<ClassificationResult> for Classification {
    fn from(result: ClassificationResult) -> Self {
        Self {
            is_in_domain: result.is_in_domain,
            matched_pillars: result.matched_pillars,
            matched_terms: result.matched_terms,
            base_vocabulary_hit: result.base_vocabulary_hit,
        }
    }
}

/// The tutor's answer to one message.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct ReplyResponse {
    pub text: String,
    pub kind: Kind,
    pub classification: Classification,
    pub session: SessionView,
}

impl ReplyResponse {
    pub fn new(reply: Reply, session: SessionView) -> Self {
        Self {
            text: reply.text,
            kind: reply.kind.into(),
            classification: reply.classification.into(),
            session,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
pub struct Pillar {
    #[schema(example = "notation-system")]
    pub name: String,
    pub available: bool,
    pub term_count: usize,
    pub error: Option<String>,
}

impl From<PillarStatus> for Pillar {
    fn from(status: PillarStatus) -> Self {
        Self {
            name: status.name,
            available: status.available,
            term_count: status.term_count,
            error: status.error,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
pub struct PillarsResponse {
    pub pillars: Vec<Pillar>,
    pub capabilities: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateSessionPayload {
    #[schema(example = "contextual")]
    pub mode: Option<Mode>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MessagePayload {
    #[schema(example = "What is the nashville number for a ii-V-I?")]
    pub text: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetModePayload {
    #[schema(example = "isolated")]
    pub mode: Mode,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub message: String,
}
