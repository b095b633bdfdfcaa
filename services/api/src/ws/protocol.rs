//! Defines the WebSocket message protocol between the browser client and the API server.

use crate::models::{Classification, Kind, Mode, SessionView};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Creates or resumes a session. This must be the first message.
    Init {
        /// An existing session to resume. When absent, a new session is created
        /// and removed again when the connection closes.
        session_id: Option<Uuid>,
        /// Starting mode for a new session.
        mode: Option<Mode>,
    },
    /// A text message from the user to the tutor.
    UserMessage { text: String },
    SetMode { mode: Mode },
    ClearHistory,
    GetStatus,
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms successful session initialization and provides the initial state.
    Initialized { session: SessionView },
    /// The session after a mode change, history clear or status request.
    Status { session: SessionView },
    /// Reports an error to the client. The connection stays open.
    Error { message: String },
    /// Signals the beginning of a streamed text response.
    ResponseStart,
    /// A chunk of a streamed text response.
    ResponseChunk { chunk: String },
    /// Signals the end of a streamed text response. Sent only when the
    /// response completed and has been committed.
    ResponseEnd {
        kind: Kind,
        classification: Classification,
    },
}
