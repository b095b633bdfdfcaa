//! Manages the WebSocket connection lifecycle for a tutoring session.

use super::protocol::{ClientMessage, ServerMessage};
use crate::{
    models::SessionView,
    state::{AppState, SharedSession},
};
use anyhow::{Result, anyhow};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual WebSocket connection.
///
/// The first message must be `init`. After that, client messages are handled
/// one at a time, so submissions on one connection never overlap. Outgoing
/// messages go through a channel to a writer task, which keeps streamed
/// chunks in order.
#[instrument(name = "ws_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    info!("New WebSocket connection. Awaiting initialization...");

    let (socket_tx, mut socket_rx) = socket.split();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_messages(socket_tx, out_rx));

    // The first message from the client must be an `init` message.
    let initialized = match socket_rx.next().await {
        Some(Ok(Message::Text(text))) => initialize_session(&text, &state).await,
        Some(Ok(_)) => Err(anyhow!("First message was not a text `init` message.")),
        _ => {
            info!("Client disconnected before sending init message.");
            return;
        }
    };

    let (session_id, session, owned) = match initialized {
        Ok(initialized) => initialized,
        Err(e) => {
            error!("Session initialization failed: {:?}", e);
            let _ = out_tx.send(ServerMessage::Error {
                message: e.to_string(),
            });
            drop(out_tx);
            let _ = writer.await;
            return;
        }
    };
    tracing::Span::current().record("session_id", tracing::field::display(session_id));

    let view = SessionView::new(session_id, &*session.lock().await);
    let _ = out_tx.send(ServerMessage::Initialized { session: view });

    while let Some(msg_result) = socket_rx.next().await {
        match msg_result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => handle_client_message(session_id, &session, msg, &out_tx).await,
                Err(e) => {
                    warn!(error = %e, "Ignoring malformed client message");
                    let _ = out_tx.send(ServerMessage::Error {
                        message: format!("Malformed message: {e}"),
                    });
                }
            },
            Ok(Message::Binary(_)) => warn!("Ignoring binary message."),
            Ok(Message::Close(_)) => {
                info!("Client sent close frame. Shutting down session.");
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Err(e) => {
                error!("Error receiving from client WebSocket: {:?}", e);
                break;
            }
        }
    }

    drop(out_tx);
    let _ = writer.await;
    release_session(&state, session_id, owned).await;
    info!("WebSocket connection closed.");
}

/// Parses the `init` message and resumes or creates the session. The flag is
/// true when this connection created the session and so owns it.
async fn initialize_session(
    init_text: &str,
    state: &Arc<AppState>,
) -> Result<(Uuid, SharedSession, bool)> {
    let init_msg: ClientMessage = serde_json::from_str(init_text)?;
    let ClientMessage::Init { session_id, mode } = init_msg else {
        return Err(anyhow!("First message must be `init`"));
    };

    match session_id {
        Some(id) => {
            let session = state
                .session(id)
                .await
                .ok_or_else(|| anyhow!("Session with id '{}' not found", id))?;
            if let Some(mode) = mode {
                session.lock().await.set_mode(mode.into());
            }
            info!(session_id = %id, "Resuming existing session");
            Ok((id, session, false))
        }
        None => {
            let (id, session) = state.create_session(mode.map(Into::into)).await;
            Ok((id, session, true))
        }
    }
}

/// Drops a session created by a connection once that connection closes.
/// Resumed sessions belong to whoever created them and are kept.
async fn release_session(state: &AppState, session_id: Uuid, owned: bool) {
    if owned && state.remove_session(session_id).await {
        info!(%session_id, "Removed session created by this connection");
    }
}

/// Handles one client message after initialization.
pub(crate) async fn handle_client_message(
    session_id: Uuid,
    session: &SharedSession,
    msg: ClientMessage,
    out: &UnboundedSender<ServerMessage>,
) {
    let mut session = session.lock().await;
    let reply = match msg {
        ClientMessage::Init { .. } => ServerMessage::Error {
            message: "Session is already initialized".to_string(),
        },
        ClientMessage::UserMessage { text } => {
            let _ = out.send(ServerMessage::ResponseStart);
            let chunks = out.clone();
            let result = session
                .submit_streaming(&text, move |fragment| {
                    let _ = chunks.send(ServerMessage::ResponseChunk {
                        chunk: fragment.to_string(),
                    });
                })
                .await;
            match result {
                Ok(reply) => ServerMessage::ResponseEnd {
                    kind: reply.kind.into(),
                    classification: reply.classification.into(),
                },
                Err(e) => {
                    warn!(error = %e, "Submission failed");
                    ServerMessage::Error {
                        message: e.to_string(),
                    }
                }
            }
        }
        ClientMessage::SetMode { mode } => {
            session.set_mode(mode.into());
            ServerMessage::Status {
                session: SessionView::new(session_id, &session),
            }
        }
        ClientMessage::ClearHistory => {
            session.clear_history();
            ServerMessage::Status {
                session: SessionView::new(session_id, &session),
            }
        }
        ClientMessage::GetStatus => ServerMessage::Status {
            session: SessionView::new(session_id, &session),
        },
    };
    let _ = out.send(reply);
}

async fn write_messages(
    mut socket_tx: SplitSink<WebSocket, Message>,
    mut out_rx: mpsc::UnboundedReceiver<ServerMessage>,
) {
    while let Some(msg) = out_rx.recv().await {
        if let Err(e) = send_msg(&mut socket_tx, msg).await {
            error!("Failed to send message to client: {:?}", e);
            break;
        }
    }
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
