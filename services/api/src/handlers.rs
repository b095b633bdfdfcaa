//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests for session management
//! and tutoring. It uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use cadence_core::SessionError;
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

use crate::{
    models::{
        CreateSessionPayload, ErrorResponse, MessagePayload, PillarsResponse, ReplyResponse,
        SessionView, SetModePayload,
    },
    state::{AppState, SharedSession},
};

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    BadGateway(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::BadGateway(message) => {
                (StatusCode::BAD_GATEWAY, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

fn submission_error(err: SessionError) -> ApiError {
    match err {
        SessionError::EmptyInput => ApiError::BadRequest(err.to_string()),
        SessionError::Generation(e) => {
            warn!(error = %e, "Generation failed");
            ApiError::BadGateway(e.to_string())
        }
    }
}

async fn find_session(state: &AppState, id: Uuid) -> Result<SharedSession, ApiError> {
    state
        .session(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Session with id '{}' not found", id)))
}

/// Create a new tutoring session.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body(content = CreateSessionPayload, description = "Optional starting mode"),
    responses(
        (status = 201, description = "Session created successfully", body = SessionView),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<CreateSessionPayload>>,
) -> Result<impl IntoResponse, ApiError> {
    let mode = payload.and_then(|Json(p)| p.mode).map(Into::into);
    let (id, session) = state.create_session(mode).await;
    let view = SessionView::new(id, &*session.lock().await);
    Ok((StatusCode::CREATED, Json(view)))
}

/// Get a session's mode and history.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    responses(
        (status = 200, description = "Session details", body = SessionView),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let session = find_session(&state, id).await?;
    let view = SessionView::new(id, &*session.lock().await);
    Ok(Json(view))
}

/// Destroy a session and its history.
#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    responses(
        (status = 204, description = "Session destroyed"),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.remove_session(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!(
            "Session with id '{}' not found",
            id
        )))
    }
}

/// Send a message to the tutor and wait for the full reply.
#[utoipa::path(
    post,
    path = "/sessions/{id}/messages",
    request_body = MessagePayload,
    responses(
        (status = 200, description = "The tutor's reply", body = ReplyResponse),
        (status = 400, description = "Empty message", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 502, description = "Generation backend failed", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MessagePayload>,
) -> Result<Json<ReplyResponse>, ApiError> {
    let session = find_session(&state, id).await?;
    let mut session = session.lock().await;
    let reply = session
        .submit(&payload.text)
        .await
        .map_err(submission_error)?;
    Ok(Json(ReplyResponse::new(reply, SessionView::new(id, &session))))
}

/// Switch a session between isolated and contextual mode. History is kept.
#[utoipa::path(
    put,
    path = "/sessions/{id}/mode",
    request_body = SetModePayload,
    responses(
        (status = 200, description = "Mode updated", body = SessionView),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn set_mode(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetModePayload>,
) -> Result<Json<SessionView>, ApiError> {
    let session = find_session(&state, id).await?;
    let mut session = session.lock().await;
    session.set_mode(payload.mode.into());
    Ok(Json(SessionView::new(id, &session)))
}

/// Empty a session's history without changing its mode.
#[utoipa::path(
    delete,
    path = "/sessions/{id}/history",
    responses(
        (status = 200, description = "History cleared", body = SessionView),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn clear_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let session = find_session(&state, id).await?;
    let mut session = session.lock().await;
    session.clear_history();
    Ok(Json(SessionView::new(id, &session)))
}

/// List the knowledge pillars and whether each one loaded.
#[utoipa::path(
    get,
    path = "/pillars",
    responses(
        (status = 200, description = "Pillar status", body = PillarsResponse)
    )
)]
pub async fn list_pillars(State(state): State<Arc<AppState>>) -> Json<PillarsResponse> {
    Json(PillarsResponse {
        pillars: state
            .registry
            .statuses()
            .into_iter()
            .map(Into::into)
            .collect(),
        capabilities: state.registry.capabilities(),
    })
}
