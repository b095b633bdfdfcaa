//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, WebSocket endpoint, and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        Classification, CreateSessionPayload, ErrorResponse, Kind, Message, MessagePayload,
        MessageRole, Mode, Pillar, PillarsResponse, ReplyResponse, SessionView, SetModePayload,
    },
    state::AppState,
    ws::ws_handler,
};

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::create_session,
        handlers::get_session,
        handlers::delete_session,
        handlers::post_message,
        handlers::set_mode,
        handlers::clear_history,
        handlers::list_pillars,
    ),
    components(
        schemas(SessionView, Message, MessageRole, Mode, Kind, Classification, ReplyResponse, Pillar, PillarsResponse, CreateSessionPayload, MessagePayload, SetModePayload, ErrorResponse)
    ),
    tags(
        (name = "Cadence API", description = "Sessions and messages for the Cadence music tutor")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/sessions", post(handlers::create_session))
        .route(
            "/sessions/{id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/sessions/{id}/messages", post(handlers::post_message))
        .route("/sessions/{id}/mode", put(handlers::set_mode))
        .route("/sessions/{id}/history", delete(handlers::clear_history))
        .route("/pillars", get(handlers::list_pillars))
        .route("/ws", get(ws_handler))
        // Apply the state ONLY to this group of routes.
        .with_state(app_state);

    // Create the final router that merges the stateful routes
    // with the stateless routes (like Swagger UI).
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
