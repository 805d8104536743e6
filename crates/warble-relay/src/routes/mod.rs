//! HTTP surface of the Warble relay.

mod chat;
mod persona;
mod storage;

use std::sync::Arc;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{post, put};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::storage::PersonaStore;
use crate::uploads::AvatarStore;
use crate::upstream::UpstreamClient;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: PersonaStore,
    pub upstream: Arc<UpstreamClient>,
    pub avatars: Arc<AvatarStore>,
    /// Reply ceiling in code points for `/api/chat` sessions.
    pub reply_limit: usize,
}

pub fn build_router(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/api", post(chat::passthrough))
        .route("/api/chat", post(chat::chat))
        .route("/api/persona", post(persona::create).get(persona::fetch))
        .route("/api/storage/upload-url", post(storage::upload_url))
        .route(
            "/api/storage/avatars/{*path}",
            put(storage::put_avatar).get(storage::get_avatar),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// JSON error envelope used by the CRUD endpoints: `{ok: false, error}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        warn!(error = %err, "request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "ok": false, "error": self.message })),
        )
            .into_response()
    }
}
