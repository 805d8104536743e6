//! Avatar upload endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ApiError, AppState};
use crate::uploads::UploadError;

#[derive(Debug, Deserialize)]
pub struct UploadUrlRequest {
    pub filename: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub token: Option<String>,
}

/// `POST /api/storage/upload-url` — reserve a path and sign a grant for it.
pub async fn upload_url(
    State(state): State<AppState>,
    Json(req): Json<UploadUrlRequest>,
) -> Result<Json<Value>, ApiError> {
    let Some(filename) = req.filename.filter(|f| !f.is_empty()) else {
        return Err(ApiError::bad_request("filename required"));
    };

    let grant = state.avatars.issue(&filename).map_err(ApiError::internal)?;
    let base = format!("/api/storage/avatars/{}", grant.path);
    Ok(Json(json!({
        "ok": true,
        "path": grant.path,
        "token": grant.token,
        "upload_url": format!("{base}?token={}", grant.token),
        "public_url": base,
    })))
}

/// `PUT /api/storage/avatars/{path}?token=…` — accept a granted upload.
pub async fn put_avatar(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let Some(token) = params.token.filter(|t| !t.is_empty()) else {
        return Err(ApiError::bad_request("token required"));
    };

    state
        .avatars
        .store(&path, &token, &body)
        .await
        .map_err(|err| match err {
            UploadError::Token(_) | UploadError::PathMismatch => {
                ApiError::forbidden(err.to_string())
            }
            UploadError::InvalidPath => ApiError::bad_request(err.to_string()),
            UploadError::Io(_) => ApiError::internal(err),
        })?;

    Ok(Json(json!({ "ok": true, "path": path })))
}

/// `GET /api/storage/avatars/{path}` — public read of a stored avatar.
pub async fn get_avatar(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    match state.avatars.read(&path).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, content_type_for(&path)),
                (header::CACHE_CONTROL, "public, max-age=86400"),
            ],
            bytes,
        )
            .into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

fn content_type_for(path: &str) -> &'static str {
    match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}
