//! Streaming chat endpoints.

use std::convert::Infallible;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::error;

use warble_core::prompt::{Persona, build_system};
use warble_core::sse::OutboundEvent;

use super::AppState;
use crate::session;
use crate::upstream::ChatMessage;

/// Token cap requested from the upstream on the passthrough endpoint.
const PASSTHROUGH_MAX_TOKENS: u32 = 200;

/// System prompt for the passthrough endpoint, which takes no persona.
const COMPANION_SYSTEM: &str = "You are a gentle companion character. \
    Always answer with empathy and restraint. Keep every reply within 120 \
    characters, closing with an ellipsis when you must cut off. No filler, \
    no emoji.";

/// Chat request body, as sent by the web client.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default)]
    pub user_text: String,
    #[serde(default)]
    pub persona: Option<Persona>,
}

fn sse_headers() -> [(header::HeaderName, &'static str); 3] {
    [
        (header::CONTENT_TYPE, "text/event-stream; charset=utf-8"),
        (header::CACHE_CONTROL, "no-cache, no-transform"),
        (header::CONNECTION, "keep-alive"),
    ]
}

fn assemble_messages(system: String, req: &ChatRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(req.history.len() + 2);
    messages.push(ChatMessage::system(system));
    messages.extend(req.history.iter().cloned());
    messages.push(ChatMessage::user(req.user_text.clone()));
    messages
}

/// Upstream failure response: one error frame, non-success status.
fn upstream_failed(err: &crate::upstream::UpstreamError) -> Response {
    error!(error = %err, "upstream unavailable");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        sse_headers(),
        OutboundEvent::Error.to_frame(),
    )
        .into_response()
}

/// `POST /api/chat` — persona chat with the reply budget enforced.
///
/// Tokens are re-framed and written one at a time to preserve the typing
/// effect; the session ends with exactly one `[DONE]` frame.
pub async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Response {
    let system = build_system(req.persona.as_ref());
    let messages = assemble_messages(system, &req);

    let upstream = match state.upstream.stream_chat(&messages, None).await {
        Ok(response) => response,
        Err(err) => return upstream_failed(&err),
    };

    let limit = state.reply_limit;
    let (tx, rx) = mpsc::channel::<Bytes>(32);
    tokio::spawn(async move {
        session::run(Box::pin(upstream.bytes_stream()), tx, limit).await;
    });

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>));
    (sse_headers(), body).into_response()
}

/// `POST /api` — raw passthrough relay.
///
/// Upstream bytes are piped through untouched (the upstream cap bounds the
/// reply instead of the code-point budget) and one `[DONE]` frame is
/// appended once the upstream is exhausted.
pub async fn passthrough(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Response {
    let messages = assemble_messages(COMPANION_SYSTEM.to_string(), &req);

    let upstream = match state
        .upstream
        .stream_chat(&messages, Some(PASSTHROUGH_MAX_TOKENS))
        .await
    {
        Ok(response) => response,
        Err(err) => return upstream_failed(&err),
    };

    let (tx, rx) = mpsc::channel::<Bytes>(32);
    tokio::spawn(async move {
        let mut chunks = Box::pin(upstream.bytes_stream());
        while let Some(chunk) = chunks.next().await {
            let Ok(chunk) = chunk else { break };
            if tx.send(chunk).await.is_err() {
                return;
            }
        }
        let _ = tx.send(Bytes::from(OutboundEvent::Done.to_frame())).await;
    });

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>));
    (sse_headers(), body).into_response()
}
