//! Persona CRUD endpoints.

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use super::{ApiError, AppState};
use crate::storage::Persona;

#[derive(Debug, Deserialize)]
pub struct CreatePersonaRequest {
    #[serde(rename = "visitorId")]
    pub visitor_id: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub style_short: Option<String>,
    #[serde(default)]
    pub canon: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FetchPersonaParams {
    #[serde(rename = "visitorId")]
    pub visitor_id: String,
}

/// Public projection of a persona record.
fn persona_json(persona: &Persona) -> Value {
    json!({
        "id": persona.id,
        "name": persona.name,
        "avatar_url": persona.avatar_url,
        "style_short": persona.style_short,
        "canon": persona.canon,
    })
}

/// `POST /api/persona` — upsert the visitor's user, then create a persona.
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreatePersonaRequest>,
) -> Result<Json<Value>, ApiError> {
    let visitor_id = req.visitor_id.filter(|v| !v.is_empty());
    let name = req.name.filter(|n| !n.is_empty());
    let (Some(visitor_id), Some(name)) = (visitor_id, name) else {
        return Err(ApiError::bad_request("visitorId and name are required"));
    };

    let user = state
        .db
        .upsert_user_by_visitor(&visitor_id)
        .await
        .map_err(ApiError::internal)?;

    let persona = state
        .db
        .create_persona(
            &user.id,
            &name,
            req.avatar_url.as_deref(),
            req.style_short.as_deref(),
            req.canon.as_deref(),
        )
        .await
        .map_err(ApiError::internal)?;

    info!(persona = %persona.id, user = %user.id, "persona created");
    Ok(Json(json!({ "ok": true, "persona": persona_json(&persona) })))
}

/// `GET /api/persona?visitorId=…` — the visitor's most recent persona.
pub async fn fetch(
    State(state): State<AppState>,
    Query(params): Query<FetchPersonaParams>,
) -> Result<Json<Value>, ApiError> {
    let persona = state
        .db
        .latest_persona_for_visitor(&params.visitor_id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("no persona for this visitor"))?;

    Ok(Json(json!({ "ok": true, "persona": persona_json(&persona) })))
}
