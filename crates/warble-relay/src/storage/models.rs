//! Data models for Warble relay storage.

use serde::{Deserialize, Serialize};

/// An anonymous visitor, keyed by the opaque identifier the browser holds.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub visitor_id: String,
    pub created_at: i64,
}

/// A companion persona owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Persona {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub style_short: Option<String>,
    pub canon: Option<String>,
    pub system_prompt: Option<String>,
    pub created_at: i64,
}
