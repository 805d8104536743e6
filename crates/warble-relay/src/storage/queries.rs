//! Database queries for the Warble relay server.

use uuid::Uuid;

use super::db::{DatabaseError, PersonaStore, unix_timestamp};
use super::models::{Persona, User};

impl PersonaStore {
    // =========================================================================
    // User queries
    // =========================================================================

    /// Find the user owning `visitor_id`, creating one if none exists.
    ///
    /// Idempotent: repeated calls with the same visitor return the same row.
    pub async fn upsert_user_by_visitor(&self, visitor_id: &str) -> Result<User, DatabaseError> {
        if let Some(user) = sqlx::query_as::<_, User>("SELECT * FROM users WHERE visitor_id = ?")
            .bind(visitor_id)
            .fetch_optional(self.pool())
            .await?
        {
            return Ok(user);
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO users (id, visitor_id, created_at) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(visitor_id)
            .bind(unix_timestamp())
            .execute(self.pool())
            .await?;

        self.get_user(&id).await
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: &str) -> Result<User, DatabaseError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("User {id}")))
    }

    // =========================================================================
    // Persona queries
    // =========================================================================

    /// Create a persona for a user.
    pub async fn create_persona(
        &self,
        user_id: &str,
        name: &str,
        avatar_url: Option<&str>,
        style_short: Option<&str>,
        canon: Option<&str>,
    ) -> Result<Persona, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO personas (id, user_id, name, avatar_url, style_short, canon, system_prompt, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, NULL, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(name)
        .bind(avatar_url)
        .bind(style_short)
        .bind(canon)
        .bind(unix_timestamp())
        .execute(self.pool())
        .await?;

        self.get_persona(&id).await
    }

    /// Get a persona by ID.
    pub async fn get_persona(&self, id: &str) -> Result<Persona, DatabaseError> {
        sqlx::query_as::<_, Persona>("SELECT * FROM personas WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Persona {id}")))
    }

    /// The visitor's most recently created persona, if any.
    pub async fn latest_persona_for_visitor(
        &self,
        visitor_id: &str,
    ) -> Result<Option<Persona>, DatabaseError> {
        Ok(sqlx::query_as::<_, Persona>(
            "SELECT p.* FROM personas p \
             JOIN users u ON u.id = p.user_id \
             WHERE u.visitor_id = ? \
             ORDER BY p.created_at DESC, p.rowid DESC \
             LIMIT 1",
        )
        .bind(visitor_id)
        .fetch_optional(self.pool())
        .await?)
    }
}
