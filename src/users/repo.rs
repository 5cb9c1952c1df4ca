use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Stored as plain TEXT, not a Postgres enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum Role {
    User,
    Guide,
    Admin,
}

/// User record. Credential and lifecycle fields never serialize.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(skip_serializing)]
    pub password_changed_at: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub password_reset_token_hash: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires_at: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub active: bool,
}

const COLUMNS: &str = "id, name, email, password_hash, role, created_at, \
     password_changed_at, password_reset_token_hash, password_reset_expires_at, active";

/// Tokens issued strictly before the last password change are stale.
pub fn password_changed_after(changed_at: Option<OffsetDateTime>, issued_at: i64) -> bool {
    match changed_at {
        Some(changed) => changed.unix_timestamp() > issued_at,
        None => false,
    }
}

/// A stored reset token is usable until its expiry instant; a cleared
/// token never matches.
pub fn reset_token_usable(expires_at: Option<OffsetDateTime>, now: OffsetDateTime) -> bool {
    matches!(expires_at, Some(expiry) if expiry > now)
}

impl User {
    pub fn password_changed_after(&self, issued_at: i64) -> bool {
        password_changed_after(self.password_changed_at, issued_at)
    }

    /// Reads go through the active-only guard; deactivated accounts are
    /// invisible everywhere, including the auth gate.
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {COLUMNS} FROM users WHERE id = $1 AND active"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {COLUMNS} FROM users WHERE email = $1 AND active"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
    }

    /// Matches a stored reset digest; expired tokens match nothing.
    pub async fn find_by_reset_hash(db: &PgPool, digest: &str) -> sqlx::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {COLUMNS} FROM users \
             WHERE password_reset_token_hash = $1 AND active"
        ))
        .bind(digest)
        .fetch_optional(db)
        .await?;
        Ok(user
            .filter(|u| reset_token_usable(u.password_reset_expires_at, OffsetDateTime::now_utc())))
    }

    /// Resolves referenced users, e.g. a tour's guide list.
    pub async fn find_by_ids(db: &PgPool, ids: &[Uuid]) -> sqlx::Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, User>(&format!(
            "SELECT {COLUMNS} FROM users WHERE id = ANY($1) AND active"
        ))
        .bind(ids)
        .fetch_all(db)
        .await
    }

    pub async fn create(
        db: &PgPool,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email, password_hash) \
             VALUES ($1, $2, $3) RETURNING {COLUMNS}"
        ))
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(db)
        .await
    }

    pub async fn list(db: &PgPool) -> sqlx::Result<Vec<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {COLUMNS} FROM users WHERE active ORDER BY created_at DESC"
        ))
        .fetch_all(db)
        .await
    }

    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
    ) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET name = COALESCE($2, name), email = COALESCE($3, email) \
             WHERE id = $1 AND active RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .bind(email)
        .fetch_optional(db)
        .await
    }

    /// Replaces the password hash, advances the change timestamp and clears
    /// any pending reset token. The timestamp is backdated one second so a
    /// token issued immediately afterwards is not considered stale.
    pub async fn set_password(db: &PgPool, id: Uuid, password_hash: &str) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET password_hash = $2, \
             password_changed_at = NOW() - INTERVAL '1 second', \
             password_reset_token_hash = NULL, password_reset_expires_at = NULL \
             WHERE id = $1 RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(password_hash)
        .fetch_one(db)
        .await
    }

    pub async fn set_reset_token(
        db: &PgPool,
        id: Uuid,
        digest: &str,
        expires_at: OffsetDateTime,
    ) -> sqlx::Result<()> {
        sqlx::query(
            "UPDATE users SET password_reset_token_hash = $2, \
             password_reset_expires_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(digest)
        .bind(expires_at)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn clear_reset_token(db: &PgPool, id: Uuid) -> sqlx::Result<()> {
        sqlx::query(
            "UPDATE users SET password_reset_token_hash = NULL, \
             password_reset_expires_at = NULL WHERE id = $1",
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Soft delete: the account disappears from reads and can no longer
    /// authenticate.
    pub async fn deactivate(db: &PgPool, id: Uuid) -> sqlx::Result<()> {
        sqlx::query("UPDATE users SET active = FALSE WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}
