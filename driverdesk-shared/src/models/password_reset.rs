/// Password reset tokens
///
/// One row per email. Only the SHA-256 hash of the token is stored; issuing
/// a new token replaces the previous one.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE password_resets (
///     email TEXT PRIMARY KEY,
///     token_hash CHAR(64) NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Stored reset token
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PasswordReset {
    /// Email the token was issued for
    pub email: String,

    /// SHA-256 hex digest of the token
    pub token_hash: String,

    /// When the token was issued
    pub created_at: DateTime<Utc>,
}

impl PasswordReset {
    /// Finds the current token for an email
    pub async fn find(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, PasswordReset>(
            "SELECT email, token_hash, created_at FROM password_resets WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    /// Stores a token, replacing any previous one for the email
    pub async fn put(
        pool: &PgPool,
        email: &str,
        token_hash: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO password_resets (email, token_hash, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (email)
            DO UPDATE SET token_hash = EXCLUDED.token_hash, created_at = EXCLUDED.created_at
            "#,
        )
        .bind(email)
        .bind(token_hash)
        .bind(created_at)
        .execute(pool)
        .await?;

        Ok(())
    }
}
