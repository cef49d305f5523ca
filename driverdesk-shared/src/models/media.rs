/// Media attached to accounts (avatars)
///
/// # Schema
///
/// ```sql
/// CREATE TABLE media (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
///     collection VARCHAR(64) NOT NULL,
///     source_url TEXT NOT NULL,
///     file_name VARCHAR(255) NOT NULL,
///     mime_type VARCHAR(127),
///     size_bytes BIGINT NOT NULL DEFAULT 0,
///     custom_properties JSONB NOT NULL DEFAULT '{}',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

/// Collection holding account avatars
pub const AVATAR_COLLECTION: &str = "avatar";

/// Stored media item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Media {
    /// Media ID
    pub id: Uuid,

    /// Owning account
    pub account_id: Uuid,

    /// Named collection (e.g. "avatar")
    pub collection: String,

    /// URL the media was fetched from
    pub source_url: String,

    /// File name under the media root
    pub file_name: String,

    /// Content type reported by the origin
    pub mime_type: Option<String>,

    /// Stored size in bytes
    pub size_bytes: i64,

    /// Free-form properties attached at upload time
    pub custom_properties: JsonValue,

    /// When the media was stored
    pub created_at: DateTime<Utc>,
}

/// Input for recording a stored media item
#[derive(Debug, Clone)]
pub struct CreateMedia {
    pub id: Uuid,
    pub account_id: Uuid,
    pub collection: String,
    pub source_url: String,
    pub file_name: String,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
    pub custom_properties: JsonValue,
}

impl Media {
    /// Records a media row
    pub async fn create(pool: &PgPool, data: CreateMedia) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Media>(
            r#"
            INSERT INTO media (id, account_id, collection, source_url, file_name,
                               mime_type, size_bytes, custom_properties)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, account_id, collection, source_url, file_name,
                      mime_type, size_bytes, custom_properties, created_at
            "#,
        )
        .bind(data.id)
        .bind(data.account_id)
        .bind(data.collection)
        .bind(data.source_url)
        .bind(data.file_name)
        .bind(data.mime_type)
        .bind(data.size_bytes)
        .bind(data.custom_properties)
        .fetch_one(pool)
        .await
    }

    /// Latest media item of a collection for an account
    pub async fn latest_in_collection(
        pool: &PgPool,
        account_id: Uuid,
        collection: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Media>(
            r#"
            SELECT id, account_id, collection, source_url, file_name,
                   mime_type, size_bytes, custom_properties, created_at
            FROM media
            WHERE account_id = $1 AND collection = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(account_id)
        .bind(collection)
        .fetch_optional(pool)
        .await
    }
}
