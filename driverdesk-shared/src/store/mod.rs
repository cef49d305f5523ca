/// Collaborator traits for persistence
///
/// The API layer talks to storage only through these traits, so the same
/// handlers run against Postgres + Redis in production and against
/// [`memory::MemoryStore`] in tests and local development.
///
/// # Implementations
///
/// | Trait | Production | In-memory |
/// |---|---|---|
/// | `AccountStore` | `postgres::PgStore` | `memory::MemoryStore` |
/// | `RoleStore` | `postgres::PgStore` | `memory::MemoryStore` |
/// | `CustomFieldStore` | `postgres::PgStore` | `memory::MemoryStore` |
/// | `SettingsStore` | `postgres::PgStore` | `memory::MemoryStore` |
/// | `ResetTokenStore` | `postgres::PgStore` | `memory::MemoryStore` |
/// | `SessionStore` | `crate::redis::session::RedisSessionStore` | `memory::MemoryStore` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

use crate::models::{
    Account, AccountField, CreateAccount, CustomField, NewCustomFieldValue, Role, UpdateAccount,
};

pub mod memory;
pub mod postgres;

/// Unique constraint on `accounts.email`
pub const EMAIL_CONSTRAINT: &str = "accounts_email_key";

/// Unique constraint on `accounts.phone`
pub const PHONE_CONSTRAINT: &str = "accounts_phone_key";

/// Unique constraint on `accounts.api_token`
pub const API_TOKEN_CONSTRAINT: &str = "accounts_api_token_key";

/// Storage error shared by every store implementation
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write; carries the constraint name
    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    /// Database failure
    #[error("Database error: {0}")]
    Database(String),

    /// Redis failure
    #[error("Redis error: {0}")]
    Redis(String),
}

/// Store result type alias
pub type StoreResult<T> = Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(constraint) = db_err.constraint() {
                return StoreError::Conflict(constraint.to_string());
            }
        }
        StoreError::Database(err.to_string())
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Redis(err.to_string())
    }
}

/// Account persistence
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// First account whose `field` equals `value`
    async fn find_by_field(&self, field: AccountField, value: &str) -> StoreResult<Option<Account>>;

    /// Account by ID
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>>;

    /// Persists a new account
    async fn create(&self, data: CreateAccount) -> StoreResult<Account>;

    /// Partial update; `None` when the account does not exist
    async fn update(&self, id: Uuid, data: UpdateAccount) -> StoreResult<Option<Account>>;

    /// Applies `data` and upserts `values` as one unit
    ///
    /// Values replace any stored value with the same `(account, custom_field_id)`.
    ///
    /// Either every change is stored or none is. `None` when the account
    /// does not exist.
    async fn update_profile(
        &self,
        id: Uuid,
        data: UpdateAccount,
        values: Vec<NewCustomFieldValue>,
    ) -> StoreResult<Option<Account>>;

    /// Whether the backing store answers
    async fn health_check(&self) -> bool {
        true
    }
}

/// Role membership
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Whether the account holds `role`
    async fn has_role(&self, account_id: Uuid, role: Role) -> StoreResult<bool>;

    /// Grants `role`; granting a held role is a no-op
    async fn assign_role(&self, account_id: Uuid, role: Role) -> StoreResult<()>;
}

/// Custom field schema
///
/// Values are written through [`AccountStore::update_profile`].
#[async_trait]
pub trait CustomFieldStore: Send + Sync {
    /// Field definitions registered for a model, in display order
    async fn fields_for_model(&self, model: &str) -> StoreResult<Vec<CustomField>>;
}

/// Application settings
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Every stored setting
    async fn all(&self) -> StoreResult<BTreeMap<String, String>>;
}

/// Password reset token persistence
#[async_trait]
pub trait ResetTokenStore: Send + Sync {
    /// When the current token for `email` was issued, if any
    async fn issued_at(&self, email: &str) -> StoreResult<Option<DateTime<Utc>>>;

    /// Stores a token digest, replacing the previous one
    async fn put(&self, email: &str, token_hash: &str, issued_at: DateTime<Utc>) -> StoreResult<()>;
}

/// Authenticated sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Opens (or refreshes) the session of an account
    async fn open(&self, account_id: Uuid, ttl: Duration) -> StoreResult<()>;

    /// Closes the session; `false` when there was none
    async fn close(&self, account_id: Uuid) -> StoreResult<bool>;
}
