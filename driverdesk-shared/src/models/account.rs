/// Account model and database operations
///
/// An account is the identity record behind every driver endpoint. Roles,
/// custom field values and the avatar live in their own tables and are
/// attached to the record by the store after it is loaded.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE accounts (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     email TEXT,
///     phone VARCHAR(32),
///     password_hash VARCHAR(255) NOT NULL,
///     device_token TEXT NOT NULL DEFAULT '',
///     api_token VARCHAR(64) NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT accounts_email_key UNIQUE (email),
///     CONSTRAINT accounts_phone_key UNIQUE (phone),
///     CONSTRAINT accounts_api_token_key UNIQUE (api_token)
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use driverdesk_shared::models::account::{Account, AccountField, CreateAccount};
/// use sqlx::{PgConnection, PgPool};
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let account = Account::create(
///     &pool,
///     CreateAccount {
///         name: "Jane Driver".to_string(),
///         email: Some("jane@example.com".to_string()),
///         phone: None,
///         password_hash: "$argon2id$...".to_string(),
///         device_token: String::new(),
///         api_token: "opaque".to_string(),
///     },
/// )
/// .await?;
///
/// let found = Account::find_by_field(&pool, AccountField::ApiToken, &account.api_token).await?;
/// assert!(found.is_some());
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::custom_field::CustomFieldValue;
use super::media::Media;
use super::role::Role;

/// Columns selected for every account query
///
/// Roles are folded into a sorted text array so a single row carries the
/// whole role set.
const ACCOUNT_COLUMNS: &str = r#"
    a.id, a.name, a.email, a.phone, a.password_hash, a.device_token, a.api_token,
    ARRAY(SELECT r.role FROM account_roles r WHERE r.account_id = a.id ORDER BY r.role) AS roles,
    a.created_at, a.updated_at
"#;

/// Account record
///
/// The password hash is never serialized into responses.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    /// Unique account ID (UUID v4)
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Email address, unique when present
    pub email: Option<String>,

    /// Phone number, unique when present
    pub phone: Option<String>,

    /// Argon2id password hash
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    /// Push notification token of the last device that logged in
    pub device_token: String,

    /// Opaque API token, immutable once assigned
    pub api_token: String,

    /// Role names held by the account, sorted
    pub roles: Vec<String>,

    /// Custom field values attached to the account
    #[sqlx(skip)]
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldValue>,

    /// Avatar media, once provisioned
    #[sqlx(skip)]
    #[serde(default)]
    pub avatar: Option<Media>,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last updated
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Membership check against the account's role set
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.iter().any(|r| r == role.as_str())
    }
}

/// Lookup keys accepted by [`Account::find_by_field`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountField {
    /// Exact email match
    Email,

    /// Exact phone match
    Phone,

    /// Exact API token match
    ApiToken,
}

impl AccountField {
    /// Column name backing this field
    pub fn column(&self) -> &'static str {
        match self {
            AccountField::Email => "email",
            AccountField::Phone => "phone",
            AccountField::ApiToken => "api_token",
        }
    }
}

/// Input for creating a new account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccount {
    /// Display name
    pub name: String,

    /// Optional email address
    pub email: Option<String>,

    /// Optional phone number
    pub phone: Option<String>,

    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: String,

    /// Device push token, empty when unknown
    pub device_token: String,

    /// Freshly minted API token
    pub api_token: String,
}

/// Partial update of an account
///
/// Only `Some` fields are written. There is deliberately no API token field:
/// the token cannot change after registration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAccount {
    /// New display name
    pub name: Option<String>,

    /// New email address
    pub email: Option<String>,

    /// New phone number
    pub phone: Option<String>,

    /// New device push token
    pub device_token: Option<String>,

    /// New password hash
    pub password_hash: Option<String>,
}

impl UpdateAccount {
    /// True when no field would change
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.device_token.is_none()
            && self.password_hash.is_none()
    }

    /// Applies the update to an in-memory record
    pub fn apply_to(&self, account: &mut Account) {
        if let Some(name) = &self.name {
            account.name = name.clone();
        }
        if let Some(email) = &self.email {
            account.email = Some(email.clone());
        }
        if let Some(phone) = &self.phone {
            account.phone = Some(phone.clone());
        }
        if let Some(device_token) = &self.device_token {
            account.device_token = device_token.clone();
        }
        if let Some(password_hash) = &self.password_hash {
            account.password_hash = password_hash.clone();
        }
    }
}

impl Account {
    /// Creates a new account in the database
    ///
    /// # Errors
    ///
    /// Returns an error if the email, phone or API token is already taken
    /// (unique constraint violation) or the database is unreachable.
    pub async fn create(pool: &PgPool, data: CreateAccount) -> Result<Self, sqlx::Error> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO accounts (name, email, phone, password_hash, device_token, api_token)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(data.name)
        .bind(data.email)
        .bind(data.phone)
        .bind(data.password_hash)
        .bind(data.device_token)
        .bind(data.api_token)
        .fetch_one(pool)
        .await?;

        Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Finds an account by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM accounts a WHERE a.id = $1", ACCOUNT_COLUMNS);

        sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds the first account whose `field` equals `value`
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use driverdesk_shared::models::account::{Account, AccountField};
    /// # use sqlx::PgPool;
    /// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
    /// if let Some(account) = Account::find_by_field(&pool, AccountField::Phone, "+15550100").await? {
    ///     println!("Found account {}", account.id);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn find_by_field(
        pool: &PgPool,
        field: AccountField,
        value: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM accounts a WHERE a.{} = $1 ORDER BY a.created_at LIMIT 1",
            ACCOUNT_COLUMNS,
            field.column()
        );

        sqlx::query_as::<_, Account>(&query)
            .bind(value)
            .fetch_optional(pool)
            .await
    }

    /// Applies a partial update
    ///
    /// Only `Some` fields in `data` are written; `updated_at` is always bumped.
    /// Takes a connection so it can run inside a caller's transaction.
    ///
    /// # Returns
    ///
    /// Whether an account with this ID existed
    pub async fn update(
        conn: &mut PgConnection,
        id: Uuid,
        data: UpdateAccount,
    ) -> Result<bool, sqlx::Error> {
        let mut query = String::from("UPDATE accounts SET updated_at = NOW()");
        let mut bind_count = 1;

        let columns = [
            ("name", data.name.is_some()),
            ("email", data.email.is_some()),
            ("phone", data.phone.is_some()),
            ("device_token", data.device_token.is_some()),
            ("password_hash", data.password_hash.is_some()),
        ];
        for (column, present) in columns {
            if present {
                bind_count += 1;
                query.push_str(&format!(", {} = ${}", column, bind_count));
            }
        }

        query.push_str(" WHERE id = $1 RETURNING id");

        let mut q = sqlx::query_scalar::<_, Uuid>(&query).bind(id);
        for value in [
            data.name,
            data.email,
            data.phone,
            data.device_token,
            data.password_hash,
        ]
        .into_iter()
        .flatten()
        {
            q = q.bind(value);
        }

        Ok(q.fetch_optional(&mut *conn).await?.is_some())
    }
}
