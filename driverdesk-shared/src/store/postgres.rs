/// Postgres-backed stores
///
/// Thin adapters over the model functions. Account reads are hydrated with
/// custom field values and the current avatar before they leave the store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{
    AccountStore, CustomFieldStore, ResetTokenStore, RoleStore, SettingsStore, StoreResult,
};
use crate::db::pool::health_check;
use crate::models::media::AVATAR_COLLECTION;
use crate::models::password_reset::PasswordReset;
use crate::models::{
    role, setting, Account, AccountField, CreateAccount, CustomField, CustomFieldValue, Media,
    NewCustomFieldValue, Role, UpdateAccount,
};

/// Store over a Postgres connection pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn hydrate(&self, account: Option<Account>) -> StoreResult<Option<Account>> {
        let Some(mut account) = account else {
            return Ok(None);
        };

        account.custom_fields = CustomFieldValue::list_for_account(&self.pool, account.id).await?;
        account.avatar =
            Media::latest_in_collection(&self.pool, account.id, AVATAR_COLLECTION).await?;

        Ok(Some(account))
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn find_by_field(&self, field: AccountField, value: &str) -> StoreResult<Option<Account>> {
        let account = Account::find_by_field(&self.pool, field, value).await?;
        self.hydrate(account).await
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>> {
        let account = Account::find_by_id(&self.pool, id).await?;
        self.hydrate(account).await
    }

    async fn create(&self, data: CreateAccount) -> StoreResult<Account> {
        Ok(Account::create(&self.pool, data).await?)
    }

    async fn update(&self, id: Uuid, data: UpdateAccount) -> StoreResult<Option<Account>> {
        let mut conn = self.pool.acquire().await?;
        if !Account::update(&mut conn, id, data).await? {
            return Ok(None);
        }
        drop(conn);

        self.find_by_id(id).await
    }

    async fn update_profile(
        &self,
        id: Uuid,
        data: UpdateAccount,
        values: Vec<NewCustomFieldValue>,
    ) -> StoreResult<Option<Account>> {
        let mut tx = self.pool.begin().await?;

        if !Account::update(&mut tx, id, data).await? {
            return Ok(None);
        }
        for value in values {
            CustomFieldValue::upsert(&mut tx, id, value).await?;
        }
        tx.commit().await?;

        self.find_by_id(id).await
    }

    async fn health_check(&self) -> bool {
        health_check(&self.pool).await.is_ok()
    }
}

#[async_trait]
impl RoleStore for PgStore {
    async fn has_role(&self, account_id: Uuid, role: Role) -> StoreResult<bool> {
        Ok(role::has_role(&self.pool, account_id, role).await?)
    }

    async fn assign_role(&self, account_id: Uuid, role: Role) -> StoreResult<()> {
        Ok(role::assign_role(&self.pool, account_id, role).await?)
    }
}

#[async_trait]
impl CustomFieldStore for PgStore {
    async fn fields_for_model(&self, model: &str) -> StoreResult<Vec<CustomField>> {
        Ok(CustomField::for_model(&self.pool, model).await?)
    }
}

#[async_trait]
impl SettingsStore for PgStore {
    async fn all(&self) -> StoreResult<BTreeMap<String, String>> {
        Ok(setting::load_all(&self.pool).await?)
    }
}

#[async_trait]
impl ResetTokenStore for PgStore {
    async fn issued_at(&self, email: &str) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(PasswordReset::find(&self.pool, email)
            .await?
            .map(|reset| reset.created_at))
    }

    async fn put(&self, email: &str, token_hash: &str, issued_at: DateTime<Utc>) -> StoreResult<()> {
        Ok(PasswordReset::put(&self.pool, email, token_hash, issued_at).await?)
    }
}
