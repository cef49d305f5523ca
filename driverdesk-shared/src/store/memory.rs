/// In-memory implementation of every store trait
///
/// Backs `STORAGE_BACKEND=memory` and the test suites. Unique constraints
/// mirror the Postgres schema and report the same constraint names, so
/// callers cannot tell the backends apart by their errors.
///
/// # Example
///
/// ```
/// use driverdesk_shared::store::memory::MemoryStore;
/// use driverdesk_shared::store::SettingsStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// store.put_setting("app_name", "RideNow").await;
///
/// let settings = store.all().await?;
/// assert_eq!(settings["app_name"], "RideNow");
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AccountStore, CustomFieldStore, ResetTokenStore, RoleStore, SessionStore, SettingsStore,
    StoreError, StoreResult, API_TOKEN_CONSTRAINT, EMAIL_CONSTRAINT, PHONE_CONSTRAINT,
};
use crate::media::{MediaError, MediaStore};
use crate::models::media::AVATAR_COLLECTION;
use crate::models::{
    Account, AccountField, CreateAccount, CustomField, CustomFieldValue, Media,
    NewCustomFieldValue, Role, UpdateAccount,
};

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<Uuid, Account>,
    custom_fields: Vec<CustomField>,
    custom_values: HashMap<(Uuid, i64), CustomFieldValue>,
    media: Vec<Media>,
    settings: BTreeMap<String, String>,
    resets: HashMap<String, (String, DateTime<Utc>)>,
    sessions: HashMap<Uuid, DateTime<Utc>>,
}

impl MemoryState {
    /// Name of the unique constraint `candidate` would violate, if any
    fn conflict(&self, candidate: &Account) -> Option<&'static str> {
        self.accounts
            .values()
            .filter(|other| other.id != candidate.id)
            .find_map(|other| {
                if candidate.email.is_some() && other.email == candidate.email {
                    Some(EMAIL_CONSTRAINT)
                } else if candidate.phone.is_some() && other.phone == candidate.phone {
                    Some(PHONE_CONSTRAINT)
                } else if other.api_token == candidate.api_token {
                    Some(API_TOKEN_CONSTRAINT)
                } else {
                    None
                }
            })
    }

    /// Copy of an account with custom field values and avatar attached
    fn hydrate(&self, account: &Account) -> Account {
        let mut account = account.clone();

        let mut values: Vec<(i32, CustomFieldValue)> = self
            .custom_values
            .iter()
            .filter(|((owner, _), _)| *owner == account.id)
            .map(|((_, field_id), value)| {
                let order = self
                    .custom_fields
                    .iter()
                    .find(|f| f.id == *field_id)
                    .map_or(i32::MAX, |f| f.sort_order);
                (order, value.clone())
            })
            .collect();
        values.sort_by_key(|(order, value)| (*order, value.custom_field_id));
        account.custom_fields = values.into_iter().map(|(_, value)| value).collect();

        account.avatar = self
            .media
            .iter()
            .rev()
            .find(|m| m.account_id == account.id && m.collection == AVATAR_COLLECTION)
            .cloned();

        account
    }
}

/// In-memory store; clones share the same state
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an application setting
    pub async fn put_setting(&self, key: &str, value: &str) {
        self.state
            .write()
            .await
            .settings
            .insert(key.to_string(), value.to_string());
    }

    /// Registers a custom field definition and returns it
    pub async fn define_custom_field(&self, model: &str, name: &str, field_type: &str) -> CustomField {
        let mut state = self.state.write().await;
        let id = state.custom_fields.iter().map(|f| f.id).max().unwrap_or(0) + 1;

        let field = CustomField {
            id,
            name: name.to_string(),
            field_type: field_type.to_string(),
            custom_field_model: model.to_string(),
            required: false,
            sort_order: id as i32,
        };
        state.custom_fields.push(field.clone());
        field
    }

    /// Stored custom field values of an account
    pub async fn custom_values_for(&self, account_id: Uuid) -> Vec<CustomFieldValue> {
        let state = self.state.read().await;
        match state.accounts.get(&account_id) {
            Some(account) => state.hydrate(account).custom_fields,
            None => Vec::new(),
        }
    }

    /// Media stored for an account, oldest first
    pub async fn media_for(&self, account_id: Uuid) -> Vec<Media> {
        self.state
            .read()
            .await
            .media
            .iter()
            .filter(|m| m.account_id == account_id)
            .cloned()
            .collect()
    }

    /// Whether the account currently has an open session
    pub async fn has_session(&self, account_id: Uuid) -> bool {
        self.state
            .read()
            .await
            .sessions
            .get(&account_id)
            .is_some_and(|expires_at| *expires_at > Utc::now())
    }

    /// Number of stored accounts
    pub async fn account_count(&self) -> usize {
        self.state.read().await.accounts.len()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_by_field(&self, field: AccountField, value: &str) -> StoreResult<Option<Account>> {
        let state = self.state.read().await;

        let mut matches: Vec<&Account> = state
            .accounts
            .values()
            .filter(|account| match field {
                AccountField::Email => account.email.as_deref() == Some(value),
                AccountField::Phone => account.phone.as_deref() == Some(value),
                AccountField::ApiToken => account.api_token == value,
            })
            .collect();
        matches.sort_by_key(|account| account.created_at);

        Ok(matches.first().map(|account| state.hydrate(account)))
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>> {
        let state = self.state.read().await;
        Ok(state.accounts.get(&id).map(|account| state.hydrate(account)))
    }

    async fn create(&self, data: CreateAccount) -> StoreResult<Account> {
        let mut state = self.state.write().await;
        let now = Utc::now();

        let account = Account {
            id: Uuid::new_v4(),
            name: data.name,
            email: data.email,
            phone: data.phone,
            password_hash: data.password_hash,
            device_token: data.device_token,
            api_token: data.api_token,
            roles: Vec::new(),
            custom_fields: Vec::new(),
            avatar: None,
            created_at: now,
            updated_at: now,
        };

        if let Some(constraint) = state.conflict(&account) {
            return Err(StoreError::Conflict(constraint.to_string()));
        }

        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn update(&self, id: Uuid, data: UpdateAccount) -> StoreResult<Option<Account>> {
        let mut state = self.state.write().await;

        let Some(current) = state.accounts.get(&id) else {
            return Ok(None);
        };

        let mut updated = current.clone();
        data.apply_to(&mut updated);
        updated.updated_at = Utc::now();

        if let Some(constraint) = state.conflict(&updated) {
            return Err(StoreError::Conflict(constraint.to_string()));
        }

        state.accounts.insert(id, updated.clone());
        Ok(Some(state.hydrate(&updated)))
    }

    async fn update_profile(
        &self,
        id: Uuid,
        data: UpdateAccount,
        values: Vec<NewCustomFieldValue>,
    ) -> StoreResult<Option<Account>> {
        let mut state = self.state.write().await;

        let Some(current) = state.accounts.get(&id) else {
            return Ok(None);
        };

        let mut updated = current.clone();
        data.apply_to(&mut updated);
        updated.updated_at = Utc::now();

        if let Some(constraint) = state.conflict(&updated) {
            return Err(StoreError::Conflict(constraint.to_string()));
        }

        state.accounts.insert(id, updated.clone());
        for value in values {
            state
                .custom_values
                .insert((id, value.custom_field_id), value.into_stored());
        }
        Ok(Some(state.hydrate(&updated)))
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn has_role(&self, account_id: Uuid, role: Role) -> StoreResult<bool> {
        Ok(self
            .state
            .read()
            .await
            .accounts
            .get(&account_id)
            .is_some_and(|account| account.has_role(role)))
    }

    async fn assign_role(&self, account_id: Uuid, role: Role) -> StoreResult<()> {
        let mut state = self.state.write().await;

        if let Some(account) = state.accounts.get_mut(&account_id) {
            if !account.has_role(role) {
                account.roles.push(role.as_str().to_string());
                account.roles.sort();
            }
        }

        Ok(())
    }
}

#[async_trait]
impl CustomFieldStore for MemoryStore {
    async fn fields_for_model(&self, model: &str) -> StoreResult<Vec<CustomField>> {
        let mut fields: Vec<CustomField> = self
            .state
            .read()
            .await
            .custom_fields
            .iter()
            .filter(|field| field.custom_field_model == model)
            .cloned()
            .collect();
        fields.sort_by_key(|field| (field.sort_order, field.id));
        Ok(fields)
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn all(&self) -> StoreResult<BTreeMap<String, String>> {
        Ok(self.state.read().await.settings.clone())
    }
}

#[async_trait]
impl ResetTokenStore for MemoryStore {
    async fn issued_at(&self, email: &str) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self
            .state
            .read()
            .await
            .resets
            .get(email)
            .map(|(_, issued_at)| *issued_at))
    }

    async fn put(&self, email: &str, token_hash: &str, issued_at: DateTime<Utc>) -> StoreResult<()> {
        self.state
            .write()
            .await
            .resets
            .insert(email.to_string(), (token_hash.to_string(), issued_at));
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn open(&self, account_id: Uuid, ttl: Duration) -> StoreResult<()> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StoreError::Database(format!("Invalid session TTL: {}", e)))?;

        self.state
            .write()
            .await
            .sessions
            .insert(account_id, Utc::now() + ttl);
        Ok(())
    }

    async fn close(&self, account_id: Uuid) -> StoreResult<bool> {
        let removed = self.state.write().await.sessions.remove(&account_id);
        Ok(removed.is_some_and(|expires_at| expires_at > Utc::now()))
    }
}

/// Records media without fetching it; the source URL is kept as-is
#[async_trait]
impl MediaStore for MemoryStore {
    async fn store_from_url(
        &self,
        account_id: Uuid,
        url: &str,
        custom_properties: JsonValue,
        collection: &str,
    ) -> Result<Media, MediaError> {
        let id = Uuid::new_v4();
        let media = Media {
            id,
            account_id,
            collection: collection.to_string(),
            source_url: url.to_string(),
            file_name: id.to_string(),
            mime_type: None,
            size_bytes: 0,
            custom_properties,
            created_at: Utc::now(),
        };

        self.state.write().await.media.push(media.clone());
        Ok(media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_account(email: Option<&str>, phone: Option<&str>, token: &str) -> CreateAccount {
        CreateAccount {
            name: "Test Driver".to_string(),
            email: email.map(str::to_string),
            phone: phone.map(str::to_string),
            password_hash: "hash".to_string(),
            device_token: String::new(),
            api_token: token.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_find_by_fields() {
        let store = MemoryStore::new();
        let account = store
            .create(new_account(Some("a@example.com"), Some("+1555"), "tok-a"))
            .await
            .unwrap();

        let by_email = store.find_by_field(AccountField::Email, "a@example.com").await.unwrap();
        let by_phone = store.find_by_field(AccountField::Phone, "+1555").await.unwrap();
        let by_token = store.find_by_field(AccountField::ApiToken, "tok-a").await.unwrap();

        assert_eq!(by_email.unwrap().id, account.id);
        assert_eq!(by_phone.unwrap().id, account.id);
        assert_eq!(by_token.unwrap().id, account.id);
        assert!(store.find_by_field(AccountField::Email, "b@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_constraints() {
        let store = MemoryStore::new();
        store.create(new_account(Some("a@example.com"), None, "tok-a")).await.unwrap();

        let dup_email = store.create(new_account(Some("a@example.com"), None, "tok-b")).await;
        assert!(matches!(dup_email, Err(StoreError::Conflict(c)) if c == EMAIL_CONSTRAINT));

        let dup_token = store.create(new_account(None, None, "tok-a")).await;
        assert!(matches!(dup_token, Err(StoreError::Conflict(c)) if c == API_TOKEN_CONSTRAINT));

        // Accounts without email or phone do not collide on NULLs
        store.create(new_account(None, None, "tok-c")).await.unwrap();
        store.create(new_account(None, None, "tok-d")).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_unknown_account() {
        let store = MemoryStore::new();
        let result = store.update(Uuid::new_v4(), UpdateAccount::default()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_roles() {
        let store = MemoryStore::new();
        let account = store.create(new_account(None, None, "tok")).await.unwrap();

        assert!(!store.has_role(account.id, Role::Driver).await.unwrap());
        store.assign_role(account.id, Role::Driver).await.unwrap();
        store.assign_role(account.id, Role::Driver).await.unwrap();

        assert!(store.has_role(account.id, Role::Driver).await.unwrap());
        let reloaded = store.find_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(reloaded.roles, vec!["driver".to_string()]);
    }

    #[tokio::test]
    async fn test_custom_field_upsert_replaces_value() {
        let store = MemoryStore::new();
        let account = store.create(new_account(None, None, "tok")).await.unwrap();
        let field = store.define_custom_field("account", "vehicle", "text").await;

        for value in ["Prius", "Model 3"] {
            store
                .update_profile(
                    account.id,
                    UpdateAccount::default(),
                    vec![NewCustomFieldValue {
                        custom_field_id: field.id,
                        name: field.name.clone(),
                        value: json!(value),
                    }],
                )
                .await
                .unwrap();
        }

        let values = store.custom_values_for(account.id).await;
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, json!("Model 3"));
    }

    #[tokio::test]
    async fn test_update_profile_is_all_or_nothing() {
        let store = MemoryStore::new();
        store.create(new_account(Some("taken@example.com"), None, "tok-a")).await.unwrap();
        let account = store
            .create(new_account(Some("mine@example.com"), None, "tok-b"))
            .await
            .unwrap();
        let field = store.define_custom_field("account", "vehicle", "text").await;
        let value = NewCustomFieldValue {
            custom_field_id: field.id,
            name: field.name.clone(),
            value: json!("Prius"),
        };

        let rejected = store
            .update_profile(
                account.id,
                UpdateAccount {
                    name: Some("Renamed".to_string()),
                    email: Some("taken@example.com".to_string()),
                    ..Default::default()
                },
                vec![value.clone()],
            )
            .await;
        assert!(matches!(rejected, Err(StoreError::Conflict(c)) if c == EMAIL_CONSTRAINT));

        let unchanged = store.find_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(unchanged.name, "Test Driver");
        assert!(store.custom_values_for(account.id).await.is_empty());

        let updated = store
            .update_profile(
                account.id,
                UpdateAccount {
                    name: Some("Renamed".to_string()),
                    ..Default::default()
                },
                vec![value],
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.custom_fields.len(), 1);
        assert_eq!(updated.custom_fields[0].value, json!("Prius"));
    }

    #[tokio::test]
    async fn test_update_profile_unknown_account() {
        let store = MemoryStore::new();
        let result = store
            .update_profile(Uuid::new_v4(), UpdateAccount::default(), Vec::new())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_sessions() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();

        assert!(!store.close(id).await.unwrap());

        store.open(id, Duration::from_secs(60)).await.unwrap();
        assert!(store.has_session(id).await);
        assert!(store.close(id).await.unwrap());
        assert!(!store.close(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_media_becomes_avatar() {
        let store = MemoryStore::new();
        let account = store.create(new_account(None, None, "tok")).await.unwrap();

        store
            .store_from_url(account.id, "https://avatars.test/?name=A", json!({"uuid": "x"}), AVATAR_COLLECTION)
            .await
            .unwrap();

        let reloaded = store.find_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(reloaded.avatar.unwrap().source_url, "https://avatars.test/?name=A");
    }
}
