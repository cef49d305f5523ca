/// Credential verification and session tracking
///
/// [`SessionGuard`] is the explicit replacement for framework-level auth
/// state: it is built once at start-up, held in the application state and
/// handed to whichever handler needs to authenticate.
///
/// # Example
///
/// ```no_run
/// use driverdesk_shared::auth::session::{Credentials, SessionGuard};
///
/// # async fn example(guard: SessionGuard) -> Result<(), Box<dyn std::error::Error>> {
/// let credentials = Credentials::from_input(Some("jane@example.com"), None, Some("secret"))
///     .ok_or("missing credentials")?;
///
/// if let Some(account) = guard.attempt(&credentials).await? {
///     println!("Logged in {}", account.name);
///     guard.logout(account.id).await?;
/// }
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::password::{verify_password, PasswordError};
use crate::models::{Account, AccountField};
use crate::store::{AccountStore, SessionStore, StoreError};

/// Default session lifetime (30 days)
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Errors raised by the session guard
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// Logout for an account without an open session
    #[error("No active session")]
    NoActiveSession,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// Identifier half of a credential pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Email(String),
    Phone(String),
}

/// Login credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub identifier: Identifier,
    pub password: String,
}

impl Credentials {
    /// Builds credentials from raw login input
    ///
    /// Empty strings count as absent. Email wins over phone when both are
    /// given. Returns `None` without a password or without any identifier.
    pub fn from_input(
        email: Option<&str>,
        phone: Option<&str>,
        password: Option<&str>,
    ) -> Option<Self> {
        let present = |value: Option<&str>| value.filter(|v| !v.is_empty()).map(str::to_string);

        let password = present(password)?;
        let identifier = match (present(email), present(phone)) {
            (Some(email), _) => Identifier::Email(email),
            (None, Some(phone)) => Identifier::Phone(phone),
            (None, None) => return None,
        };

        Some(Self {
            identifier,
            password,
        })
    }
}

/// Verifies credentials and tracks sessions
#[derive(Clone)]
pub struct SessionGuard {
    accounts: Arc<dyn AccountStore>,
    sessions: Arc<dyn SessionStore>,
    ttl: Duration,
}

impl SessionGuard {
    pub fn new(accounts: Arc<dyn AccountStore>, sessions: Arc<dyn SessionStore>, ttl: Duration) -> Self {
        Self {
            accounts,
            sessions,
            ttl,
        }
    }

    /// Verifies credentials and opens a session on success
    ///
    /// # Returns
    ///
    /// The authenticated account, or `None` when the identifier is unknown
    /// or the password does not match
    pub async fn attempt(&self, credentials: &Credentials) -> Result<Option<Account>, GuardError> {
        let account = match &credentials.identifier {
            Identifier::Email(email) => self.accounts.find_by_field(AccountField::Email, email).await?,
            Identifier::Phone(phone) => self.accounts.find_by_field(AccountField::Phone, phone).await?,
        };

        let Some(account) = account else {
            debug!("Login attempt for unknown identifier");
            return Ok(None);
        };

        if !verify_password(&credentials.password, &account.password_hash)? {
            debug!(account_id = %account.id, "Login attempt with wrong password");
            return Ok(None);
        }

        self.sessions.open(account.id, self.ttl).await?;
        Ok(Some(account))
    }

    /// Closes the session of an account
    ///
    /// # Errors
    ///
    /// `GuardError::NoActiveSession` when the account has no open session
    pub async fn logout(&self, account_id: Uuid) -> Result<(), GuardError> {
        if self.sessions.close(account_id).await? {
            Ok(())
        } else {
            Err(GuardError::NoActiveSession)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use crate::models::CreateAccount;
    use crate::store::memory::MemoryStore;

    async fn guard_with_account(password: &str) -> (SessionGuard, MemoryStore, Account) {
        let store = MemoryStore::new();
        let account = store
            .create(CreateAccount {
                name: "Jane".to_string(),
                email: Some("jane@example.com".to_string()),
                phone: Some("+15550100".to_string()),
                password_hash: hash_password(password).unwrap(),
                device_token: String::new(),
                api_token: "token".to_string(),
            })
            .await
            .unwrap();

        let guard = SessionGuard::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Duration::from_secs(60),
        );
        (guard, store, account)
    }

    #[test]
    fn test_credentials_prefer_email() {
        let creds = Credentials::from_input(Some("a@b.c"), Some("+1"), Some("pw")).unwrap();
        assert_eq!(creds.identifier, Identifier::Email("a@b.c".to_string()));

        let creds = Credentials::from_input(Some(""), Some("+1"), Some("pw")).unwrap();
        assert_eq!(creds.identifier, Identifier::Phone("+1".to_string()));
    }

    #[test]
    fn test_credentials_require_password_and_identifier() {
        assert!(Credentials::from_input(Some("a@b.c"), None, None).is_none());
        assert!(Credentials::from_input(Some("a@b.c"), None, Some("")).is_none());
        assert!(Credentials::from_input(None, None, Some("pw")).is_none());
        assert!(Credentials::from_input(Some(""), Some(""), Some("pw")).is_none());
    }

    #[tokio::test]
    async fn test_attempt_by_email_and_phone() {
        let (guard, store, account) = guard_with_account("secret").await;

        let by_email = Credentials::from_input(Some("jane@example.com"), None, Some("secret")).unwrap();
        assert_eq!(guard.attempt(&by_email).await.unwrap().unwrap().id, account.id);
        assert!(store.has_session(account.id).await);

        let by_phone = Credentials::from_input(None, Some("+15550100"), Some("secret")).unwrap();
        assert!(guard.attempt(&by_phone).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_attempt_rejects_bad_credentials() {
        let (guard, store, account) = guard_with_account("secret").await;

        let wrong = Credentials::from_input(Some("jane@example.com"), None, Some("nope")).unwrap();
        assert!(guard.attempt(&wrong).await.unwrap().is_none());

        let unknown = Credentials::from_input(Some("who@example.com"), None, Some("secret")).unwrap();
        assert!(guard.attempt(&unknown).await.unwrap().is_none());

        assert!(!store.has_session(account.id).await);
    }

    #[tokio::test]
    async fn test_logout_requires_open_session() {
        let (guard, _store, account) = guard_with_account("secret").await;

        assert!(matches!(guard.logout(account.id).await, Err(GuardError::NoActiveSession)));

        let creds = Credentials::from_input(Some("jane@example.com"), None, Some("secret")).unwrap();
        guard.attempt(&creds).await.unwrap();

        assert!(guard.logout(account.id).await.is_ok());
        assert!(matches!(guard.logout(account.id).await, Err(GuardError::NoActiveSession)));
    }
}
