/// Password reset links by email
///
/// [`TokenResetBroker`] issues a random token per request, persists only
/// its SHA-256 digest and mails a link of the form
/// `{reset_url_base}/{token}?email={email}`. Repeat requests for the same
/// email inside the throttle window are refused.
///
/// # Example
///
/// ```
/// use driverdesk_shared::mail::LogEmailSender;
/// use driverdesk_shared::reset::{PasswordResetBroker, ResetLinkOutcome, TokenResetBroker};
/// use driverdesk_shared::store::memory::MemoryStore;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(MemoryStore::new());
/// let broker = TokenResetBroker::new(
///     store.clone(),
///     store,
///     Arc::new(LogEmailSender),
///     "https://app.example.com/password/reset",
///     Duration::from_secs(60),
/// );
///
/// let outcome = broker.send_reset_link("nobody@example.com").await?;
/// assert_eq!(outcome, ResetLinkOutcome::InvalidUser);
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::auth::api_token::{generate_reset_token, hash_token};
use crate::mail::{EmailMessage, EmailSender, MailError};
use crate::models::AccountField;
use crate::store::{AccountStore, ResetTokenStore, StoreError};

/// Result of a reset link request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetLinkOutcome {
    /// Link mailed
    Sent,

    /// No account uses this email
    InvalidUser,

    /// A link was issued too recently
    Throttled,
}

/// Broker failures; refusals are outcomes, not errors
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error("Invalid reset URL: {0}")]
    InvalidUrl(String),
}

/// Issues password reset links
#[async_trait]
pub trait PasswordResetBroker: Send + Sync {
    async fn send_reset_link(&self, email: &str) -> Result<ResetLinkOutcome, BrokerError>;
}

/// Broker backed by stored token digests and an email sender
pub struct TokenResetBroker {
    accounts: Arc<dyn AccountStore>,
    tokens: Arc<dyn ResetTokenStore>,
    mail: Arc<dyn EmailSender>,
    reset_url_base: String,
    throttle: Duration,
}

impl TokenResetBroker {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        tokens: Arc<dyn ResetTokenStore>,
        mail: Arc<dyn EmailSender>,
        reset_url_base: impl Into<String>,
        throttle: Duration,
    ) -> Self {
        Self {
            accounts,
            tokens,
            mail,
            reset_url_base: reset_url_base.into(),
            throttle,
        }
    }

    fn reset_link(&self, token: &str, email: &str) -> Result<Url, BrokerError> {
        let base = self.reset_url_base.trim_end_matches('/');
        Url::parse_with_params(&format!("{}/{}", base, token), &[("email", email)])
            .map_err(|e| BrokerError::InvalidUrl(e.to_string()))
    }

    async fn is_throttled(&self, email: &str) -> Result<bool, StoreError> {
        let Some(issued_at) = self.tokens.issued_at(email).await? else {
            return Ok(false);
        };

        let elapsed = (Utc::now() - issued_at).to_std().unwrap_or_default();
        Ok(elapsed < self.throttle)
    }
}

#[async_trait]
impl PasswordResetBroker for TokenResetBroker {
    async fn send_reset_link(&self, email: &str) -> Result<ResetLinkOutcome, BrokerError> {
        if self
            .accounts
            .find_by_field(AccountField::Email, email)
            .await?
            .is_none()
        {
            debug!("Reset link requested for unknown email");
            return Ok(ResetLinkOutcome::InvalidUser);
        }

        if self.is_throttled(email).await? {
            debug!("Reset link request throttled");
            return Ok(ResetLinkOutcome::Throttled);
        }

        let token = generate_reset_token();
        let link = self.reset_link(&token, email)?;

        self.tokens.put(email, &hash_token(&token), Utc::now()).await?;
        self.mail
            .send(&EmailMessage {
                to: email.to_string(),
                subject: "Reset Password Notification".to_string(),
                text: format!(
                    "You are receiving this email because we received a password reset request for your account.\n\n\
                     Reset your password: {}\n\n\
                     If you did not request a password reset, no further action is required.",
                    link
                ),
            })
            .await?;

        info!("Password reset link sent");
        Ok(ResetLinkOutcome::Sent)
    }
}
