/// Outgoing email
///
/// Delivery sits behind [`EmailSender`]. Local development uses
/// [`LogEmailSender`], which only logs; deployments point
/// [`HttpEmailSender`] at a transactional mail API that accepts a JSON
/// `{to, subject, text}` body.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

/// Send timeout for the mail API
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Mail delivery errors
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mail API request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// A single outgoing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

/// Email delivery abstraction
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

/// Sender that logs instead of delivering
#[derive(Clone, Debug, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        info!(to = %message.to, subject = %message.subject, "Email send stub");
        Ok(())
    }
}

/// Sender posting to an HTTP mail API
#[derive(Clone, Debug)]
pub struct HttpEmailSender {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpEmailSender {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, MailError> {
        let client = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        self.client
            .post(&self.endpoint)
            .json(message)
            .send()
            .await?
            .error_for_status()?;

        info!(to = %message.to, subject = %message.subject, "Email handed to mail API");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_sender_accepts_everything() {
        let message = EmailMessage {
            to: "jane@example.com".to_string(),
            subject: "Hi".to_string(),
            text: "Body".to_string(),
        };
        assert!(LogEmailSender.send(&message).await.is_ok());
    }

    #[test]
    fn test_message_json_shape() {
        let message = EmailMessage {
            to: "jane@example.com".to_string(),
            subject: "Reset".to_string(),
            text: "Link".to_string(),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json, serde_json::json!({"to": "jane@example.com", "subject": "Reset", "text": "Link"}));
    }
}
