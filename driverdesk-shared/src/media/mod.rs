/// Media storage and avatar provisioning
///
/// New accounts get a generated avatar: the avatar service renders the
/// account initials, the image is fetched and stored in the `avatar`
/// collection. Provisioning runs in the background and never fails the
/// request that triggered it.
///
/// # Example
///
/// ```
/// use driverdesk_shared::media::avatar_url;
///
/// let url = avatar_url("https://na.ui-avatars.com/api/", "Jane Q Driver");
/// assert_eq!(url, "https://na.ui-avatars.com/api/?name=Jane+Q+Driver");
/// ```

use async_trait::async_trait;
use reqwest::Url;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::media::AVATAR_COLLECTION;
use crate::models::Media;

pub mod http;

/// Default avatar service
pub const DEFAULT_AVATAR_BASE_URL: &str = "https://na.ui-avatars.com/api/";

/// Media storage errors
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// The source could not be fetched
    #[error("Failed to fetch media: {0}")]
    Fetch(String),

    /// The file could not be written
    #[error("Failed to write media: {0}")]
    Io(#[from] std::io::Error),

    /// The media row could not be recorded
    #[error("Failed to record media: {0}")]
    Database(String),
}

impl From<sqlx::Error> for MediaError {
    fn from(err: sqlx::Error) -> Self {
        MediaError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for MediaError {
    fn from(err: reqwest::Error) -> Self {
        MediaError::Fetch(err.to_string())
    }
}

/// Stores media fetched from a URL
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Fetches `url` and records it in `collection` for the account
    async fn store_from_url(
        &self,
        account_id: Uuid,
        url: &str,
        custom_properties: JsonValue,
        collection: &str,
    ) -> Result<Media, MediaError>;
}

/// Avatar URL for a display name
///
/// The name is form-encoded into `?name=`, so spaces become `+`.
pub fn avatar_url(base_url: &str, name: &str) -> Result<Url, MediaError> {
    Url::parse_with_params(base_url, &[("name", name)])
        .map_err(|e| MediaError::Fetch(format!("Invalid avatar base URL: {}", e)))
}

/// Custom properties attached to a generated avatar
pub fn avatar_properties() -> JsonValue {
    json!({ "uuid": Uuid::new_v4().to_string() })
}

/// Provisions the avatar of a new account in the background
///
/// Failures are logged and dropped.
pub fn spawn_avatar_provisioning(
    media: Arc<dyn MediaStore>,
    base_url: &str,
    account_id: Uuid,
    name: &str,
) -> JoinHandle<()> {
    let url = avatar_url(base_url, name);

    tokio::spawn(async move {
        let url = match url {
            Ok(url) => url.to_string(),
            Err(e) => {
                warn!(account_id = %account_id, error = %e, "Avatar provisioning skipped");
                return;
            }
        };

        match media
            .store_from_url(account_id, &url, avatar_properties(), AVATAR_COLLECTION)
            .await
        {
            Ok(stored) => {
                debug!(account_id = %account_id, media_id = %stored.id, "Avatar stored");
            }
            Err(e) => {
                warn!(account_id = %account_id, url = %url, error = %e, "Avatar provisioning failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[test]
    fn test_avatar_url_replaces_spaces() {
        assert_eq!(
            avatar_url(DEFAULT_AVATAR_BASE_URL, "Ana Maria Souza").unwrap().as_str(),
            "https://na.ui-avatars.com/api/?name=Ana+Maria+Souza"
        );
        assert_eq!(avatar_url("http://a.test/", "Solo").unwrap().as_str(), "http://a.test/?name=Solo");
    }

    #[test]
    fn test_avatar_url_encodes_reserved_characters() {
        let url = avatar_url("http://a.test/", "Tom & Jerry #1 100%").unwrap();

        assert_eq!(url.as_str(), "http://a.test/?name=Tom+%26+Jerry+%231+100%25");
        let pairs: Vec<_> = url.query_pairs().collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].1, "Tom & Jerry #1 100%");
    }

    #[test]
    fn test_avatar_url_rejects_relative_base() {
        assert!(avatar_url("not a url", "Jo").is_err());
    }

    #[test]
    fn test_avatar_properties_carry_uuid() {
        let props = avatar_properties();
        let uuid = props["uuid"].as_str().unwrap();
        assert!(Uuid::parse_str(uuid).is_ok());
        assert_ne!(props, avatar_properties());
    }

    #[tokio::test]
    async fn test_spawned_provisioning_records_avatar() {
        let store = MemoryStore::new();
        let account_id = Uuid::new_v4();

        spawn_avatar_provisioning(Arc::new(store.clone()), "http://a.test/", account_id, "Jo Doe")
            .await
            .unwrap();

        let media = store.media_for(account_id).await;
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].collection, AVATAR_COLLECTION);
        assert_eq!(media[0].source_url, "http://a.test/?name=Jo+Doe");
    }
}
