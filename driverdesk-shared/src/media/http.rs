/// Media store that downloads over HTTP
///
/// Files are written to `{root}/{collection}/{media_id}` and recorded in the
/// `media` table.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::{MediaError, MediaStore};
use crate::models::media::CreateMedia;
use crate::models::Media;

/// Download timeout for a single media fetch
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Downloads media to the local media root
#[derive(Clone)]
pub struct HttpMediaStore {
    client: reqwest::Client,
    pool: PgPool,
    root: PathBuf,
}

impl HttpMediaStore {
    pub fn new(pool: PgPool, root: impl Into<PathBuf>) -> Result<Self, MediaError> {
        let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;

        Ok(Self {
            client,
            pool,
            root: root.into(),
        })
    }
}

#[async_trait]
impl MediaStore for HttpMediaStore {
    async fn store_from_url(
        &self,
        account_id: Uuid,
        url: &str,
        custom_properties: JsonValue,
        collection: &str,
    ) -> Result<Media, MediaError> {
        let response = self.client.get(url).send().await?.error_for_status()?;

        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        let id = Uuid::new_v4();
        let dir = self.root.join(collection);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(id.to_string()), &body).await?;

        debug!(account_id = %account_id, size = body.len(), "Media downloaded");

        let media = Media::create(
            &self.pool,
            CreateMedia {
                id,
                account_id,
                collection: collection.to_string(),
                source_url: url.to_string(),
                file_name: id.to_string(),
                mime_type,
                size_bytes: body.len() as i64,
                custom_properties,
            },
        )
        .await?;

        Ok(media)
    }
}
