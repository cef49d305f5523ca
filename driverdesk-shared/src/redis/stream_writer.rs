/// Redis Stream publisher for account events
///
/// Appends every event to [`ACCOUNT_EVENTS_STREAM`] with XADD, retrying with
/// exponential backoff. The stream is capped (approximate MAXLEN) so it
/// cannot grow without bound.
///
/// # Example
///
/// ```no_run
/// use driverdesk_shared::events::{AccountEvent, EventPublisher};
/// use driverdesk_shared::redis::client::{RedisClient, RedisConfig};
/// use driverdesk_shared::redis::stream_writer::StreamWriter;
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = RedisClient::new(RedisConfig::new("redis://localhost:6379")).await?;
/// let writer = StreamWriter::new(client);
///
/// writer
///     .deliver(&AccountEvent::RoleChanged {
///         account_id: Uuid::new_v4(),
///         name: "Jane".to_string(),
///         roles: vec!["driver".to_string()],
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::Utc;
use redis::streams::StreamMaxlen;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::Duration;

use crate::events::serialization::{serialize_event, ACCOUNT_EVENTS_STREAM};
use crate::events::{AccountEvent, EventError, EventPublisher};
use crate::redis::client::RedisClient;

/// Retry and retention settings
#[derive(Debug, Clone)]
pub struct StreamWriterConfig {
    /// Retries after the first failed XADD
    pub max_retries: u32,

    /// First backoff delay in milliseconds; doubles per retry
    pub base_retry_delay_ms: u64,

    /// Backoff ceiling in milliseconds
    pub max_retry_delay_ms: u64,

    /// Approximate number of entries kept in the stream
    pub max_len: usize,
}

impl Default for StreamWriterConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_retry_delay_ms: 100,
            max_retry_delay_ms: 5000,
            max_len: 100_000,
        }
    }
}

impl StreamWriterConfig {
    /// Backoff before retry number `attempt` (1-based)
    fn retry_delay(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_retry_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        Duration::from_millis(exponential.min(self.max_retry_delay_ms))
    }
}

/// Publishes account events to Redis
#[derive(Clone)]
pub struct StreamWriter {
    client: RedisClient,
    config: StreamWriterConfig,
}

impl StreamWriter {
    pub fn new(client: RedisClient) -> Self {
        Self::with_config(client, StreamWriterConfig::default())
    }

    pub fn with_config(client: RedisClient, config: StreamWriterConfig) -> Self {
        Self { client, config }
    }

    async fn xadd_with_retry(&self, fields: &HashMap<String, String>) -> Result<String, EventError> {
        let items: Vec<(&str, &str)> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let mut attempt = 0;
        loop {
            let mut conn = self.client.connection();
            let result: Result<String, redis::RedisError> = conn
                .xadd_maxlen(
                    ACCOUNT_EVENTS_STREAM,
                    StreamMaxlen::Approx(self.config.max_len),
                    "*",
                    &items,
                )
                .await;

            match result {
                Ok(stream_id) => return Ok(stream_id),
                Err(e) if attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = self.config.retry_delay(attempt);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "XADD failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(EventError::DeliveryFailed {
                        attempts: attempt + 1,
                        last_error: e.to_string(),
                    })
                }
            }
        }
    }
}

#[async_trait]
impl EventPublisher for StreamWriter {
    async fn deliver(&self, event: &AccountEvent) -> Result<(), EventError> {
        let fields = serialize_event(event, Utc::now())?;
        let stream_id = self.xadd_with_retry(&fields).await?;

        tracing::debug!(
            kind = event.kind(),
            account_id = %event.account_id(),
            stream_id = %stream_id,
            "Published account event"
        );

        Ok(())
    }
}
