/// Account event encoding for Redis Streams
///
/// Stream entries are flat string pairs:
///
/// ```text
/// type: "role_changed"
/// account_id: "6f1c..."
/// payload: "{\"type\":\"role_changed\",\"account_id\":\"6f1c...\",...}"
/// ts: "2025-01-03T12:00:00+00:00"
/// ```
///
/// `payload` carries the full event; the other fields exist so consumers
/// can filter without parsing JSON.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

use super::AccountEvent;

/// Stream holding every account event
pub const ACCOUNT_EVENTS_STREAM: &str = "events:accounts";

/// Serialization errors
#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Encodes an event as stream fields
pub fn serialize_event(
    event: &AccountEvent,
    ts: DateTime<Utc>,
) -> Result<HashMap<String, String>, SerializationError> {
    let mut fields = HashMap::new();

    fields.insert("type".to_string(), event.kind().to_string());
    fields.insert("account_id".to_string(), event.account_id().to_string());
    fields.insert("payload".to_string(), serde_json::to_string(event)?);
    fields.insert("ts".to_string(), ts.to_rfc3339());

    Ok(fields)
}

/// Decodes the event carried in a stream entry
pub fn deserialize_event(fields: &HashMap<String, String>) -> Result<AccountEvent, SerializationError> {
    let payload = fields
        .get("payload")
        .ok_or_else(|| SerializationError::MissingField("payload".to_string()))?;

    Ok(serde_json::from_str(payload)?)
}
