/// Response envelope shared by every driver endpoint
///
/// ```json
/// { "success": true, "data": { ... }, "message": "User retrieved successfully" }
/// ```

use axum::Json;
use serde::{Deserialize, Serialize};

/// `{success, data, message}` wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    pub message: String,
}

/// Successful envelope around `data`
pub fn ok<T: Serialize>(data: T, message: &str) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
        message: message.to_string(),
    })
}
