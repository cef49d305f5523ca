/// Error handling for the API server
///
/// Every failure leaves a handler as an [`ApiError`], which renders the same
/// envelope successful responses use, with `success: false` and an
/// `{error, code}` object in `data`. The HTTP status always equals `code`.
///
/// ```json
/// {
///   "success": false,
///   "data": { "error": "Unauthenticated user", "code": 401 },
///   "message": "User not logged"
/// }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use driverdesk_shared::{
    auth::{authorization::AuthzError, password::PasswordError, session::GuardError},
    reset::BrokerError,
    store::StoreError,
};
use serde_json::{json, Value as JsonValue};
use std::fmt;

use crate::response::Envelope;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed input (400)
    BadRequest(String),

    /// Missing or rejected credentials (401)
    Unauthenticated,

    /// Authenticated account lacks the driver role (401)
    Forbidden,

    /// Unknown account (404)
    UserNotFound,

    /// Unknown account on the phone reset path (404)
    PhoneNotFound,

    /// No driver-visible settings (404)
    SettingsNotFound,

    /// Input rejected by validation; the message is returned verbatim
    Validation { message: String, status: StatusCode },

    /// Password reset broker refused (401)
    ResetLinkNotSent,

    /// Collaborator failure (500); details are logged, not returned
    Internal(String),
}

impl ApiError {
    /// Validation failure reported with status 422
    pub fn unprocessable(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            status: StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// HTTP status, also used as the envelope `code`
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated | ApiError::Forbidden | ApiError::ResetLinkNotSent => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::UserNotFound | ApiError::PhoneNotFound | ApiError::SettingsNotFound => {
                StatusCode::NOT_FOUND
            }
            ApiError::Validation { status, .. } => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Envelope message
    pub fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Unauthenticated => "User not logged".to_string(),
            ApiError::Forbidden => "User not driver".to_string(),
            ApiError::UserNotFound | ApiError::PhoneNotFound => "User not found".to_string(),
            ApiError::SettingsNotFound => "Settings not found".to_string(),
            ApiError::Validation { message, .. } => message.clone(),
            ApiError::ResetLinkNotSent => "Reset link not sent".to_string(),
            ApiError::Internal(_) => "An internal error occurred".to_string(),
        }
    }

    /// Value of `data.error`
    fn error_value(&self) -> JsonValue {
        match self {
            ApiError::BadRequest(_) => json!("Bad Request"),
            ApiError::Unauthenticated => json!("Unauthenticated user"),
            ApiError::Forbidden => json!("Unauthorised user"),
            ApiError::PhoneNotFound => json!("Not Found"),
            ApiError::ResetLinkNotSent => json!("Reset link not sent"),
            ApiError::Internal(_) => json!("Internal Server Error"),
            ApiError::UserNotFound | ApiError::SettingsNotFound | ApiError::Validation { .. } => {
                json!(true)
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Internal(msg) => write!(f, "Internal error: {}", msg),
            other => write!(f, "{} ({})", other.message(), other.status().as_u16()),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(msg) = &self {
            tracing::error!("Internal error: {}", msg);
        }

        let status = self.status();
        let body = Envelope {
            success: false,
            data: json!({
                "error": self.error_value(),
                "code": status.as_u16(),
            }),
            message: self.message(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::Internal(format!("Password operation failed: {}", err))
    }
}

impl From<GuardError> for ApiError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::NoActiveSession => ApiError::UserNotFound,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::MissingRole { .. } => ApiError::Forbidden,
            AuthzError::Store(e) => e.into(),
        }
    }
}

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        ApiError::Internal(format!("Password reset failed: {}", err))
    }
}
