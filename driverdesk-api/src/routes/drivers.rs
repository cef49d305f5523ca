/// Driver account endpoints
///
/// # Endpoints
///
/// - `POST /api/driver/login` - Verify credentials, record the device token
/// - `POST /api/driver/register` - Create a driver account
/// - `POST /api/driver/logout` - Close the session of a token holder
/// - `GET /api/driver/user?api_token=` - Profile of a token holder
/// - `GET /api/driver/settings` - Driver-visible application settings
/// - `POST /api/driver/users/:id` - Partial profile update
/// - `POST /api/driver/send_reset_link_email` - Mail a password reset link
/// - `POST /api/driver/sms_password_reset` - Set a new password by phone
///
/// Every response, success or failure, is an [`Envelope`].

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use driverdesk_shared::{
    auth::{
        api_token::{generate_api_token, is_well_formed},
        authorization::require_role,
        password,
        session::{Credentials, GuardError},
    },
    events::AccountEvent,
    media::spawn_avatar_provisioning,
    models::{
        custom_field::{extract_values, ACCOUNT_MODEL},
        setting::driver_settings,
        Account, AccountField, CreateAccount, Role, UpdateAccount,
    },
    reset::ResetLinkOutcome,
    store::{StoreError, API_TOKEN_CONSTRAINT, EMAIL_CONSTRAINT, PHONE_CONSTRAINT},
};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::{Validate, ValidateEmail, ValidationErrors};

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    response::{ok, Envelope},
};

/// Attempts at minting a unique API token before giving up
const API_TOKEN_ATTEMPTS: usize = 3;

type Reply<T> = ApiResult<Json<Envelope<T>>>;

/// Login request
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub device_token: Option<String>,
}

/// Registration request
#[derive(Debug, Default, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(max = 255, message = "The name may not be greater than 255 characters."))]
    pub name: Option<String>,

    #[validate(email(message = "The email must be a valid email address."))]
    pub email: Option<String>,

    #[validate(length(max = 32, message = "The phone may not be greater than 32 characters."))]
    pub phone: Option<String>,

    pub password: Option<String>,
    pub device_token: Option<String>,
}

/// Body carrying an API token
#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    pub api_token: Option<String>,
}

/// Profile update
///
/// There are no password or API token fields: both are silently ignored
/// when present in the body.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 1, max = 255, message = "The name must be between 1 and 255 characters."))]
    pub name: Option<String>,

    #[validate(email(message = "The email must be a valid email address."))]
    pub email: Option<String>,

    #[validate(length(max = 32, message = "The phone may not be greater than 32 characters."))]
    pub phone: Option<String>,

    pub device_token: Option<String>,

    /// Values keyed by custom field name
    #[serde(default)]
    pub custom_fields: Map<String, JsonValue>,
}

impl ProfileUpdate {
    fn account_changes(&self) -> UpdateAccount {
        UpdateAccount {
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            device_token: self.device_token.clone(),
            password_hash: None,
        }
    }
}

/// Password reset link request
#[derive(Debug, Default, Deserialize)]
pub struct ResetLinkRequest {
    pub email: Option<String>,
}

/// Password reset by phone
#[derive(Debug, Default, Deserialize)]
pub struct PhoneResetRequest {
    pub phone: Option<String>,
    pub password: Option<String>,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// Treats empty strings as absent
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// First validation message, by field name
fn first_message(errors: &ValidationErrors) -> String {
    let fields: BTreeMap<_, _> = errors.field_errors().into_iter().collect();

    fields
        .values()
        .flat_map(|errors| errors.iter())
        .find_map(|error| error.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "The given data was invalid.".to_string())
}

/// Message for a unique constraint rejecting an account write
fn taken_message(constraint: &str) -> Option<&'static str> {
    match constraint {
        EMAIL_CONSTRAINT => Some("The email has already been taken."),
        PHONE_CONSTRAINT => Some("The phone has already been taken."),
        _ => None,
    }
}

async fn find_by_token(state: &AppState, token: Option<&str>) -> ApiResult<Account> {
    let token = token.filter(|t| is_well_formed(t)).ok_or(ApiError::UserNotFound)?;

    state
        .accounts
        .find_by_field(AccountField::ApiToken, token)
        .await?
        .ok_or(ApiError::UserNotFound)
}

/// Login with email or phone plus password
///
/// # Endpoint
///
/// ```text
/// POST /api/driver/login
/// Content-Type: application/json
///
/// { "email": "jane@example.com", "password": "secret", "device_token": "fcm-token" }
/// ```
///
/// Email wins when both email and phone are given. On success the supplied
/// device token (or `""` when omitted) replaces the stored one.
///
/// # Errors
///
/// - `401 User not logged`: missing identifier or password, or bad credentials
/// - `401 User not driver`: the account lacks the driver role
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Reply<Account> {
    let req = body(payload)?;

    let credentials = Credentials::from_input(
        req.email.as_deref(),
        req.phone.as_deref(),
        req.password.as_deref(),
    )
    .ok_or(ApiError::Unauthenticated)?;

    let account = state
        .guard
        .attempt(&credentials)
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    if let Err(e) = require_role(state.roles.as_ref(), account.id, Role::Driver).await {
        match state.guard.logout(account.id).await {
            Ok(()) | Err(GuardError::NoActiveSession) => {}
            Err(close_err) => tracing::warn!(error = %close_err, "Failed to close rejected session"),
        }
        return Err(e.into());
    }

    let account = state
        .accounts
        .update(
            account.id,
            UpdateAccount {
                device_token: Some(req.device_token.unwrap_or_default()),
                ..Default::default()
            },
        )
        .await?
        .ok_or(ApiError::UserNotFound)?;

    tracing::info!(account_id = %account.id, "Driver logged in");
    Ok(ok(account, "User retrieved successfully"))
}

/// Register a driver account
///
/// # Endpoint
///
/// ```text
/// POST /api/driver/register
/// Content-Type: application/json
///
/// { "name": "Jane Driver", "email": "jane@example.com", "phone": "+15550100", "password": "secret" }
/// ```
///
/// The account gets the driver role and a fresh 60 character API token.
/// The avatar is provisioned in the background and a `RoleChanged` event is
/// published once the role is assigned.
///
/// # Errors
///
/// - `400`: name or password missing
/// - `422`: malformed email, or email/phone already taken
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Reply<Account> {
    let req = body(payload)?;
    let req = RegisterRequest {
        email: present(req.email),
        phone: present(req.phone),
        ..req
    };

    let (Some(name), Some(password)) = (present(req.name.clone()), present(req.password.clone()))
    else {
        return Err(ApiError::BadRequest(
            "Please provide name and password".to_string(),
        ));
    };

    req.validate()
        .map_err(|e| ApiError::unprocessable(first_message(&e)))?;

    let password_hash = password::hash_password(&password)?;

    let mut created = None;
    for _ in 0..API_TOKEN_ATTEMPTS {
        let result = state
            .accounts
            .create(CreateAccount {
                name: name.clone(),
                email: req.email.clone(),
                phone: req.phone.clone(),
                password_hash: password_hash.clone(),
                device_token: req.device_token.clone().unwrap_or_default(),
                api_token: generate_api_token(),
            })
            .await;

        match result {
            Ok(account) => {
                created = Some(account);
                break;
            }
            Err(StoreError::Conflict(constraint)) if constraint == API_TOKEN_CONSTRAINT => {
                tracing::warn!("API token collision, minting a new one");
            }
            Err(StoreError::Conflict(constraint)) => {
                return Err(match taken_message(&constraint) {
                    Some(message) => ApiError::unprocessable(message),
                    None => ApiError::Internal(format!("Unexpected constraint: {}", constraint)),
                });
            }
            Err(e) => return Err(e.into()),
        }
    }

    let account = created.ok_or_else(|| {
        ApiError::Internal("Could not mint a unique API token".to_string())
    })?;

    state.roles.assign_role(account.id, Role::Driver).await?;

    let account = state
        .accounts
        .find_by_id(account.id)
        .await?
        .ok_or_else(|| ApiError::Internal("Registered account disappeared".to_string()))?;

    spawn_avatar_provisioning(
        state.media.clone(),
        &state.config.avatar_base_url,
        account.id,
        &account.name,
    );
    state.events.publish(AccountEvent::role_changed(&account));

    tracing::info!(account_id = %account.id, "Driver registered");
    Ok(ok(account, "User retrieved successfully"))
}

/// Close the session of the token holder
///
/// Responds with the account name.
///
/// # Errors
///
/// - `404 User not found`: unknown token, or no open session
pub async fn logout(
    State(state): State<AppState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Reply<String> {
    let req = body(payload)?;
    let account = find_by_token(&state, req.api_token.as_deref()).await?;

    state.guard.logout(account.id).await?;

    tracing::info!(account_id = %account.id, "Driver logged out");
    Ok(ok(account.name, "User logout successfully"))
}

/// Profile of the token holder
pub async fn user(
    State(state): State<AppState>,
    query: Result<Query<TokenRequest>, QueryRejection>,
) -> Reply<Account> {
    let Query(query) = query.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let account = find_by_token(&state, query.api_token.as_deref()).await?;

    Ok(ok(account, "User retrieved successfully"))
}

/// Driver-visible application settings
///
/// Only `default_tax`, `default_currency`, `app_name`, `currency_right`,
/// `enable_paypal` and `enable_stripe` are returned.
pub async fn settings(State(state): State<AppState>) -> Reply<BTreeMap<String, String>> {
    let settings = driver_settings(state.settings.all().await?);

    if settings.is_empty() {
        return Err(ApiError::SettingsNotFound);
    }

    Ok(ok(settings, "Settings retrieved successfully"))
}

/// Partial profile update
///
/// # Endpoint
///
/// ```text
/// POST /api/driver/users/{id}
/// Content-Type: application/json
///
/// { "name": "Jane Q Driver", "custom_fields": { "vehicle_plate": "7ABC123" } }
/// ```
///
/// Only supplied keys change. Custom field values are upserted for the
/// account fields present in `custom_fields`, in the same store write as the
/// account columns.
///
/// # Errors
///
/// - `404 User not found`: unknown id
/// - `404` with the validation message: rejected input
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Reply<Account> {
    let id = Uuid::parse_str(&id).map_err(|_| ApiError::UserNotFound)?;

    state
        .accounts
        .find_by_id(id)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    let req = body(payload)?;
    req.validate().map_err(|e| ApiError::Validation {
        message: first_message(&e),
        status: StatusCode::NOT_FOUND,
    })?;

    let fields = state.custom_fields.fields_for_model(ACCOUNT_MODEL).await?;
    let values = extract_values(&fields, &req.custom_fields);

    let account = match state
        .accounts
        .update_profile(id, req.account_changes(), values)
        .await
    {
        Ok(Some(account)) => account,
        Ok(None) => return Err(ApiError::UserNotFound),
        Err(StoreError::Conflict(constraint)) => {
            let message = taken_message(&constraint)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Constraint violation: {}", constraint));
            return Err(ApiError::Validation {
                message,
                status: StatusCode::NOT_FOUND,
            });
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(account_id = %account.id, "Driver profile updated");
    Ok(ok(account, "User updated successfully"))
}

/// Mail a password reset link
///
/// # Errors
///
/// - `422`: email missing or malformed
/// - `401 Reset link not sent`: unknown email or throttled
pub async fn send_reset_link_email(
    State(state): State<AppState>,
    payload: Result<Json<ResetLinkRequest>, JsonRejection>,
) -> Reply<bool> {
    let req = body(payload)?;

    let email = present(req.email)
        .ok_or_else(|| ApiError::unprocessable("The email field is required."))?;
    if !email.validate_email() {
        return Err(ApiError::unprocessable(
            "The email must be a valid email address.",
        ));
    }

    match state.reset_broker.send_reset_link(&email).await? {
        ResetLinkOutcome::Sent => Ok(ok(true, "Reset link was sent successfully")),
        outcome => {
            tracing::debug!(?outcome, "Reset link refused");
            Err(ApiError::ResetLinkNotSent)
        }
    }
}

/// Set a new password for the account owning a phone number
///
/// Possession of the phone is not verified here.
///
/// # Errors
///
/// - `400`: phone or password missing
/// - `404 User not found`: unknown phone
pub async fn sms_password_reset(
    State(state): State<AppState>,
    payload: Result<Json<PhoneResetRequest>, JsonRejection>,
) -> Reply<Account> {
    let req = body(payload)?;

    let (Some(phone), Some(new_password)) = (present(req.phone), present(req.password)) else {
        return Err(ApiError::BadRequest(
            "Please provide phone number and password".to_string(),
        ));
    };

    let account = state
        .accounts
        .find_by_field(AccountField::Phone, &phone)
        .await?
        .ok_or(ApiError::PhoneNotFound)?;

    tracing::warn!(account_id = %account.id, "Password reset by phone");

    let account = state
        .accounts
        .update(
            account.id,
            UpdateAccount {
                password_hash: Some(password::hash_password(&new_password)?),
                ..Default::default()
            },
        )
        .await?
        .ok_or(ApiError::PhoneNotFound)?;

    Ok(ok(account, "Your password has been reset successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_message_is_deterministic() {
        let update = ProfileUpdate {
            name: Some(String::new()),
            email: Some("not-an-email".to_string()),
            ..Default::default()
        };
        let errors = update.validate().unwrap_err();

        assert_eq!(first_message(&errors), "The email must be a valid email address.");
    }

    #[test]
    fn test_profile_update_ignores_credentials() {
        let update: ProfileUpdate = serde_json::from_value(serde_json::json!({
            "name": "Jane",
            "password": "new-password",
            "api_token": "forged"
        }))
        .unwrap();

        let changes = update.account_changes();
        assert_eq!(changes.name.as_deref(), Some("Jane"));
        assert!(changes.password_hash.is_none());
    }

    #[test]
    fn test_taken_message() {
        assert_eq!(taken_message(EMAIL_CONSTRAINT), Some("The email has already been taken."));
        assert_eq!(taken_message(PHONE_CONSTRAINT), Some("The phone has already been taken."));
        assert_eq!(taken_message("other"), None);
    }
}
