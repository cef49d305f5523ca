/// Opaque API tokens and random identifiers
///
/// Driver apps authenticate follow-up calls with a 60 character base62 token
/// minted at registration. Uniqueness is enforced by the store; the token
/// space (62^60) makes collisions a non-event, but the registration flow
/// still retries on a conflicting token.
///
/// The same generator backs password reset tokens, whose SHA-256 digest is
/// what gets persisted.
///
/// # Example
///
/// ```
/// use driverdesk_shared::auth::api_token::{generate_api_token, is_well_formed, API_TOKEN_LENGTH};
///
/// let token = generate_api_token();
/// assert_eq!(token.len(), API_TOKEN_LENGTH);
/// assert!(is_well_formed(&token));
/// ```

use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of an API token
pub const API_TOKEN_LENGTH: usize = 60;

/// Length of a password reset token
pub const RESET_TOKEN_LENGTH: usize = 64;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Mints a new API token
pub fn generate_api_token() -> String {
    random_string(API_TOKEN_LENGTH)
}

/// Mints a new password reset token
pub fn generate_reset_token() -> String {
    random_string(RESET_TOKEN_LENGTH)
}

/// Random base62 string of `length` characters
pub fn random_string(length: usize) -> String {
    let mut rng = rand::thread_rng();

    (0..length)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

/// Hex-encoded SHA-256 digest of a token
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Checks length and alphabet of an API token
///
/// Lets lookups skip the store for values that could never match.
pub fn is_well_formed(token: &str) -> bool {
    token.len() == API_TOKEN_LENGTH && token.bytes().all(|b| b.is_ascii_alphanumeric())
}
