/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and verification
/// - [`api_token`]: Opaque API token and reset token generation
/// - [`session`]: Credential verification and session tracking
/// - [`authorization`]: Role checks
///
/// # Example
///
/// ```
/// use driverdesk_shared::auth::api_token::generate_api_token;
/// use driverdesk_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("driver_password")?;
/// assert!(verify_password("driver_password", &hash)?);
///
/// let token = generate_api_token();
/// assert_eq!(token.len(), 60);
/// # Ok(())
/// # }
/// ```

pub mod api_token;
pub mod authorization;
pub mod password;
pub mod session;
