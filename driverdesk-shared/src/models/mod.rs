/// Database models for DriverDesk
///
/// # Models
///
/// - `account`: Driver accounts and credentials
/// - `role`: Role catalogue and role assignment
/// - `custom_field`: Schema-defined account attributes and their values
/// - `media`: Stored media (avatars)
/// - `setting`: Application settings
/// - `password_reset`: Email password reset tokens
///
/// Each model exposes its Postgres operations as associated functions taking
/// a `&PgPool`; the store layer wraps them behind collaborator traits.

pub mod account;
pub mod custom_field;
pub mod media;
pub mod password_reset;
pub mod role;
pub mod setting;

pub use account::{Account, AccountField, CreateAccount, UpdateAccount};
pub use custom_field::{CustomField, CustomFieldValue, NewCustomFieldValue};
pub use media::Media;
pub use role::Role;
