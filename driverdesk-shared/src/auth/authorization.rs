/// Role checks
///
/// Driver endpoints only serve accounts holding [`Role::Driver`]. The check
/// goes to the role store rather than trusting the role list on a loaded
/// account, so a role revoked in the back office takes effect immediately.
///
/// # Example
///
/// ```no_run
/// use driverdesk_shared::auth::authorization::require_role;
/// use driverdesk_shared::models::Role;
/// use driverdesk_shared::store::RoleStore;
/// use uuid::Uuid;
///
/// # async fn example(roles: &dyn RoleStore, account_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// require_role(roles, account_id, Role::Driver).await?;
/// # Ok(())
/// # }
/// ```

use uuid::Uuid;

use crate::models::Role;
use crate::store::{RoleStore, StoreError};

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// Account does not hold the role
    #[error("Account {account_id} lacks role {required}")]
    MissingRole { account_id: Uuid, required: Role },

    /// Role lookup failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fails with `AuthzError::MissingRole` unless the account holds `required`
pub async fn require_role(
    roles: &dyn RoleStore,
    account_id: Uuid,
    required: Role,
) -> Result<(), AuthzError> {
    if roles.has_role(account_id, required).await? {
        Ok(())
    } else {
        Err(AuthzError::MissingRole {
            account_id,
            required,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateAccount;
    use crate::store::memory::MemoryStore;
    use crate::store::AccountStore;

    async fn account(store: &MemoryStore) -> Uuid {
        store
            .create(CreateAccount {
                name: "Driver".to_string(),
                email: None,
                phone: None,
                password_hash: "hash".to_string(),
                device_token: String::new(),
                api_token: "token".to_string(),
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_require_role_passes_for_holder() {
        let store = MemoryStore::new();
        let id = account(&store).await;
        store.assign_role(id, Role::Driver).await.unwrap();

        assert!(require_role(&store, id, Role::Driver).await.is_ok());
    }

    #[tokio::test]
    async fn test_require_role_rejects_other_roles() {
        let store = MemoryStore::new();
        let id = account(&store).await;
        store.assign_role(id, Role::Client).await.unwrap();

        let err = require_role(&store, id, Role::Driver).await.unwrap_err();
        assert!(matches!(
            err,
            AuthzError::MissingRole { required: Role::Driver, .. }
        ));
    }
}
