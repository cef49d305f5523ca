/// Account roles and role assignment
///
/// Roles are stored one row per (account, role) pair and surfaced on the
/// account record as a sorted list of role names.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE account_roles (
///     account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
///     role TEXT NOT NULL,
///     assigned_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (account_id, role)
/// );
/// ```

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Role catalogue of the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Back-office administrator
    Admin,

    /// Fleet or restaurant manager
    Manager,

    /// End customer placing bookings
    Client,

    /// Driver fulfilling bookings; required by every driver endpoint
    Driver,
}

impl Role {
    /// Role name as stored in `account_roles.role`
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Client => "client",
            Role::Driver => "driver",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "client" => Ok(Role::Client),
            "driver" => Ok(Role::Driver),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Assigns a role to an account
///
/// Assigning a role the account already holds is a no-op.
pub async fn assign_role(pool: &PgPool, account_id: Uuid, role: Role) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO account_roles (account_id, role)
        VALUES ($1, $2)
        ON CONFLICT (account_id, role) DO NOTHING
        "#,
    )
    .bind(account_id)
    .bind(role.as_str())
    .execute(pool)
    .await?;

    Ok(())
}

/// Checks whether an account holds a role
pub async fn has_role(pool: &PgPool, account_id: Uuid, role: Role) -> Result<bool, sqlx::Error> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM account_roles
            WHERE account_id = $1 AND role = $2
        )
        "#,
    )
    .bind(account_id)
    .bind(role.as_str())
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_names_round_trip() {
        for role in [Role::Admin, Role::Manager, Role::Client, Role::Driver] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert!("dispatcher".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Driver).unwrap();
        assert_eq!(json, "\"driver\"");
    }
}
