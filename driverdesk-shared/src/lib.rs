//! # DriverDesk Shared Library
//!
//! Domain types, persistence and integrations behind the DriverDesk driver
//! account API.
//!
//! ## Module Organization
//!
//! - `models`: Database models and table access
//! - `store`: Collaborator traits with Postgres and in-memory implementations
//! - `auth`: Password hashing, API tokens, session guard, role checks
//! - `db`: Connection pool and migrations
//! - `redis`: Redis client, sessions and the account event stream
//! - `events`: Account events and the outbound event bus
//! - `media`: Avatar provisioning and media storage
//! - `mail`: Outgoing email
//! - `reset`: Password reset links by email

pub mod auth;
pub mod db;
pub mod events;
pub mod mail;
pub mod media;
pub mod models;
pub mod redis;
pub mod reset;
pub mod store;

/// Current version of the DriverDesk shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
