/// Redis-backed session store
///
/// One key per account, `session:{account_id}`, expiring with the session
/// TTL. Closing a session deletes the key; a missing key means there was no
/// live session.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;
use uuid::Uuid;

use crate::redis::client::RedisClient;
use crate::store::{SessionStore, StoreResult};

/// Session key of an account
pub fn session_key(account_id: Uuid) -> String {
    format!("session:{}", account_id)
}

#[derive(Clone)]
pub struct RedisSessionStore {
    client: RedisClient,
}

impl RedisSessionStore {
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn open(&self, account_id: Uuid, ttl: Duration) -> StoreResult<()> {
        let mut conn = self.client.connection();
        let opened_at = chrono::Utc::now().to_rfc3339();

        let _: () = conn
            .set_ex(session_key(account_id), opened_at, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn close(&self, account_id: Uuid) -> StoreResult<bool> {
        let mut conn = self.client.connection();
        let removed: u64 = conn.del(session_key(account_id)).await?;
        Ok(removed > 0)
    }
}
