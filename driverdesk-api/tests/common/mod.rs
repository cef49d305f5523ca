/// Common test utilities for integration tests
///
/// This module provides shared infrastructure for integration tests:
/// - An in-memory application with a recording mail sender
/// - Driver and non-driver account seeding
/// - Request helpers returning the decoded envelope

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use driverdesk_api::app::{build_router, AppState};
use driverdesk_api::config::{AccountsConfig, ApiConfig};
use driverdesk_shared::auth::api_token::generate_api_token;
use driverdesk_shared::auth::password::hash_password;
use driverdesk_shared::auth::session::SessionGuard;
use driverdesk_shared::events::{event_bus, AccountEvent};
use driverdesk_shared::mail::{EmailMessage, EmailSender, MailError};
use driverdesk_shared::models::{Account, CreateAccount, Role};
use driverdesk_shared::reset::TokenResetBroker;
use driverdesk_shared::store::memory::MemoryStore;
use driverdesk_shared::store::{AccountStore, RoleStore};
use serde_json::Value as JsonValue;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tower::Service as _;

pub const PASSWORD: &str = "correct horse battery staple";

/// Mail sender that keeps every message
#[derive(Default)]
pub struct Outbox {
    pub sent: Mutex<Vec<EmailMessage>>,
}

impl Outbox {
    pub fn messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for Outbox {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Test context containing all necessary resources
pub struct TestContext {
    pub store: MemoryStore,
    pub app: axum::Router,
    pub outbox: Arc<Outbox>,
    pub events: UnboundedReceiver<AccountEvent>,
}

impl TestContext {
    /// Application over a fresh in-memory store with default settings
    pub fn new() -> Self {
        Self::with_config(AccountsConfig::default())
    }

    pub fn with_config(config: AccountsConfig) -> Self {
        let store = MemoryStore::new();
        let outbox = Arc::new(Outbox::default());
        let (sink, events) = event_bus();

        let state = AppState::in_memory(store.clone(), Arc::new(sink), outbox.clone(), config);
        Self::assemble(store, state, outbox, events)
    }

    /// Application whose account writes go through `wrap(store)`
    ///
    /// Every other collaborator is the shared in-memory store.
    pub fn with_accounts<F>(wrap: F) -> Self
    where
        F: FnOnce(MemoryStore) -> Arc<dyn AccountStore>,
    {
        let store = MemoryStore::new();
        let outbox = Arc::new(Outbox::default());
        let (sink, events) = event_bus();
        let config = AccountsConfig::default();
        let accounts = wrap(store.clone());

        let state = AppState {
            accounts: accounts.clone(),
            roles: Arc::new(store.clone()),
            custom_fields: Arc::new(store.clone()),
            settings: Arc::new(store.clone()),
            media: Arc::new(store.clone()),
            events: Arc::new(sink),
            reset_broker: Arc::new(TokenResetBroker::new(
                accounts.clone(),
                Arc::new(store.clone()),
                outbox.clone(),
                config.reset_url_base.clone(),
                config.reset_throttle,
            )),
            guard: SessionGuard::new(accounts, Arc::new(store.clone()), config.session_ttl),
            config: Arc::new(config),
        };
        Self::assemble(store, state, outbox, events)
    }

    fn assemble(
        store: MemoryStore,
        state: AppState,
        outbox: Arc<Outbox>,
        events: UnboundedReceiver<AccountEvent>,
    ) -> Self {
        let api = ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
        };

        Self {
            store,
            app: build_router(state, &api),
            outbox,
            events,
        }
    }

    /// Seeds an account holding `roles`, with [`PASSWORD`] as its password
    pub async fn seed_account(&self, name: &str, email: &str, phone: &str, roles: &[Role]) -> Account {
        let account = self
            .store
            .create(CreateAccount {
                name: name.to_string(),
                email: Some(email.to_string()),
                phone: Some(phone.to_string()),
                password_hash: hash_password(PASSWORD).unwrap(),
                device_token: String::new(),
                api_token: generate_api_token(),
            })
            .await
            .unwrap();

        for role in roles {
            self.store.assign_role(account.id, *role).await.unwrap();
        }

        self.store.find_by_id(account.id).await.unwrap().unwrap()
    }

    pub async fn seed_driver(&self) -> Account {
        self.seed_account("Jane Driver", "jane@example.com", "+15550100", &[Role::Driver])
            .await
    }

    /// Sends a request and decodes the JSON body
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, JsonValue) {
        let response = self.app.clone().call(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let json = if body.is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_slice(&body).unwrap_or_else(|_| {
                panic!("Non-JSON body ({}): {}", status, String::from_utf8_lossy(&body))
            })
        };
        (status, json)
    }

    pub async fn post_json(&self, uri: &str, body: JsonValue) -> (StatusCode, JsonValue) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, JsonValue) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }
}

/// Polls `check` until it returns true or the timeout elapses
pub async fn wait_for<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..50 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
