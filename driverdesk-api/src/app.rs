/// Application state and router builder
///
/// `AppState` holds every collaborator the handlers talk to, each behind
/// its trait, so the same router runs against Postgres + Redis or against
/// the in-memory store.
///
/// # Example
///
/// ```
/// use driverdesk_api::app::{build_router, AppState};
/// use driverdesk_api::config::{AccountsConfig, ApiConfig};
/// use driverdesk_shared::events::event_bus;
/// use driverdesk_shared::mail::LogEmailSender;
/// use driverdesk_shared::store::memory::MemoryStore;
/// use std::sync::Arc;
///
/// let (events, _receiver) = event_bus();
/// let state = AppState::in_memory(
///     MemoryStore::new(),
///     Arc::new(events),
///     Arc::new(LogEmailSender),
///     AccountsConfig::default(),
/// );
///
/// let api = ApiConfig {
///     host: "127.0.0.1".to_string(),
///     port: 8080,
///     cors_origins: vec!["*".to_string()],
/// };
/// let app = build_router(state, &api);
/// ```

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use driverdesk_shared::{
    auth::session::SessionGuard,
    events::EventSink,
    mail::EmailSender,
    media::{http::HttpMediaStore, MediaStore},
    redis::RedisSessionStore,
    reset::{PasswordResetBroker, TokenResetBroker},
    store::{
        memory::MemoryStore, postgres::PgStore, AccountStore, CustomFieldStore, ResetTokenStore,
        RoleStore, SessionStore, SettingsStore,
    },
};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::{AccountsConfig, ApiConfig};
use crate::routes;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AccountsConfig>,
    pub accounts: Arc<dyn AccountStore>,
    pub roles: Arc<dyn RoleStore>,
    pub custom_fields: Arc<dyn CustomFieldStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub media: Arc<dyn MediaStore>,
    pub events: Arc<dyn EventSink>,
    pub reset_broker: Arc<dyn PasswordResetBroker>,
    pub guard: SessionGuard,
}

impl AppState {
    /// State backed entirely by one in-memory store
    pub fn in_memory(
        store: MemoryStore,
        events: Arc<dyn EventSink>,
        mail: Arc<dyn EmailSender>,
        config: AccountsConfig,
    ) -> Self {
        let media: Arc<dyn MediaStore> = Arc::new(store.clone());
        let sessions: Arc<dyn SessionStore> = Arc::new(store.clone());
        Self::assemble(store, sessions, media, events, mail, config)
    }

    /// Production state: Postgres records, Redis sessions, HTTP media
    pub fn postgres(
        store: PgStore,
        sessions: RedisSessionStore,
        media: HttpMediaStore,
        events: Arc<dyn EventSink>,
        mail: Arc<dyn EmailSender>,
        config: AccountsConfig,
    ) -> Self {
        Self::assemble(store, Arc::new(sessions), Arc::new(media), events, mail, config)
    }

    fn assemble<S>(
        store: S,
        sessions: Arc<dyn SessionStore>,
        media: Arc<dyn MediaStore>,
        events: Arc<dyn EventSink>,
        mail: Arc<dyn EmailSender>,
        config: AccountsConfig,
    ) -> Self
    where
        S: AccountStore + RoleStore + CustomFieldStore + SettingsStore + ResetTokenStore + 'static,
    {
        let store = Arc::new(store);
        let accounts: Arc<dyn AccountStore> = store.clone();

        let reset_broker = TokenResetBroker::new(
            accounts.clone(),
            store.clone(),
            mail,
            config.reset_url_base.clone(),
            config.reset_throttle,
        );
        let guard = SessionGuard::new(accounts.clone(), sessions, config.session_ttl);

        Self {
            accounts,
            roles: store.clone(),
            custom_fields: store.clone(),
            settings: store,
            media,
            events,
            reset_broker: Arc::new(reset_broker),
            guard,
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /
/// ├── GET  /health
/// └── /api/driver/
///     ├── POST /login
///     ├── POST /register
///     ├── POST /logout
///     ├── GET  /user?api_token=
///     ├── GET  /settings
///     ├── POST /users/:id
///     ├── POST /send_reset_link_email
///     └── POST /sms_password_reset        (when enabled)
/// ```
pub fn build_router(state: AppState, api: &ApiConfig) -> Router {
    let mut driver_routes = Router::new()
        .route("/login", post(routes::drivers::login))
        .route("/register", post(routes::drivers::register))
        .route("/logout", post(routes::drivers::logout))
        .route("/user", get(routes::drivers::user))
        .route("/settings", get(routes::drivers::settings))
        .route("/users/:id", post(routes::drivers::update))
        .route("/send_reset_link_email", post(routes::drivers::send_reset_link_email));

    if state.config.sms_password_reset_enabled {
        driver_routes =
            driver_routes.route("/sms_password_reset", post(routes::drivers::sms_password_reset));
    }

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api/driver", driver_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&api.cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600))
}
