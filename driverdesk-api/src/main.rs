//! # DriverDesk API Server
//!
//! Serves the driver account endpoints under `/api/driver`.
//!
//! ## Storage
//!
//! - `STORAGE_BACKEND=postgres` (default): accounts in Postgres, sessions
//!   and account events in Redis, avatars downloaded to `MEDIA_ROOT`
//! - `STORAGE_BACKEND=memory`: everything in process, events only logged
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/driverdesk REDIS_URL=redis://localhost:6379 \
//!     cargo run -p driverdesk-api
//! ```

use anyhow::Context;
use driverdesk_api::{
    app::{build_router, AppState},
    config::{Config, StorageBackend},
};
use driverdesk_shared::{
    db::{
        migrations::run_migrations,
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    events::{event_bus, run_dispatcher, EventPublisher, LogPublisher},
    mail::{EmailSender, HttpEmailSender, LogEmailSender},
    media::http::HttpMediaStore,
    redis::{RedisClient, RedisConfig, RedisSessionStore, StreamWriter},
    store::{memory::MemoryStore, postgres::PgStore},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!(
        "DriverDesk API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;

    let mail: Arc<dyn EmailSender> = match &config.accounts.mail_api_url {
        Some(endpoint) => Arc::new(HttpEmailSender::new(endpoint.clone())?),
        None => {
            tracing::warn!("MAIL_API_URL not set, outgoing emails will only be logged");
            Arc::new(LogEmailSender)
        }
    };

    let (events, receiver) = event_bus();
    let events = Arc::new(events);

    let (state, publisher, pool) = match config.storage.backend {
        StorageBackend::Postgres => {
            let database_url = config
                .storage
                .database_url
                .clone()
                .context("DATABASE_URL environment variable is required")?;
            let redis_url = config
                .storage
                .redis_url
                .clone()
                .context("REDIS_URL environment variable is required")?;

            let pool = create_pool(DatabaseConfig {
                url: database_url,
                max_connections: config.storage.max_connections,
                ..Default::default()
            })
            .await?;
            run_migrations(&pool).await?;

            let redis = RedisClient::new(RedisConfig::new(redis_url)).await?;
            let media = HttpMediaStore::new(pool.clone(), config.accounts.media_root.clone())?;

            let state = AppState::postgres(
                PgStore::new(pool.clone()),
                RedisSessionStore::new(redis.clone()),
                media,
                events,
                mail,
                config.accounts.clone(),
            );
            let publisher: Arc<dyn EventPublisher> = Arc::new(StreamWriter::new(redis));
            (state, publisher, Some(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, all data is lost on shutdown");
            let state = AppState::in_memory(
                MemoryStore::new(),
                events,
                mail,
                config.accounts.clone(),
            );
            let publisher: Arc<dyn EventPublisher> = Arc::new(LogPublisher);
            (state, publisher, None)
        }
    };

    let shutdown = CancellationToken::new();
    let dispatcher = tokio::spawn(run_dispatcher(receiver, publisher, shutdown.clone()));

    let app = build_router(state, &config.api);
    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!("Server listening on http://{}", config.bind_address());

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received, draining...");
        })
        .await?;

    shutdown.cancel();
    if let Err(e) = dispatcher.await {
        tracing::error!(error = %e, "Event dispatcher panicked");
    }
    if let Some(pool) = pool {
        close_pool(pool).await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// `LOG_FORMAT=json` switches to JSON lines
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "driverdesk_api=debug,driverdesk_shared=debug,tower_http=debug".into()
    });

    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
