//! Retail POS Platform - Backend Server

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pos_backend::external::{FileStorage, LocalFileStorage};
use pos_backend::repository::{MemoryStore, PgStore, Store};
use pos_backend::services::AuthService;
use pos_backend::{create_app, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load().context("failed to load configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "pos_server=debug,pos_backend=debug,tower_http=debug,sqlx=warn".into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Retail POS Server");
    tracing::info!("Environment: {}", config.environment);

    let store: Arc<dyn Store> = if config.database.is_memory() {
        tracing::warn!("Using in-memory store; data is lost on restart");
        Arc::new(MemoryStore::new())
    } else {
        tracing::info!("Connecting to database...");
        let db_pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .min_connections(config.database.min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.database.url)
            .await
            .context("failed to connect to database")?;
        tracing::info!("Database connection established");

        if config.database.run_migrations {
            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&db_pool).await?;
            tracing::info!("Migrations completed");
        }

        Arc::new(PgStore::new(db_pool))
    };

    if let Some(admin) = &config.admin {
        AuthService::new(store.clone(), &config.jwt)
            .bootstrap_admin(&admin.username, &admin.email, &admin.password)
            .await
            .context("failed to create bootstrap administrator")?;
    }

    let storage: Arc<dyn FileStorage> = Arc::new(LocalFileStorage::from_config(&config.storage));
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;

    // Build application
    let app = create_app(AppState::new(store, storage, config));

    // Start server
    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
