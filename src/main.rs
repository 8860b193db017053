use passline::{
    clock::SystemClock,
    config::{
        session::{validate_production_config, SessionConfig, SESSION_TABLE},
        AppConfig,
    },
    db, routes, services, AppState,
};

use anyhow::Context;
use std::{net::SocketAddr, sync::Arc};
use tower_sessions_sqlx_store::SqliteStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "passline=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    validate_production_config().context("invalid production configuration")?;

    // Database connection
    let pool = db::create_pool(&config.database_url)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;

    // Run migrations
    db::run_migrations(&pool).await?;

    let email_service = services::create_email_service();
    let app_state = AppState::new(
        pool.clone(),
        config.magic_link.clone(),
        email_service,
        Arc::new(SystemClock),
    );

    // Session store
    let session_store = SqliteStore::new(pool.clone())
        .with_table_name(SESSION_TABLE)
        .map_err(|e| anyhow::anyhow!("invalid session table name: {}", e))?;
    session_store.migrate().await?;

    let session_layer = SessionConfig::from_env().create_layer(session_store);

    let app = routes::build_router(app_state, session_layer);

    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));

    tracing::info!(
        environment = %config.environment,
        ttl_minutes = config.magic_link.token_lifetime_minutes(),
        "Server running on http://{}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
