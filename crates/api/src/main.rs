//! Notifeed API server binary entrypoint.

use std::net::SocketAddr;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use notifeed_common::config::AppConfig;
use notifeed_common::db::DbPools;
use notifeed_common::redis_pool::create_redis_pool;

use notifeed_api::routes::create_router;
use notifeed_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first so LOG_FORMAT can pick the formatter
    let config = AppConfig::from_env()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("notifeed_api=debug,notifeed_store=debug,tower_http=debug")
    });
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!("Starting Notifeed API server...");

    // Create database connection pools
    let pools = DbPools::connect(
        &config.database_url,
        config.database_read_url.as_deref(),
        config.db_max_connections,
    )
    .await?;
    sqlx::migrate!("../../migrations").run(pools.primary()).await?;
    tracing::info!("Database pools created and migrated");

    // Create Redis connection
    let redis = create_redis_pool(&config.redis_url).await?;
    tracing::info!("Redis connection established");

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));

    // Build application state
    let state = AppState::new(pools, redis, config);

    // Build router
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
