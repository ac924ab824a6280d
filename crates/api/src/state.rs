//! Shared application state for the Axum API server.

use notifeed_common::config::AppConfig;
use notifeed_common::db::DbPools;
use notifeed_store::notification::NotificationRepository;
use notifeed_store::stats_cache::StatsCache;
use redis::aio::ConnectionManager;
use sqlx::PgPool;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub pools: DbPools,
    pub redis: ConnectionManager,
    pub config: AppConfig,
    pub notifications: NotificationRepository,
    pub stats_cache: StatsCache,
}

impl AppState {
    pub fn new(pools: DbPools, redis: ConnectionManager, config: AppConfig) -> Self {
        Self {
            notifications: NotificationRepository::new(pools.clone()),
            stats_cache: StatsCache::new(config.stats_cache_ttl_seconds),
            pools,
            redis,
            config,
        }
    }

    /// Pool for writes and for reads that must see them.
    pub fn pool(&self) -> &PgPool {
        self.pools.primary()
    }
}
