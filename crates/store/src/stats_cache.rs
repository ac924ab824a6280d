//! Stats cache: Redis-backed TTL cache for environment stats.
//!
//! The stats aggregation scans a year of notifications, so dashboards polling it
//! are served from Redis for `ttl_seconds`. Redis failures never fail the
//! request: they are logged and the value is computed from the database.

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use uuid::Uuid;

use notifeed_common::error::AppError;
use notifeed_common::types::NotificationStats;

use crate::notification::NotificationRepository;

/// Read-through cache for `NotificationRepository::get_stats`.
#[derive(Debug, Clone)]
pub struct StatsCache {
    ttl_seconds: u64,
}

impl StatsCache {
    pub fn new(ttl_seconds: u64) -> Self {
        Self { ttl_seconds }
    }

    pub fn key(environment_id: Uuid) -> String {
        format!("notifications:stats:{}", environment_id)
    }

    /// Return cached stats for the environment, loading and caching them on a miss.
    pub async fn get_or_load(
        &self,
        redis: &mut ConnectionManager,
        repository: &NotificationRepository,
        environment_id: Uuid,
    ) -> Result<NotificationStats, AppError> {
        let key = Self::key(environment_id);

        match redis.get::<_, Option<String>>(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<NotificationStats>(&raw) {
                Ok(stats) => {
                    tracing::debug!(environment_id = %environment_id, "Stats cache hit");
                    return Ok(stats);
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Discarding unreadable cached stats");
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Stats cache read failed");
            }
        }

        let stats = repository.get_stats(environment_id).await?;

        let raw = serde_json::to_string(&stats)?;
        if let Err(e) = redis.set_ex::<_, _, ()>(&key, raw, self.ttl_seconds).await {
            tracing::warn!(key = %key, error = %e, "Stats cache write failed");
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_scoped_by_environment() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(StatsCache::key(a), format!("notifications:stats:{}", a));
        assert_ne!(StatsCache::key(a), StatsCache::key(b));
    }
}
