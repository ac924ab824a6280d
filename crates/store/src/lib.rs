//! Persistence for notifications and in-app messages.
//!
//! - [`notification::NotificationRepository`]: activity feed queries with
//!   subscriber/template/job population, plus the daily and rolling-window
//!   aggregations.
//! - [`message::MessageRepository`]: the subscriber-facing message feed and its
//!   seen/read/action mutations.
//! - [`stats_cache::StatsCache`]: Redis TTL cache in front of environment stats.

pub mod message;
pub mod notification;
pub mod stats;
pub mod stats_cache;

use notifeed_common::error::AppError;

/// Row offset of zero-based `page` at `limit` rows per page.
///
/// Rejects negative pages and pages whose offset does not fit in an `i64`.
pub fn page_offset(page: i64, limit: i64) -> Result<i64, AppError> {
    if page < 0 {
        return Err(AppError::Validation("page must not be negative".to_string()));
    }
    page.checked_mul(limit)
        .ok_or_else(|| AppError::Validation(format!("page {} is out of range", page)))
}
