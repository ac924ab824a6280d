//! Activity feed routes for dashboards.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use notifeed_common::error::AppError;
use notifeed_common::types::{ActivityGraphEntry, FeedItem, Notification, NotificationStats};
use notifeed_store::notification::FeedFilters;
use notifeed_store::page_offset;

use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 50;
const DEFAULT_GRAPH_DAYS: i64 = 30;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/environments/{environment_id}/notifications",
            get(get_feed),
        )
        .route(
            "/api/v1/environments/{environment_id}/notifications/graph/stats",
            get(get_activity_graph),
        )
        .route(
            "/api/v1/environments/{environment_id}/notifications/stats",
            get(get_stats),
        )
        .route(
            "/api/v1/organizations/{organization_id}/environments/{environment_id}/notifications/{id}",
            get(get_feed_item),
        )
        .route(
            "/api/v1/environments/{environment_id}/subscribers/{subscriber_id}/notifications",
            get(list_by_subscriber),
        )
}

/// Query string of the activity feed. List fields are comma separated.
#[derive(Debug, Default, Deserialize)]
pub struct FeedParams {
    pub channels: Option<String>,
    pub templates: Option<String>,
    pub subscriber_ids: Option<String>,
    pub transaction_id: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl FeedParams {
    pub fn filters(&self) -> Result<FeedFilters, AppError> {
        Ok(FeedFilters {
            channels: parse_list(self.channels.as_deref(), "channel")?,
            template_ids: parse_list(self.templates.as_deref(), "template id")?,
            subscriber_ids: parse_list(self.subscriber_ids.as_deref(), "subscriber id")?,
            transaction_id: self
                .transaction_id
                .as_ref()
                .filter(|t| !t.is_empty())
                .cloned(),
        })
    }

    /// `(page, limit, offset)` after defaults and bounds checks. The end of
    /// the page, `offset + limit`, is guaranteed to fit in an `i64`.
    pub fn paging(&self) -> Result<(i64, i64, i64), AppError> {
        let page = self.page.unwrap_or(0);
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        let offset = page_offset(page, limit)?;
        if offset.checked_add(limit).is_none() {
            return Err(AppError::Validation(format!("page {} is out of range", page)));
        }
        Ok((page, limit, offset))
    }
}

/// Parse a comma separated list. Blank input means "no filter".
fn parse_list<T: std::str::FromStr>(raw: Option<&str>, what: &str) -> Result<Option<Vec<T>>, AppError> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    let items = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<T>()
                .map_err(|_| AppError::Validation(format!("Invalid {} '{}'", what, s)))
        })
        .collect::<Result<Vec<T>, AppError>>()?;

    Ok(if items.is_empty() { None } else { Some(items) })
}

#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub total_count: i64,
    pub page: i64,
    pub page_size: i64,
    pub has_more: bool,
    pub data: Vec<FeedItem>,
}

/// GET /api/v1/environments/:environment_id/notifications: Filtered activity feed.
async fn get_feed(
    State(state): State<AppState>,
    Path(environment_id): Path<Uuid>,
    Query(params): Query<FeedParams>,
) -> Result<Json<FeedResponse>, AppError> {
    let filters = params.filters()?;
    let (page, limit, offset) = params.paging()?;

    let feed = state
        .notifications
        .get_feed(environment_id, &filters, offset, limit)
        .await?;

    Ok(Json(FeedResponse {
        has_more: offset + limit < feed.total_count,
        total_count: feed.total_count,
        page,
        page_size: limit,
        data: feed.data,
    }))
}

/// GET /api/v1/organizations/:organization_id/environments/:environment_id/notifications/:id
async fn get_feed_item(
    State(state): State<AppState>,
    Path((organization_id, environment_id, id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<Json<FeedItem>, AppError> {
    state
        .notifications
        .get_feed_item(id, environment_id, organization_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))
}

#[derive(Debug, Deserialize)]
pub struct GraphParams {
    pub days: Option<i64>,
}

/// GET /api/v1/environments/:environment_id/notifications/graph/stats: Daily activity.
async fn get_activity_graph(
    State(state): State<AppState>,
    Path(environment_id): Path<Uuid>,
    Query(params): Query<GraphParams>,
) -> Result<Json<Vec<ActivityGraphEntry>>, AppError> {
    let days = params.days.unwrap_or(DEFAULT_GRAPH_DAYS);
    if !(1..=366).contains(&days) {
        return Err(AppError::Validation(
            "days must be between 1 and 366".to_string(),
        ));
    }

    let since = Utc::now() - Duration::days(days);
    let graph = state
        .notifications
        .get_activity_graph_stats(since, environment_id)
        .await?;
    Ok(Json(graph))
}

/// GET /api/v1/environments/:environment_id/notifications/stats: Rolling-window counts.
async fn get_stats(
    State(mut state): State<AppState>,
    Path(environment_id): Path<Uuid>,
) -> Result<Json<NotificationStats>, AppError> {
    let stats = state
        .stats_cache
        .get_or_load(&mut state.redis, &state.notifications, environment_id)
        .await?;
    Ok(Json(stats))
}

/// GET /api/v1/environments/:environment_id/subscribers/:subscriber_id/notifications
async fn list_by_subscriber(
    State(state): State<AppState>,
    Path((environment_id, subscriber_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let notifications = state
        .notifications
        .find_by_subscriber_id(environment_id, subscriber_id)
        .await?;
    Ok(Json(notifications))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notifeed_common::types::ChannelType;

    #[test]
    fn test_parse_channels_list() {
        let params = FeedParams {
            channels: Some("email, sms,,".to_string()),
            ..Default::default()
        };
        let filters = params.filters().unwrap();
        assert_eq!(
            filters.channels,
            Some(vec![ChannelType::Email, ChannelType::Sms])
        );
        assert!(filters.template_ids.is_none());
    }

    #[test]
    fn test_blank_lists_are_absent() {
        let params = FeedParams {
            channels: Some(" , ".to_string()),
            templates: Some(String::new()),
            transaction_id: Some(String::new()),
            ..Default::default()
        };
        let filters = params.filters().unwrap();
        assert!(filters.channels.is_none());
        assert!(filters.template_ids.is_none());
        assert!(filters.transaction_id.is_none());
    }

    #[test]
    fn test_invalid_uuid_rejected() {
        let params = FeedParams {
            subscriber_ids: Some("not-a-uuid".to_string()),
            ..Default::default()
        };
        assert!(matches!(params.filters(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_paging_defaults_and_bounds() {
        assert_eq!(FeedParams::default().paging().unwrap(), (0, 10, 0));

        let too_big = FeedParams {
            limit: Some(500),
            ..Default::default()
        };
        assert!(too_big.paging().is_err());

        let negative = FeedParams {
            page: Some(-1),
            ..Default::default()
        };
        assert!(negative.paging().is_err());
    }

    #[test]
    fn test_paging_rejects_offset_overflow() {
        let third = FeedParams {
            page: Some(2),
            limit: Some(25),
            ..Default::default()
        };
        assert_eq!(third.paging().unwrap(), (2, 25, 50));

        let huge = FeedParams {
            page: Some(i64::MAX),
            limit: Some(10),
            ..Default::default()
        };
        assert!(matches!(huge.paging(), Err(AppError::Validation(_))));

        // Offset fits but the end of the page would not
        let edge = FeedParams {
            page: Some(i64::MAX / 10),
            limit: Some(10),
            ..Default::default()
        };
        assert!(matches!(edge.paging(), Err(AppError::Validation(_))));
    }
}
