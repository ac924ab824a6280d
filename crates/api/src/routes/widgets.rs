//! Subscriber-facing widget routes: the in-app message feed and its acknowledgements.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use notifeed_common::error::AppError;
use notifeed_common::types::{ButtonType, FeedQuery, Message, MessageActionStatus, MessageFeedPage};
use notifeed_store::message::MessageRepository;

use crate::state::AppState;

/// Messages per widget feed page.
pub const WIDGET_PAGE_SIZE: i64 = 10;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/widgets/{environment_id}/subscribers/{subscriber_id}/notifications/feed",
            get(get_feed),
        )
        .route(
            "/api/v1/widgets/{environment_id}/subscribers/{subscriber_id}/notifications/unseen",
            get(get_unseen_count),
        )
        .route(
            "/api/v1/widgets/{environment_id}/subscribers/{subscriber_id}/messages/seen",
            post(mark_seen),
        )
        .route(
            "/api/v1/widgets/{environment_id}/subscribers/{subscriber_id}/messages/{message_id}/read",
            post(mark_read),
        )
        .route(
            "/api/v1/widgets/{environment_id}/subscribers/{subscriber_id}/messages/{message_id}/actions/{button_type}",
            post(update_action),
        )
}

#[derive(Debug, Default, Deserialize)]
pub struct WidgetFeedParams {
    pub page: Option<i64>,
    pub feed_identifier: Option<String>,
    pub seen: Option<bool>,
    pub read: Option<bool>,
}

impl WidgetFeedParams {
    pub fn query(&self) -> FeedQuery {
        FeedQuery {
            feed_identifier: self.feed_identifier.clone(),
            seen: self.seen,
            read: self.read,
        }
    }
}

/// GET .../notifications/feed: One page of the subscriber's in-app messages.
async fn get_feed(
    State(state): State<AppState>,
    Path((environment_id, subscriber_id)): Path<(Uuid, Uuid)>,
    Query(params): Query<WidgetFeedParams>,
) -> Result<Json<MessageFeedPage>, AppError> {
    let page = params.page.unwrap_or(0);
    if page < 0 {
        return Err(AppError::Validation("page must not be negative".to_string()));
    }

    let data = MessageRepository::get_feed(
        state.pool(),
        environment_id,
        subscriber_id,
        &params.query(),
        page,
        WIDGET_PAGE_SIZE,
    )
    .await?;

    Ok(Json(MessageFeedPage {
        data,
        page,
        page_size: WIDGET_PAGE_SIZE,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UnseenParams {
    pub feed_identifier: Option<String>,
}

/// GET .../notifications/unseen: Count of unseen in-app messages.
async fn get_unseen_count(
    State(state): State<AppState>,
    Path((environment_id, subscriber_id)): Path<(Uuid, Uuid)>,
    Query(params): Query<UnseenParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let count = MessageRepository::unseen_count(
        state.pool(),
        environment_id,
        subscriber_id,
        params.feed_identifier,
    )
    .await?;
    Ok(Json(json!({ "count": count })))
}

#[derive(Debug, Deserialize)]
pub struct MarkSeenBody {
    pub message_ids: Vec<Uuid>,
}

/// POST .../messages/seen: Mark a batch of messages as seen.
async fn mark_seen(
    State(state): State<AppState>,
    Path((environment_id, subscriber_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<MarkSeenBody>,
) -> Result<Json<Vec<Message>>, AppError> {
    let messages = MessageRepository::mark_as_seen(
        state.pool(),
        environment_id,
        subscriber_id,
        &body.message_ids,
    )
    .await?;
    Ok(Json(messages))
}

/// POST .../messages/:message_id/read: Mark one message as read.
async fn mark_read(
    State(state): State<AppState>,
    Path((environment_id, subscriber_id, message_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<Json<Message>, AppError> {
    MessageRepository::mark_as_read(state.pool(), environment_id, subscriber_id, message_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Message {} not found", message_id)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateActionBody {
    pub status: MessageActionStatus,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// POST .../messages/:message_id/actions/:button_type: Record a call-to-action press.
async fn update_action(
    State(state): State<AppState>,
    Path((environment_id, subscriber_id, message_id, button_type)): Path<(
        Uuid,
        Uuid,
        Uuid,
        String,
    )>,
    Json(body): Json<UpdateActionBody>,
) -> Result<Json<Message>, AppError> {
    let button_type: ButtonType = button_type
        .parse()
        .map_err(|e: notifeed_common::types::ParseEnumError| AppError::Validation(e.to_string()))?;

    MessageRepository::update_action(
        state.pool(),
        environment_id,
        subscriber_id,
        message_id,
        button_type,
        body.status,
        body.payload,
    )
    .await?
    .map(Json)
    .ok_or_else(|| AppError::NotFound(format!("Message {} not found", message_id)))
}
