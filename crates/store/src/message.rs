//! Message repository: a subscriber's in-app feed and its acknowledgements.

use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use notifeed_common::error::AppError;
use notifeed_common::types::{
    ActionResult, ButtonType, ChannelType, Cta, FeedQuery, Message, MessageActionStatus,
};

const MESSAGE_COLUMNS: &str =
    "id, seen, read, content, channel, feed_identifier, payload, cta, created_at";

/// Service layer over the `messages` table.
pub struct MessageRepository;

impl MessageRepository {
    /// Append the scope and optional feed filters shared by the feed and count queries.
    fn push_scope(
        qb: &mut QueryBuilder<'_, Postgres>,
        environment_id: Uuid,
        subscriber_id: Uuid,
        query: &FeedQuery,
    ) {
        qb.push(" WHERE environment_id = ")
            .push_bind(environment_id)
            .push(" AND subscriber_id = ")
            .push_bind(subscriber_id)
            .push(" AND channel = ")
            .push_bind(ChannelType::InApp.to_string());

        if let Some(feed_identifier) = &query.feed_identifier {
            qb.push(" AND feed_identifier = ")
                .push_bind(feed_identifier.clone());
        }
        if let Some(seen) = query.seen {
            qb.push(" AND seen = ").push_bind(seen);
        }
        if let Some(read) = query.read {
            qb.push(" AND read = ").push_bind(read);
        }
    }

    /// One page of in-app messages, newest first.
    pub async fn get_feed(
        pool: &PgPool,
        environment_id: Uuid,
        subscriber_id: Uuid,
        query: &FeedQuery,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Message>, AppError> {
        let offset = crate::page_offset(page, limit)?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {MESSAGE_COLUMNS} FROM messages"));
        Self::push_scope(&mut qb, environment_id, subscriber_id, query);
        qb.push(" ORDER BY created_at DESC OFFSET ")
            .push_bind(offset)
            .push(" LIMIT ")
            .push_bind(limit);

        let messages: Vec<Message> = qb.build_query_as().fetch_all(pool).await?;
        Ok(messages)
    }

    /// Number of unseen in-app messages, optionally within one feed.
    pub async fn unseen_count(
        pool: &PgPool,
        environment_id: Uuid,
        subscriber_id: Uuid,
        feed_identifier: Option<String>,
    ) -> Result<i64, AppError> {
        let query = FeedQuery {
            feed_identifier,
            seen: Some(false),
            read: None,
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM messages");
        Self::push_scope(&mut qb, environment_id, subscriber_id, &query);

        let count: i64 = qb.build_query_scalar().fetch_one(pool).await?;
        Ok(count)
    }

    /// Mark messages as seen. Ids outside the subscriber's scope are ignored.
    pub async fn mark_as_seen(
        pool: &PgPool,
        environment_id: Uuid,
        subscriber_id: Uuid,
        message_ids: &[Uuid],
    ) -> Result<Vec<Message>, AppError> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }

        let messages: Vec<Message> = sqlx::query_as(&format!(
            r#"
            UPDATE messages
            SET seen = TRUE, last_seen_at = NOW()
            WHERE environment_id = $1 AND subscriber_id = $2 AND id = ANY($3)
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(environment_id)
        .bind(subscriber_id)
        .bind(message_ids)
        .fetch_all(pool)
        .await?;

        tracing::info!(
            environment_id = %environment_id,
            subscriber_id = %subscriber_id,
            marked = messages.len(),
            "Messages marked as seen"
        );

        Ok(messages)
    }

    /// Mark one message as read (and seen).
    pub async fn mark_as_read(
        pool: &PgPool,
        environment_id: Uuid,
        subscriber_id: Uuid,
        message_id: Uuid,
    ) -> Result<Option<Message>, AppError> {
        let message: Option<Message> = sqlx::query_as(&format!(
            r#"
            UPDATE messages
            SET read = TRUE,
                seen = TRUE,
                last_read_at = NOW(),
                last_seen_at = COALESCE(last_seen_at, NOW())
            WHERE environment_id = $1 AND subscriber_id = $2 AND id = $3
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(environment_id)
        .bind(subscriber_id)
        .bind(message_id)
        .fetch_optional(pool)
        .await?;

        if message.is_some() {
            tracing::info!(message_id = %message_id, "Message marked as read");
        }

        Ok(message)
    }

    /// Record a call-to-action press: set the action status and its result.
    pub async fn update_action(
        pool: &PgPool,
        environment_id: Uuid,
        subscriber_id: Uuid,
        message_id: Uuid,
        button_type: ButtonType,
        status: MessageActionStatus,
        payload: serde_json::Value,
    ) -> Result<Option<Message>, AppError> {
        let mut tx = pool.begin().await?;

        let existing: Option<Message> = sqlx::query_as(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS} FROM messages
            WHERE environment_id = $1 AND subscriber_id = $2 AND id = $3
            FOR UPDATE
            "#
        ))
        .bind(environment_id)
        .bind(subscriber_id)
        .bind(message_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(mut message) = existing else {
            return Ok(None);
        };

        let cta = message.cta.get_or_insert_with(Cta::default);
        cta.action.status = status;
        cta.action.result = Some(ActionResult {
            button_type,
            payload,
        });

        sqlx::query("UPDATE messages SET cta = $1 WHERE id = $2")
            .bind(sqlx::types::Json(&*cta))
            .bind(message_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            message_id = %message_id,
            button_type = %button_type,
            status = %status,
            "Message action updated"
        );

        Ok(Some(message))
    }
}
