//! Notification repository: activity feed queries and aggregations.
//!
//! Every query is scoped by `environment_id`. Feed reads prefer the read
//! replica when one is configured.
//!
//! Population follows the reference layout of the schema: a page of
//! notifications is fetched first, then subscribers, templates, jobs, steps
//! and execution details are loaded in one batched query each and stitched
//! onto the page in memory.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use notifeed_common::db::{DbPools, ReadPreference};
use notifeed_common::error::AppError;
use notifeed_common::types::{
    ActivityGraphEntry, ChannelType, ExecutionDetail, FeedItem, FeedPage, Job, Notification,
    NotificationStats, PopulatedJob, StepSummary, SubscriberSummary, TemplateSummary,
    parse_channels,
};

use crate::stats::StatsWindow;

/// Optional filters for the activity feed. `None` and empty lists are not filtered on.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedFilters {
    pub channels: Option<Vec<ChannelType>>,
    pub template_ids: Option<Vec<Uuid>>,
    pub subscriber_ids: Option<Vec<Uuid>>,
    pub transaction_id: Option<String>,
}

impl FeedFilters {
    /// Append the `WHERE` clause for these filters.
    fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>, environment_id: Uuid) {
        qb.push(" WHERE environment_id = ").push_bind(environment_id);

        if let Some(channels) = self.channels.as_ref().filter(|c| !c.is_empty()) {
            let channels: Vec<String> = channels.iter().map(|c| c.to_string()).collect();
            qb.push(" AND channels && ")
                .push_bind(channels)
                .push("::text[]");
        }

        if let Some(ids) = self.template_ids.as_ref().filter(|ids| !ids.is_empty()) {
            qb.push(" AND template_id = ANY(")
                .push_bind(ids.clone())
                .push(")");
        }

        if let Some(ids) = self.subscriber_ids.as_ref().filter(|ids| !ids.is_empty()) {
            qb.push(" AND subscriber_id = ANY(")
                .push_bind(ids.clone())
                .push(")");
        }

        if let Some(transaction_id) = &self.transaction_id {
            qb.push(" AND transaction_id = ")
                .push_bind(transaction_id.clone());
        }
    }
}

/// Repository over the `notifications` table and its related tables.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pools: DbPools,
}

impl NotificationRepository {
    pub fn new(pools: DbPools) -> Self {
        Self { pools }
    }

    /// All notifications of one subscriber in one environment, newest first.
    pub async fn find_by_subscriber_id(
        &self,
        environment_id: Uuid,
        subscriber_id: Uuid,
    ) -> Result<Vec<Notification>, AppError> {
        let rows: Vec<Notification> = sqlx::query_as(
            r#"
            SELECT * FROM notifications
            WHERE environment_id = $1 AND subscriber_id = $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(environment_id)
        .bind(subscriber_id)
        .fetch_all(self.pools.primary())
        .await?;

        Ok(rows)
    }

    /// A filtered page of populated notifications, newest first, plus the
    /// total number of matches.
    pub async fn get_feed(
        &self,
        environment_id: Uuid,
        filters: &FeedFilters,
        skip: i64,
        limit: i64,
    ) -> Result<FeedPage, AppError> {
        let pool = self.pools.reader(ReadPreference::SecondaryPreferred);

        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM notifications");
        filters.push_where(&mut count_qb, environment_id);
        let total_count: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

        let mut page_qb = QueryBuilder::<Postgres>::new("SELECT * FROM notifications");
        filters.push_where(&mut page_qb, environment_id);
        page_qb
            .push(" ORDER BY created_at DESC OFFSET ")
            .push_bind(skip)
            .push(" LIMIT ")
            .push_bind(limit);
        let notifications: Vec<Notification> = page_qb.build_query_as().fetch_all(pool).await?;

        tracing::debug!(
            environment_id = %environment_id,
            total_count,
            returned = notifications.len(),
            skip,
            limit,
            "Feed page loaded"
        );

        let data = populate(pool, environment_id, notifications).await?;
        Ok(FeedPage { total_count, data })
    }

    /// One populated notification scoped by id, environment and organization.
    pub async fn get_feed_item(
        &self,
        id: Uuid,
        environment_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<FeedItem>, AppError> {
        let pool = self.pools.reader(ReadPreference::SecondaryPreferred);

        let notification: Option<Notification> = sqlx::query_as(
            r#"
            SELECT * FROM notifications
            WHERE id = $1 AND environment_id = $2 AND organization_id = $3
            "#,
        )
        .bind(id)
        .bind(environment_id)
        .bind(organization_id)
        .fetch_optional(pool)
        .await?;

        let Some(notification) = notification else {
            return Ok(None);
        };

        let mut items = populate(pool, environment_id, vec![notification]).await?;
        Ok(items.pop())
    }

    /// Per-day counts since `since`, with the distinct templates and channels
    /// touched each day. Days are UTC and returned in ascending order.
    pub async fn get_activity_graph_stats(
        &self,
        since: DateTime<Utc>,
        environment_id: Uuid,
    ) -> Result<Vec<ActivityGraphEntry>, AppError> {
        let rows: Vec<(String, i64, Vec<Uuid>, Vec<String>)> = sqlx::query_as(
            r#"
            SELECT
                to_char(n.created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD') AS day,
                COUNT(DISTINCT n.id) AS count,
                ARRAY_AGG(DISTINCT n.template_id) AS templates,
                ARRAY_REMOVE(ARRAY_AGG(DISTINCT c.channel), NULL) AS channels
            FROM notifications n
            LEFT JOIN LATERAL UNNEST(n.channels) AS c(channel) ON TRUE
            WHERE n.environment_id = $1 AND n.created_at >= $2
            GROUP BY day
            ORDER BY day ASC
            "#,
        )
        .bind(environment_id)
        .bind(since)
        .fetch_all(self.pools.reader(ReadPreference::SecondaryPreferred))
        .await?;

        rows.into_iter()
            .map(|(id, count, templates, channels)| -> Result<_, AppError> {
                Ok(ActivityGraphEntry {
                    id,
                    count,
                    templates,
                    channels: parse_channels("channels", &channels)?,
                })
            })
            .collect()
    }

    /// Weekly, monthly and yearly counts ending now.
    pub async fn get_stats(&self, environment_id: Uuid) -> Result<NotificationStats, AppError> {
        self.get_stats_at(environment_id, Utc::now()).await
    }

    /// Weekly, monthly and yearly counts ending at `now`, in a single pass
    /// over the one-year window.
    pub async fn get_stats_at(
        &self,
        environment_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<NotificationStats, AppError> {
        let window = StatsWindow::ending_at(now);

        let (weekly, monthly, yearly): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE created_at >= $2) AS weekly,
                COUNT(*) FILTER (WHERE created_at >= $3) AS monthly,
                COUNT(*) AS yearly
            FROM notifications
            WHERE environment_id = $1
              AND created_at >= $4
              AND created_at <= $5
            "#,
        )
        .bind(environment_id)
        .bind(window.week_start)
        .bind(window.month_start)
        .bind(window.year_start)
        .bind(window.end)
        .fetch_one(self.pools.reader(ReadPreference::SecondaryPreferred))
        .await?;

        Ok(NotificationStats {
            weekly,
            monthly,
            yearly,
        })
    }
}

/// Attach subscriber, template and non-trigger jobs (with steps and execution
/// details) to each notification, keeping the input order.
async fn populate(
    pool: &PgPool,
    environment_id: Uuid,
    notifications: Vec<Notification>,
) -> Result<Vec<FeedItem>, AppError> {
    if notifications.is_empty() {
        return Ok(Vec::new());
    }

    let notification_ids: Vec<Uuid> = notifications.iter().map(|n| n.id).collect();
    let subscriber_ids = unique(notifications.iter().map(|n| n.subscriber_id));
    let template_ids = unique(notifications.iter().map(|n| n.template_id));

    let subscribers: Vec<SubscriberSummary> = sqlx::query_as(
        r#"
        SELECT id, subscriber_id, first_name, last_name, email, phone
        FROM subscribers
        WHERE id = ANY($1) AND environment_id = $2
        "#,
    )
    .bind(&subscriber_ids)
    .bind(environment_id)
    .fetch_all(pool)
    .await?;

    let templates: Vec<TemplateSummary> = sqlx::query_as(
        r#"
        SELECT id, name, triggers
        FROM notification_templates
        WHERE id = ANY($1) AND environment_id = $2
        "#,
    )
    .bind(&template_ids)
    .bind(environment_id)
    .fetch_all(pool)
    .await?;

    let jobs: Vec<Job> = sqlx::query_as(
        r#"
        SELECT id, notification_id, step_id, step_type, status, created_at
        FROM jobs
        WHERE notification_id = ANY($1)
          AND environment_id = $2
          AND step_type <> 'trigger'
        ORDER BY created_at ASC
        "#,
    )
    .bind(&notification_ids)
    .bind(environment_id)
    .fetch_all(pool)
    .await?;

    let job_ids: Vec<Uuid> = jobs.iter().map(|j| j.id).collect();
    let step_ids = unique(jobs.iter().filter_map(|j| j.step_id));

    let steps: Vec<StepSummary> = if step_ids.is_empty() {
        Vec::new()
    } else {
        sqlx::query_as(
            r#"
            SELECT id, step_type, name, active, metadata
            FROM template_steps
            WHERE id = ANY($1)
            "#,
        )
        .bind(&step_ids)
        .fetch_all(pool)
        .await?
    };

    let details: Vec<ExecutionDetail> = if job_ids.is_empty() {
        Vec::new()
    } else {
        sqlx::query_as(
            r#"
            SELECT id, job_id, notification_id, detail, source, status,
                   is_test, is_retry, raw, created_at
            FROM execution_details
            WHERE job_id = ANY($1) AND environment_id = $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(&job_ids)
        .bind(environment_id)
        .fetch_all(pool)
        .await?
    };

    Ok(assemble(
        notifications,
        subscribers,
        templates,
        jobs,
        steps,
        details,
    ))
}

/// Stitch loaded relations onto their notifications. Jobs and details keep
/// the order they were loaded in.
fn assemble(
    notifications: Vec<Notification>,
    subscribers: Vec<SubscriberSummary>,
    templates: Vec<TemplateSummary>,
    jobs: Vec<Job>,
    steps: Vec<StepSummary>,
    details: Vec<ExecutionDetail>,
) -> Vec<FeedItem> {
    let subscribers: HashMap<Uuid, SubscriberSummary> =
        subscribers.into_iter().map(|s| (s.id, s)).collect();
    let templates: HashMap<Uuid, TemplateSummary> =
        templates.into_iter().map(|t| (t.id, t)).collect();
    let steps: HashMap<Uuid, StepSummary> = steps.into_iter().map(|s| (s.id, s)).collect();

    let mut details_by_job: HashMap<Uuid, Vec<ExecutionDetail>> = HashMap::new();
    for detail in details {
        details_by_job.entry(detail.job_id).or_default().push(detail);
    }

    let mut jobs_by_notification: HashMap<Uuid, Vec<PopulatedJob>> = HashMap::new();
    for job in jobs {
        let step = job.step_id.and_then(|id| steps.get(&id).cloned());
        let execution_details = details_by_job.remove(&job.id).unwrap_or_default();
        jobs_by_notification
            .entry(job.notification_id)
            .or_default()
            .push(PopulatedJob {
                job,
                step,
                execution_details,
            });
    }

    notifications
        .into_iter()
        .map(|notification| FeedItem {
            subscriber: subscribers.get(&notification.subscriber_id).cloned(),
            template: templates.get(&notification.template_id).cloned(),
            jobs: jobs_by_notification
                .remove(&notification.id)
                .unwrap_or_default(),
            notification,
        })
        .collect()
}

fn unique(ids: impl Iterator<Item = Uuid>) -> Vec<Uuid> {
    let mut out: Vec<Uuid> = ids.collect();
    out.sort_unstable();
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use notifeed_common::types::{
        ExecutionDetailSource, ExecutionDetailStatus, JobStatus, StepType,
    };

    fn where_sql(filters: &FeedFilters) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM notifications");
        filters.push_where(&mut qb, Uuid::new_v4());
        qb.sql().to_string()
    }

    fn notification(subscriber_id: Uuid, template_id: Uuid) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            environment_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            subscriber_id,
            template_id,
            transaction_id: "tx".to_string(),
            channels: vec![ChannelType::InApp],
            created_at: Utc::now(),
        }
    }

    fn job(notification_id: Uuid, step_id: Option<Uuid>) -> Job {
        Job {
            id: Uuid::new_v4(),
            notification_id,
            step_id,
            step_type: StepType::InApp,
            status: JobStatus::Completed,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_filters_only_scope_environment() {
        let sql = where_sql(&FeedFilters::default());
        assert_eq!(sql, "SELECT * FROM notifications WHERE environment_id = $1");
    }

    #[test]
    fn test_empty_lists_are_omitted() {
        let filters = FeedFilters {
            channels: Some(vec![]),
            template_ids: Some(vec![]),
            subscriber_ids: Some(vec![]),
            transaction_id: None,
        };
        assert_eq!(
            where_sql(&filters),
            "SELECT * FROM notifications WHERE environment_id = $1"
        );
    }

    #[test]
    fn test_all_filters_in_order() {
        let filters = FeedFilters {
            channels: Some(vec![ChannelType::Email, ChannelType::Sms]),
            template_ids: Some(vec![Uuid::new_v4()]),
            subscriber_ids: Some(vec![Uuid::new_v4()]),
            transaction_id: Some("tx-1".to_string()),
        };
        assert_eq!(
            where_sql(&filters),
            "SELECT * FROM notifications WHERE environment_id = $1 \
             AND channels && $2::text[] \
             AND template_id = ANY($3) \
             AND subscriber_id = ANY($4) \
             AND transaction_id = $5"
        );
    }

    #[test]
    fn test_transaction_only() {
        let filters = FeedFilters {
            transaction_id: Some("tx-1".to_string()),
            ..Default::default()
        };
        assert_eq!(
            where_sql(&filters),
            "SELECT * FROM notifications WHERE environment_id = $1 AND transaction_id = $2"
        );
    }

    #[test]
    fn test_assemble_attaches_relations() {
        let sub_id = Uuid::new_v4();
        let tpl_id = Uuid::new_v4();
        let n1 = notification(sub_id, tpl_id);
        let n2 = notification(Uuid::new_v4(), tpl_id);

        let step_id = Uuid::new_v4();
        let j1 = job(n1.id, Some(step_id));
        let j2 = job(n1.id, None);
        let detail = ExecutionDetail {
            id: Uuid::new_v4(),
            job_id: j1.id,
            notification_id: n1.id,
            detail: "Message sent".to_string(),
            source: ExecutionDetailSource::Internal,
            status: ExecutionDetailStatus::Success,
            is_test: false,
            is_retry: false,
            raw: None,
            created_at: Utc::now(),
        };

        let items = assemble(
            vec![n1.clone(), n2.clone()],
            vec![SubscriberSummary {
                id: sub_id,
                subscriber_id: "ext-1".to_string(),
                first_name: Some("Ada".to_string()),
                last_name: None,
                email: None,
                phone: None,
            }],
            vec![TemplateSummary {
                id: tpl_id,
                name: "Welcome".to_string(),
                triggers: serde_json::json!([{"identifier": "welcome"}]),
            }],
            vec![j1.clone(), j2.clone()],
            vec![StepSummary {
                id: step_id,
                step_type: StepType::InApp,
                name: Some("inbox".to_string()),
                active: true,
                metadata: serde_json::json!({}),
            }],
            vec![detail.clone()],
        );

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].notification.id, n1.id);
        assert_eq!(items[0].subscriber.as_ref().unwrap().subscriber_id, "ext-1");
        assert_eq!(items[0].template.as_ref().unwrap().name, "Welcome");
        assert_eq!(items[0].jobs.len(), 2);
        assert_eq!(items[0].jobs[0].job.id, j1.id);
        assert_eq!(items[0].jobs[0].step.as_ref().unwrap().id, step_id);
        assert_eq!(items[0].jobs[0].execution_details, vec![detail]);
        assert!(items[0].jobs[1].step.is_none());
        assert!(items[0].jobs[1].execution_details.is_empty());

        assert_eq!(items[1].notification.id, n2.id);
        assert!(items[1].subscriber.is_none());
        assert!(items[1].template.is_some());
        assert!(items[1].jobs.is_empty());
    }

    #[test]
    fn test_unique_dedups() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let out = unique([a, b, a, b, a].into_iter());
        assert_eq!(out.len(), 2);
    }
}
